//! Raw controller records, exactly as reported.
//!
//! These types describe the shape of the controller's topology payloads and
//! nothing more: no deduplication, no host filtering, no identities. The
//! normalizer does all interpretation.
//!
//! Controllers disagree on how they spell numbers. Datapath ids arrive as
//! JSON integers, decimal strings, or Ryu's 16-digit hex strings; port
//! numbers as integers or decimal strings. [`Dpid`] and [`RawPort`] accept
//! all of these and reject anything else as a schema violation.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::id::PortNo;

/// Everything one poll of the controller returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTopology {
    #[serde(default)]
    pub switches: Vec<RawSwitch>,
    #[serde(default)]
    pub links: Vec<RawLink>,
    #[serde(default, deserialize_with = "deserialize_hosts")]
    pub hosts: Vec<RawHost>,
}

impl RawTopology {
    pub fn is_empty(&self) -> bool {
        self.switches.is_empty() && self.links.is_empty() && self.hosts.is_empty()
    }
}

/// A switch entry: either a bare datapath id or a described switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSwitch {
    Id(Dpid),
    Described {
        dpid: Dpid,
        #[serde(default)]
        ports: Vec<RawPortEntry>,
    },
}

impl RawSwitch {
    pub fn dpid(&self) -> Dpid {
        match self {
            RawSwitch::Id(dpid) | RawSwitch::Described { dpid, .. } => *dpid,
        }
    }

    /// Ports listed on the switch itself (links may reveal more).
    pub fn ports(&self) -> impl Iterator<Item = PortNo> + '_ {
        let listed = match self {
            RawSwitch::Id(_) => &[][..],
            RawSwitch::Described { ports, .. } => ports.as_slice(),
        };
        listed.iter().map(|p| p.port_no.0)
    }
}

/// Port entry inside a described switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPortEntry {
    pub port_no: RawPort,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One direction of a discovered link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub src: RawLinkEnd,
    pub dst: RawLinkEnd,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLinkEnd {
    pub dpid: Dpid,
    pub port_no: RawPort,
}

/// A learned host and the switch port it was seen on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHost {
    pub mac: String,
    pub attached_switch: Dpid,
    pub attached_port: RawPort,
}

/// Host attachment as it appears in the map form of the hosts payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawAttachment {
    pub attached_switch: Dpid,
    pub attached_port: RawPort,
}

/// The hosts payload comes either as `{ mac: attachment }` or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawHostsPayload {
    Map(BTreeMap<String, RawAttachment>),
    List(Vec<RawHost>),
}

impl RawHostsPayload {
    pub fn into_hosts(self) -> Vec<RawHost> {
        match self {
            RawHostsPayload::Map(map) => map
                .into_iter()
                .map(|(mac, at)| RawHost {
                    mac,
                    attached_switch: at.attached_switch,
                    attached_port: at.attached_port,
                })
                .collect(),
            RawHostsPayload::List(list) => list,
        }
    }
}

fn deserialize_hosts<'de, D>(deserializer: D) -> Result<Vec<RawHost>, D::Error>
where
    D: Deserializer<'de>,
{
    RawHostsPayload::deserialize(deserializer).map(RawHostsPayload::into_hosts)
}

// ---------------------------------------------------------------------------
// Numeric identifiers
// ---------------------------------------------------------------------------

/// OpenFlow datapath id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Dpid(pub u64);

/// Switch port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RawPort(pub PortNo);

/// Parses a datapath id string: exactly 16 hex digits is Ryu's fixed-width
/// hex form, anything else must be decimal.
pub fn parse_dpid(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.len() == 16 && s.chars().all(|c| c.is_ascii_hexdigit()) {
        u64::from_str_radix(s, 16).ok()
    } else {
        s.parse().ok()
    }
}

struct NumberVisitor {
    expecting: &'static str,
    parse: fn(&str) -> Option<u64>,
}

impl<'de> Visitor<'de> for NumberVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expecting)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        (self.parse)(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for Dpid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(NumberVisitor {
                expecting: "a datapath id as integer, decimal string or 16-digit hex string",
                parse: parse_dpid,
            })
            .map(Dpid)
    }
}

impl<'de> Deserialize<'de> for RawPort {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let visitor = NumberVisitor {
            expecting: "a port number as integer or decimal string",
            parse: |s| s.trim().parse().ok(),
        };
        let value = deserializer.deserialize_any(visitor)?;
        PortNo::try_from(value)
            .map(RawPort)
            .map_err(|_| de::Error::custom(format!("port number {value} out of range")))
    }
}
