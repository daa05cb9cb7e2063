//! Rendering committed generations.
//!
//! Renderers are plain synchronous sinks: they get a graph and its
//! generation and write a deterministic representation. [`RenderLoop`] is
//! the async side that follows the store and feeds them.

use std::fmt::Write as _;
use std::io::Write;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use sdntwin_core::{EdgeKey, Endpoint, Generation, LinkMeta, Node, TopologyGraph};
use sdntwin_store::{TwinSnapshot, TwinStore};

use crate::error::RenderError;

pub trait Renderer: Send {
    fn render(&mut self, graph: &TopologyGraph, generation: Generation) -> Result<(), RenderError>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, graph: &TopologyGraph, generation: Generation) -> Result<(), RenderError> {
        (**self).render(graph, generation)
    }
}

/// Output format selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    #[default]
    Text,
    Dot,
}

impl RenderFormat {
    /// Boxed renderer of this format writing to `out`.
    pub fn renderer<W: Write + Send + 'static>(self, out: W) -> Box<dyn Renderer> {
        match self {
            RenderFormat::Text => Box::new(TextRenderer::new(out)),
            RenderFormat::Dot => Box::new(DotRenderer::new(out)),
        }
    }
}

// ---------------------------------------------------------------------------
// Ordering helpers
// ---------------------------------------------------------------------------

/// Labels in natural order: `s2` before `s10`.
fn natural(label: &str) -> (usize, &str) {
    (label.len(), label)
}

fn sorted_nodes<'g>(graph: &'g TopologyGraph, pick: impl Fn(&Node) -> bool) -> Vec<&'g Node> {
    let mut nodes: Vec<&Node> = graph.nodes().filter(|n| pick(n)).collect();
    nodes.sort_by(|a, b| natural(&a.label).cmp(&natural(&b.label)));
    nodes
}

fn label_of<'g>(graph: &'g TopologyGraph, endpoint: &'g Endpoint) -> &'g str {
    graph
        .node(&endpoint.node)
        .map(|n| n.label.as_str())
        .unwrap_or(endpoint.node.as_str())
}

/// Splits an access edge into its host and switch endpoints.
fn access_sides<'g>(graph: &TopologyGraph, key: &'g EdgeKey) -> (&'g Endpoint, &'g Endpoint) {
    let (a, b) = key.endpoints();
    let a_is_host = graph.node(&a.node).map(Node::is_host).unwrap_or(a.port.is_none());
    if a_is_host {
        (a, b)
    } else {
        (b, a)
    }
}

fn trunk_edges(graph: &TopologyGraph) -> Vec<(&EdgeKey, &LinkMeta)> {
    let mut edges: Vec<_> = graph.edges().filter(|(_, m)| m.is_trunk()).collect();
    edges.sort_by(|(x, _), (y, _)| {
        let (xa, xb) = x.endpoints();
        let (ya, yb) = y.endpoints();
        (natural(label_of(graph, xa)), xa.port, natural(label_of(graph, xb)), xb.port).cmp(&(
            natural(label_of(graph, ya)),
            ya.port,
            natural(label_of(graph, yb)),
            yb.port,
        ))
    });
    edges
}

fn access_edges(graph: &TopologyGraph) -> Vec<(&Endpoint, &Endpoint)> {
    let mut edges: Vec<_> = graph
        .edges()
        .filter(|(_, m)| !m.is_trunk())
        .map(|(k, _)| access_sides(graph, k))
        .collect();
    edges.sort_by(|(h1, _), (h2, _)| natural(label_of(graph, h1)).cmp(&natural(label_of(graph, h2))));
    edges
}

fn port_text(port: Option<u32>) -> String {
    port.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Plain-text listing of a generation.
pub fn render_text(graph: &TopologyGraph, generation: Generation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Digital Twin - Network Topology (generation {generation}) ===");

    let switches = sorted_nodes(graph, Node::is_switch);
    let names: Vec<String> = switches
        .iter()
        .map(|n| {
            if n.placeholder {
                format!("{}*", n.label)
            } else {
                n.label.clone()
            }
        })
        .collect();
    let _ = writeln!(out, "{}", listing("Switches", &names));
    if switches.iter().any(|n| n.placeholder) {
        let _ = writeln!(out, "  (* referenced by a link but not reported by the controller)");
    }

    let hosts = sorted_nodes(graph, Node::is_host);
    let names: Vec<String> = hosts.iter().map(|n| n.label.clone()).collect();
    let _ = writeln!(out, "{}", listing("Hosts", &names));

    let trunks = trunk_edges(graph);
    let _ = writeln!(out, "Switch-to-Switch Links ({}):", trunks.len());
    for (key, meta) in trunks {
        let (a, b) = key.endpoints();
        let _ = write!(
            out,
            "  {}:{} <-> {}:{}",
            label_of(graph, a),
            port_text(a.port),
            label_of(graph, b),
            port_text(b.port)
        );
        if let Some(bw) = meta.bandwidth_mbps {
            let _ = write!(out, " [{bw} Mbps]");
        }
        if let Some(status) = &meta.status {
            let _ = write!(out, " ({status})");
        }
        out.push('\n');
    }

    let access = access_edges(graph);
    let _ = writeln!(out, "Host-to-Switch Links ({}):", access.len());
    for (host, switch) in access {
        let _ = writeln!(
            out,
            "  {} [{}] -> {} port {}",
            label_of(graph, host),
            host.node,
            label_of(graph, switch),
            port_text(switch.port)
        );
    }
    out
}

fn listing(title: &str, names: &[String]) -> String {
    if names.is_empty() {
        format!("{title} (0):")
    } else {
        format!("{title} ({}): {}", names.len(), names.join(", "))
    }
}

/// Writes [`render_text`] output, one frame per generation.
pub struct TextRenderer<W> {
    out: W,
}

impl<W: Write + Send> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        TextRenderer { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for TextRenderer<W> {
    fn render(&mut self, graph: &TopologyGraph, generation: Generation) -> Result<(), RenderError> {
        self.out.write_all(render_text(graph, generation).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DOT
// ---------------------------------------------------------------------------

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Graphviz DOT for a generation. Switches are boxes, hosts ellipses and
/// placeholders dashed.
pub fn render_dot(graph: &TopologyGraph, generation: Generation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "graph twin {{");
    let _ = writeln!(out, "  label={};", quoted(&format!("generation {generation}")));

    for node in sorted_nodes(graph, Node::is_switch) {
        let style = if node.placeholder { ", style=dashed" } else { "" };
        let _ = writeln!(
            out,
            "  {} [label={}, shape=box{}];",
            quoted(node.id.as_str()),
            quoted(&node.label),
            style
        );
    }
    for node in sorted_nodes(graph, Node::is_host) {
        let _ = writeln!(
            out,
            "  {} [label={}, shape=ellipse];",
            quoted(node.id.as_str()),
            quoted(&node.label)
        );
    }

    for (key, _) in trunk_edges(graph) {
        let (a, b) = key.endpoints();
        let _ = writeln!(
            out,
            "  {} -- {} [taillabel={}, headlabel={}];",
            quoted(a.node.as_str()),
            quoted(b.node.as_str()),
            quoted(&port_text(a.port)),
            quoted(&port_text(b.port))
        );
    }
    for (host, switch) in access_edges(graph) {
        let _ = writeln!(
            out,
            "  {} -- {} [headlabel={}, style=dotted];",
            quoted(host.node.as_str()),
            quoted(switch.node.as_str()),
            quoted(&port_text(switch.port))
        );
    }
    let _ = writeln!(out, "}}");
    out
}

/// Writes [`render_dot`] output.
pub struct DotRenderer<W> {
    out: W,
}

impl<W: Write + Send> DotRenderer<W> {
    pub fn new(out: W) -> Self {
        DotRenderer { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for DotRenderer<W> {
    fn render(&mut self, graph: &TopologyGraph, generation: Generation) -> Result<(), RenderError> {
        self.out.write_all(render_dot(graph, generation).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Render loop
// ---------------------------------------------------------------------------

/// Counters reported by a finished [`RenderLoop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub renders: u64,
    pub last_generation: Option<Generation>,
}

/// Follows a store and renders each new generation.
///
/// Generations are rendered in increasing order but not necessarily all of
/// them: when commits arrive faster than the renderer runs, only the latest
/// is rendered.
pub struct RenderLoop<R> {
    renderer: R,
    updates: watch::Receiver<TwinSnapshot>,
    stats: RenderStats,
}

impl<R: Renderer> RenderLoop<R> {
    pub fn new(renderer: R, store: &TwinStore) -> Self {
        RenderLoop {
            renderer,
            updates: store.subscribe(),
            stats: RenderStats::default(),
        }
    }

    fn render_latest(&mut self) -> Result<(), RenderError> {
        let snapshot = self.updates.borrow_and_update().clone();
        if snapshot.generation == Generation::ZERO {
            return Ok(());
        }
        if self.stats.last_generation.is_some_and(|g| g >= snapshot.generation) {
            return Ok(());
        }
        self.renderer.render(&snapshot.graph, snapshot.generation)?;
        self.stats.renders += 1;
        self.stats.last_generation = Some(snapshot.generation);
        Ok(())
    }

    /// Renders until `shutdown` is cancelled or the store goes away, then
    /// renders the final generation if it has not been shown yet.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<RenderStats, RenderError> {
        self.render_latest()?;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                changed = self.updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.render_latest()?;
                }
            }
        }
        self.render_latest()?;
        tracing::debug!(renders = self.stats.renders, "render loop finished");
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use sdntwin_core::{normalize, Dpid, RawHost, RawLink, RawLinkEnd, RawPort, RawSwitch, RawTopology};

    fn end(dpid: u64, port: u32) -> RawLinkEnd {
        RawLinkEnd {
            dpid: Dpid(dpid),
            port_no: RawPort(port),
        }
    }

    fn link(a: RawLinkEnd, b: RawLinkEnd) -> RawLink {
        RawLink {
            src: a,
            dst: b,
            bandwidth: None,
            status: None,
        }
    }

    fn host(mac: &str, dpid: u64, port: u32) -> RawHost {
        RawHost {
            mac: mac.to_string(),
            attached_switch: Dpid(dpid),
            attached_port: RawPort(port),
        }
    }

    /// Three switches in a line, s3 only seen through a link.
    fn lab() -> TopologyGraph {
        normalize(&RawTopology {
            switches: vec![RawSwitch::Id(Dpid(1)), RawSwitch::Id(Dpid(2))],
            links: vec![
                link(end(1, 1), end(2, 1)),
                link(end(2, 1), end(1, 1)),
                link(end(2, 2), end(3, 1)),
            ],
            hosts: vec![
                host("00:00:00:00:00:02", 2, 3),
                host("00:00:00:00:00:01", 1, 2),
                host("00:00:00:00:00:09", 1, 1),
            ],
        })
    }

    #[test]
    fn text_listing() {
        assert_snapshot!(render_text(&lab(), Generation(4)), @r###"
        === Digital Twin - Network Topology (generation 4) ===
        Switches (3): s1, s2, s3*
          (* referenced by a link but not reported by the controller)
        Hosts (2): h1, h2
        Switch-to-Switch Links (2):
          s1:1 <-> s2:1
          s2:2 <-> s3:1
        Host-to-Switch Links (2):
          h1 [00:00:00:00:00:01] -> s1 port 2
          h2 [00:00:00:00:00:02] -> s2 port 3
        "###);
    }

    #[test]
    fn text_empty_graph() {
        assert_snapshot!(render_text(&TopologyGraph::new(), Generation::ZERO), @r###"
        === Digital Twin - Network Topology (generation 0) ===
        Switches (0):
        Hosts (0):
        Switch-to-Switch Links (0):
        Host-to-Switch Links (0):
        "###);
    }

    #[test]
    fn dot_listing() {
        assert_snapshot!(render_dot(&lab(), Generation(4)), @r###"
        graph twin {
          label="generation 4";
          "s1" [label="s1", shape=box];
          "s2" [label="s2", shape=box];
          "s3" [label="s3", shape=box, style=dashed];
          "00:00:00:00:00:01" [label="h1", shape=ellipse];
          "00:00:00:00:00:02" [label="h2", shape=ellipse];
          "s1" -- "s2" [taillabel="1", headlabel="1"];
          "s2" -- "s3" [taillabel="2", headlabel="1"];
          "00:00:00:00:00:01" -- "s1" [headlabel="2", style=dotted];
          "00:00:00:00:00:02" -- "s2" [headlabel="3", style=dotted];
        }
        "###);
    }

    #[test]
    fn natural_order_of_switches() {
        let graph = normalize(&RawTopology {
            switches: (1..=11).map(|d| RawSwitch::Id(Dpid(d))).collect(),
            ..RawTopology::default()
        });
        let text = render_text(&graph, Generation(1));
        assert!(text.contains("Switches (11): s1, s2, s3, s4, s5, s6, s7, s8, s9, s10, s11\n"));
    }

    #[test]
    fn text_renderer_writes_frames() {
        let mut renderer = TextRenderer::new(Vec::new());
        renderer.render(&lab(), Generation(1)).unwrap();
        renderer.render(&lab(), Generation(2)).unwrap();
        let written = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(written.matches("=== Digital Twin").count(), 2);
        assert!(written.contains("(generation 2)"));
    }
}
