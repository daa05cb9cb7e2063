//! Acquisition and rendering for the sdntwin digital twin.
//!
//! Wires a [`TopologySource`](source::TopologySource) through the
//! normalizer, debouncer and diff engine into a
//! [`TwinStore`](sdntwin_store::TwinStore), and renders committed
//! generations. [`twin::Twin`] is the entry point used by the CLI.

pub mod config;
pub mod error;
pub mod render;
pub mod scheduler;
pub mod source;
pub mod twin;

pub use config::{BackoffPolicy, Mode, TwinConfig};
pub use error::{RenderError, SourceError, TwinError};
pub use render::{
    render_dot, render_text, DotRenderer, RenderFormat, RenderLoop, RenderStats, Renderer,
    TextRenderer,
};
pub use scheduler::{PollOutcome, PollScheduler, PollState, RunSummary};
pub use source::{RyuRestSource, StaticSource, TopologySource};
pub use twin::{Twin, TwinOutcome};
