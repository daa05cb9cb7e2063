//! The `sdntwin` binary.
//!
//! Subcommands:
//! - `realtime`: poll the controller until Enter or Ctrl-C, re-rendering on
//!   every committed change
//! - `snapshot`: poll once, render, optionally save the result
//! - `replay`: render a saved snapshot, with optional link-down what-ifs and
//!   a pingall reachability report
//!
//! Exit codes: 0 success, 1 configuration/render/IO error, 2 the controller
//! could not be read.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use sdntwin_agent::{
    render_dot, render_text, Mode, RenderFormat, RyuRestSource, StaticSource, TopologySource,
    Twin, TwinConfig, TwinError,
};
use sdntwin_core::{pingall, NodeId, TopologyGraph};
use sdntwin_store::{load_snapshot, save_snapshot};

/// Digital twin of an SDN controller's topology.
#[derive(Parser)]
#[command(name = "sdntwin", version, about = "Digital twin of an SDN controller's topology")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll continuously and re-render on every change until stopped.
    Realtime {
        #[command(flatten)]
        acquire: AcquireArgs,
    },

    /// Poll once, render, and exit.
    Snapshot {
        #[command(flatten)]
        acquire: AcquireArgs,

        /// Also write the committed state to this snapshot file.
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,
    },

    /// Render a saved snapshot file.
    Replay {
        /// Snapshot file written by `snapshot --save`.
        #[arg(short, long)]
        file: PathBuf,

        /// Take the link between two nodes down before rendering (repeatable).
        #[arg(long = "link-down", value_name = "A-B")]
        link_down: Vec<String>,

        /// Bring a link from the snapshot back up after the link-downs
        /// (repeatable).
        #[arg(long = "link-up", value_name = "A-B")]
        link_up: Vec<String>,

        /// Append a host-to-host reachability report.
        #[arg(long)]
        pingall: bool,

        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Where and how to render.
#[derive(Args)]
struct OutputArgs {
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,

    /// Output file (default: stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Dot,
}

impl From<FormatArg> for RenderFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => RenderFormat::Text,
            FormatArg::Dot => RenderFormat::Dot,
        }
    }
}

/// Acquisition settings. Flags override the config file, which overrides
/// the built-in defaults.
#[derive(Args)]
struct AcquireArgs {
    /// JSON configuration file.
    #[arg(long, env = "SDNTWIN_CONFIG")]
    config: Option<PathBuf>,

    /// Controller REST base URL.
    #[arg(long, env = "SDNTWIN_CONTROLLER")]
    controller: Option<String>,

    #[arg(long, env = "SDNTWIN_POLL_INTERVAL_MS")]
    interval_ms: Option<u64>,

    #[arg(long, env = "SDNTWIN_FETCH_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Consecutive absent polls before a node or link is removed.
    #[arg(long, env = "SDNTWIN_DEBOUNCE")]
    debounce: Option<u32>,

    #[arg(long, env = "SDNTWIN_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Read the topology from a JSON file instead of the controller.
    #[arg(long, value_name = "PATH")]
    source_file: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,
}

impl AcquireArgs {
    fn config(&self) -> Result<TwinConfig, TwinError> {
        let mut config = match &self.config {
            Some(path) => TwinConfig::from_json_file(path)?,
            None => TwinConfig::default(),
        };
        if let Some(url) = &self.controller {
            config.controller_url = url.clone();
        }
        if let Some(ms) = self.interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(ms) = self.timeout_ms {
            config.fetch_timeout_ms = ms;
        }
        if let Some(n) = self.debounce {
            config.debounce_polls = n;
        }
        if let Some(n) = self.max_retries {
            config.backoff.max_retries = n;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Realtime { acquire } => run_acquire(Mode::Realtime, &acquire, None).await,
        Commands::Snapshot { acquire, save } => {
            run_acquire(Mode::Snapshot, &acquire, save.as_deref()).await
        }
        Commands::Replay {
            file,
            link_down,
            link_up,
            pingall,
            output,
        } => run_replay(&file, &link_down, &link_up, pingall, &output),
    };
    process::exit(exit_code);
}

fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write + Send>> {
    match path {
        Some(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
        None => Ok(Box::new(io::stdout())),
    }
}

fn exit_code(err: &TwinError) -> i32 {
    if err.is_acquisition_failure() {
        2
    } else {
        1
    }
}

/// Execute `realtime` or `snapshot`.
async fn run_acquire(mode: Mode, args: &AcquireArgs, save: Option<&Path>) -> i32 {
    let config = match args.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match &args.source_file {
        Some(path) => match StaticSource::from_json_file(path) {
            Ok(source) => drive(source, mode, &config, &args.output, save).await,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        None => match RyuRestSource::new(&config.controller_url, config.fetch_timeout()) {
            Ok(source) => drive(source, mode, &config, &args.output, save).await,
            Err(e) => {
                eprintln!("Error: {}", e);
                2
            }
        },
    }
}

async fn drive<S: TopologySource>(
    source: S,
    mode: Mode,
    config: &TwinConfig,
    output: &OutputArgs,
    save: Option<&Path>,
) -> i32 {
    let sink = match open_output(output.output.as_deref()) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("Error: cannot open output: {}", e);
            return 1;
        }
    };
    let renderer = RenderFormat::from(output.format).renderer(sink);

    let mut twin = match Twin::new(source, mode, config) {
        Ok(twin) => twin,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let shutdown = CancellationToken::new();
    if mode == Mode::Realtime {
        tracing::info!(controller = %config.controller_url, "real-time mode, press Enter or Ctrl-C to stop");
        stop_on_operator(shutdown.clone());
    } else {
        stop_on_ctrl_c(shutdown.clone());
    }

    let outcome = match twin.run(renderer, shutdown).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_code(&e);
        }
    };

    if let Some(path) = save {
        if let Err(e) = save_snapshot(path, &outcome.snapshot) {
            eprintln!("Error: cannot save snapshot to '{}': {}", path.display(), e);
            return 1;
        }
    }
    0
}

fn stop_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

/// Cancels on Ctrl-C or on a line from stdin. A closed stdin is ignored.
fn stop_on_operator(token: CancellationToken) {
    tokio::spawn(async move {
        let enter = async {
            let mut line = String::new();
            let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
            match stdin.read_line(&mut line).await {
                Ok(n) if n > 0 => {}
                _ => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = enter => {}
        }
        token.cancel();
    });
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Resolves an `A-B` request to two node ids.
fn link_ends(graph: &TopologyGraph, request: &str) -> Result<(NodeId, NodeId), String> {
    let (x, y) = request
        .split_once('-')
        .ok_or_else(|| format!("invalid link '{}', expected A-B", request))?;
    let resolve = |name: &str| {
        graph
            .resolve(name.trim())
            .map(|node| node.id.clone())
            .ok_or_else(|| format!("unknown node '{}'", name.trim()))
    };
    Ok((resolve(x)?, resolve(y)?))
}

/// Applies the link-down requests in order, then the link-up requests.
/// A link can only come up if `saved` has it.
fn apply_link_changes(saved: &TopologyGraph, down: &[String], up: &[String]) -> Result<TopologyGraph, String> {
    let mut graph = saved.clone();
    for request in down {
        let (a, b) = link_ends(&graph, request)?;
        let (next, removed) = graph.without_link(&a, &b);
        if removed == 0 {
            tracing::warn!(%a, %b, "no link to take down");
        } else {
            tracing::info!(%a, %b, removed, "link down");
        }
        graph = next;
    }
    for request in up {
        let (a, b) = link_ends(&graph, request)?;
        let (next, restored) = graph.restore_link(saved, &a, &b);
        if restored == 0 {
            tracing::warn!(%a, %b, "no saved link to bring up");
        } else {
            tracing::info!(%a, %b, restored, "link up");
        }
        graph = next;
    }
    Ok(graph)
}

/// Execute `replay`. Returns 0 on success, 1 on any error.
fn run_replay(
    file: &Path,
    link_down: &[String],
    link_up: &[String],
    with_pingall: bool,
    output: &OutputArgs,
) -> i32 {
    let snapshot = match load_snapshot(file) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("Error: cannot load '{}': {}", file.display(), e);
            return 1;
        }
    };

    let graph = match apply_link_changes(&snapshot.graph, link_down, link_up) {
        Ok(graph) => graph,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 1;
        }
    };

    let mut text = match RenderFormat::from(output.format) {
        RenderFormat::Text => render_text(&graph, snapshot.generation),
        RenderFormat::Dot => render_dot(&graph, snapshot.generation),
    };
    if with_pingall {
        text.push_str(&pingall(&graph).to_string());
        text.push('\n');
    }

    let written = open_output(output.output.as_deref()).and_then(|mut sink| {
        sink.write_all(text.as_bytes())?;
        sink.flush()
    });
    match written {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: cannot write output: {}", e);
            1
        }
    }
}
