//! padcursor - gamepad-driven virtual pointer
//!
//! Command-line front end: rewrite class files, manage bindings, list
//! gamepads, or run the headless frame loop against the console host.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use padcursor::config::ControllerConfig;
use padcursor::input::BindingStore;
use padcursor::paths::AppPaths;

/// padcursor - drive a mouse-only application with a gamepad
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: detected from the app paths)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Also write a daily rolling log file into the logs directory
    #[arg(long, global = true)]
    log_file: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Redirect pointer queries in a class file or a directory of them
    Rewrite {
        /// A .class file or a directory tree of them
        path: PathBuf,

        /// Where to write the result (file, or directory mirror)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dotted class name for a single file (default: read from the class)
        #[arg(long)]
        class_name: Option<String>,
    },

    /// Show and edit controller bindings
    Bindings {
        /// Rebind an action, e.g. `jump=RB` or `attack=LT`
        #[arg(long = "set", value_name = "ID=INDEX")]
        set: Vec<String>,

        /// Unbind an action
        #[arg(long, value_name = "ID")]
        unbind: Vec<String>,

        /// Restore every default before applying edits
        #[arg(long)]
        reset: bool,
    },

    /// Run the frame loop against a console surface until Ctrl+C
    Run {
        /// Frames per second
        #[arg(long, default_value_t = 60)]
        fps: u32,

        /// Simulated surface as WIDTHxHEIGHT@SCALE
        #[arg(long, default_value = "427x240@3")]
        surface: String,

        /// Start with a surface already open
        #[arg(long)]
        open: bool,
    },

    /// List connected gamepads
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let paths = AppPaths::detect();
    let config_path = args.config.clone().unwrap_or_else(|| paths.config.clone());

    let log_dir = if args.log_file {
        paths.ensure_directories()?;
        Some(paths.logs_dir.clone())
    } else {
        None
    };
    let _log_guard = init_logging(&args.log_level, args.log_json, log_dir)?;

    info!("padcursor v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path.display());

    let config = ControllerConfig::load(&config_path).await;
    let store = BindingStore::new(paths.bindings.clone());

    match args.command {
        Command::Rewrite {
            path,
            output,
            class_name,
        } => cli::rewrite(&config.rewriter, &path, output.as_deref(), class_name.as_deref()),
        Command::Bindings { set, unbind, reset } => cli::bindings(&store, &set, &unbind, reset),
        Command::Run { fps, surface, open } => {
            let metrics = cli::parse_surface(&surface)?;
            cli::run(config, &store, fps, metrics, open, shutdown_signal()).await
        }
        Command::Devices => cli::devices(),
    }
}

/// Install the global subscriber; the returned guard flushes the log file on drop
fn init_logging(level: &str, json: bool, log_dir: Option<PathBuf>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "padcursor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
        }))
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_target(false)))
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
