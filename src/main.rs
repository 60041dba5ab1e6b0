use clap::Parser;
use log::{error, info};
use rg_status::config::{AppConfig, CliOverrides};
use rg_status::daemon::{plugin_registry, Daemon, EXIT_FAILURE};
use std::path::PathBuf;
use tokio::task::LocalSet;

/// rg-status - aggregate system state into one status line
#[derive(Parser, Debug, Clone)]
#[command(name = "rg-status")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output renderer (text, json, debug)
    #[arg(short = 'o', long = "output", value_name = "NAME")]
    output: Option<String>,

    /// Input plugin to load (repeatable)
    #[arg(short = 'i', long = "input", value_name = "NAME")]
    inputs: Vec<String>,

    /// Section id or name in display order (repeatable)
    #[arg(short = 'O', long = "order", value_name = "ID")]
    order: Vec<String>,

    /// Listen for consumers on tcp:HOST:PORT or unix:PATH (repeatable)
    #[arg(short = 'l', long = "listen", value_name = "ADDRESS")]
    listen: Vec<String>,

    /// Deliver to std, tcp:HOST:PORT or unix:PATH (repeatable)
    #[arg(short = 's', long = "stream", value_name = "ADDRESS")]
    streams: Vec<String>,

    /// Render a single line and exit
    #[arg(long = "one-shot")]
    one_shot: bool,

    /// Config file (overrides RG_STATUS_CONFIG and the default location)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,

    /// List the compiled-in plugins and exit
    #[arg(long = "list-plugins")]
    list_plugins: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            output: self.output.clone(),
            inputs: self.inputs.clone(),
            order: self.order.clone(),
            listen: self.listen.clone(),
            streams: self.streams.clone(),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Level 0 (default): warn only
    // Level 1: info
    // Level 2: debug
    // Level 3+: trace
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    info!("Starting rg-status v{}", env!("CARGO_PKG_VERSION"));

    if cli.list_plugins {
        list_plugins();
        return;
    }

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}, using defaults", e);
            AppConfig::default()
        }
    };
    config.extend(cli.overrides());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Could not start the event loop: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    let local = LocalSet::new();
    let code = local.block_on(&runtime, run(config, cli.one_shot));
    std::process::exit(code);
}

async fn run(config: AppConfig, one_shot: bool) -> i32 {
    let registry = plugin_registry();
    let daemon = match Daemon::build(&config, &registry, one_shot).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("{}", e);
            return e.exit_code();
        }
    };
    match daemon.run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            EXIT_FAILURE
        }
    }
}

/// Print the compiled-in plugins to stdout
fn list_plugins() {
    let registry = plugin_registry();
    println!("Inputs:");
    for name in registry.list_inputs() {
        println!("  {}", name);
    }
    println!("Outputs:");
    for name in registry.list_renderers() {
        println!("  {}", name);
    }
}
