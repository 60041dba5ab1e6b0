//! Daemon wiring: plugins, streams, signals and the event loop

use crate::config::AppConfig;
use anyhow::Result;
use log::{debug, info, warn};
use rg_status_core::delivery::Listener;
use rg_status_core::{
    Aggregator, AggregatorSettings, Flow, ListenAddress, PluginRegistry, StreamAddress,
};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_NO_RENDERER: i32 = 2;
pub const EXIT_NO_INPUT: i32 = 3;
pub const EXIT_NO_STREAM: i32 = 4;

/// Reasons the daemon cannot start at all
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("No usable output renderer: {0}")]
    NoRenderer(String),
    #[error("No input plugin could be created")]
    NoInput,
    #[error("No output stream or listener could be created")]
    NoStream,
}

impl StartupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::NoRenderer(_) => EXIT_NO_RENDERER,
            StartupError::NoInput => EXIT_NO_INPUT,
            StartupError::NoStream => EXIT_NO_STREAM,
        }
    }
}

/// Registry holding every compiled-in plugin
pub fn plugin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    rg_status_sources::register_all(&mut registry);
    rg_status_render::register_all(&mut registry);
    registry
}

pub struct Daemon {
    aggregator: Aggregator,
    one_shot: bool,
}

impl Daemon {
    /// Create the renderer, the inputs, then the listeners and streams.
    ///
    /// Must be called from within a `LocalSet`.
    pub async fn build(
        config: &AppConfig,
        registry: &PluginRegistry,
        one_shot: bool,
    ) -> Result<Self, StartupError> {
        let output = config.general.output.as_str();
        let renderer = registry
            .create_renderer(output, &config.plugin(output))
            .map_err(|e| StartupError::NoRenderer(format!("{}: {:#}", output, e)))?;
        info!("Output renderer: {}", renderer.name());

        let settings = AggregatorSettings {
            display_order: config.general.order.clone(),
            overrides: config.overrides.clone(),
            reconnect: config.general.reconnect.policy(),
            one_shot,
        };
        let mut aggregator = Aggregator::new(settings, renderer);

        for name in config.inputs() {
            match registry.create_input(&name, aggregator.core(), &config.plugin(&name)) {
                Ok(input) => aggregator.add_input(input),
                Err(e) => warn!("Input plugin {} unavailable: {:#}", name, e),
            }
        }
        if aggregator.input_count() == 0 {
            return Err(StartupError::NoInput);
        }

        for address in &config.general.listen {
            let parsed = match address.parse::<ListenAddress>() {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Skipping listener: {}", e);
                    continue;
                }
            };
            match Listener::bind(&parsed).await {
                Ok(listener) => {
                    info!("Listening on {}", listener.describe());
                    aggregator.delivery_mut().add_server(listener);
                }
                Err(e) => warn!("Could not listen on {}: {}", parsed, e),
            }
        }

        for address in config.streams() {
            match address.parse::<StreamAddress>() {
                Ok(parsed) => {
                    aggregator.delivery_mut().add_client(parsed);
                }
                Err(e) => warn!("Skipping stream: {}", e),
            }
        }
        if aggregator.delivery().is_idle() {
            return Err(StartupError::NoStream);
        }

        Ok(Self {
            aggregator,
            one_shot,
        })
    }

    /// Run until quit, a termination signal, or the last consumer leaving.
    ///
    /// `SIGUSR1` pauses the inputs, `SIGUSR2` resumes them.
    pub async fn run(mut self) -> Result<()> {
        let mut pause = signal(SignalKind::user_defined1())?;
        let mut resume = signal(SignalKind::user_defined2())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        self.aggregator.start();
        if self.one_shot {
            // Render even when no section has a value yet
            self.aggregator.core().request_regeneration(true);
        }

        loop {
            tokio::select! {
                event = self.aggregator.next_event() => {
                    let Some(event) = event else {
                        break;
                    };
                    if self.aggregator.handle_event(event) == Flow::Quit {
                        debug!("Event loop quitting");
                        break;
                    }
                }
                _ = pause.recv() => {
                    info!("Received SIGUSR1, stopping inputs");
                    self.aggregator.stop();
                }
                _ = resume.recv() => {
                    info!("Received SIGUSR2, starting inputs");
                    self.aggregator.start();
                }
                _ = interrupt.recv() => {
                    info!("Interrupted");
                    break;
                }
                _ = terminate.recv() => {
                    info!("Terminated");
                    break;
                }
            }
        }

        self.aggregator.shutdown().await;
        Ok(())
    }
}
