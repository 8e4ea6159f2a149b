//! xRTML relay.
//!
//! Starts a routing runtime over the in-memory hub with the configured
//! connections and logs every envelope routed through it until Ctrl-C.
//!
//! Configuration comes from `XRTML__*` environment variables and the optional
//! file named by `XRTML_CONFIG`. `RUST_LOG` overrides the configured level.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use xrtml::adapters::{ErrorReporter, InMemoryHub, InMemoryTransportFactory};
use xrtml::application::{ManagerEvent, XrtmlRuntime};
use xrtml::config::{AppConfig, LoggingConfig};

fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    init_tracing(&config.logging).map_err(|e| e.to_string())?;

    if let Err(err) = config.validate() {
        warn!(error = %err, "configuration is invalid, affected connections will report errors");
    }

    let reporter = ErrorReporter::from_config(&config.runtime)?;
    let hub = InMemoryHub::new();
    let factory = Arc::new(InMemoryTransportFactory::new(hub.clone()));

    let runtime = XrtmlRuntime::from_config(&config, factory, Arc::new(reporter));

    runtime.manager().on(|event| match event {
        ManagerEvent::XrtmlMessage {
            connection,
            channel,
            message,
        } => {
            info!(
                connection_id = %connection,
                channel = %channel,
                trigger = ?message.trigger_names(),
                action = message.action.as_deref().unwrap_or("-"),
                sender = message.sender_id.as_deref().unwrap_or("-"),
                data = %message.data,
                "envelope routed"
            );
        }
        ManagerEvent::ConnectionAdded { id } => info!(connection_id = %id, "connection added"),
        ManagerEvent::ConnectionRemoved { id } => info!(connection_id = %id, "connection removed"),
    });

    info!(
        connections = runtime.manager().len(),
        clients = hub.client_count(),
        "xrtml relay running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;

    info!("shutdown signal received");
    runtime.shutdown();

    Ok(())
}
