use anyhow::Context;
use ferrous_doh_domain::{CliOverrides, Config, SessionEvent, SessionState};
use ferrous_doh_infrastructure::events::{ChannelListener, TracingListener};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::bootstrap;
use crate::di::Services;

/// Runs until Ctrl-C or until the session fails. SIGHUP re-reads the
/// configuration and restarts the session with it.
pub async fn run(
    services: &Services,
    config: Config,
    config_path: Option<&str>,
    overrides: CliOverrides,
) -> anyhow::Result<()> {
    let controller = &services.controller;
    controller.add_listener(Arc::new(TracingListener));
    let (listener, mut events) = ChannelListener::new();
    controller.add_listener(Arc::new(listener));

    controller
        .start(config.resolver_config()?)
        .await
        .context("Failed to start tunnel session")?;

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break Ok(());
            }
            _ = hangup.recv() => {
                info!("Reloading configuration");
                let reloaded = bootstrap::load_config(config_path, overrides.clone())
                    .and_then(|c| c.resolver_config().map_err(anyhow::Error::from));
                match reloaded {
                    Ok(resolver) => {
                        if let Err(e) = controller.reload_and_restart(resolver).await {
                            error!(error = %e, "Restart with reloaded configuration failed");
                        }
                    }
                    Err(e) => warn!(error = %e, "Keeping current session, reload rejected"),
                }
            }
            event = events.recv() => match event {
                Some(SessionEvent::StateChanged { state: SessionState::Error, message }) => {
                    break Err(anyhow::anyhow!(
                        "tunnel session failed: {}",
                        message.unwrap_or_else(|| "unknown error".to_string())
                    ));
                }
                Some(_) => {}
                None => break Ok(()),
            },
        }
    };

    controller.stop().await;
    info!("Ferrous DoH stopped");
    outcome
}
