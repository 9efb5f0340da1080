//! Process supervisor: startup sequencing, concurrent trigger and listener, shutdown

use crate::dispatch::{DispatchSource, PollAction};
use crate::models::{ConfigError, Configuration};
use crate::router::CommandRouter;
use crate::scheduler::CronTrigger;
use crate::transport::{PollTransport, TransportError, UpdateSource};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Errors that end the service
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Connectivity check failed: {0}")]
    Connectivity(#[source] TransportError),

    #[error("Command listener failed: {0}")]
    Listener(String),
}

/// Owns the transport and wires the poll action, trigger and router together.
pub struct Supervisor<T> {
    config: Configuration,
    transport: Arc<T>,
}

impl<T> Supervisor<T>
where
    T: PollTransport + UpdateSource + 'static,
{
    pub fn new(config: Configuration, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    /// Run until `shutdown` resolves.
    ///
    /// Configuration is validated before the transport is touched. Once the
    /// identity check has passed, the trigger is stopped and the transport
    /// closed on every exit path.
    pub async fn run<F>(self, shutdown: F) -> Result<(), BotError>
    where
        F: Future<Output = ()> + Send,
    {
        let settings = self.config.validate()?;

        let identity = match self.transport.get_self().await {
            Ok(identity) => identity,
            Err(e) => {
                self.transport.close().await;
                return Err(BotError::Connectivity(e));
            }
        };
        tracing::info!(bot = %identity.display_name(), "Bot started");

        let outbound: Arc<dyn PollTransport> = self.transport.clone();
        let action = PollAction::new(settings.poll, settings.destination, Arc::clone(&outbound));

        let trigger = CronTrigger::new(settings.schedule, action.clone());
        tracing::info!(
            schedule = %trigger.schedule(),
            first_fire = %trigger.first_fire(),
            "Scheduler registered"
        );

        if settings.startup_poll {
            // Health check: every start sends one poll on top of the daily one.
            action.dispatch(DispatchSource::Startup).await;
        }

        let trigger = trigger.spawn();

        let router = CommandRouter::new(action, outbound).with_bot_username(identity.username);
        let inbound: Arc<dyn UpdateSource> = self.transport.clone();
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut listener = tokio::spawn(async move { router.listen(inbound, stop_rx).await });

        let result = tokio::select! {
            joined = &mut listener => joined.map_err(|e| BotError::Listener(e.to_string())),
            _ = shutdown => {
                tracing::info!("Shutdown requested");
                let _ = stop_tx.send(true);
                listener.await.map_err(|e| BotError::Listener(e.to_string()))
            }
        };

        trigger.stop().await;
        self.transport.close().await;
        tracing::info!("Transport closed");

        result
    }
}
