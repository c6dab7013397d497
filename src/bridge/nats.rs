use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::engine::HostBridge;
use super::hooks::HookRegistry;
use super::messages::{BridgeCallback, BridgeRequest};

/// Host bridge reached over NATS
///
/// Requests are published on `request_subject`; the host publishes its
/// callbacks on `callback_subject`.
pub struct NatsHostBridge {
    client: Client,
    request_subject: String,
    callback_subject: String,
}

impl NatsHostBridge {
    /// Connect to NATS server
    pub async fn connect(url: &str, request_subject: String, callback_subject: String) -> Result<Self> {
        info!("Connecting to host bridge over NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            request_subject,
            callback_subject,
        })
    }

    /// Subscribe to host callbacks and dispatch them into `hooks`
    pub async fn listen(&self, hooks: Arc<HookRegistry>) -> Result<JoinHandle<()>> {
        let mut subscriber = self
            .client
            .subscribe(self.callback_subject.clone())
            .await
            .context("Failed to subscribe to host bridge callbacks")?;

        info!("Listening for host bridge callbacks on {}", self.callback_subject);

        Ok(tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<BridgeCallback>(&msg.payload) {
                    Ok(callback) => {
                        debug!(?callback, "Host bridge callback");
                        hooks.dispatch(callback);
                    }
                    Err(e) => {
                        warn!("Failed to parse host bridge callback: {}", e);
                    }
                }
            }

            info!("Host bridge callback listener stopped");
        }))
    }
}

#[async_trait::async_trait]
impl HostBridge for NatsHostBridge {
    async fn post(&self, request: BridgeRequest) -> Result<()> {
        let payload = serde_json::to_vec(&request)?;

        self.client
            .publish(self.request_subject.clone(), payload.into())
            .await
            .context("Failed to publish host bridge request")?;

        debug!(?request, subject = %self.request_subject, "Published host bridge request");

        Ok(())
    }

    fn is_available(&self) -> bool {
        matches!(
            self.client.connection_state(),
            async_nats::connection::State::Connected
        )
    }

    fn name(&self) -> &str {
        "nats"
    }
}
