use anyhow::{Context, Result};
use tracing::debug;

/// Lightweight reachability check against an endpoint
#[async_trait::async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, endpoint: &str) -> Result<()>;
}

/// Probe issuing a bodiless `HEAD` request.
///
/// Any HTTP response counts as reachable; only transport failures do not.
/// Timeouts are applied by the resolver, not here.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self, endpoint: &str) -> Result<()> {
        let response = self
            .client
            .head(endpoint)
            .send()
            .await
            .with_context(|| format!("Probe request to {} failed", endpoint))?;

        debug!(endpoint, status = %response.status(), "Probe answered");
        Ok(())
    }
}
