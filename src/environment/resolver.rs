use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::probe::ReachabilityProbe;

/// User preference for which endpoint to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentPreference {
    /// Probe the dev endpoint on every cold start
    #[default]
    Auto,
    Dev,
    Prod,
}

impl fmt::Display for EnvironmentPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentPreference::Auto => write!(f, "auto"),
            EnvironmentPreference::Dev => write!(f, "dev"),
            EnvironmentPreference::Prod => write!(f, "prod"),
        }
    }
}

impl FromStr for EnvironmentPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(EnvironmentPreference::Auto),
            "dev" => Ok(EnvironmentPreference::Dev),
            "prod" => Ok(EnvironmentPreference::Prod),
            other => Err(format!("unknown environment preference '{}' (expected auto, dev or prod)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    Dev,
    Prod,
}

/// Tri-state indicator shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    DevConfirmed,
    ProdFallback,
    Unresolved,
}

/// An endpoint the resolver may choose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCandidate {
    pub endpoint_url: String,
    pub kind: EnvironmentKind,
    pub probe_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEnvironment {
    pub kind: EnvironmentKind,
    pub endpoint: String,
    pub status: ResolutionStatus,
    pub preference: EnvironmentPreference,
    pub resolved_at: DateTime<Utc>,
}

/// Picks the dev or prod endpoint.
///
/// A fixed preference resolves immediately without any network traffic. In
/// `auto` mode one probe is raced against the dev candidate's timeout; any
/// failure (error, timeout) resolves to prod. The result is cached until the
/// preference changes.
pub struct BackendResolver {
    dev: BackendCandidate,
    prod: BackendCandidate,
    preference: EnvironmentPreference,
    probe: Arc<dyn ReachabilityProbe>,
    resolved: Option<ResolvedEnvironment>,
}

impl BackendResolver {
    pub fn new(
        dev: BackendCandidate,
        prod: BackendCandidate,
        preference: EnvironmentPreference,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> Self {
        // Slots follow each candidate's own kind
        let (dev, prod) = if dev.kind == EnvironmentKind::Prod && prod.kind == EnvironmentKind::Dev {
            warn!(dev = %prod.endpoint_url, prod = %dev.endpoint_url, "Backend candidates passed in swapped order");
            (prod, dev)
        } else {
            (dev, prod)
        };
        if dev.kind != EnvironmentKind::Dev || prod.kind != EnvironmentKind::Prod {
            warn!(dev = ?dev.kind, prod = ?prod.kind, "Backend candidates do not cover both environments");
        }

        Self {
            dev,
            prod,
            preference,
            probe,
            resolved: None,
        }
    }

    pub fn preference(&self) -> EnvironmentPreference {
        self.preference
    }

    pub fn resolved(&self) -> Option<&ResolvedEnvironment> {
        self.resolved.as_ref()
    }

    pub fn status(&self) -> ResolutionStatus {
        self.resolved
            .as_ref()
            .map(|r| r.status)
            .unwrap_or(ResolutionStatus::Unresolved)
    }

    /// Resolve once; later calls return the cached result.
    pub async fn resolve(&mut self) -> ResolvedEnvironment {
        if let Some(resolved) = &self.resolved {
            return resolved.clone();
        }

        let resolved = self.resolve_now().await;
        self.resolved = Some(resolved.clone());
        resolved
    }

    /// Change the preference and resolve again right away.
    pub async fn set_preference(&mut self, preference: EnvironmentPreference) -> ResolvedEnvironment {
        info!(from = %self.preference, to = %preference, "Environment preference changed");
        self.preference = preference;
        self.resolved = None;
        self.resolve().await
    }

    async fn resolve_now(&self) -> ResolvedEnvironment {
        let wanted = match self.preference {
            EnvironmentPreference::Dev => EnvironmentKind::Dev,
            EnvironmentPreference::Prod => EnvironmentKind::Prod,
            EnvironmentPreference::Auto => {
                if self.probe_dev().await {
                    EnvironmentKind::Dev
                } else {
                    EnvironmentKind::Prod
                }
            }
        };

        let candidate = match wanted {
            EnvironmentKind::Dev => &self.dev,
            EnvironmentKind::Prod => &self.prod,
        };
        let kind = candidate.kind;
        let status = match kind {
            EnvironmentKind::Dev => ResolutionStatus::DevConfirmed,
            EnvironmentKind::Prod => ResolutionStatus::ProdFallback,
        };

        info!(
            preference = %self.preference,
            endpoint = %candidate.endpoint_url,
            ?status,
            "Environment resolved"
        );

        ResolvedEnvironment {
            kind,
            endpoint: candidate.endpoint_url.clone(),
            status,
            preference: self.preference,
            resolved_at: Utc::now(),
        }
    }

    async fn probe_dev(&self) -> bool {
        let timeout = self.dev.probe_timeout;
        match tokio::time::timeout(timeout, self.probe.probe(&self.dev.endpoint_url)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                info!(endpoint = %self.dev.endpoint_url, "Dev endpoint unreachable: {:#}", e);
                false
            }
            Err(_) => {
                info!(
                    endpoint = %self.dev.endpoint_url,
                    timeout_ms = timeout.as_millis() as u64,
                    "Dev endpoint probe timed out"
                );
                false
            }
        }
    }
}
