//! Host platform speech bridge
//!
//! Capture is delegated to a host process by message passing:
//! - `messages`: request / callback wire shapes
//! - `hooks`: process-wide callback registration, owned by one session at a time
//! - `engine`: the `SpeechBackend` implementation
//! - `nats`: NATS transport to the host

mod engine;
mod hooks;
pub mod messages;
mod nats;

pub use engine::{BridgeConfig, BridgeEngine, HostBridge};
pub use hooks::{HookEvent, HookRegistry, HookSubscription};
pub use messages::{BridgeCallback, BridgeRequest};
pub use nats::NatsHostBridge;
