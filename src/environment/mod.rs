//! Endpoint resolution: dev endpoint when reachable, prod otherwise.

mod probe;
mod resolver;

pub use probe::{HttpProbe, ReachabilityProbe};
pub use resolver::{
    BackendCandidate, BackendResolver, EnvironmentKind, EnvironmentPreference, ResolutionStatus,
    ResolvedEnvironment,
};
