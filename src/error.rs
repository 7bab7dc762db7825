// kgsp: Engine error taxonomy
// Every public entry point returns one of these kinds; hot paths never
// throw, and budget overruns are recorded rather than raised

use kgsp_actors::{ActorError, RouteError, SupervisionError};
use kgsp_discovery::DiscoveryError;
use kgsp_rdf::InternError;
use kgsp_reason::ReasonError;
use kgsp_shacl::ShaclError;
use thiserror::Error;

/// Engine-level error kinds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("referenced entity does not exist")]
    NotFound,
    #[error("already registered")]
    Duplicate,
    #[error("bounded table or list full")]
    Capacity,
    #[error("mailbox ring full")]
    QueueFull,
    #[error("actor failure without supervisor linkage")]
    NoSupervisor,
    #[error("request expired without a matching reply")]
    NoResponse,
    #[error("operation exceeded its cycle budget")]
    BudgetExceeded,
    #[error("memory bound violated")]
    MemoryBound,
    #[error("structural self-check failed")]
    Corruption,
}

impl From<InternError> for EngineError {
    fn from(err: InternError) -> Self {
        match err {
            InternError::InvalidArgument => EngineError::InvalidArgument("interner input"),
            InternError::Capacity => EngineError::Capacity,
        }
    }
}

impl From<ShaclError> for EngineError {
    fn from(err: ShaclError) -> Self {
        match err {
            ShaclError::InvalidArgument => EngineError::InvalidArgument("validator input"),
            ShaclError::NotFound => EngineError::NotFound,
            ShaclError::Duplicate => EngineError::Duplicate,
            ShaclError::Capacity => EngineError::Capacity,
            ShaclError::Corruption => EngineError::Corruption,
        }
    }
}

impl From<ReasonError> for EngineError {
    fn from(err: ReasonError) -> Self {
        match err {
            ReasonError::InvalidArgument => EngineError::InvalidArgument("reasoner input"),
            ReasonError::Capacity => EngineError::Capacity,
        }
    }
}

impl From<ActorError> for EngineError {
    fn from(err: ActorError) -> Self {
        match err {
            ActorError::InvalidArgument => EngineError::InvalidArgument("actor input"),
            ActorError::NotFound => EngineError::NotFound,
            ActorError::Capacity => EngineError::Capacity,
        }
    }
}

impl From<RouteError> for EngineError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::InvalidArgument => EngineError::InvalidArgument("router input"),
            RouteError::QueueFull => EngineError::QueueFull,
            RouteError::DeadLettered => EngineError::NoResponse,
        }
    }
}

impl From<SupervisionError> for EngineError {
    fn from(err: SupervisionError) -> Self {
        match err {
            SupervisionError::InvalidArgument => EngineError::InvalidArgument("supervision input"),
            SupervisionError::NotFound => EngineError::NotFound,
            SupervisionError::Capacity => EngineError::Capacity,
            SupervisionError::NoSupervisor => EngineError::NoSupervisor,
        }
    }
}

impl From<DiscoveryError> for EngineError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::Intern(e) => e.into(),
            DiscoveryError::Shacl(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(EngineError::from(ShaclError::Duplicate), EngineError::Duplicate);
        assert_eq!(EngineError::from(RouteError::QueueFull), EngineError::QueueFull);
        assert_eq!(
            EngineError::from(SupervisionError::NoSupervisor),
            EngineError::NoSupervisor
        );
        assert_eq!(EngineError::from(ActorError::Capacity), EngineError::Capacity);
    }
}
