//! The closed set of stage kinds a pipeline can be composed of.

use super::{Configuration, CoreLogic, PullConnector, PushConnector, Sender, StorageHandle};
use crate::params::Params;
use std::fmt;
use std::sync::Arc;

/// Discriminant of a stage variant, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Produces run-time parameters.
    Configuration,
    /// Pull-based input connector.
    Connector,
    /// Push-based input connector.
    PushConnector,
    /// Persists payloads.
    Storage,
    /// User-defined processing logic.
    CoreLogic,
    /// Delivers payloads to an external destination.
    Send,
    /// Free-form user function with an open parameter bag.
    Custom,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Connector => write!(f, "connector"),
            Self::PushConnector => write!(f, "push connector"),
            Self::Storage => write!(f, "storage"),
            Self::CoreLogic => write!(f, "core logic"),
            Self::Send => write!(f, "send"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// A stage attached to a pipeline: the callable plus parameters bound at
/// build time.
///
/// The set of kinds is closed on purpose: the execution dispatcher is a
/// single exhaustive match, so adding a stage kind is a compile-checked
/// change. The multi-step capability is an explicit flag and exists only
/// on the variants where a lazy output sequence is meaningful; storage,
/// send and push-connector stages are structurally single-step.
#[derive(Clone)]
pub enum StageSpec {
    /// Run-time parameter production.
    Configuration {
        /// The stage implementation.
        stage: Arc<dyn Configuration>,
        /// Parameters bound at build time.
        params: Params,
        /// Whether the stage yields a lazy sequence of parameter bags.
        multi_step: bool,
    },
    /// Pull-based data intake.
    Connector {
        /// The stage implementation.
        stage: Arc<dyn PullConnector>,
        /// Parameters bound at build time.
        params: Params,
        /// Whether the stage yields a lazy sequence of payloads.
        multi_step: bool,
    },
    /// Push-based data intake with buffered flushing.
    PushConnector {
        /// The stage implementation.
        stage: Arc<dyn PushConnector>,
        /// Buffer size at which inbound messages are drained to storage.
        flush_threshold: usize,
    },
    /// Payload persistence.
    Storage {
        /// The shared storage handle.
        stage: StorageHandle,
        /// Parameters bound at build time.
        params: Params,
    },
    /// User-defined processing logic.
    CoreLogic {
        /// The stage implementation.
        stage: Arc<dyn CoreLogic>,
        /// Parameters bound at build time.
        params: Params,
        /// Whether the stage yields a lazy sequence of payloads.
        multi_step: bool,
    },
    /// Outbound delivery.
    Send {
        /// The stage implementation.
        stage: Arc<dyn Sender>,
        /// Parameters bound at build time.
        params: Params,
    },
    /// Free-form user function, executed like core logic but carrying an
    /// open parameter bag as its configuration escape hatch.
    Custom {
        /// The stage implementation.
        stage: Arc<dyn CoreLogic>,
        /// The open, user-defined parameter bag.
        params: Params,
        /// Whether the stage yields a lazy sequence of payloads.
        multi_step: bool,
    },
}

impl StageSpec {
    /// Returns the kind discriminant of this stage.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Configuration { .. } => StageKind::Configuration,
            Self::Connector { .. } => StageKind::Connector,
            Self::PushConnector { .. } => StageKind::PushConnector,
            Self::Storage { .. } => StageKind::Storage,
            Self::CoreLogic { .. } => StageKind::CoreLogic,
            Self::Send { .. } => StageKind::Send,
            Self::Custom { .. } => StageKind::Custom,
        }
    }

    /// Whether this stage fans out into a lazy sequence of outputs.
    #[must_use]
    pub fn is_multi_step(&self) -> bool {
        match self {
            Self::Configuration { multi_step, .. }
            | Self::Connector { multi_step, .. }
            | Self::CoreLogic { multi_step, .. }
            | Self::Custom { multi_step, .. } => *multi_step,
            Self::PushConnector { .. } | Self::Storage { .. } | Self::Send { .. } => false,
        }
    }

    /// Returns the storage handle when this is a storage stage.
    #[must_use]
    pub fn storage_handle(&self) -> Option<StorageHandle> {
        match self {
            Self::Storage { stage, .. } => Some(Arc::clone(stage)),
            _ => None,
        }
    }
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("kind", &self.kind())
            .field("multi_step", &self.is_multi_step())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{FnConnector, StageData};

    #[test]
    fn kind_and_multi_step_reporting() {
        let spec = StageSpec::Connector {
            stage: Arc::new(FnConnector::new(|_| Ok(StageData::Empty))),
            params: Params::new(),
            multi_step: true,
        };
        assert_eq!(spec.kind(), StageKind::Connector);
        assert!(spec.is_multi_step());
        assert!(spec.storage_handle().is_none());
    }
}
