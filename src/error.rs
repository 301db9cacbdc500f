//! Errors raised while inspecting monitors and headers.

use crate::util::Address;
use crate::vm::ReadError;

/// Errors from the inspector. Layout problems found while resolving the
/// directory are not raised: they are kept in the degraded
/// [`crate::monitor::MonitorDirectory`] and surface later as
/// [`InspectError::LayoutUnavailable`] only when an operation needs the layout.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InspectError {
    /// A state-specific accessor was called on a value in another state, e.g.
    /// `hash()` on a monitor-tagged mark word.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// A header bit pattern this subsystem cannot interpret (biased, or claimed by the collector).
    #[error("cannot decode mark word {value:#x}: {reason}")]
    UndecodableMark { value: usize, reason: &'static str },

    /// A type, field or constant the operation needs is missing from the image.
    #[error("layout unavailable: {0}")]
    LayoutUnavailable(String),

    /// Reading the image failed.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// The monitor block list did not terminate within the configured bound.
    #[error("monitor block list starting at {head} exceeds {limit} blocks")]
    BlockListTooLong { head: Address, limit: usize },
}

pub type Result<T> = std::result::Result<T, InspectError>;

impl InspectError {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        InspectError::PreconditionViolation(msg.into())
    }

    pub(crate) fn layout_unavailable(msg: impl Into<String>) -> Self {
        InspectError::LayoutUnavailable(msg.into())
    }
}
