use studio_shared::{
    domain::BehaviorId,
    error::{ErrorCode, RpcError},
    protocol::KeymapErrorCode,
};
use thiserror::Error;

use crate::parameters::BindingIssue;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no device connected")]
    NotConnected,
    #[error("device is locked")]
    Locked,
    #[error("keymap has not been loaded")]
    KeymapUnavailable,
    #[error("device did not answer {request} within {timeout_ms}ms")]
    DeviceUnresponsive {
        request: &'static str,
        timeout_ms: u128,
    },
    #[error("unknown behavior {0}")]
    UnknownBehavior(BehaviorId),
    #[error("invalid binding for behavior {behavior_id} ({param1}, {param2}): {issue}")]
    InvalidBinding {
        behavior_id: BehaviorId,
        param1: u32,
        param2: u32,
        issue: BindingIssue,
    },
    #[error("layer index {index} out of range ({len} layers)")]
    LayerOutOfRange { index: usize, len: usize },
    #[error("key position {position} out of range on layer {layer_index} ({len} keys)")]
    KeyPositionOutOfRange {
        layer_index: usize,
        position: usize,
        len: usize,
    },
    #[error("layer name exceeds {max} characters")]
    LayerNameTooLong { max: u32 },
    #[error("no free layer slots")]
    NoLayerSpace,
    #[error("device rejected {request}: {code:?}")]
    Rejected {
        request: &'static str,
        code: KeymapErrorCode,
    },
    #[error("device reported {request} as failed")]
    Failed { request: &'static str },
    #[error("device error on {request}: {code:?} {message}")]
    Remote {
        request: &'static str,
        code: ErrorCode,
        message: String,
    },
    #[error("unexpected response to {request}")]
    UnexpectedResponse { request: &'static str },
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl SyncError {
    pub(crate) fn remote(request: &'static str, error: RpcError) -> Self {
        Self::Remote {
            request,
            code: error.code,
            message: error.message,
        }
    }

    /// Whether the failure came from the device or the link rather than
    /// from local validation.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::DeviceUnresponsive { .. }
                | Self::Rejected { .. }
                | Self::Failed { .. }
                | Self::Remote { .. }
                | Self::UnexpectedResponse { .. }
                | Self::Transport(_)
        )
    }
}
