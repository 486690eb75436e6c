//! Error types shared by the scene manager and its collaborators.
//!
//! Almost every variant is a precondition violation: the caller used the
//! manager in a state that does not allow the operation. Those are returned
//! immediately and never retried. `ResourceRelease` and `Render` are the only
//! runtime faults and are reported rather than propagated where teardown or
//! the animation loop must keep going.

use thiserror::Error;

use crate::data_structures::scene_graph::NodeId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    /// The viewport host (window, canvas container) is gone or cannot take a surface.
    #[error("viewport host is unavailable: {0}")]
    ContainerUnavailable(String),

    #[error("scene manager has not been initialized")]
    NotInitialized,

    #[error("scene manager is already initialized")]
    AlreadyInitialized,

    #[error("an animation loop is already running on this scene manager")]
    LoopAlreadyRunning,

    #[error("scene manager has been disposed")]
    Disposed,

    #[error("no scene content with id {0:?}")]
    UnknownNode(NodeId),

    #[error("failed to release resources of {node}: {reason}")]
    ResourceRelease { node: String, reason: String },

    #[error("render failed: {0}")]
    Render(String),
}

pub type Result<T, E = SceneError> = std::result::Result<T, E>;
