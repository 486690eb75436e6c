//! scene-ngin
//!
//! A small cross-platform (native and WASM) scene lifecycle manager. A
//! [`SceneManager`] owns a camera, a renderer and a scene graph: it sets the
//! scene up, keeps camera and renderer in step with the viewport, runs a
//! per-frame update callback driven by the host's frame scheduler and tears
//! everything down again without leaking GPU resources.
//!
//! High-level modules
//! - `camera`: perspective camera, its uniform, and camera controllers
//! - `config`: scene and window configuration with the demo defaults
//! - `context`: GPU device, queue and surface for one window
//! - `data_structures`: scene graph, transforms, geometry and textures
//! - `driver`: animation drivers that schedule frames
//! - `error`: the crate's error type
//! - `flow`: the winit application loop running a scene in a window
//! - `host`: viewport hosts and their event subscriptions
//! - `manager`: the scene lifecycle manager
//! - `pipelines`: the mesh pipeline and light uniforms
//! - `render`: the renderer trait and its wgpu implementation
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod driver;
pub mod error;
pub mod flow;
pub mod host;
pub mod manager;
pub mod pipelines;
pub mod render;

pub use error::{Result, SceneError};
pub use manager::{FrameTime, LifecycleState, SceneManager};

// Re-exports commonly used crates for convenience in downstream code.
pub use cgmath;
pub use wgpu;
pub use winit;
