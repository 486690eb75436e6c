//! Engine data structures: geometry, transforms, textures and the scene graph.
//!
//! - `instance` holds per-node transformation data
//! - `model` contains geometry builders and the GPU buffers for meshes and materials
//! - `scene_graph` enables hierarchical scene organization and resource release
//! - `texture` wraps the renderer's depth texture

pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
