//! Render pipelines and the uniform resources they bind.
//!
//! - `basic` builds the flat-lit mesh pipeline and the shared bind group layouts
//! - `light` folds the scene's lights into a single light uniform

pub mod basic;
pub mod light;
