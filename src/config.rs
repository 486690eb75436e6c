//! Scene and window configuration.
//!
//! [`SceneConfig`] holds everything `initialize` applies to a fresh scene:
//! background, camera placement and projection, and the base lighting. The
//! defaults reproduce the animated demo setup (dark grey background, a
//! perspective camera at (5, 3, 5) looking at the origin, soft ambient light
//! plus one weak directional light).

use cgmath::Point3;

/// Converts an 8-bit sRGB channel to linear space.
///
/// Surfaces are configured with an sRGB format, so colours given as hex
/// have to be linearised before they reach the GPU.
fn srgb_to_linear(channel: u8) -> f32 {
    let c = channel as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Linear RGB from a `0xRRGGBB` hex value.
pub fn rgb(hex: u32) -> [f32; 3] {
    [
        srgb_to_linear(((hex >> 16) & 0xff) as u8),
        srgb_to_linear(((hex >> 8) & 0xff) as u8),
        srgb_to_linear((hex & 0xff) as u8),
    ]
}

/// Opaque clear colour from a `0xRRGGBB` hex value.
pub fn clear_colour(hex: u32) -> wgpu::Color {
    let [r, g, b] = rgb(hex);
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: 1.0,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            position: Point3::new(5.0, 3.0, 5.0),
            target: Point3::new(0.0, 0.0, 0.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LightConfig {
    pub colour: [f32; 3],
    pub intensity: f32,
    /// Only used by directional lights; they shine from here towards the origin.
    pub position: Point3<f32>,
}

impl LightConfig {
    pub fn new(hex: u32, intensity: f32) -> Self {
        Self {
            colour: rgb(hex),
            intensity,
            position: Point3::new(0.0, 0.0, 0.0),
        }
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Point3::new(x, y, z);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneConfig {
    pub background: wgpu::Color,
    pub camera: CameraConfig,
    pub ambient: Option<LightConfig>,
    pub directional: Option<LightConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: clear_colour(0x1a1a1a),
            camera: CameraConfig::default(),
            ambient: Some(LightConfig::new(0x404040, 0.8)),
            directional: Some(LightConfig::new(0xffffff, 0.3).at(5.0, 5.0, 5.0)),
        }
    }
}

impl SceneConfig {
    pub fn with_background(mut self, hex: u32) -> Self {
        self.background = clear_colour(hex);
        self
    }

    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_camera_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.camera.position = Point3::new(x, y, z);
        self
    }

    pub fn looking_at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.camera.target = Point3::new(x, y, z);
        self
    }

    pub fn with_ambient(mut self, ambient: Option<LightConfig>) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_directional(mut self, directional: Option<LightConfig>) -> Self {
        self.directional = directional;
        self
    }
}

/// Native window / web canvas settings used by [`crate::flow::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct WindowConfig {
    pub title: String,
    /// Id of the DOM element the canvas gets appended to (wasm only).
    pub container_id: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "scene-ngin".to_string(),
            container_id: "app".to_string(),
        }
    }
}
