use cgmath::Vector3;
use wgpu::util::DeviceExt;

use crate::render::{LightKind, Lit};

/// Light data as laid out in the uniform buffer.
///
/// All ambient lights are summed; only the first directional light is used.
/// Hemisphere lights are flat shaded as the mean of sky and ground colours
/// and folded into the ambient term.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub ambient: [f32; 4],
    /// xyz direction the light travels in, w is 1.0 when a directional light is present.
    pub direction: [f32; 4],
    pub colour: [f32; 4],
}

impl LightUniform {
    pub fn from_lights<'a>(lights: impl IntoIterator<Item = &'a Lit>) -> Self {
        let mut ambient = Vector3::new(0.0, 0.0, 0.0);
        let mut directional: Option<&Lit> = None;
        for lit in lights {
            match lit.kind {
                LightKind::Ambient => ambient += Vector3::from(lit.colour) * lit.intensity,
                LightKind::Hemisphere { ground } => {
                    let mean = (Vector3::from(lit.colour) + Vector3::from(ground)) * 0.5;
                    ambient += mean * lit.intensity;
                }
                LightKind::Directional => {
                    if directional.is_some() {
                        log::warn!("only the first directional light is used");
                    } else {
                        directional = Some(lit);
                    }
                }
            }
        }
        let (direction, colour) = match directional {
            Some(lit) => {
                let d = lit.direction;
                let c = Vector3::from(lit.colour) * lit.intensity;
                ([d.x, d.y, d.z, 1.0], [c.x, c.y, c.z, 1.0])
            }
            None => ([0.0, -1.0, 0.0, 0.0], [0.0; 4]),
        };
        Self {
            ambient: [ambient.x, ambient.y, ambient.z, 1.0],
            direction,
            colour,
        }
    }
}

pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform = LightUniform::from_lights([]);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout =
            crate::pipelines::basic::uniform_bind_group_layout(device, "light_bind_group_layout");
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("light_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }
}
