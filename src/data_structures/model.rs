//! Mesh geometry and the GPU buffers backing it.
//!
//! [`GeometryData`] is plain CPU-side vertex/index data with builders for the
//! primitive shapes the demos use. [`Mesh`] and [`Material`] own the GPU
//! buffers created from it and are the resources a [`MeshNode`] releases on
//! disposal.
//!
//! [`MeshNode`]: crate::data_structures::scene_graph::MeshNode

use std::f32::consts::PI;

use wgpu::util::DeviceExt;

use crate::error::{Result, SceneError};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl ModelVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl GeometryData {
    /// Axis aligned box centred on the origin, four vertices per face so every
    /// face gets its own flat normal.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let half = [width / 2.0, height / 2.0, depth / 2.0];
        // (normal, u, v) with u x v == normal, so the quads wind counter-clockwise
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        let mut geometry = Self::default();
        for (normal, u, v) in faces {
            let base = geometry.vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let mut position = [0.0; 3];
                for axis in 0..3 {
                    position[axis] = (normal[axis] + su * u[axis] + sv * v[axis]) * half[axis];
                }
                geometry.vertices.push(ModelVertex { position, normal });
            }
            geometry
                .indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        geometry
    }

    /// Square in the XZ plane facing +Y.
    pub fn plane(width: f32, depth: f32) -> Self {
        let (hw, hd) = (width / 2.0, depth / 2.0);
        let normal = [0.0, 1.0, 0.0];
        let vertices = [[-hw, 0.0, hd], [hw, 0.0, hd], [hw, 0.0, -hd], [-hw, 0.0, -hd]]
            .into_iter()
            .map(|position| ModelVertex { position, normal })
            .collect();
        Self {
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Latitude/longitude sphere. Pole rows are kept as degenerate rings, their
    /// collapsed triangles are skipped.
    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut geometry = Self::default();
        for iy in 0..=rings {
            let v = iy as f32 / rings as f32;
            let phi = v * PI;
            for ix in 0..=segments {
                let u = ix as f32 / segments as f32;
                let theta = u * 2.0 * PI;
                let normal = [-theta.cos() * phi.sin(), phi.cos(), theta.sin() * phi.sin()];
                let position = [normal[0] * radius, normal[1] * radius, normal[2] * radius];
                geometry.vertices.push(ModelVertex { position, normal });
            }
        }
        let row = segments + 1;
        for iy in 0..rings {
            for ix in 0..segments {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                if iy != 0 {
                    geometry.indices.extend_from_slice(&[a, b, d]);
                }
                if iy != rings - 1 {
                    geometry.indices.extend_from_slice(&[b, c, d]);
                }
            }
        }
        geometry
    }

    pub fn num_elements(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Vertex and index buffers of one piece of geometry.
#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    released: bool,
}

impl Mesh {
    pub fn new(device: &wgpu::Device, name: &str, geometry: &GeometryData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", name)),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: geometry.num_elements(),
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Err(SceneError::ResourceRelease {
                node: self.name.clone(),
                reason: "geometry buffers were already released".to_string(),
            });
        }
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.released = true;
        Ok(())
    }
}

/// Per-object uniform: world matrix, normal matrix and base colour.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub colour: [f32; 4],
}

/// Flat colour material. Owns the object uniform its mesh is drawn with.
#[derive(Debug)]
pub struct Material {
    pub colour: [f32; 4],
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    released: bool,
}

impl Material {
    pub fn new(device: &wgpu::Device, colour: [f32; 4]) -> Self {
        use cgmath::SquareMatrix;

        let identity: [[f32; 4]; 4] = cgmath::Matrix4::identity().into();
        let uniform = ObjectUniform {
            model: identity,
            normal: identity,
            colour,
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Object Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let layout = crate::pipelines::basic::object_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("object_bind_group"),
        });
        Self {
            colour,
            buffer,
            bind_group,
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Err(SceneError::ResourceRelease {
                node: "material".to_string(),
                reason: "uniform buffer was already released".to_string(),
            });
        }
        self.buffer.destroy();
        self.released = true;
        Ok(())
    }
}
