//! Rendering: what nodes hand to the renderer, and the renderer itself.
//!
//! Scene nodes describe themselves with a [`Render`] each frame. The
//! [`Renderer`] trait is the narrow surface the scene manager drives: sizing,
//! pixel ratio, background, drawing a scene through a camera and finally
//! releasing its surface. [`WgpuRenderer`] is the GPU implementation.
//!
//! # Key types
//!
//! - [`Render<'a>`] is the per-node render description
//! - [`Drawn<'a>`] references a mesh, its material and its world transform
//! - [`Lit`] is a light contribution folded into the light uniform

use std::{iter, sync::Arc};

use cgmath::Vector3;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraUniform},
    context::GpuContext,
    data_structures::{
        instance::Instance,
        model::{Material, Mesh, ObjectUniform},
        scene_graph::SceneGraph,
        texture::Texture,
    },
    error::{Result, SceneError},
    host::SurfaceId,
    pipelines::{
        basic::{mk_mesh_pipeline, uniform_bind_group_layout},
        light::{LightResources, LightUniform},
    },
};

pub struct Drawn<'a> {
    pub mesh: &'a Mesh,
    pub material: &'a Material,
    pub world: Instance,
}

impl Drawn<'_> {
    pub fn uniform(&self) -> ObjectUniform {
        ObjectUniform {
            model: self.world.to_matrix().into(),
            normal: self.world.normal_matrix().into(),
            colour: self.material.colour,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional,
    /// Sky colour from above (`Lit::colour`) blending into `ground` from below.
    Hemisphere { ground: [f32; 3] },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lit {
    pub kind: LightKind,
    pub colour: [f32; 3],
    pub intensity: f32,
    /// Direction the light travels in (unused for ambient lights).
    pub direction: Vector3<f32>,
}

/// Specifies how a scene node should be rendered.
///
/// - `None` renders nothing
/// - `Mesh(Drawn)` draws one mesh with its material
/// - `Light(Lit)` contributes to the scene lighting
/// - `Composed(Vec<Render>)` recursively renders composition of multiple renders
pub enum Render<'a> {
    None,
    Mesh(Drawn<'a>),
    Light(Lit),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    /// Sort renders into meshes and lights.
    pub(crate) fn split(self, meshes: &mut Vec<Drawn<'a>>, lights: &mut Vec<Lit>) {
        match self {
            Render::None => (),
            Render::Mesh(drawn) => meshes.push(drawn),
            Render::Light(lit) => lights.push(lit),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.split(meshes, lights)),
        }
    }
}

/// The render target a scene manager owns exclusively.
pub trait Renderer {
    fn surface_id(&self) -> SurfaceId;

    /// Record the device pixel ratio. Sizes passed to [`Renderer::set_size`]
    /// are already in physical pixels, so the ratio is informational.
    fn set_pixel_ratio(&mut self, ratio: f64);

    fn pixel_ratio(&self) -> f64;

    /// Resize the backing surface. Called synchronously from resize handling.
    fn set_size(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    fn set_background(&mut self, colour: wgpu::Color);

    fn render(&mut self, scene: &SceneGraph, camera: &Camera) -> Result<()>;

    /// Release the surface and every GPU resource the renderer owns.
    fn release(&mut self);
}

struct CameraResources {
    uniform: CameraUniform,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// wgpu implementation of [`Renderer`].
pub struct WgpuRenderer {
    ctx: GpuContext,
    surface_id: SurfaceId,
    // winit reports physical sizes, nothing is scaled by this
    pixel_ratio: f64,
    background: wgpu::Color,
    depth_texture: Texture,
    camera: CameraResources,
    light: LightResources,
    pipeline: wgpu::RenderPipeline,
    is_surface_configured: bool,
    released: bool,
}

impl WgpuRenderer {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let ctx = GpuContext::new(window).await?;
        let device = &ctx.device;

        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group_layout = uniform_bind_group_layout(device, "camera_bind_group_layout");
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        let camera = CameraResources {
            uniform: camera_uniform,
            buffer: camera_buffer,
            bind_group: camera_bind_group,
        };

        let light = LightResources::new(device);
        let pipeline = mk_mesh_pipeline(
            device,
            &ctx.config,
            &camera_bind_group_layout,
            &light.bind_group_layout,
        );
        let depth_texture = Texture::create_depth_texture(
            device,
            [ctx.config.width, ctx.config.height],
            "depth_texture",
        );
        let surface_id = SurfaceId(u64::from(ctx.window.id()));

        Ok(Self {
            ctx,
            surface_id,
            pixel_ratio: 1.0,
            background: wgpu::Color::BLACK,
            depth_texture,
            camera,
            light,
            pipeline,
            is_surface_configured: false,
            released: false,
        })
    }

    /// Device for creating scene content (meshes, materials).
    pub fn device(&self) -> &wgpu::Device {
        &self.ctx.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.ctx.queue
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.ctx.window
    }

    fn reconfigure(&mut self) {
        let size = self.ctx.window.inner_size();
        self.set_size(size.width, size.height);
    }
}

impl Renderer for WgpuRenderer {
    fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn set_size(&mut self, width: u32, height: u32) {
        if self.released || width == 0 || height == 0 {
            return;
        }
        self.ctx.config.width = width;
        self.ctx.config.height = height;
        self.ctx.surface.configure(&self.ctx.device, &self.ctx.config);
        self.depth_texture.destroy();
        self.depth_texture =
            Texture::create_depth_texture(&self.ctx.device, [width, height], "depth_texture");
        self.is_surface_configured = true;
    }

    fn size(&self) -> (u32, u32) {
        (self.ctx.config.width, self.ctx.config.height)
    }

    fn set_background(&mut self, colour: wgpu::Color) {
        self.background = colour;
    }

    fn render(&mut self, scene: &SceneGraph, camera: &Camera) -> Result<()> {
        if self.released {
            return Err(SceneError::Render("renderer was released".to_string()));
        }
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = match self.ctx.surface.get_current_texture() {
            Ok(output) => output,
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost or outdated, reconfiguring");
                self.reconfigure();
                return Ok(());
            }
            Err(e) => return Err(SceneError::Render(e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.camera.uniform.update_view_proj(camera);
        self.ctx.queue.write_buffer(
            &self.camera.buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform]),
        );

        let mut meshes: Vec<Drawn> = Vec::new();
        let mut lights: Vec<Lit> = Vec::new();
        scene
            .renders()
            .into_iter()
            .for_each(|render| render.split(&mut meshes, &mut lights));

        self.light.uniform = LightUniform::from_lights(&lights);
        self.ctx.queue.write_buffer(
            &self.light.buffer,
            0,
            bytemuck::cast_slice(&[self.light.uniform]),
        );
        for drawn in &meshes {
            self.ctx.queue.write_buffer(
                &drawn.material.buffer,
                0,
                bytemuck::cast_slice(&[drawn.uniform()]),
            );
        }

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.camera.bind_group, &[]);
            render_pass.set_bind_group(1, &self.light.bind_group, &[]);
            for drawn in &meshes {
                if drawn.mesh.num_elements == 0 {
                    log::warn!("you attempted to render {} without any indices", drawn.mesh.name);
                    continue;
                }
                render_pass.set_bind_group(2, &drawn.material.bind_group, &[]);
                render_pass.set_vertex_buffer(0, drawn.mesh.vertex_buffer.slice(..));
                render_pass
                    .set_index_buffer(drawn.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..drawn.mesh.num_elements, 0, 0..1);
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.depth_texture.destroy();
        self.camera.buffer.destroy();
        self.light.buffer.destroy();
        self.is_surface_configured = false;
        self.released = true;
        log::debug!("renderer for surface {:?} released", self.surface_id);
    }
}
