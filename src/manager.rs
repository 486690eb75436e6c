//! The scene lifecycle manager.
//!
//! [`SceneManager`] owns a camera, a renderer and a scene graph and walks them
//! through a fixed lifecycle:
//!
//! ```text
//! Constructed -> Initialized -> (Animating <-> Initialized) -> Disposed
//! ```
//!
//! Frames are driven by the host. Starting the loop asks the
//! [`AnimationDriver`] for a frame; when the host services it, it calls
//! [`SceneManager::on_frame`] (or [`SceneManager::on_display_refresh`], which
//! asks the driver which frame is due). Each tick runs the update callback,
//! lets the camera controller reconcile the camera, renders, and schedules
//! the next frame. Handles the manager did not schedule, or has cancelled,
//! are ignored, so no tick runs after [`SceneManager::stop_animation_loop`].
//!
//! Disposal is terminal: every operation afterwards fails with
//! [`SceneError::Disposed`].

use cgmath::{Deg, EuclideanSpace};
use instant::Duration;
use winit::event::{DeviceEvent, WindowEvent};

use crate::{
    camera::{Camera, CameraController, Projection},
    config::SceneConfig,
    data_structures::scene_graph::{DisposeReport, LightNode, NodeId, SceneGraph, SceneNode},
    driver::{AnimationDriver, FrameHandle},
    error::{Result, SceneError},
    host::{HostEvent, ListenerId, Viewport, ViewportHost},
    render::Renderer,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Initialized,
    Animating,
    Disposed,
}

/// Timing information handed to the update callback every tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTime {
    /// Time since the loop was started.
    pub elapsed: Duration,
    /// Time since the previous tick (or since the start for the first one).
    pub delta: Duration,
    /// Ticks run by this loop so far, starting at 1.
    pub frame: u64,
}

pub type UpdateCallback = Box<dyn FnMut(&mut SceneGraph, &FrameTime)>;

struct AnimationState {
    pending: Option<FrameHandle>,
    update: UpdateCallback,
    started: Duration,
    last: Duration,
    frame: u64,
}

struct AttachedController {
    controller: Box<dyn CameraController>,
    listener: ListenerId,
}

pub struct SceneManager<H: ViewportHost, R: Renderer, D: AnimationDriver> {
    host: H,
    renderer: R,
    driver: D,
    config: SceneConfig,
    camera: Camera,
    scene: SceneGraph,
    viewport: Viewport,
    state: LifecycleState,
    animation: Option<AnimationState>,
    controller: Option<AttachedController>,
    listeners: Vec<ListenerId>,
    surface_attached: bool,
}

impl<H: ViewportHost, R: Renderer, D: AnimationDriver> SceneManager<H, R, D> {
    /// Create the camera and keep the renderer detached until [`Self::initialize`].
    pub fn new(host: H, renderer: R, driver: D, config: SceneConfig) -> Self {
        let viewport = host.viewport().unwrap_or_else(|e| {
            log::debug!("no viewport at construction ({}), using 1x1", e);
            Viewport::new(1, 1, 1.0)
        });
        let projection = Projection::new(
            viewport.width,
            viewport.height,
            Deg(config.camera.fov),
            config.camera.near,
            config.camera.far,
        );
        let camera = Camera::new(config.camera.position, projection);

        Self {
            host,
            renderer,
            driver,
            config,
            camera,
            scene: SceneGraph::new(),
            viewport,
            state: LifecycleState::Constructed,
            animation: None,
            controller: None,
            listeners: Vec::new(),
            surface_attached: false,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        match self.state {
            LifecycleState::Disposed => Err(SceneError::Disposed),
            _ => Ok(()),
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        match self.state {
            LifecycleState::Disposed => Err(SceneError::Disposed),
            LifecycleState::Constructed => Err(SceneError::NotInitialized),
            LifecycleState::Initialized | LifecycleState::Animating => Ok(()),
        }
    }

    /// Set up background, base lighting and camera, attach the renderer's
    /// surface to the host and subscribe to resizes.
    ///
    /// Fails with [`SceneError::ContainerUnavailable`] when the host is gone;
    /// nothing is attached in that case.
    pub fn initialize(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Disposed => return Err(SceneError::Disposed),
            LifecycleState::Initialized | LifecycleState::Animating => {
                return Err(SceneError::AlreadyInitialized);
            }
            LifecycleState::Constructed => (),
        }
        let viewport = self.host.viewport()?;
        self.host.attach_surface(self.renderer.surface_id())?;
        self.surface_attached = true;

        self.renderer.set_background(self.config.background);
        if let Some(ambient) = &self.config.ambient {
            self.scene
                .insert(Box::new(LightNode::ambient(ambient.colour, ambient.intensity)));
        }
        if let Some(directional) = &self.config.directional {
            self.scene.insert(Box::new(LightNode::directional(
                directional.colour,
                directional.intensity,
                directional.position.to_vec(),
            )));
        }

        self.camera.position = self.config.camera.position;
        self.camera.look_at(self.config.camera.target);
        self.apply_viewport(viewport);

        self.listeners.push(self.host.subscribe(HostEvent::Resize));
        self.state = LifecycleState::Initialized;
        log::debug!("scene initialized at {}x{}", viewport.width, viewport.height);
        Ok(())
    }

    fn apply_viewport(&mut self, viewport: Viewport) {
        if viewport.is_empty() {
            log::debug!(
                "skipping empty viewport {}x{}",
                viewport.width,
                viewport.height
            );
            return;
        }
        self.viewport = viewport;
        self.camera.resize(viewport.width, viewport.height);
        self.renderer.set_pixel_ratio(viewport.scale_factor);
        self.renderer.set_size(viewport.width, viewport.height);
    }

    /// Bring camera aspect and renderer size in line with the new viewport.
    ///
    /// Runs synchronously so the next frame already uses the new size. Empty
    /// viewports keep the previous state.
    pub fn handle_resize(&mut self, viewport: Viewport) -> Result<()> {
        self.ensure_initialized()?;
        self.apply_viewport(viewport);
        Ok(())
    }

    pub fn add_content(&mut self, node: Box<dyn SceneNode>) -> Result<NodeId> {
        self.ensure_initialized()?;
        Ok(self.scene.insert(node))
    }

    /// Detach a top-level node and hand it back; its resources are the caller's from here on.
    pub fn remove_content(&mut self, id: NodeId) -> Result<Box<dyn SceneNode>> {
        self.ensure_initialized()?;
        self.scene.remove(id).ok_or(SceneError::UnknownNode(id))
    }

    pub fn start_animation_loop<F>(&mut self, update: F) -> Result<()>
    where
        F: FnMut(&mut SceneGraph, &FrameTime) + 'static,
    {
        self.ensure_initialized()?;
        if self.state == LifecycleState::Animating {
            return Err(SceneError::LoopAlreadyRunning);
        }
        let now = self.driver.now();
        let pending = self.driver.request_frame();
        self.animation = Some(AnimationState {
            pending: Some(pending),
            update: Box::new(update),
            started: now,
            last: now,
            frame: 0,
        });
        self.state = LifecycleState::Animating;
        log::debug!("animation loop started");
        Ok(())
    }

    /// Cancel the pending tick. Does nothing when no loop is running.
    pub fn stop_animation_loop(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.halt();
        Ok(())
    }

    fn halt(&mut self) {
        if let Some(animation) = self.animation.take() {
            if let Some(pending) = animation.pending {
                self.driver.cancel_frame(pending);
            }
            self.state = LifecycleState::Initialized;
            log::debug!("animation loop stopped after {} frames", animation.frame);
        }
    }

    /// Service the frame the driver reports as due.
    pub fn on_display_refresh(&mut self) -> Result<bool> {
        self.ensure_live()?;
        match self.driver.take_due() {
            Some(handle) => self.on_frame(handle),
            None => Ok(false),
        }
    }

    /// Run one tick for `handle`. Returns `false` if the handle was not the
    /// frame this manager is waiting for.
    pub fn on_frame(&mut self, handle: FrameHandle) -> Result<bool> {
        self.ensure_live()?;
        let Some(animation) = self.animation.as_mut() else {
            log::debug!("ignoring frame {:?}, no loop running", handle);
            return Ok(false);
        };
        if animation.pending != Some(handle) {
            log::debug!("ignoring stale frame {:?}", handle);
            return Ok(false);
        }
        animation.pending = None;

        let now = self.driver.now();
        animation.frame += 1;
        let time = FrameTime {
            elapsed: now.saturating_sub(animation.started),
            delta: now.saturating_sub(animation.last),
            frame: animation.frame,
        };
        animation.last = now;

        (animation.update)(&mut self.scene, &time);
        if let Some(attached) = self.controller.as_mut() {
            attached.controller.update(&mut self.camera, time.delta);
        }
        self.scene.update_world_transforms();
        if let Err(e) = self.renderer.render(&self.scene, &self.camera) {
            log::error!("frame {} failed to render: {}", time.frame, e);
        }

        animation.pending = Some(self.driver.request_frame());
        Ok(true)
    }

    /// Attach a camera controller, releasing the one attached before.
    pub fn set_controller(&mut self, controller: Box<dyn CameraController>) -> Result<()> {
        self.ensure_live()?;
        match self.controller.as_mut() {
            Some(attached) => {
                attached.controller.release();
                attached.controller = controller;
            }
            None => {
                let listener = self.host.subscribe(HostEvent::Input);
                self.controller = Some(AttachedController {
                    controller,
                    listener,
                });
            }
        }
        Ok(())
    }

    /// Detach the camera controller and hand it back unreleased.
    pub fn detach_controller(&mut self) -> Result<Option<Box<dyn CameraController>>> {
        self.ensure_live()?;
        Ok(self.controller.take().map(|attached| {
            self.host.unsubscribe(attached.listener);
            attached.controller
        }))
    }

    pub fn has_controller(&self) -> bool {
        self.controller.is_some()
    }

    /// Forward host input to the camera controller. Returns `true` if it was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> Result<bool> {
        self.ensure_live()?;
        Ok(self
            .controller
            .as_mut()
            .is_some_and(|attached| attached.controller.handle_window_event(event)))
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) -> Result<bool> {
        self.ensure_live()?;
        Ok(self
            .controller
            .as_mut()
            .is_some_and(|attached| attached.controller.handle_device_event(event)))
    }

    /// Tear everything down. The manager is terminal afterwards.
    ///
    /// Node release failures are logged and collected in the report; they
    /// never stop the rest of the graph from being released.
    pub fn dispose(&mut self) -> Result<DisposeReport> {
        self.ensure_live()?;
        self.halt();

        if let Some(mut attached) = self.controller.take() {
            attached.controller.release();
            self.host.unsubscribe(attached.listener);
        }

        let report = self.scene.release_all();
        if !report.is_clean() {
            log::error!(
                "{} of {} nodes failed to release",
                report.failures.len(),
                report.released + report.failures.len()
            );
        }

        for listener in self.listeners.drain(..) {
            self.host.unsubscribe(listener);
        }
        if self.surface_attached {
            self.host.detach_surface(self.renderer.surface_id());
            self.surface_attached = false;
        }
        self.renderer.release();

        self.state = LifecycleState::Disposed;
        log::debug!("scene disposed, {} nodes released", report.released);
        Ok(report)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_animating(&self) -> bool {
        self.state == LifecycleState::Animating
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl<H: ViewportHost, R: Renderer, D: AnimationDriver> Drop for SceneManager<H, R, D> {
    fn drop(&mut self) {
        if self.state == LifecycleState::Disposed {
            return;
        }
        log::debug!("scene manager dropped without dispose, disposing now");
        if let Err(e) = self.dispose() {
            log::error!("dispose on drop failed: {}", e);
        }
    }
}
