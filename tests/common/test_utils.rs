use std::{
    cell::{Ref, RefCell},
    rc::Rc,
};

use instant::Duration;
use scene_ngin::{
    SceneError, SceneManager,
    camera::{Camera, CameraController},
    config::SceneConfig,
    data_structures::{
        instance::{Instance, NodeTransform},
        scene_graph::{NodeKind, SceneGraph, SceneNode},
    },
    driver::ManualDriver,
    host::{HostEvent, ListenerId, Listeners, SurfaceId, Viewport, ViewportHost},
    render::Renderer,
    wgpu,
    winit::event::{DeviceEvent, WindowEvent},
};

pub(crate) const FRAME: Duration = Duration::from_nanos(16_666_667);

/// Records every `release_resources` call by node name, in call order.
#[derive(Clone, Default)]
pub(crate) struct ReleaseTracker(Rc<RefCell<Vec<String>>>);

impl ReleaseTracker {
    pub(crate) fn count(&self, name: &str) -> usize {
        self.0.borrow().iter().filter(|n| *n == name).count()
    }

    pub(crate) fn total(&self) -> usize {
        self.0.borrow().len()
    }

    pub(crate) fn order(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    fn record(&self, name: &str) {
        self.0.borrow_mut().push(name.to_string());
    }
}

/// A mesh-like node whose release is tracked instead of touching a GPU.
pub(crate) struct TrackedNode {
    name: String,
    transform: NodeTransform,
    children: Vec<Box<dyn SceneNode>>,
    tracker: ReleaseTracker,
    fail_release: bool,
}

impl TrackedNode {
    pub(crate) fn new(name: &str, tracker: &ReleaseTracker) -> Self {
        Self {
            name: name.to_string(),
            transform: NodeTransform::default(),
            children: Vec::new(),
            tracker: tracker.clone(),
            fail_release: false,
        }
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub(crate) fn with_child(mut self, child: TrackedNode) -> Self {
        self.children.push(Box::new(child));
        self
    }

    pub(crate) fn boxed(self) -> Box<dyn SceneNode> {
        Box::new(self)
    }
}

impl SceneNode for TrackedNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Mesh
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self) -> &NodeTransform {
        &self.transform
    }

    fn transform_mut(&mut self) -> &mut NodeTransform {
        &mut self.transform
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn release_resources(&mut self) -> scene_ngin::Result<()> {
        self.tracker.record(&self.name);
        if self.fail_release {
            return Err(SceneError::ResourceRelease {
                node: self.name.clone(),
                reason: "buffer already unmapped".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) struct HostState {
    pub(crate) viewport: Viewport,
    pub(crate) valid: bool,
    pub(crate) attached: Option<SurfaceId>,
    pub(crate) attach_calls: u32,
    pub(crate) listeners: Listeners,
}

/// A viewport host the test keeps a handle to after handing it to the manager.
#[derive(Clone)]
pub(crate) struct MockHost(Rc<RefCell<HostState>>);

impl MockHost {
    pub(crate) fn new(width: u32, height: u32, scale_factor: f64) -> Self {
        Self(Rc::new(RefCell::new(HostState {
            viewport: Viewport::new(width, height, scale_factor),
            valid: true,
            attached: None,
            attach_calls: 0,
            listeners: Listeners::default(),
        })))
    }

    /// Simulates the container being removed from the document.
    pub(crate) fn invalidate(&self) {
        self.0.borrow_mut().valid = false;
    }

    pub(crate) fn state(&self) -> Ref<'_, HostState> {
        self.0.borrow()
    }
}

impl ViewportHost for MockHost {
    fn viewport(&self) -> scene_ngin::Result<Viewport> {
        let state = self.0.borrow();
        if !state.valid {
            return Err(SceneError::ContainerUnavailable(
                "container was removed".to_string(),
            ));
        }
        Ok(state.viewport)
    }

    fn attach_surface(&mut self, surface: SurfaceId) -> scene_ngin::Result<()> {
        let mut state = self.0.borrow_mut();
        if !state.valid {
            return Err(SceneError::ContainerUnavailable(
                "container was removed".to_string(),
            ));
        }
        state.attach_calls += 1;
        state.attached = Some(surface);
        Ok(())
    }

    fn detach_surface(&mut self, surface: SurfaceId) {
        let mut state = self.0.borrow_mut();
        assert_eq!(state.attached, Some(surface));
        state.attached = None;
    }

    fn subscribe(&mut self, event: HostEvent) -> ListenerId {
        self.0.borrow_mut().listeners.subscribe(event)
    }

    fn unsubscribe(&mut self, listener: ListenerId) {
        self.0.borrow_mut().listeners.unsubscribe(listener)
    }

    fn is_subscribed(&self, event: HostEvent) -> bool {
        self.0.borrow().listeners.is_subscribed(event)
    }
}

/// Renderer that records what the manager asked of it.
#[derive(Debug, Default)]
pub(crate) struct RecordingRenderer {
    pub(crate) size: (u32, u32),
    pub(crate) pixel_ratio: f64,
    pub(crate) background: Option<wgpu::Color>,
    /// Number of nodes in the scene for each rendered frame.
    pub(crate) frames: Vec<usize>,
    /// Camera aspect seen by each rendered frame.
    pub(crate) aspects: Vec<f32>,
    pub(crate) releases: u32,
    pub(crate) fail_render: bool,
}

impl Renderer for RecordingRenderer {
    fn surface_id(&self) -> SurfaceId {
        SurfaceId(7)
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn set_background(&mut self, colour: wgpu::Color) {
        self.background = Some(colour);
    }

    fn render(&mut self, scene: &SceneGraph, camera: &Camera) -> scene_ngin::Result<()> {
        self.frames.push(scene.count_nodes());
        self.aspects.push(camera.aspect());
        if self.fail_render {
            return Err(SceneError::Render("surface timeout".to_string()));
        }
        Ok(())
    }

    fn release(&mut self) {
        self.releases += 1;
    }
}

#[derive(Debug, Default)]
pub(crate) struct ControllerLog {
    pub(crate) updates: Vec<Duration>,
    pub(crate) events: u32,
    pub(crate) device_events: u32,
    pub(crate) releases: u32,
}

/// Camera controller that nudges the camera up by one unit per update.
#[derive(Clone, Default)]
pub(crate) struct RecordingController(pub(crate) Rc<RefCell<ControllerLog>>);

impl RecordingController {
    pub(crate) fn log(&self) -> Ref<'_, ControllerLog> {
        self.0.borrow()
    }
}

impl CameraController for RecordingController {
    fn update(&mut self, camera: &mut Camera, dt: Duration) {
        camera.position.y += 1.0;
        self.0.borrow_mut().updates.push(dt);
    }

    fn handle_window_event(&mut self, _event: &WindowEvent) -> bool {
        self.0.borrow_mut().events += 1;
        true
    }

    fn handle_device_event(&mut self, _event: &DeviceEvent) -> bool {
        self.0.borrow_mut().device_events += 1;
        true
    }

    fn release(&mut self) {
        self.0.borrow_mut().releases += 1;
    }
}

pub(crate) type TestManager = SceneManager<MockHost, RecordingRenderer, ManualDriver>;

pub(crate) fn manager(host: &MockHost) -> TestManager {
    SceneManager::new(
        host.clone(),
        RecordingRenderer::default(),
        ManualDriver::new(),
        SceneConfig::default(),
    )
}

/// Manager that is initialized and has no base lighting, so the scene only
/// holds what the test adds.
pub(crate) fn bare_manager(host: &MockHost) -> TestManager {
    let config = SceneConfig::default()
        .with_ambient(None)
        .with_directional(None);
    let mut mgr = SceneManager::new(
        host.clone(),
        RecordingRenderer::default(),
        ManualDriver::new(),
        config,
    );
    mgr.initialize().unwrap();
    mgr
}

/// Advance host time by `dt` and service the due frame, if any.
pub(crate) fn tick(mgr: &mut TestManager, dt: Duration) -> bool {
    mgr.driver_mut().advance(dt);
    mgr.on_display_refresh().unwrap()
}

pub(crate) fn moved(x: f32) -> Instance {
    Instance::at(x, 0.0, 0.0)
}
