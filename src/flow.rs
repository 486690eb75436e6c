//! The winit application loop.
//!
//! [`run`] opens a window (a canvas on the web), builds the GPU renderer and
//! hands a ready, initialized [`WindowSceneManager`] to the caller's setup
//! closure. From then on winit events are routed into the manager:
//!
//! 1. `Resized` / `ScaleFactorChanged` go to `handle_resize` while the manager listens for resizes
//! 2. `RedrawRequested` services the frame the animation loop scheduled
//! 3. input events go to the attached camera controller
//! 4. `CloseRequested` disposes the scene and exits the loop

use std::{fmt::Debug, sync::Arc};

use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    config::{SceneConfig, WindowConfig},
    driver::WindowDriver,
    host::{HostEvent, Viewport, ViewportHost, WindowHost},
    manager::SceneManager,
    render::WgpuRenderer,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub type WindowSceneManager = SceneManager<WindowHost, WgpuRenderer, WindowDriver>;

/// Called once the scene is initialized: add content, attach a controller and
/// start the animation loop here.
pub type SceneSetup = Box<dyn FnOnce(&mut WindowSceneManager) -> anyhow::Result<()>>;

pub(crate) enum FlowEvent {
    #[allow(dead_code)]
    Initialized(WgpuRenderer),
}

impl Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(_) => f.write_str("Initialized(WgpuRenderer)"),
        }
    }
}

struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[allow(dead_code)]
    proxy: winit::event_loop::EventLoopProxy<FlowEvent>,
    window_config: WindowConfig,
    scene_config: SceneConfig,
    window: Option<Arc<Window>>,
    manager: Option<WindowSceneManager>,
    // Taken once the manager is ready.
    setup: Option<SceneSetup>,
}

impl App {
    fn new(
        event_loop: &EventLoop<FlowEvent>,
        window_config: WindowConfig,
        scene_config: SceneConfig,
        setup: SceneSetup,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy,
            window_config,
            scene_config,
            window: None,
            manager: None,
            setup: Some(setup),
        })
    }

    fn start_scene(&mut self, event_loop: &ActiveEventLoop, renderer: WgpuRenderer) {
        let Some(window) = self.window.clone() else {
            return;
        };
        let host = WindowHost::new(window.clone(), self.window_config.container_id.clone());
        let driver = WindowDriver::new(window.clone());
        let mut manager = SceneManager::new(host, renderer, driver, self.scene_config.clone());

        if let Err(e) = manager.initialize() {
            log::error!("could not initialize the scene: {}", e);
            event_loop.exit();
            return;
        }
        if let Some(setup) = self.setup.take() {
            if let Err(e) = setup(&mut manager) {
                log::error!("scene setup failed: {:#}", e);
                event_loop.exit();
                return;
            }
        }
        self.manager = Some(manager);
        window.request_redraw();
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        #[allow(unused_mut)]
        let mut window_attributes =
            Window::default_attributes().with_title(self.window_config.title.clone());

        #[cfg(target_arch = "wasm32")]
        {
            // the host appends the canvas to its container on attach
            use winit::platform::web::WindowAttributesExtWebSys;
            window_attributes = window_attributes.with_append(false);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create a window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(WgpuRenderer::new(window)) {
                Ok(renderer) => self.start_scene(event_loop, renderer),
                Err(e) => {
                    log::error!("could not set up the renderer: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match WgpuRenderer::new(window).await {
                    Ok(renderer) => {
                        if proxy.send_event(FlowEvent::Initialized(renderer)).is_err() {
                            log::error!("event loop closed before the renderer was ready");
                        }
                    }
                    Err(e) => log::error!("could not set up the renderer: {:#}", e),
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            // This is the message from our wasm `spawn_local`
            FlowEvent::Initialized(renderer) => self.start_scene(event_loop, renderer),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(manager) = &mut self.manager else {
            return;
        };
        if manager.host().is_subscribed(HostEvent::Input) {
            if let Err(e) = manager.handle_device_event(&event) {
                log::warn!("device event ignored: {}", e);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(manager) = &mut self.manager else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                match manager.dispose() {
                    Ok(report) if !report.is_clean() => {
                        log::warn!("{} nodes failed to release", report.failures.len())
                    }
                    Ok(_) => (),
                    Err(e) => log::error!("{}", e),
                }
                manager.host_mut().mark_closed();
                event_loop.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if !manager.host().is_subscribed(HostEvent::Resize) {
                    return;
                }
                let window = manager.host().window();
                let size = window.inner_size();
                let viewport = Viewport::new(size.width, size.height, window.scale_factor());
                if let Err(e) = manager.handle_resize(viewport) {
                    log::warn!("resize ignored: {}", e);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = manager.on_display_refresh() {
                    log::warn!("redraw ignored: {}", e);
                }
            }
            event => {
                if manager.host().is_subscribed(HostEvent::Input) {
                    if let Err(e) = manager.handle_window_event(&event) {
                        log::warn!("input event ignored: {}", e);
                    }
                }
            }
        }
    }
}

/// Open a window and run a scene in it until the window is closed.
pub fn run(
    window_config: WindowConfig,
    scene_config: SceneConfig,
    setup: SceneSetup,
) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, window_config, scene_config, setup)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
