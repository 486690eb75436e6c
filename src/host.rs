//! The viewport host: whatever the rendering surface lives in.
//!
//! On the web that is a DOM container the canvas gets appended to, natively it
//! is the winit window. The manager only needs to read the current
//! [`Viewport`], attach/detach its renderer surface and subscribe to host
//! events. Every subscription is a [`ListenerId`] the manager keeps and hands
//! back in `dispose`, so no listener outlives the scene.

use std::{collections::HashMap, sync::Arc};

use winit::window::Window;

use crate::error::{Result, SceneError};

/// Rectangular pixel area available for rendering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Width in physical pixels.
    pub width: u32,
    /// Height in physical pixels.
    pub height: u32,
    /// Pixel density (device pixel ratio).
    pub scale_factor: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32, scale_factor: f64) -> Self {
        Self {
            width,
            height,
            scale_factor,
        }
    }

    /// Minimised windows and collapsed containers report a zero-sized viewport.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Identifies the surface a renderer draws into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Host notifications a manager can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostEvent {
    Resize,
    /// Pointer, wheel and keyboard input, forwarded to the camera controller.
    Input,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

pub trait ViewportHost {
    /// Current viewport, or `ContainerUnavailable` once the host is gone.
    fn viewport(&self) -> Result<Viewport>;

    fn attach_surface(&mut self, surface: SurfaceId) -> Result<()>;

    fn detach_surface(&mut self, surface: SurfaceId);

    fn subscribe(&mut self, event: HostEvent) -> ListenerId;

    fn unsubscribe(&mut self, listener: ListenerId);

    fn is_subscribed(&self, event: HostEvent) -> bool;
}

/// Bookkeeping for host subscriptions.
#[derive(Debug, Default)]
pub struct Listeners {
    next: u64,
    active: HashMap<ListenerId, HostEvent>,
}

impl Listeners {
    pub fn subscribe(&mut self, event: HostEvent) -> ListenerId {
        self.next += 1;
        let id = ListenerId(self.next);
        self.active.insert(id, event);
        id
    }

    pub fn unsubscribe(&mut self, listener: ListenerId) {
        if self.active.remove(&listener).is_none() {
            log::warn!("listener {:?} was not subscribed", listener);
        }
    }

    pub fn is_subscribed(&self, event: HostEvent) -> bool {
        self.active.values().any(|e| *e == event)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// A winit window as viewport host.
///
/// On wasm the window's canvas is appended to the DOM element with
/// `container_id` when the surface gets attached and removed again on detach.
#[derive(Debug)]
pub struct WindowHost {
    window: Arc<Window>,
    #[cfg(target_arch = "wasm32")]
    container_id: String,
    closed: bool,
    attached: Option<SurfaceId>,
    listeners: Listeners,
}

impl WindowHost {
    #[cfg_attr(not(target_arch = "wasm32"), allow(unused_variables))]
    pub fn new(window: Arc<Window>, container_id: impl Into<String>) -> Self {
        Self {
            window,
            #[cfg(target_arch = "wasm32")]
            container_id: container_id.into(),
            closed: false,
            attached: None,
            listeners: Listeners::default(),
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// The window was closed or destroyed; the host can no longer take a surface.
    pub fn mark_closed(&mut self) {
        self.closed = true;
    }

    #[cfg(target_arch = "wasm32")]
    fn append_canvas(&self) -> Result<()> {
        use winit::platform::web::WindowExtWebSys;

        let unavailable = |what: &str| SceneError::ContainerUnavailable(what.to_string());
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| unavailable("no document"))?;
        let container = document
            .get_element_by_id(&self.container_id)
            .ok_or_else(|| unavailable(&format!("no element with id '{}'", self.container_id)))?;
        let canvas = self
            .window
            .canvas()
            .ok_or_else(|| unavailable("window has no canvas"))?;
        container
            .append_child(&canvas)
            .map_err(|_| unavailable("canvas could not be appended"))?;
        Ok(())
    }
}

impl ViewportHost for WindowHost {
    fn viewport(&self) -> Result<Viewport> {
        if self.closed {
            return Err(SceneError::ContainerUnavailable(
                "window was closed".to_string(),
            ));
        }
        let size = self.window.inner_size();
        Ok(Viewport::new(
            size.width,
            size.height,
            self.window.scale_factor(),
        ))
    }

    fn attach_surface(&mut self, surface: SurfaceId) -> Result<()> {
        if self.closed {
            return Err(SceneError::ContainerUnavailable(
                "window was closed".to_string(),
            ));
        }
        #[cfg(target_arch = "wasm32")]
        self.append_canvas()?;
        self.attached = Some(surface);
        Ok(())
    }

    fn detach_surface(&mut self, surface: SurfaceId) {
        if self.attached != Some(surface) {
            log::warn!("surface {:?} is not attached to this window", surface);
            return;
        }
        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowExtWebSys;
            if let Some(canvas) = self.window.canvas() {
                canvas.remove();
            }
        }
        self.attached = None;
    }

    fn subscribe(&mut self, event: HostEvent) -> ListenerId {
        self.listeners.subscribe(event)
    }

    fn unsubscribe(&mut self, listener: ListenerId) {
        self.listeners.unsubscribe(listener);
    }

    fn is_subscribed(&self, event: HostEvent) -> bool {
        self.listeners.is_subscribed(event)
    }
}
