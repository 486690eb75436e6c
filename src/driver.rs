//! Animation drivers: the host's per-frame scheduler.
//!
//! A driver only knows how to schedule the next frame, cancel a scheduled
//! frame and tell the time. The host hands the frame that is due back to the
//! manager (see [`crate::manager::SceneManager::on_display_refresh`]), which
//! ignores anything it did not schedule itself.

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::window::Window;

/// Cancellable handle for one scheduled frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

pub trait AnimationDriver {
    /// Schedule the next frame and return its handle.
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancel a scheduled frame. Unknown or already fired handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);

    /// Take the frame the host is servicing right now, if one was scheduled.
    fn take_due(&mut self) -> Option<FrameHandle>;

    /// Host time, monotonic.
    fn now(&self) -> Duration;
}

/// Schedules frames by asking winit for a redraw.
///
/// The frame is due when the window reports `RedrawRequested`.
#[derive(Debug)]
pub struct WindowDriver {
    window: Arc<Window>,
    started: Instant,
    next: u64,
    pending: Option<FrameHandle>,
}

impl WindowDriver {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            started: Instant::now(),
            next: 0,
            pending: None,
        }
    }
}

impl AnimationDriver for WindowDriver {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        let handle = FrameHandle(self.next);
        self.pending = Some(handle);
        self.window.request_redraw();
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        // winit can't retract a redraw request, dropping the handle is enough
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }

    fn take_due(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }
}

/// A deterministic driver for headless runs and tests.
///
/// Time only moves through [`ManualDriver::advance`].
#[derive(Debug, Default)]
pub struct ManualDriver {
    clock: Duration,
    next: u64,
    pending: Option<FrameHandle>,
    requested: u64,
    cancelled: u64,
}

impl ManualDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, dt: Duration) {
        self.clock += dt;
    }

    /// The scheduled frame, without taking it.
    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl AnimationDriver for ManualDriver {
    fn request_frame(&mut self) -> FrameHandle {
        if let Some(previous) = self.pending {
            log::warn!("frame {:?} replaced before it fired", previous);
        }
        self.next += 1;
        self.requested += 1;
        let handle = FrameHandle(self.next);
        self.pending = Some(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
            self.cancelled += 1;
        }
    }

    fn take_due(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }

    fn now(&self) -> Duration {
        self.clock
    }
}
