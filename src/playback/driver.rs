use std::rc::Rc;
use std::time::Instant;

use crate::playback::controller::{Controller, SharedController};
use crate::render::surface::ViewportMetrics;

/// Host hook for viewport resize notifications.
///
/// The driver attaches it when its first controller appears and detaches it when the last one
/// is removed. The host reports changes through [`Driver::viewport_changed`].
pub trait ResizeSource {
    fn attach(&mut self);
    fn detach(&mut self);
}

/// Scheduling context that owns every controller and ticks them from one loop.
///
/// Call [`Driver::frame`] (or [`Driver::frame_with_delta`]) once per display refresh.
#[derive(Default)]
pub struct Driver {
    controllers: Vec<SharedController>,
    global: Option<SharedController>,
    resize: Option<Box<dyn ResizeSource>>,
    resize_attached: bool,
    metrics: ViewportMetrics,
    last_frame: Option<Instant>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("controllers", &self.controllers.len())
            .field("resize_attached", &self.resize_attached)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl Driver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resize_source(resize: Box<dyn ResizeSource>) -> Self {
        let mut driver = Self::default();
        driver.resize = Some(resize);
        driver
    }

    /// Create a controller ticked by this driver.
    pub fn create_controller(&mut self) -> SharedController {
        let c = Controller::new().shared();
        self.add_controller(Rc::clone(&c));
        c
    }

    /// Start ticking an existing controller. Adding one twice is a no-op.
    pub fn add_controller(&mut self, controller: SharedController) {
        if self.controllers.iter().any(|c| Rc::ptr_eq(c, &controller)) {
            return;
        }
        self.controllers.push(controller);
        if !self.resize_attached
            && let Some(r) = self.resize.as_mut()
        {
            r.attach();
            self.resize_attached = true;
            tracing::debug!("resize listener attached");
        }
    }

    /// Stop ticking a controller. Returns whether it was known.
    pub fn remove_controller(&mut self, controller: &SharedController) -> bool {
        let Some(i) = self
            .controllers
            .iter()
            .position(|c| Rc::ptr_eq(c, controller))
        else {
            return false;
        };
        self.controllers.remove(i);
        if self
            .global
            .as_ref()
            .is_some_and(|g| Rc::ptr_eq(g, controller))
        {
            self.global = None;
        }
        if self.controllers.is_empty()
            && self.resize_attached
            && let Some(r) = self.resize.as_mut()
        {
            r.detach();
            self.resize_attached = false;
            tracing::debug!("resize listener detached");
        }
        true
    }

    /// The shared default controller, created on first use.
    pub fn global(&mut self) -> SharedController {
        if let Some(g) = &self.global {
            return Rc::clone(g);
        }
        let g = self.create_controller();
        self.global = Some(Rc::clone(&g));
        g
    }

    pub fn controllers(&self) -> &[SharedController] {
        &self.controllers
    }

    pub fn is_resize_attached(&self) -> bool {
        self.resize_attached
    }

    pub fn metrics(&self) -> ViewportMetrics {
        self.metrics
    }

    /// Tick with the wall-clock delta since the previous call (zero on the first call).
    pub fn frame(&mut self, now: Instant) {
        let dt = self
            .last_frame
            .map_or(0.0, |prev| now.saturating_duration_since(prev).as_secs_f64());
        self.last_frame = Some(now);
        self.frame_with_delta(dt);
    }

    /// Poll every controller's views, then tick it, in registration order.
    pub fn frame_with_delta(&mut self, dt_seconds: f64) {
        for c in &self.controllers {
            let mut c = c.borrow_mut();
            c.poll_views();
            c.tick(dt_seconds);
        }
    }

    /// Host notification that the device pixel ratio or zoom changed.
    pub fn viewport_changed(&mut self, metrics: ViewportMetrics) {
        self.metrics = metrics;
        for c in &self.controllers {
            c.borrow_mut().correct_scaling(metrics);
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if self.resize_attached
            && let Some(r) = self.resize.as_mut()
        {
            r.detach();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/driver.rs"]
mod tests;
