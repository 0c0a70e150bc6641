use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::catalog::model::Capture;
use crate::foundation::core::{ClassMask, ViewId};
use crate::foundation::error::{PointreelError, PointreelResult};
use crate::playback::observer::{Observers, Subscription};
use crate::render::surface::ViewportMetrics;

pub const DEFAULT_FPS: f64 = 30.0;

/// Playback state handed to views on every draw.
///
/// Views never borrow their controller during controller-driven calls; this is all they get.
#[derive(Clone, Copy, Debug)]
pub struct FrameState<'a> {
    pub time: f64,
    pub is_playing: bool,
    pub class_mask: &'a ClassMask,
}

/// A view the controller keeps in sync.
pub trait PlaybackView {
    fn draw(&mut self, frame: &FrameState<'_>);

    /// Recompute pixel dimensions for new viewport metrics, then redraw.
    fn correct_scaling(&mut self, metrics: ViewportMetrics, frame: &FrameState<'_>);

    /// Pump pending asynchronous work (loads). Called once per driver frame.
    fn poll(&mut self, _frame: &FrameState<'_>) {}
}

pub type SharedView = Rc<RefCell<dyn PlaybackView>>;
pub type SharedController = Rc<RefCell<Controller>>;

/// Playback clock for a group of views.
///
/// Observer callbacks run synchronously while the controller is mutably borrowed and must not
/// call back into it.
pub struct Controller {
    time: f64,
    is_playing: bool,
    fps: f64,
    class_mask: ClassMask,
    capture: Option<Capture>,
    views: Vec<(ViewId, SharedView)>,
    index: HashMap<ViewId, usize>,
    time_observers: Observers<f64>,
    playing_observers: Observers<bool>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("time", &self.time)
            .field("is_playing", &self.is_playing)
            .field("fps", &self.fps)
            .field("capture", &self.capture.as_ref().map(|c| c.name.as_str()))
            .field("views", &self.views.len())
            .finish_non_exhaustive()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self {
            time: 0.0,
            is_playing: true,
            fps: DEFAULT_FPS,
            class_mask: ClassMask::default(),
            capture: None,
            views: Vec::new(),
            index: HashMap::new(),
            time_observers: Observers::default(),
            playing_observers: Observers::default(),
        }
    }

    pub fn shared(self) -> SharedController {
        Rc::new(RefCell::new(self))
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn class_mask(&self) -> &ClassMask {
        &self.class_mask
    }

    pub fn capture(&self) -> Option<&Capture> {
        self.capture.as_ref()
    }

    /// Frames of the active capture; `0` without one.
    pub fn frame_count(&self) -> usize {
        self.capture
            .as_ref()
            .map_or(0, |c| usize::try_from(c.frame_count).unwrap_or(usize::MAX))
    }

    pub fn frame_state(&self) -> FrameState<'_> {
        FrameState {
            time: self.time,
            is_playing: self.is_playing,
            class_mask: &self.class_mask,
        }
    }

    /// Add a view, or replace the one already registered under `id`.
    pub fn register(&mut self, id: ViewId, view: SharedView) {
        match self.index.get(&id) {
            Some(&i) => self.views[i].1 = view,
            None => {
                self.index.insert(id, self.views.len());
                self.views.push((id, view));
            }
        }
        tracing::debug!(view = %id, views = self.views.len(), "view registered");
    }

    /// Remove a view. Unknown ids are ignored.
    pub fn unregister(&mut self, id: ViewId) -> bool {
        let Some(i) = self.index.remove(&id) else {
            return false;
        };
        self.views.swap_remove(i);
        if let Some((moved, _)) = self.views.get(i) {
            self.index.insert(*moved, i);
        }
        tracing::debug!(view = %id, views = self.views.len(), "view unregistered");
        true
    }

    pub fn is_registered(&self, id: ViewId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Draw every view at the current time, then advance by `fps * dt_seconds` frames.
    pub fn tick(&mut self, dt_seconds: f64) {
        if !self.is_playing || self.frame_count() == 0 {
            return;
        }
        self.draw_all();
        let advance = self.fps * dt_seconds;
        let advance = if advance.is_finite() { advance } else { 0.0 };
        self.set_time(self.time + advance);
    }

    /// Wrap `time` into `[0, frame_count)`, notify observers, redraw when paused.
    pub fn set_time(&mut self, time: f64) {
        let frames = self.frame_count();
        self.time = if frames == 0 || !time.is_finite() {
            0.0
        } else {
            let t = time.rem_euclid(frames as f64);
            // rem_euclid can round up to the modulus for tiny negative inputs.
            if t >= frames as f64 { 0.0 } else { t }
        };
        self.time_observers.emit(&self.time);
        if !self.is_playing {
            self.draw_all();
        }
    }

    pub fn set_is_playing(&mut self, is_playing: bool) {
        self.is_playing = is_playing;
        self.playing_observers.emit(&is_playing);
        // Settle on the exact frame we stopped at.
        if !is_playing {
            self.draw_all();
        }
    }

    pub fn toggle_playing(&mut self) {
        self.set_is_playing(!self.is_playing);
    }

    /// Jump `delta_frames` whole frames from the current one and pause.
    pub fn step(&mut self, delta_frames: i64) {
        self.set_time(self.time.floor() + delta_frames as f64);
        self.set_is_playing(false);
    }

    pub fn set_fps(&mut self, fps: f64) -> PointreelResult<()> {
        if !fps.is_finite() || fps < 0.0 {
            return Err(PointreelError::validation(format!(
                "fps must be finite and non-negative, got {fps}"
            )));
        }
        self.fps = fps;
        Ok(())
    }

    /// Replace the class mask and redraw.
    ///
    /// Once a capture with classes is active the mask must have one entry per class.
    pub fn set_class_mask(&mut self, mask: ClassMask) -> PointreelResult<()> {
        let classes = self.capture.as_ref().map_or(0, Capture::class_count);
        if classes > 0 && mask.len() != classes {
            return Err(PointreelError::validation(format!(
                "class mask has {} entries but the capture declares {classes} classes",
                mask.len()
            )));
        }
        self.class_mask = mask;
        self.draw_all();
        Ok(())
    }

    /// Enable or disable a single class and redraw.
    pub fn set_class_enabled(&mut self, class_id: usize, enabled: bool) -> PointreelResult<()> {
        let Some(flag) = self.class_mask.0.get_mut(class_id) else {
            return Err(PointreelError::validation(format!(
                "class {class_id} out of range ({} classes)",
                self.class_mask.len()
            )));
        };
        *flag = enabled;
        self.draw_all();
        Ok(())
    }

    /// Install the active capture: reset the mask to all-enabled and re-wrap the time.
    #[tracing::instrument(skip_all, fields(capture = %capture.name))]
    pub fn set_capture(&mut self, capture: Capture) {
        self.class_mask = ClassMask::all_enabled(capture.class_count());
        self.capture = Some(capture);
        self.set_time(self.time);
    }

    /// Every view recomputes its surface for `metrics` and redraws.
    pub fn correct_scaling(&mut self, metrics: ViewportMetrics) {
        let frame = self.frame_state();
        for (id, view) in &self.views {
            match view.try_borrow_mut() {
                Ok(mut v) => v.correct_scaling(metrics, &frame),
                Err(_) => tracing::warn!(view = %id, "view busy; scaling correction skipped"),
            }
        }
    }

    /// Let every view pump its pending loads.
    pub fn poll_views(&mut self) {
        let frame = self.frame_state();
        for (id, view) in &self.views {
            match view.try_borrow_mut() {
                Ok(mut v) => v.poll(&frame),
                Err(_) => tracing::debug!(view = %id, "view busy; poll skipped"),
            }
        }
    }

    /// Redraw every view at the current time.
    pub fn draw_all(&self) {
        let frame = self.frame_state();
        for (id, view) in &self.views {
            match view.try_borrow_mut() {
                Ok(mut v) => v.draw(&frame),
                Err(_) => tracing::warn!(view = %id, "view busy; draw skipped"),
            }
        }
    }

    pub fn subscribe_time(&mut self, f: impl Fn(&f64) + 'static) -> Subscription {
        self.time_observers.subscribe(f)
    }

    pub fn subscribe_playing(&mut self, f: impl Fn(&bool) + 'static) -> Subscription {
        self.playing_observers.subscribe(f)
    }

    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        self.time_observers.unsubscribe(sub) || self.playing_observers.unsubscribe(sub)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/controller.rs"]
mod tests;
