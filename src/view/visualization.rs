use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::assets::color::{parse_color, parse_palette, with_opacity};
use crate::assets::loader::{AssetLoader, LoadPoll, PendingLoad};
use crate::catalog::model::Variation;
use crate::foundation::core::{Point, Rgba8, ViewId};
use crate::foundation::error::{PointreelError, PointreelResult};
use crate::playback::controller::{Controller, FrameState, PlaybackView, SharedController};
use crate::playback::observer::{Observers, Subscription};
use crate::render::renderer::{RenderRequest, RenderStyle, Renderer};
use crate::render::surface::{Surface, ViewportMetrics};
use crate::view::hit_test::{HitQuery, MouseCollision};
use crate::view::options::{ViewOptions, check_percent, check_radius};

pub type SharedVisualization = Rc<RefCell<Visualization>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewState {
    /// No variation requested yet.
    Uninitialized,
    Loading,
    Ready,
    /// The latest load failed; the view stays blank until another variation is requested.
    Failed,
}

struct InFlight {
    token: u64,
    variation: Variation,
    class_count: usize,
    load: PendingLoad,
}

/// One displayed view: binds a controller's clock to a renderer and owns its loads.
///
/// Observer callbacks run while the visualization is mutably borrowed and must not call back
/// into it.
pub struct Visualization {
    id: ViewId,
    controller: Weak<RefCell<Controller>>,
    loader: AssetLoader,
    surface: Surface,

    state: ViewState,
    variation: Option<Variation>,
    renderer: Option<Renderer>,
    in_flight: Vec<InFlight>,
    load_token: u64,
    latest_token: Rc<Cell<u64>>,

    channel: usize,
    render_style: RenderStyle,
    tail_falloff: f32,
    radius: f64,
    opacity: f32,
    background: Rgba8,
    colors: Vec<Rgba8>,
    palette: Vec<Rgba8>,
    masked_alpha_scale: f32,

    pointer: Option<Point>,
    hovered: Option<usize>,

    loading_observers: Observers<bool>,
    progress_observers: Rc<RefCell<Observers<f32>>>,
    error_observers: Observers<PointreelError>,
    collision_observers: Observers<Option<MouseCollision>>,
}

impl std::fmt::Debug for Visualization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visualization")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("variation", &self.variation.as_ref().map(|v| v.name.as_str()))
            .field("channel", &self.channel)
            .field("render_style", &self.render_style)
            .field("load_token", &self.load_token)
            .finish_non_exhaustive()
    }
}

impl Visualization {
    /// Build a view and register it with `controller`.
    #[tracing::instrument(skip_all, fields(view = %id))]
    pub fn attach(
        id: ViewId,
        controller: &SharedController,
        loader: AssetLoader,
        surface: Surface,
        options: &ViewOptions,
    ) -> PointreelResult<SharedVisualization> {
        options.validate()?;
        let colors = parse_palette(&options.colors)?;
        let vis = Self {
            id,
            controller: Rc::downgrade(controller),
            loader,
            surface,
            state: ViewState::Uninitialized,
            variation: None,
            renderer: None,
            in_flight: Vec::new(),
            load_token: 0,
            latest_token: Rc::new(Cell::new(0)),
            channel: options.channel,
            render_style: options.render_style,
            tail_falloff: options.tail_falloff,
            radius: options.radius,
            opacity: options.opacity,
            background: parse_color(&options.background)?,
            palette: with_opacity(&colors, options.opacity),
            colors,
            masked_alpha_scale: options.masked_alpha_scale,
            pointer: None,
            hovered: None,
            loading_observers: Observers::default(),
            progress_observers: Rc::new(RefCell::new(Observers::default())),
            error_observers: Observers::default(),
            collision_observers: Observers::default(),
        };
        let shared = Rc::new(RefCell::new(vis));
        controller.borrow_mut().register(id, shared.clone());
        Ok(shared)
    }

    /// Unregister from the controller and drop observers, loads and pointer state.
    pub fn shutdown(&mut self) {
        if let Some(c) = self.controller.upgrade() {
            match c.try_borrow_mut() {
                Ok(mut c) => {
                    c.unregister(self.id);
                }
                Err(_) => {
                    tracing::warn!(view = %self.id, "controller busy; view not unregistered");
                }
            }
        }
        self.loader.forget_view(self.id);
        self.in_flight.clear();
        self.pointer = None;
        self.hovered = None;
        self.loading_observers.clear();
        self.progress_observers.borrow_mut().clear();
        self.error_observers.clear();
        self.collision_observers.clear();
        tracing::debug!(view = %self.id, "view shut down");
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state() == ViewState::Loading
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.renderer.as_ref()
    }

    /// Requested variation (pending or installed).
    pub fn variation(&self) -> Option<&Variation> {
        self.variation.as_ref()
    }

    pub fn load_token(&self) -> u64 {
        self.load_token
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn render_style(&self) -> RenderStyle {
        self.render_style
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn tail_falloff(&self) -> f32 {
        self.tail_falloff
    }

    pub fn background(&self) -> Rgba8 {
        self.background
    }

    /// Alpha-applied palette used for drawing.
    pub fn palette(&self) -> &[Rgba8] {
        &self.palette
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Last pointer position in display coordinates.
    pub fn pointer(&self) -> Option<Point> {
        self.pointer
    }

    /// Straight RGBA8 snapshot of the surface over the background color.
    pub fn snapshot_rgba8(&self) -> Vec<u8> {
        self.surface.to_rgba8(Some(self.background))
    }

    /// Switch to another variation; the view stays blank until the load installs.
    #[tracing::instrument(skip_all, fields(view = %self.id, variation = %variation.name))]
    pub fn set_variation(&mut self, variation: Variation, path_prefix: &str) {
        self.surface.clear();
        self.renderer = None;
        self.hovered = None;
        self.state = ViewState::Loading;
        self.load_token += 1;
        let token = self.load_token;
        self.latest_token.set(token);

        let class_count = self
            .controller
            .upgrade()
            .and_then(|c| {
                let c = c.try_borrow().ok()?;
                c.capture().map(|cap| cap.class_count())
            })
            .unwrap_or(0);

        let latest = Rc::clone(&self.latest_token);
        let progress = Rc::clone(&self.progress_observers);
        let on_progress = move |pct: f32| {
            if latest.get() == token {
                progress.borrow().emit(&pct);
            }
        };
        let loading = &self.loading_observers;
        let load = self.loader.load(
            self.id,
            &variation,
            path_prefix,
            || loading.emit(&true),
            on_progress,
        );

        tracing::debug!(token, "variation requested");
        self.variation = Some(variation.clone());
        self.in_flight.push(InFlight {
            token,
            variation,
            class_count,
            load,
        });
    }

    fn settle(&mut self, done: InFlight, outcome: LoadPoll, frame: &FrameState<'_>) {
        if done.token != self.load_token {
            tracing::debug!(
                view = %self.id,
                token = done.token,
                latest = self.load_token,
                variation = %done.variation.name,
                "discarding stale load"
            );
            return;
        }

        let installed = match outcome {
            LoadPoll::Pending => return,
            LoadPoll::Loaded(set) => {
                let checked = if done.class_count > 0 {
                    set.check_class_count(done.class_count)
                } else {
                    Ok(())
                };
                checked.and_then(|()| Renderer::new(set, done.variation))
            }
            LoadPoll::Failed(e) => Err(e),
            LoadPoll::Aborted => {
                tracing::debug!(view = %self.id, "latest load aborted");
                self.state = ViewState::Uninitialized;
                self.loading_observers.emit(&false);
                return;
            }
        };

        match installed {
            Ok(renderer) => {
                let channels = renderer.variation().channels.len();
                if self.channel >= channels {
                    tracing::debug!(
                        view = %self.id,
                        channel = self.channel,
                        channels,
                        "selected channel missing from new variation; resetting to 0"
                    );
                    self.channel = 0;
                }
                tracing::info!(
                    view = %self.id,
                    variation = %renderer.variation().name,
                    samples = renderer.arrays().sample_count(),
                    "variation installed"
                );
                self.renderer = Some(renderer);
                self.state = ViewState::Ready;
                self.draw(frame);
            }
            Err(e) => {
                tracing::warn!(view = %self.id, error = %e, "variation failed to load");
                self.state = ViewState::Failed;
                self.error_observers.emit(&e);
            }
        }
        self.loading_observers.emit(&false);
    }

    fn render_now(&mut self, frame: &FrameState<'_>) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let req = RenderRequest {
            time: frame.time,
            channel: self.channel,
            radius: self.radius,
            palette: &self.palette,
            style: self.render_style,
            tail_falloff: self.tail_falloff,
            is_playing: frame.is_playing,
            class_mask: frame.class_mask,
            background: self.background,
            masked_alpha_scale: self.masked_alpha_scale,
            hovered: self.hovered,
        };
        if let Err(e) = renderer.render(&mut self.surface, &req) {
            tracing::warn!(view = %self.id, error = %e, "render failed");
        }
    }

    /// Redraw at the controller's current time.
    fn redraw(&mut self) {
        let Some(controller) = self.controller.upgrade() else {
            return;
        };
        let Ok(c) = controller.try_borrow() else {
            tracing::debug!(view = %self.id, "controller busy; redraw deferred to next draw");
            return;
        };
        self.render_now(&c.frame_state());
    }

    pub fn set_channel(&mut self, channel: usize) -> PointreelResult<()> {
        if let Some(v) = &self.variation
            && channel >= v.channels.len()
        {
            return Err(PointreelError::validation(format!(
                "channel {channel} out of range ({} channels)",
                v.channels.len()
            )));
        }
        self.channel = channel;
        self.redraw();
        Ok(())
    }

    pub fn set_color_map<S: AsRef<str>>(&mut self, colors: &[S]) -> PointreelResult<()> {
        self.colors = parse_palette(colors)?;
        self.palette = with_opacity(&self.colors, self.opacity);
        self.redraw();
        Ok(())
    }

    pub fn set_opacity(&mut self, opacity: f32) -> PointreelResult<()> {
        check_percent("opacity", opacity)?;
        self.opacity = opacity;
        self.palette = with_opacity(&self.colors, opacity);
        self.redraw();
        Ok(())
    }

    pub fn set_render_style(&mut self, style: RenderStyle) {
        self.render_style = style;
        self.redraw();
    }

    pub fn set_tail_falloff(&mut self, falloff: f32) -> PointreelResult<()> {
        check_percent("tail_falloff", falloff)?;
        self.tail_falloff = falloff;
        self.redraw();
        Ok(())
    }

    pub fn set_radius(&mut self, radius: f64) -> PointreelResult<()> {
        check_radius(radius)?;
        self.radius = radius;
        self.redraw();
        Ok(())
    }

    pub fn set_background(&mut self, color: &str) -> PointreelResult<()> {
        self.background = parse_color(color)?;
        self.redraw();
        Ok(())
    }

    /// Change the displayed size and redraw.
    pub fn resize_display(&mut self, width: f64, height: f64) -> PointreelResult<()> {
        self.surface.set_display_size(width, height)?;
        self.redraw();
        Ok(())
    }

    /// Hit-test at display coordinates and report the collision to observers.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<MouseCollision> {
        let pointer = Point::new(x, y);
        self.pointer = Some(pointer);

        let collision = self.controller.upgrade().and_then(|c| {
            let c = c.try_borrow().ok()?;
            if !c.capture().is_some_and(|cap| cap.has_x_preview) {
                return None;
            }
            let renderer = self.renderer.as_ref()?;
            let query = HitQuery {
                positions: renderer.arrays().positions.get(self.channel)?,
                channel: renderer.variation().channels.get(self.channel)?,
                time: c.time(),
                display: self.surface.display_size(),
                radius: self.radius,
            };
            query.nearest(pointer)
        });

        self.set_hovered(collision.map(|c| c.sample_idx));
        self.collision_observers.emit(&collision);
        collision
    }

    pub fn pointer_leave(&mut self) {
        self.pointer = None;
        self.set_hovered(None);
        self.collision_observers.emit(&None);
    }

    fn set_hovered(&mut self, hovered: Option<usize>) {
        if self.hovered != hovered {
            self.hovered = hovered;
            self.redraw();
        }
    }

    pub fn subscribe_loading(&mut self, f: impl Fn(&bool) + 'static) -> Subscription {
        self.loading_observers.subscribe(f)
    }

    pub fn subscribe_progress(&mut self, f: impl Fn(&f32) + 'static) -> Subscription {
        self.progress_observers.borrow_mut().subscribe(f)
    }

    pub fn subscribe_load_error(
        &mut self,
        f: impl Fn(&PointreelError) + 'static,
    ) -> Subscription {
        self.error_observers.subscribe(f)
    }

    pub fn subscribe_collision(
        &mut self,
        f: impl Fn(&Option<MouseCollision>) + 'static,
    ) -> Subscription {
        self.collision_observers.subscribe(f)
    }

    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        self.loading_observers.unsubscribe(sub)
            || self.progress_observers.borrow_mut().unsubscribe(sub)
            || self.error_observers.unsubscribe(sub)
            || self.collision_observers.unsubscribe(sub)
    }
}

impl PlaybackView for Visualization {
    /// No-op while loading.
    fn draw(&mut self, frame: &FrameState<'_>) {
        self.render_now(frame);
    }

    fn correct_scaling(&mut self, metrics: ViewportMetrics, frame: &FrameState<'_>) {
        self.surface.correct_scaling(metrics);
        self.render_now(frame);
    }

    fn poll(&mut self, frame: &FrameState<'_>) {
        let mut i = 0;
        while i < self.in_flight.len() {
            match self.in_flight[i].load.poll() {
                LoadPoll::Pending => i += 1,
                outcome => {
                    let done = self.in_flight.swap_remove(i);
                    self.settle(done, outcome, frame);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/view/visualization.rs"]
mod tests;
