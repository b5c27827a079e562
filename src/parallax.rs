//! Pointer-driven depth parallax.
//!
//! Two layers react to the pointer. A "bubble" follows it with per-frame exponential smoothing,
//! so its motion is independent of the pointer event rate. Foreground images and particles get
//! discrete eased tweens towards an offset scaled by their depth.

use crate::{
    anim::TweenOpts,
    anim_ease::Ease,
    core::Point,
    listeners::{ListenerKind, Owner},
    observer::{EndEdge, ObserverEvent, ObserverHandle, ScrollPolicy, StartEdge},
    runtime::Ctx,
    scene::{ElementId, Props},
    timer::TimerId,
};

/// Latest-value cell between an event handler (sole writer) and a frame loop (sole reader).
///
/// Writes between two reads collapse into the last one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerCell<T> {
    latest: Option<T>,
}

impl<T: Copy> PointerCell<T> {
    pub fn new() -> Self {
        Self { latest: None }
    }

    pub fn write(&mut self, value: T) {
        self.latest = Some(value);
    }

    /// Consumes the pending value, if any.
    pub fn take(&mut self) -> Option<T> {
        self.latest.take()
    }

    pub fn peek(&self) -> Option<T> {
        self.latest
    }
}

/// Exponential follower: `cur += (target - cur) / k` once per frame.
///
/// With `k >= 1` every step lands between the current position and the target, so the follower
/// never overshoots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BubbleFollower {
    k: f64,
    current: Point,
    target: Point,
}

impl BubbleFollower {
    pub fn new(k: f64) -> Self {
        Self {
            k: k.max(1.0),
            current: Point::ZERO,
            target: Point::ZERO,
        }
    }

    pub fn set_target(&mut self, target: Point) {
        self.target = target;
    }

    pub fn target(&self) -> Point {
        self.target
    }

    pub fn position(&self) -> Point {
        self.current
    }

    pub fn step(&mut self) -> Point {
        self.current += (self.target - self.current) / self.k;
        self.current
    }
}

/// Normalized pointer displacement from the viewport center, scaled by `intensity`.
pub fn pointer_offset(pointer: Point, width: f64, height: f64, intensity: f64) -> (f64, f64) {
    (
        (pointer.x / width - 0.5) * intensity,
        (pointer.y / height - 0.5) * intensity,
    )
}

/// Elements the about section's parallax moves.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParallaxTargets {
    #[serde(default)]
    pub bubble: Option<ElementId>,
    #[serde(default)]
    pub images: Vec<ElementId>,
    #[serde(default)]
    pub particles: Vec<ElementId>,
}

pub const LISTENS: [ListenerKind; 2] = [ListenerKind::PointerMove, ListenerKind::Frame];

#[derive(Debug)]
pub struct DepthParallax {
    owner: Owner,
    targets: ParallaxTargets,
    bubble: BubbleFollower,
    pending: PointerCell<Point>,
    debounce: Option<TimerId>,
}

impl DepthParallax {
    #[tracing::instrument(skip(ctx, targets))]
    pub fn mount(ctx: &mut Ctx<'_>, targets: ParallaxTargets) -> Self {
        let scene = &*ctx.scene;
        let mut targets = targets;
        targets.images.retain(|e| scene.is_mounted(*e));
        targets.particles.retain(|e| scene.is_mounted(*e));
        if targets.bubble.is_some_and(|b| !scene.is_mounted(b)) {
            tracing::warn!("parallax bubble not mounted; follower disabled");
            targets.bubble = None;
        }

        let owner = ctx.listeners.allocate_owner();
        ctx.listeners.add_all(owner, &LISTENS);
        Self {
            owner,
            targets,
            bubble: BubbleFollower::new(ctx.config.parallax.damping),
            pending: PointerCell::new(),
            debounce: None,
        }
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn bubble(&self) -> &BubbleFollower {
        &self.bubble
    }

    /// Records a pointer move. The bubble always follows; the depth tweens are debounced and
    /// skipped while the intro timeline still owns the elements.
    pub fn on_pointer_move(&mut self, ctx: &mut Ctx<'_>, pointer: Point, intro_running: bool) {
        self.bubble.set_target(pointer);
        if intro_running {
            return;
        }
        self.pending.write(pointer);
        if let Some(t) = self.debounce.take() {
            ctx.timers.cancel(t);
        }
        let after = ctx.config.parallax.pointer_debounce_ms;
        self.debounce = Some(ctx.timers.schedule(self.owner, ctx.now_ms, after));
    }

    /// Handles the debounce deadline. Returns false for timers this component does not own.
    pub fn on_timer(&mut self, ctx: &mut Ctx<'_>, id: TimerId) -> bool {
        if self.debounce != Some(id) {
            return false;
        }
        self.debounce = None;
        if let Some(pointer) = self.pending.take() {
            self.apply(ctx, pointer);
        }
        true
    }

    fn apply(&self, ctx: &mut Ctx<'_>, pointer: Point) {
        let (x, y) = pointer_offset(
            pointer,
            ctx.viewport.width,
            ctx.viewport.height,
            ctx.config.parallax.intensity,
        );
        for (i, &img) in self.targets.images.iter().enumerate() {
            let depth = (i + 1) as f64 * 0.3;
            ctx.tweens.animate(
                ctx.scene,
                img,
                Props::new()
                    .x(x * depth)
                    .y(y * depth)
                    .rotation_x(-y * 0.1)
                    .rotation_y(x * 0.1),
                TweenOpts::new(800.0, Ease::OutQuad).overwrite(),
            );
        }
        ctx.tweens.animate_staggered(
            ctx.scene,
            &self.targets.particles,
            Props::new().x(x * 0.2).y(y * 0.2),
            TweenOpts::new(1000.0, Ease::OutQuad).stagger(20.0),
        );
    }

    /// One animation frame: advances the bubble and writes it to its element.
    pub fn on_frame(&mut self, ctx: &mut Ctx<'_>) {
        let p = self.bubble.step();
        if let Some(bubble) = self.targets.bubble {
            ctx.tweens
                .set_immediate(ctx.scene, bubble, &Props::new().x(p.x).y(p.y));
        }
    }

    #[tracing::instrument(skip_all, fields(owner = self.owner.0))]
    pub fn unmount(&mut self, ctx: &mut Ctx<'_>) {
        ctx.listeners.remove_all(self.owner);
        ctx.timers.cancel_all_for(self.owner);
        self.debounce = None;
        self.pending.take();
        for &el in self.targets.images.iter().chain(&self.targets.particles) {
            ctx.tweens.kill_target(el);
        }
    }
}

/// Scroll-linked vertical drift: `y = progress * viewport_width * speed * 0.1` while the element
/// crosses the viewport.
#[derive(Debug)]
pub struct ScrollParallax {
    element: ElementId,
    speed: f64,
    handle: Option<ObserverHandle>,
}

impl ScrollParallax {
    pub fn mount(ctx: &mut Ctx<'_>, element: ElementId, speed: f64) -> Self {
        let policy = ScrollPolicy {
            start: StartEdge::TopBottom,
            end: EndEdge::BottomTop,
            ..ScrollPolicy::default()
        };
        let handle = match ctx.observer.register(ctx.scene, element, policy) {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!(element = element.0, error = %e, "scroll parallax skipped");
                None
            }
        };
        Self {
            element,
            speed,
            handle,
        }
    }

    pub fn handle(&self) -> Option<ObserverHandle> {
        self.handle
    }

    pub fn on_observer(&mut self, ctx: &mut Ctx<'_>, handle: ObserverHandle, event: ObserverEvent) {
        if self.handle != Some(handle) {
            return;
        }
        match event {
            ObserverEvent::Update { progress, .. } => {
                let y = progress * ctx.viewport.width * self.speed * 0.1;
                ctx.tweens
                    .set_immediate(ctx.scene, self.element, &Props::new().y(y));
            }
            ObserverEvent::Detached => self.handle = None,
            _ => {}
        }
    }

    pub fn unmount(&mut self, ctx: &mut Ctx<'_>) {
        if let Some(h) = self.handle.take() {
            ctx.observer.unregister(h);
        }
    }
}
