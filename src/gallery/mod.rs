//! Card sequencer: discrete, guarded transitions between gallery cards.
//!
//! The sequencer owns the gesture plumbing (wheel accumulator, swipe detector, key mapping), the
//! `is_animating` guard and the section's completion writer. How cards actually move is delegated
//! to a [`CardDriver`], chosen per viewport class.

mod continuous;
mod grouped;
mod sequential;

pub use continuous::ContinuousDriver;
pub use grouped::GroupedDriver;
pub use sequential::SequentialDriver;

use crate::{
    anim::{TweenEvent, TweenId},
    completion::{CompletionReader, CompletionWriter},
    config::{DesktopGalleryMode, ShowreelConfig},
    core::{Direction, Viewport, ViewportClass},
    error::ShowreelError,
    gesture::{SwipeDetector, WheelAccumulator, key_direction},
    listeners::{ListenerKind, Owner},
    observer::{EndEdge, ObserverEvent, ObserverHandle, ScrollPolicy},
    runtime::{Ctx, ScrollCommand},
    scene::ElementId,
    stage::InputEvent,
    timer::TimerId,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub enum CardPhase {
    #[default]
    Hidden,
    Entering,
    Settled,
    Exiting,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct GalleryCard {
    pub element: ElementId,
    pub source: String,
    pub orientation: Orientation,
    /// Position inside the visible subset (left/center/right for a 3-up group).
    pub slot: usize,
    pub phase: CardPhase,
}

impl GalleryCard {
    pub fn new(element: ElementId, source: impl Into<String>, orientation: Orientation) -> Self {
        Self {
            element,
            source: source.into(),
            orientation,
            slot: 0,
            phase: CardPhase::Hidden,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.phase, CardPhase::Entering | CardPhase::Settled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum GalleryMode {
    Sequential,
    Grouped { group_size: usize },
    ContinuousScroll,
}

pub fn mode_for(class: ViewportClass, config: &ShowreelConfig) -> GalleryMode {
    match (class, config.gallery.desktop_mode) {
        (ViewportClass::Mobile, _) => GalleryMode::Sequential,
        (ViewportClass::Desktop, DesktopGalleryMode::Grouped) => GalleryMode::Grouped {
            group_size: config.gallery.group_size.max(1),
        },
        (ViewportClass::Desktop, DesktopGalleryMode::Continuous) => GalleryMode::ContinuousScroll,
    }
}

/// Result of asking a driver for one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A transition started; the tween is the authoritative completion signal.
    Started(TweenId),
    AtStart,
    AtEnd,
    /// The driver does not take discrete steps.
    Unsupported,
}

/// Per-mode card choreography.
pub trait CardDriver {
    fn mode(&self) -> GalleryMode;

    /// Number of discrete positions (cards or groups).
    fn positions(&self) -> usize;

    fn position(&self) -> usize;

    /// Lays every card out for position 0.
    fn init(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard]);

    fn on_forward(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard]) -> CommitOutcome;

    fn on_backward(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard]) -> CommitOutcome;

    fn on_progress(&mut self, _ctx: &mut Ctx<'_>, _cards: &mut [GalleryCard], _progress: f64) {}

    /// The authoritative tween of the last commit finished (or was killed).
    fn on_tween_done(&mut self, cards: &mut [GalleryCard]);

    /// Re-applies settled transforms after a same-class resize.
    fn relayout(&mut self, _ctx: &mut Ctx<'_>, _cards: &mut [GalleryCard]) {}
}

pub fn create_driver(mode: GalleryMode, card_count: usize) -> Box<dyn CardDriver> {
    match mode {
        GalleryMode::Sequential => Box::new(SequentialDriver::new(card_count)),
        GalleryMode::Grouped { group_size } => Box::new(GroupedDriver::new(card_count, group_size)),
        GalleryMode::ContinuousScroll => Box::new(ContinuousDriver::new(card_count)),
    }
}

const LISTENS: [ListenerKind; 5] = [
    ListenerKind::Wheel,
    ListenerKind::TouchStart,
    ListenerKind::TouchEnd,
    ListenerKind::Key,
    ListenerKind::Resize,
];

struct Active {
    owner: Owner,
    region: ElementId,
    class: ViewportClass,
    driver: Box<dyn CardDriver>,
    cards: Vec<GalleryCard>,
    handle: Option<ObserverHandle>,
    authoritative: Option<TweenId>,
    wheel: WheelAccumulator,
    wheel_timer: Option<TimerId>,
    snap_timer: Option<TimerId>,
    swipe: SwipeDetector,
}

/// Gated gallery state machine.
///
/// Created inert when its region or cards are missing; an inert sequencer ignores everything.
pub struct CardSequencer {
    active: Option<Active>,
    completion: CompletionWriter,
}

impl std::fmt::Debug for CardSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardSequencer")
            .field("mode", &self.mode())
            .field("index", &self.current_index())
            .field("is_animating", &self.is_animating())
            .field("complete", &self.completion.reader().is_complete())
            .finish()
    }
}

impl CardSequencer {
    #[tracing::instrument(skip(ctx, cards, completion), fields(cards = cards.len()))]
    pub fn mount(
        ctx: &mut Ctx<'_>,
        region: ElementId,
        cards: Vec<GalleryCard>,
        completion: CompletionWriter,
    ) -> Self {
        completion.reset();
        if !ctx.scene.is_mounted(region) {
            tracing::warn!(region = region.0, "gallery region not mounted; sequencer inert");
            return Self {
                active: None,
                completion,
            };
        }
        let cards: Vec<GalleryCard> = cards
            .into_iter()
            .filter(|c| {
                let ok = ctx.scene.is_mounted(c.element);
                if !ok {
                    tracing::warn!(element = c.element.0, "gallery card not mounted; skipped");
                }
                ok
            })
            .collect();
        if cards.is_empty() {
            tracing::warn!("gallery has no cards; sequencer inert");
            return Self {
                active: None,
                completion,
            };
        }

        let owner = ctx.listeners.allocate_owner();
        ctx.listeners.add_all(owner, &LISTENS);
        let class = ctx.viewport.class(ctx.config.breakpoint_px);
        let gesture = &ctx.config.gesture;
        let mut active = Active {
            owner,
            region,
            class,
            driver: create_driver(mode_for(class, ctx.config), cards.len()),
            cards,
            handle: None,
            authoritative: None,
            wheel: WheelAccumulator::new(gesture.wheel()),
            wheel_timer: None,
            snap_timer: None,
            swipe: SwipeDetector::new(gesture.swipe_min_px),
        };
        active.start(ctx);
        Self {
            active: Some(active),
            completion,
        }
    }

    pub fn completion(&self) -> CompletionReader {
        self.completion.reader()
    }

    pub fn owner(&self) -> Option<Owner> {
        self.active.as_ref().map(|a| a.owner)
    }

    pub fn handle(&self) -> Option<ObserverHandle> {
        self.active.as_ref().and_then(|a| a.handle)
    }

    pub fn current_index(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.driver.position())
    }

    pub fn positions(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.driver.positions())
    }

    pub fn is_animating(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.authoritative.is_some())
    }

    pub fn mode(&self) -> Option<GalleryMode> {
        self.active.as_ref().map(|a| a.driver.mode())
    }

    pub fn cards(&self) -> &[GalleryCard] {
        self.active
            .as_ref()
            .map(|a| a.cards.as_slice())
            .unwrap_or_default()
    }

    /// Wheel, touch and key input. Only acted on while the gallery region is in view.
    pub fn handle_input(&mut self, ctx: &mut Ctx<'_>, event: &InputEvent) {
        let Some(a) = self.active.as_mut() else {
            return;
        };
        let in_view = a.handle.is_some_and(|h| ctx.observer.is_active(h));
        if !in_view {
            return;
        }
        if a.driver.mode() == GalleryMode::ContinuousScroll {
            // Scroll position drives this mode; discrete gestures are not used.
            return;
        }

        match *event {
            InputEvent::Wheel { delta_y } => {
                let deadline = a.wheel.on_wheel(ctx.now_ms, delta_y);
                if let Some(t) = a.wheel_timer.take() {
                    ctx.timers.cancel(t);
                }
                let after = deadline - ctx.now_ms;
                a.wheel_timer = Some(ctx.timers.schedule(a.owner, ctx.now_ms, after));
            }
            InputEvent::TouchStart { x } => a.swipe.start(x),
            InputEvent::TouchEnd { x } => {
                if let Some(dir) = a.swipe.end(x) {
                    self.commit(ctx, dir);
                }
            }
            InputEvent::Key { key } => {
                if let Some(dir) = key_direction(key) {
                    self.commit(ctx, dir);
                }
            }
            _ => {}
        }
    }

    /// Fires the wheel debounce or the continuous-mode snap.
    pub fn on_timer(&mut self, ctx: &mut Ctx<'_>, id: TimerId) -> Option<ScrollCommand> {
        let a = self.active.as_mut()?;
        if a.wheel_timer == Some(id) {
            a.wheel_timer = None;
            if !a.handle.is_some_and(|h| ctx.observer.is_active(h)) {
                a.wheel.reset();
                return None;
            }
            if let Some(dir) = a.wheel.on_deadline(ctx.now_ms) {
                self.commit(ctx, dir);
            }
            return None;
        }
        if a.snap_timer == Some(id) {
            a.snap_timer = None;
            let target = ctx.observer.snap_target(a.handle?)?;
            if (target - ctx.observer.last_scroll()).abs() > 0.5 {
                tracing::debug!(target, "snapping gallery to nearest card");
                return Some(ScrollCommand::ScrollTo(target));
            }
        }
        None
    }

    /// Releases the guard when the authoritative tween reports back.
    pub fn on_tween_event(&mut self, event: TweenEvent) -> bool {
        let Some(a) = self.active.as_mut() else {
            return false;
        };
        if a.authoritative != Some(event.id()) {
            return false;
        }
        a.authoritative = None;
        a.driver.on_tween_done(&mut a.cards);
        if let TweenEvent::Killed(id) = event {
            tracing::debug!(tween = id.0, "commit tween killed; guard released");
        }
        if a.driver.position() + 1 >= a.driver.positions() {
            tracing::debug!("terminal card settled; section complete");
            self.completion.complete();
        }
        true
    }

    /// A class change re-initializes (and resets completion); otherwise only the settled layout
    /// is refreshed.
    pub fn on_resize(&mut self, ctx: &mut Ctx<'_>, viewport: Viewport) {
        let Some(a) = self.active.as_mut() else {
            return;
        };
        let class = viewport.class(ctx.config.breakpoint_px);
        if class == a.class {
            if a.authoritative.is_none() {
                a.driver.relayout(ctx, &mut a.cards);
            }
            return;
        }

        tracing::debug!(?class, "viewport class changed; reinitializing gallery");
        a.stop(ctx);
        self.completion.reset();
        a.class = class;
        a.driver = create_driver(mode_for(class, ctx.config), a.cards.len());
        a.start(ctx);
    }

    pub fn on_observer(
        &mut self,
        ctx: &mut Ctx<'_>,
        handle: ObserverHandle,
        event: ObserverEvent,
    ) -> Option<ScrollCommand> {
        let a = self.active.as_mut()?;
        if a.handle != Some(handle) {
            return None;
        }
        match event {
            ObserverEvent::Detached => {
                a.handle = None;
            }
            ObserverEvent::Update { progress, .. }
                if a.driver.mode() == GalleryMode::ContinuousScroll =>
            {
                a.driver.on_progress(ctx, &mut a.cards, progress);
                if let Some(t) = a.snap_timer.take() {
                    ctx.timers.cancel(t);
                }
                a.snap_timer = Some(ctx.timers.schedule(
                    a.owner,
                    ctx.now_ms,
                    ctx.config.gesture.idle_gap_ms,
                ));
            }
            ObserverEvent::Leave if a.driver.mode() == GalleryMode::ContinuousScroll => {
                self.completion.complete();
            }
            ObserverEvent::Leave | ObserverEvent::LeaveBack => a.drop_gestures(ctx),
            _ => {}
        }
        None
    }

    /// Logs a card image failure. The card stays in whatever transform it already has.
    pub fn report_load_failure(&self, element: ElementId, error: &ShowreelError) {
        tracing::warn!(element = element.0, %error, "gallery card image failed to load");
    }

    fn commit(&mut self, ctx: &mut Ctx<'_>, dir: Direction) {
        let Some(a) = self.active.as_mut() else {
            return;
        };
        if a.authoritative.is_some() {
            tracing::trace!(?dir, "commit ignored; transition in flight");
            return;
        }
        let outcome = match dir {
            Direction::Forward => a.driver.on_forward(ctx, &mut a.cards),
            Direction::Backward => a.driver.on_backward(ctx, &mut a.cards),
        };
        match outcome {
            CommitOutcome::Started(id) => {
                tracing::debug!(?dir, to = a.driver.position(), "gallery commit");
                a.authoritative = Some(id);
            }
            CommitOutcome::AtEnd => self.completion.complete(),
            CommitOutcome::AtStart | CommitOutcome::Unsupported => {}
        }
    }

    /// Cancels tweens, timers and listeners and drops the observer trigger.
    #[tracing::instrument(skip_all)]
    pub fn unmount(&mut self, ctx: &mut Ctx<'_>) {
        if let Some(mut a) = self.active.take() {
            a.stop(ctx);
            ctx.listeners.remove_all(a.owner);
            ctx.timers.cancel_all_for(a.owner);
        }
    }
}

impl Active {
    fn policy(&self, ctx: &Ctx<'_>) -> ScrollPolicy {
        match self.driver.mode() {
            GalleryMode::ContinuousScroll => {
                let n = self.cards.len();
                let snap = if n > 1 {
                    (0..n).map(|i| i as f64 / (n - 1) as f64).collect()
                } else {
                    vec![0.0]
                };
                ScrollPolicy {
                    snap,
                    ..ScrollPolicy::pinned(EndEdge::PlusViewport(ctx.config.gallery.continuous_span))
                }
            }
            _ => ScrollPolicy::default(),
        }
    }

    fn start(&mut self, ctx: &mut Ctx<'_>) {
        self.driver.init(ctx, &mut self.cards);
        let policy = self.policy(ctx);
        match ctx.observer.register(ctx.scene, self.region, policy) {
            Ok(h) => self.handle = Some(h),
            Err(e) => tracing::warn!(error = %e, "gallery trigger registration failed"),
        }
    }

    /// Forgets a half-finished wheel burst or swipe.
    fn drop_gestures(&mut self, ctx: &mut Ctx<'_>) {
        if let Some(t) = self.wheel_timer.take() {
            ctx.timers.cancel(t);
        }
        self.wheel.reset();
        self.swipe.cancel();
    }

    fn stop(&mut self, ctx: &mut Ctx<'_>) {
        for card in &self.cards {
            ctx.tweens.kill_target(card.element);
        }
        self.authoritative = None;
        if let Some(t) = self.snap_timer.take() {
            ctx.timers.cancel(t);
        }
        self.drop_gestures(ctx);
        if let Some(h) = self.handle.take() {
            ctx.observer.unregister(h);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::{test_support::*, *};
    use crate::{anim::TweenEngine, config::ShowreelConfig, gesture::Key};

    #[test]
    fn mode_follows_viewport_class() {
        let cfg = ShowreelConfig::default();
        assert_eq!(mode_for(ViewportClass::Mobile, &cfg), GalleryMode::Sequential);
        assert_eq!(
            mode_for(ViewportClass::Desktop, &cfg),
            GalleryMode::Grouped { group_size: 3 }
        );
        let mut cfg = cfg;
        cfg.gallery.desktop_mode = DesktopGalleryMode::Continuous;
        assert_eq!(
            mode_for(ViewportClass::Desktop, &cfg),
            GalleryMode::ContinuousScroll
        );
    }

    #[test]
    fn guard_blocks_overlapping_commits() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (mut seq, _) = mounted(&mut rt, 5);
        press(&mut rt, &mut seq, Key::ArrowDown);
        assert!(seq.is_animating());
        let active = rt.tweens.active_count();
        press(&mut rt, &mut seq, Key::ArrowDown);
        press(&mut rt, &mut seq, Key::ArrowUp);
        assert_eq!(rt.tweens.active_count(), active);
        assert_eq!(seq.current_index(), 1);
        settle(&mut rt, &mut seq);
        assert!(!seq.is_animating());
        assert_eq!(seq.current_index(), 1);
    }

    #[test]
    fn wheel_burst_commits_exactly_once() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (mut seq, _) = mounted(&mut rt, 5);
        for _ in 0..4 {
            seq.handle_input(&mut rt.ctx(), &InputEvent::Wheel { delta_y: 20.0 });
            rt.step(5.0);
        }
        settle(&mut rt, &mut seq);
        assert_eq!(seq.current_index(), 1);
    }

    #[test]
    fn split_bursts_below_threshold_never_commit() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (mut seq, _) = mounted(&mut rt, 5);
        seq.handle_input(&mut rt.ctx(), &InputEvent::Wheel { delta_y: 30.0 });
        settle(&mut rt, &mut seq);
        rt.step(300.0);
        seq.handle_input(&mut rt.ctx(), &InputEvent::Wheel { delta_y: 30.0 });
        settle(&mut rt, &mut seq);
        assert_eq!(seq.current_index(), 0);
    }

    #[test]
    fn swipe_left_advances() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (mut seq, _) = mounted(&mut rt, 3);
        seq.handle_input(&mut rt.ctx(), &InputEvent::TouchStart { x: 300.0 });
        seq.handle_input(&mut rt.ctx(), &InputEvent::TouchEnd { x: 280.0 });
        assert!(!seq.is_animating());
        seq.handle_input(&mut rt.ctx(), &InputEvent::TouchStart { x: 300.0 });
        seq.handle_input(&mut rt.ctx(), &InputEvent::TouchEnd { x: 100.0 });
        assert!(seq.is_animating());
        settle(&mut rt, &mut seq);
        assert_eq!(seq.current_index(), 1);
    }

    #[test]
    fn killed_authoritative_tween_releases_guard() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (mut seq, _) = mounted(&mut rt, 3);
        press(&mut rt, &mut seq, Key::ArrowDown);
        assert!(seq.is_animating());
        let card = seq.cards()[1].element;
        rt.tweens.kill_target(card);
        settle(&mut rt, &mut seq);
        assert!(!seq.is_animating());
        press(&mut rt, &mut seq, Key::ArrowDown);
        assert!(seq.is_animating());
    }

    #[test]
    fn failed_card_image_leaves_navigation_intact() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (mut seq, _) = mounted(&mut rt, 3);
        let card = seq.cards()[1].element;
        let before = rt.scene.style(card);
        seq.report_load_failure(card, &ShowreelError::asset("card_1.jpg: not found"));
        assert_eq!(rt.scene.style(card), before);

        press(&mut rt, &mut seq, Key::ArrowDown);
        settle(&mut rt, &mut seq);
        assert_eq!(seq.current_index(), 1);
    }

    #[test]
    fn class_change_resets_completion_and_mode() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (mut seq, done) = mounted(&mut rt, 2);
        press(&mut rt, &mut seq, Key::ArrowDown);
        settle(&mut rt, &mut seq);
        assert!(done.is_complete());

        let vp = Viewport::new(DESKTOP.0, DESKTOP.1).unwrap();
        rt.viewport = vp;
        seq.on_resize(&mut rt.ctx(), vp);
        assert!(!done.is_complete());
        assert_eq!(seq.mode(), Some(GalleryMode::Grouped { group_size: 3 }));
        assert_eq!(seq.current_index(), 0);
    }

    #[test]
    fn same_class_resize_preserves_index_without_commit() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (mut seq, _) = mounted(&mut rt, 5);
        press(&mut rt, &mut seq, Key::ArrowDown);
        settle(&mut rt, &mut seq);
        let vp = Viewport::new(380.0, 700.0).unwrap();
        rt.viewport = vp;
        seq.on_resize(&mut rt.ctx(), vp);
        assert_eq!(seq.current_index(), 1);
        assert!(!seq.is_animating());
    }

    #[test]
    fn empty_gallery_is_inert() {
        let mut rt = runtime(ShowreelConfig::default(), DESKTOP);
        let (mut seq, done) = mounted(&mut rt, 0);
        assert!(seq.owner().is_none());
        press(&mut rt, &mut seq, Key::ArrowDown);
        assert!(!seq.is_animating());
        assert!(!done.is_complete());
        assert_eq!(rt.listeners.total(), 0);
    }

    #[test]
    fn unmount_detaches_listeners_timers_and_trigger() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (mut seq, _) = mounted(&mut rt, 5);
        seq.handle_input(&mut rt.ctx(), &InputEvent::Wheel { delta_y: 80.0 });
        let owner = seq.owner().unwrap();
        assert_eq!(rt.listeners.count_for(owner), LISTENS.len());
        assert_eq!(rt.timers.pending_for(owner), 1);

        seq.unmount(&mut rt.ctx());
        assert_eq!(rt.listeners.total(), 0);
        assert_eq!(rt.timers.pending(), 0);
        assert!(rt.observer.is_empty());
        rt.step(100.0);
        assert!(!seq.is_animating());
        assert_eq!(seq.current_index(), 0);
    }
}
