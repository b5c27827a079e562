//! Scroll observer: maps the page scroll position onto per-region progress.
//!
//! A registered region gets a `[start, end]` span in page scroll coordinates, resolved from the
//! region's layout and its [`ScrollPolicy`]. Every scroll sample is classified against each span
//! and turned into enter/leave/update events. Pinned regions are reported as pinned while the
//! scroll position is inside their span.

use crate::{
    core::{Direction, Viewport},
    error::{ShowreelError, ShowreelResult},
    scene::{ElementId, Scene},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct ObserverHandle(pub u32);

/// Where the span starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StartEdge {
    /// Region top meets viewport top ("top top").
    TopTop,
    /// Region top meets viewport bottom ("top bottom").
    TopBottom,
    /// "top+=px top".
    TopPlus(f64),
}

/// Where the span ends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EndEdge {
    /// `+= f * 100%` of the viewport height past the start.
    PlusViewport(f64),
    /// A fixed distance past the start.
    PlusPixels(f64),
    /// Region bottom meets viewport top ("bottom top").
    BottomTop,
    /// Region bottom meets viewport bottom ("bottom bottom").
    BottomBottom,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScrollPolicy {
    pub pin: bool,
    pub pin_spacing: bool,
    pub start: StartEdge,
    pub end: EndEdge,
    /// Progress values to snap to once scrolling settles.
    pub snap: Vec<f64>,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            pin: false,
            pin_spacing: true,
            start: StartEdge::TopTop,
            end: EndEdge::PlusViewport(1.0),
            snap: Vec::new(),
        }
    }
}

impl ScrollPolicy {
    /// Full-viewport slide: pinned for one viewport height, no reserved spacing.
    pub fn slide() -> Self {
        Self {
            pin: true,
            pin_spacing: false,
            ..Self::default()
        }
    }

    pub fn pinned(end: EndEdge) -> Self {
        Self {
            pin: true,
            end,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ShowreelResult<()> {
        if let Some(p) = self.snap.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(ShowreelError::scroll(format!(
                "snap point {p} outside [0, 1]"
            )));
        }
        let len = match self.end {
            EndEdge::PlusViewport(f) => f,
            EndEdge::PlusPixels(px) => px,
            EndEdge::BottomTop | EndEdge::BottomBottom => 0.0,
        };
        if !len.is_finite() || len < 0.0 {
            return Err(ShowreelError::scroll("end edge must be finite and >= 0"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub enum ObserverEvent {
    Enter,
    Leave,
    EnterBack,
    LeaveBack,
    Update { progress: f64, direction: Direction },
    /// The region's element disappeared; the trigger was removed.
    Detached,
}

/// Outcome of [`ScrollObserver::refresh`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Refreshed {
    pub realign: Option<f64>,
    pub events: Vec<(ObserverHandle, ObserverEvent)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Zone {
    Before,
    Active,
    After,
}

#[derive(Clone, Debug)]
struct Trigger {
    handle: ObserverHandle,
    region: ElementId,
    policy: ScrollPolicy,
    start: f64,
    end: f64,
    progress: f64,
    zone: Zone,
    direction: Direction,
}

impl Trigger {
    fn progress_at(&self, y: f64) -> f64 {
        let span = self.end - self.start;
        if span <= 0.0 {
            return if y >= self.start { 1.0 } else { 0.0 };
        }
        ((y - self.start) / span).clamp(0.0, 1.0)
    }

    /// Adopts `y`, pushing the edge crossings and the progress change it causes.
    fn move_to(&mut self, y: f64, events: &mut Vec<(ObserverHandle, ObserverEvent)>) {
        let h = self.handle;
        let zone = self.zone_at(y);
        match (self.zone, zone) {
            (Zone::Before, Zone::Active) => events.push((h, ObserverEvent::Enter)),
            (Zone::Active, Zone::After) => events.push((h, ObserverEvent::Leave)),
            (Zone::After, Zone::Active) => events.push((h, ObserverEvent::EnterBack)),
            (Zone::Active, Zone::Before) => events.push((h, ObserverEvent::LeaveBack)),
            (Zone::Before, Zone::After) => {
                events.push((h, ObserverEvent::Enter));
                events.push((h, ObserverEvent::Leave));
            }
            (Zone::After, Zone::Before) => {
                events.push((h, ObserverEvent::EnterBack));
                events.push((h, ObserverEvent::LeaveBack));
            }
            _ => {}
        }
        self.zone = zone;

        let progress = self.progress_at(y);
        if progress != self.progress {
            self.progress = progress;
            events.push((
                h,
                ObserverEvent::Update {
                    progress,
                    direction: self.direction,
                },
            ));
        }
    }

    fn zone_at(&self, y: f64) -> Zone {
        if y < self.start {
            Zone::Before
        } else if y > self.end {
            Zone::After
        } else {
            Zone::Active
        }
    }
}

#[derive(Debug)]
pub struct ScrollObserver {
    viewport: Viewport,
    triggers: Vec<Trigger>,
    next_handle: u32,
    last_y: f64,
}

impl ScrollObserver {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            triggers: Vec::new(),
            next_handle: 0,
            last_y: 0.0,
        }
    }

    fn resolve(
        viewport: Viewport,
        scene: &Scene,
        region: ElementId,
        policy: &ScrollPolicy,
    ) -> Option<(f64, f64)> {
        let el = scene.get(region)?;
        let start = match policy.start {
            StartEdge::TopTop => el.top,
            StartEdge::TopBottom => el.top - viewport.height,
            StartEdge::TopPlus(px) => el.top + px,
        };
        let end = match policy.end {
            EndEdge::PlusViewport(f) => start + f * viewport.height,
            EndEdge::PlusPixels(px) => start + px,
            EndEdge::BottomTop => el.top + el.height,
            EndEdge::BottomBottom => el.top + el.height - viewport.height,
        };
        Some((start, end.max(start)))
    }

    #[tracing::instrument(skip(self, scene, policy), fields(region = region.0))]
    pub fn register(
        &mut self,
        scene: &Scene,
        region: ElementId,
        policy: ScrollPolicy,
    ) -> ShowreelResult<ObserverHandle> {
        policy.validate()?;
        let Some((start, end)) = Self::resolve(self.viewport, scene, region, &policy) else {
            return Err(ShowreelError::scroll(format!(
                "region element {} is not mounted",
                region.0
            )));
        };

        self.next_handle += 1;
        let handle = ObserverHandle(self.next_handle);
        let mut trigger = Trigger {
            handle,
            region,
            policy,
            start,
            end,
            progress: 0.0,
            zone: Zone::Before,
            direction: Direction::Forward,
        };
        // Registration never emits; the trigger just adopts the current position.
        trigger.progress = trigger.progress_at(self.last_y);
        trigger.zone = trigger.zone_at(self.last_y);
        self.triggers.push(trigger);
        Ok(handle)
    }

    pub fn unregister(&mut self, handle: ObserverHandle) -> bool {
        let before = self.triggers.len();
        self.triggers.retain(|t| t.handle != handle);
        before != self.triggers.len()
    }

    /// Replaces the end edge (e.g. after a strip width changed) and recomputes the span.
    pub fn set_end(&mut self, scene: &Scene, handle: ObserverHandle, end: EndEdge) {
        let viewport = self.viewport;
        if let Some(t) = self.triggers.iter_mut().find(|t| t.handle == handle) {
            t.policy.end = end;
            if let Some((s, e)) = Self::resolve(viewport, scene, t.region, &t.policy) {
                t.start = s;
                t.end = e;
            }
        }
    }

    /// Feeds a new scroll position. Returns events in trigger registration order.
    pub fn on_scroll(&mut self, scene: &Scene, y: f64) -> Vec<(ObserverHandle, ObserverEvent)> {
        let mut events = Vec::new();
        let moved = y - self.last_y;
        self.last_y = y;

        let mut detached = Vec::new();
        for t in &mut self.triggers {
            if !scene.is_mounted(t.region) {
                tracing::warn!(handle = t.handle.0, "observed region unmounted; detaching");
                detached.push(t.handle);
                events.push((t.handle, ObserverEvent::Detached));
                continue;
            }

            if let Some(d) = Direction::from_delta(moved) {
                t.direction = d;
            }
            t.move_to(y, &mut events);
        }

        if !detached.is_empty() {
            self.triggers.retain(|t| !detached.contains(&t.handle));
        }
        events
    }

    /// Recomputes every span for a new viewport, keeping each trigger's progress.
    ///
    /// When a pinned trigger is active, the returned `realign` is the scroll position that keeps
    /// its progress under the new span; the caller should adopt it without re-dispatching. Every
    /// other trigger re-evaluates its zone at that position, and the crossings this causes are
    /// returned in registration order, together with `Detached` for regions that went away.
    pub fn refresh(&mut self, scene: &Scene, viewport: Viewport) -> Refreshed {
        self.viewport = viewport;
        let mut realign = None;
        let mut events = Vec::new();
        let mut detached = Vec::new();

        for t in &mut self.triggers {
            match Self::resolve(viewport, scene, t.region, &t.policy) {
                Some((s, e)) => {
                    t.start = s;
                    t.end = e;
                    if realign.is_none() && t.policy.pin && t.zone == Zone::Active {
                        realign = Some(s + t.progress * (e - s));
                    }
                }
                None => {
                    tracing::warn!(handle = t.handle.0, "region unmounted during refresh; detaching");
                    detached.push(t.handle);
                }
            }
        }
        self.triggers.retain(|t| !detached.contains(&t.handle));
        events.extend(detached.into_iter().map(|h| (h, ObserverEvent::Detached)));

        if let Some(y) = realign {
            self.last_y = y;
        }
        let y = self.last_y;
        for t in &mut self.triggers {
            t.move_to(y, &mut events);
        }
        Refreshed { realign, events }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn span(&self, handle: ObserverHandle) -> Option<(f64, f64)> {
        self.find(handle).map(|t| (t.start, t.end))
    }

    pub fn progress(&self, handle: ObserverHandle) -> Option<f64> {
        self.find(handle).map(|t| t.progress)
    }

    pub fn is_active(&self, handle: ObserverHandle) -> bool {
        self.find(handle).is_some_and(|t| t.zone == Zone::Active)
    }

    pub fn is_pinned(&self, handle: ObserverHandle) -> bool {
        self.find(handle)
            .is_some_and(|t| t.policy.pin && t.zone == Zone::Active)
    }

    /// Vertical offset applied to a pinned region so it stays at the viewport top.
    pub fn pinned_offset(&self, handle: ObserverHandle) -> f64 {
        match self.find(handle) {
            Some(t) if t.policy.pin && t.zone == Zone::Active => self.last_y - t.start,
            Some(t) if t.policy.pin && t.zone == Zone::After && !t.policy.pin_spacing => {
                t.end - t.start
            }
            _ => 0.0,
        }
    }

    /// Scroll position of the snap point nearest to the current progress.
    pub fn snap_target(&self, handle: ObserverHandle) -> Option<f64> {
        let t = self.find(handle)?;
        if t.zone != Zone::Active {
            return None;
        }
        let p = t
            .policy
            .snap
            .iter()
            .copied()
            .min_by(|a, b| (a - t.progress).abs().total_cmp(&(b - t.progress).abs()))?;
        Some(t.start + p * (t.end - t.start))
    }

    pub fn handles(&self) -> Vec<ObserverHandle> {
        self.triggers.iter().map(|t| t.handle).collect()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn last_scroll(&self) -> f64 {
        self.last_y
    }

    fn find(&self, handle: ObserverHandle) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.handle == handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(top: f64, height: f64) -> (Scene, ElementId, ScrollObserver) {
        let mut scene = Scene::default();
        let id = scene.mount("section");
        scene.set_layout(id, top, 1000.0, height);
        let vp = Viewport::new(1000.0, 800.0).unwrap();
        (scene, id, ScrollObserver::new(vp))
    }

    #[test]
    fn enter_update_leave_sequence() {
        let (scene, id, mut obs) = setup(800.0, 800.0);
        let h = obs.register(&scene, id, ScrollPolicy::slide()).unwrap();
        assert_eq!(obs.span(h), Some((800.0, 1600.0)));

        let ev = obs.on_scroll(&scene, 1200.0);
        assert_eq!(ev[0], (h, ObserverEvent::Enter));
        assert_eq!(
            ev[1],
            (
                h,
                ObserverEvent::Update {
                    progress: 0.5,
                    direction: Direction::Forward
                }
            )
        );
        assert!(obs.is_pinned(h));
        assert_eq!(obs.pinned_offset(h), 400.0);

        // Same position again: no duplicate update.
        assert!(obs.on_scroll(&scene, 1200.0).is_empty());

        let ev = obs.on_scroll(&scene, 2000.0);
        assert!(ev.contains(&(h, ObserverEvent::Leave)));
        assert!(!obs.is_pinned(h));

        let ev = obs.on_scroll(&scene, 1000.0);
        assert_eq!(ev[0], (h, ObserverEvent::EnterBack));
        assert!(matches!(
            ev[1].1,
            ObserverEvent::Update {
                direction: Direction::Backward,
                ..
            }
        ));
    }

    #[test]
    fn jump_over_span_emits_both_edges() {
        let (scene, id, mut obs) = setup(800.0, 800.0);
        let h = obs.register(&scene, id, ScrollPolicy::slide()).unwrap();
        let ev = obs.on_scroll(&scene, 5000.0);
        assert_eq!(ev[0], (h, ObserverEvent::Enter));
        assert_eq!(ev[1], (h, ObserverEvent::Leave));
        let ev = obs.on_scroll(&scene, 0.0);
        assert_eq!(ev[0], (h, ObserverEvent::EnterBack));
        assert_eq!(ev[1], (h, ObserverEvent::LeaveBack));
    }

    #[test]
    fn refresh_keeps_progress_of_active_pin() {
        let (scene, id, mut obs) = setup(0.0, 800.0);
        let h = obs.register(&scene, id, ScrollPolicy::slide()).unwrap();
        obs.on_scroll(&scene, 200.0);
        assert_eq!(obs.progress(h), Some(0.25));

        let refreshed = obs.refresh(&scene, Viewport::new(1000.0, 400.0).unwrap());
        assert_eq!(refreshed.realign, Some(100.0));
        assert!(refreshed.events.is_empty());
        assert_eq!(obs.progress(h), Some(0.25));
        assert!(obs.on_scroll(&scene, 100.0).is_empty());
    }

    #[test]
    fn refresh_reevaluates_zones_under_the_new_span() {
        let (scene, id, mut obs) = setup(0.0, 800.0);
        let h = obs.register(&scene, id, ScrollPolicy::default()).unwrap();
        obs.on_scroll(&scene, 1000.0);
        assert!(!obs.is_active(h));

        // A taller viewport stretches the span back over the current position.
        let refreshed = obs.refresh(&scene, Viewport::new(1000.0, 1200.0).unwrap());
        assert_eq!(refreshed.realign, None);
        assert_eq!(refreshed.events[0], (h, ObserverEvent::EnterBack));
        assert!(matches!(
            refreshed.events[1],
            (_, ObserverEvent::Update { progress, .. }) if (progress - 1000.0 / 1200.0).abs() < 1e-9
        ));
        assert!(obs.is_active(h));

        assert!(obs.on_scroll(&scene, 1000.0).is_empty());
        let ev = obs.on_scroll(&scene, 1300.0);
        assert_eq!(ev[0], (h, ObserverEvent::Leave));

        let refreshed = obs.refresh(&scene, Viewport::new(1000.0, 1400.0).unwrap());
        assert_eq!(refreshed.events[0], (h, ObserverEvent::EnterBack));
        let refreshed = obs.refresh(&scene, Viewport::new(1000.0, 800.0).unwrap());
        assert_eq!(refreshed.events[0], (h, ObserverEvent::Leave));
    }

    #[test]
    fn refresh_reports_regions_that_went_away() {
        let (mut scene, id, mut obs) = setup(0.0, 800.0);
        let h = obs.register(&scene, id, ScrollPolicy::slide()).unwrap();
        obs.on_scroll(&scene, 10.0);
        scene.unmount(id);

        let refreshed = obs.refresh(&scene, Viewport::new(1000.0, 600.0).unwrap());
        assert_eq!(refreshed.events, vec![(h, ObserverEvent::Detached)]);
        assert!(obs.is_empty());
    }

    #[test]
    fn unmounted_region_detaches_without_panic() {
        let (mut scene, id, mut obs) = setup(0.0, 800.0);
        let h = obs.register(&scene, id, ScrollPolicy::slide()).unwrap();
        obs.on_scroll(&scene, 10.0);
        assert!(obs.is_pinned(h));
        scene.unmount(id);
        let ev = obs.on_scroll(&scene, 20.0);
        assert_eq!(ev, vec![(h, ObserverEvent::Detached)]);
        assert!(!obs.is_pinned(h));
        assert!(obs.is_empty());
    }

    #[test]
    fn register_on_missing_region_is_an_error() {
        let (mut scene, id, mut obs) = setup(0.0, 800.0);
        scene.unmount(id);
        assert!(obs.register(&scene, id, ScrollPolicy::slide()).is_err());
    }

    #[test]
    fn snap_picks_nearest_point() {
        let (scene, id, mut obs) = setup(0.0, 800.0);
        let policy = ScrollPolicy {
            snap: vec![0.0, 0.5, 1.0],
            end: EndEdge::PlusPixels(1000.0),
            ..ScrollPolicy::pinned(EndEdge::PlusPixels(1000.0))
        };
        let h = obs.register(&scene, id, policy).unwrap();
        obs.on_scroll(&scene, 420.0);
        assert_eq!(obs.snap_target(h), Some(500.0));
    }

    #[test]
    fn invalid_snap_is_rejected() {
        let policy = ScrollPolicy {
            snap: vec![1.5],
            ..ScrollPolicy::default()
        };
        assert!(policy.validate().is_err());
    }
}
