//! Vertical-to-horizontal scroll handoff for the image strip.
//!
//! While the strip wrapper is pinned, page scroll inside its span is reinterpreted as the strip's
//! horizontal translation. The span length equals the strip's overflow past the viewport.

use crate::{
    core::Direction,
    observer::{EndEdge, ObserverEvent, ObserverHandle, ScrollPolicy},
    runtime::{Ctx, ScrollCommand},
    scene::{ElementId, Props, Scene},
};

/// Horizontal overflow of the strip: `sum(widths) - viewport_width`, floored at 0.
pub fn scroll_distance(panel_widths: impl IntoIterator<Item = f64>, viewport_width: f64) -> f64 {
    let total: f64 = panel_widths.into_iter().filter(|w| w.is_finite()).sum();
    (total - viewport_width).max(0.0)
}

/// Width of a bodypaint strip with `n` 55vw panels, 1vw gaps and a 1vw trailing pad.
pub fn bodypaint_strip_width(n: usize, viewport_width: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let vw = viewport_width / 100.0;
    (n as f64 * 55.0 + (n - 1) as f64 + 1.0) * vw
}

#[derive(Debug, Default)]
pub struct HorizontalHandoff {
    wrapper: Option<ElementId>,
    strip: Option<ElementId>,
    panels: Vec<ElementId>,
    handle: Option<ObserverHandle>,
    distance: f64,
    locked: bool,
}

impl HorizontalHandoff {
    /// Pins `wrapper` for the strip's overflow distance. Missing elements leave an inert
    /// controller behind.
    #[tracing::instrument(skip(ctx, panels), fields(panels = panels.len()))]
    pub fn mount(
        ctx: &mut Ctx<'_>,
        wrapper: ElementId,
        strip: ElementId,
        panels: &[ElementId],
    ) -> Self {
        let all_mounted = ctx.scene.is_mounted(wrapper)
            && ctx.scene.is_mounted(strip)
            && panels.iter().all(|p| ctx.scene.is_mounted(*p));
        if !all_mounted {
            tracing::warn!("strip elements missing; horizontal handoff skipped");
            return Self::default();
        }

        let distance = Self::measure(ctx.scene, panels, ctx.viewport.width);
        let policy = ScrollPolicy::pinned(EndEdge::PlusPixels(distance));
        let handle = match ctx.observer.register(ctx.scene, wrapper, policy) {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(error = %e, "strip registration failed; handoff skipped");
                return Self::default();
            }
        };

        Self {
            wrapper: Some(wrapper),
            strip: Some(strip),
            panels: panels.to_vec(),
            handle: Some(handle),
            distance,
            locked: false,
        }
    }

    fn measure(scene: &Scene, panels: &[ElementId], viewport_width: f64) -> f64 {
        scroll_distance(
            panels.iter().filter_map(|p| scene.get(*p)).map(|el| el.width),
            viewport_width,
        )
    }

    pub fn handle(&self) -> Option<ObserverHandle> {
        self.handle
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Scroll range wheel input is confined to while the body is locked.
    pub fn lock_span(&self, ctx: &Ctx<'_>) -> Option<(f64, f64)> {
        if !self.locked {
            return None;
        }
        let (start, end) = ctx.observer.span(self.handle?)?;
        Some((start - 1.0, end))
    }

    pub fn on_observer(
        &mut self,
        ctx: &mut Ctx<'_>,
        handle: ObserverHandle,
        event: ObserverEvent,
    ) -> Option<ScrollCommand> {
        if self.handle != Some(handle) {
            return None;
        }
        match event {
            ObserverEvent::Enter | ObserverEvent::EnterBack => {
                self.set_locked(true);
                None
            }
            ObserverEvent::Leave | ObserverEvent::LeaveBack => {
                self.set_locked(false);
                None
            }
            ObserverEvent::Detached => {
                self.set_locked(false);
                self.handle = None;
                None
            }
            ObserverEvent::Update {
                progress,
                direction,
            } => {
                self.translate(ctx, progress);
                let (start, end) = ctx.observer.span(handle)?;
                if progress >= 1.0 {
                    Some(ScrollCommand::ScrollTo(end - 1.0))
                } else if progress <= 0.0 && direction == Direction::Backward {
                    Some(ScrollCommand::ScrollTo(start - 1.0))
                } else {
                    None
                }
            }
        }
    }

    fn translate(&self, ctx: &mut Ctx<'_>, progress: f64) {
        if let Some(strip) = self.strip {
            ctx.tweens
                .set_immediate(ctx.scene, strip, &Props::new().x(-progress * self.distance));
        }
    }

    fn set_locked(&mut self, locked: bool) {
        if self.locked != locked {
            tracing::debug!(locked, "body scroll lock");
            self.locked = locked;
        }
    }

    /// Re-measures the strip after a layout change and re-resolves the pinned span.
    pub fn refresh(&mut self, ctx: &mut Ctx<'_>) {
        let Some(handle) = self.handle else {
            return;
        };
        self.distance = Self::measure(ctx.scene, &self.panels, ctx.viewport.width);
        ctx.observer
            .set_end(ctx.scene, handle, EndEdge::PlusPixels(self.distance));
        let progress = ctx.observer.progress(handle).unwrap_or(0.0);
        self.translate(ctx, progress);
    }

    pub fn unmount(&mut self, ctx: &mut Ctx<'_>) {
        if let Some(h) = self.handle.take() {
            ctx.observer.unregister(h);
        }
        self.set_locked(false);
        self.wrapper = None;
        self.strip = None;
        self.panels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ShowreelConfig, core::Viewport, runtime::Runtime};

    fn setup() -> (Runtime, ElementId, HorizontalHandoff) {
        let mut rt = Runtime::new(
            ShowreelConfig::default(),
            Viewport::new(1000.0, 800.0).unwrap(),
        );
        let wrapper = rt.scene.mount("strip-wrapper");
        rt.scene.set_layout(wrapper, 1600.0, 1000.0, 800.0);
        let strip = rt.scene.mount("strip");
        let a = rt.scene.mount("bodypaint");
        rt.scene.set_layout(a, 1600.0, 1500.0, 800.0);
        let b = rt.scene.mount("sfx");
        rt.scene.set_layout(b, 1600.0, 1000.0, 800.0);
        let handoff = HorizontalHandoff::mount(&mut rt.ctx(), wrapper, strip, &[a, b]);
        (rt, strip, handoff)
    }

    fn scroll(rt: &mut Runtime, handoff: &mut HorizontalHandoff, y: f64) -> Vec<ScrollCommand> {
        let events = rt.observer.on_scroll(&rt.scene, y);
        let mut ctx = rt.ctx();
        events
            .into_iter()
            .filter_map(|(h, ev)| handoff.on_observer(&mut ctx, h, ev))
            .collect()
    }

    #[test]
    fn distance_is_overflow_past_viewport() {
        assert_eq!(scroll_distance([1500.0, 1000.0], 1000.0), 1500.0);
        assert_eq!(scroll_distance([400.0], 1000.0), 0.0);
        assert_eq!(bodypaint_strip_width(0, 1000.0), 0.0);
        assert_eq!(bodypaint_strip_width(3, 1000.0), 1680.0);
    }

    #[test]
    fn scrub_translates_and_locks() {
        let (mut rt, strip, mut handoff) = setup();
        assert_eq!(handoff.distance(), 1500.0);
        assert!(scroll(&mut rt, &mut handoff, 2350.0).is_empty());
        assert!(handoff.is_locked());
        assert_eq!(rt.scene.style(strip).unwrap().x, -750.0);
        assert_eq!(handoff.lock_span(&rt.ctx()), Some((1599.0, 3100.0)));
    }

    #[test]
    fn clamps_at_both_ends() {
        let (mut rt, _strip, mut handoff) = setup();
        scroll(&mut rt, &mut handoff, 2000.0);
        assert_eq!(
            scroll(&mut rt, &mut handoff, 3100.0),
            vec![ScrollCommand::ScrollTo(3099.0)]
        );
        assert_eq!(
            scroll(&mut rt, &mut handoff, 1600.0),
            vec![ScrollCommand::ScrollTo(1599.0)]
        );
        scroll(&mut rt, &mut handoff, 1599.0);
        assert!(!handoff.is_locked());
    }

    #[test]
    fn refresh_follows_new_widths() {
        let (mut rt, strip, mut handoff) = setup();
        scroll(&mut rt, &mut handoff, 2350.0);
        let panels = handoff.panels.clone();
        rt.scene.set_layout(panels[0], 1600.0, 2000.0, 800.0);
        handoff.refresh(&mut rt.ctx());
        assert_eq!(handoff.distance(), 2000.0);
        assert_eq!(rt.observer.span(handoff.handle().unwrap()), Some((1600.0, 3600.0)));
        assert_eq!(rt.scene.style(strip).unwrap().x, -1000.0);
    }

    #[test]
    fn unmount_releases_lock_and_trigger() {
        let (mut rt, _strip, mut handoff) = setup();
        scroll(&mut rt, &mut handoff, 2000.0);
        handoff.unmount(&mut rt.ctx());
        assert!(!handoff.is_locked());
        assert!(rt.observer.is_empty());
    }

    #[test]
    fn missing_strip_is_inert() {
        let mut rt = Runtime::new(
            ShowreelConfig::default(),
            Viewport::new(1000.0, 800.0).unwrap(),
        );
        let wrapper = rt.scene.mount("strip-wrapper");
        let handoff = HorizontalHandoff::mount(&mut rt.ctx(), wrapper, ElementId(99), &[]);
        assert!(handoff.handle().is_none());
        assert!(rt.observer.is_empty());
    }
}
