use super::{CardDriver, CardPhase, CommitOutcome, GalleryCard, GalleryMode};
use crate::{anim::TweenOpts, runtime::Ctx, scene::Props};

/// Scroll-scrubbed crossfade: progress maps to a virtual card position and every card fades and
/// shrinks with its distance from it.
#[derive(Debug)]
pub struct ContinuousDriver {
    len: usize,
    position: usize,
}

/// Opacity and scale of a card `distance` card-widths away from the virtual position.
pub fn crossfade(distance: f64) -> (f64, f64) {
    let d = distance.abs();
    ((1.0 - d).clamp(0.0, 1.0), (1.0 - 0.2 * d).max(0.0))
}

impl ContinuousDriver {
    pub fn new(len: usize) -> Self {
        Self { len, position: 0 }
    }

    fn virtual_position(&self, progress: f64) -> f64 {
        progress.clamp(0.0, 1.0) * self.len.saturating_sub(1) as f64
    }
}

impl CardDriver for ContinuousDriver {
    fn mode(&self) -> GalleryMode {
        GalleryMode::ContinuousScroll
    }

    fn positions(&self) -> usize {
        self.len
    }

    fn position(&self) -> usize {
        self.position
    }

    fn init(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard]) {
        self.position = 0;
        for (i, card) in cards.iter_mut().enumerate() {
            let (opacity, scale) = crossfade(i as f64);
            card.slot = 0;
            card.phase = if i == 0 {
                CardPhase::Settled
            } else {
                CardPhase::Hidden
            };
            ctx.tweens.set_immediate(
                ctx.scene,
                card.element,
                &Props::new().x(0.0).y(0.0).rotation(0.0).opacity(opacity).scale(scale),
            );
        }
    }

    fn on_forward(&mut self, _ctx: &mut Ctx<'_>, _cards: &mut [GalleryCard]) -> CommitOutcome {
        CommitOutcome::Unsupported
    }

    fn on_backward(&mut self, _ctx: &mut Ctx<'_>, _cards: &mut [GalleryCard]) -> CommitOutcome {
        CommitOutcome::Unsupported
    }

    fn on_progress(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard], progress: f64) {
        let v = self.virtual_position(progress);
        self.position = (v.round() as usize).min(self.len.saturating_sub(1));
        let anim = &ctx.config.animation;
        for (i, card) in cards.iter_mut().enumerate() {
            let cp = v - i as f64;
            let (opacity, scale) = crossfade(cp);
            ctx.tweens.animate(
                ctx.scene,
                card.element,
                Props::new().opacity(opacity).scale(scale),
                TweenOpts::new(anim.duration_ms, anim.ease).overwrite(),
            );
            card.phase = if i == self.position {
                CardPhase::Settled
            } else if cp.abs() < 1.0 {
                CardPhase::Entering
            } else {
                CardPhase::Hidden
            };
        }
    }

    fn on_tween_done(&mut self, _cards: &mut [GalleryCard]) {}
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::{
        config::{DesktopGalleryMode, ShowreelConfig},
        gesture::Key,
        observer::ObserverEvent,
        runtime::ScrollCommand,
    };

    fn continuous() -> ShowreelConfig {
        let mut cfg = ShowreelConfig::default();
        cfg.gallery.desktop_mode = DesktopGalleryMode::Continuous;
        cfg
    }

    #[test]
    fn crossfade_falls_off_linearly() {
        assert_eq!(crossfade(0.0), (1.0, 1.0));
        assert_eq!(crossfade(-0.5), (0.5, 0.9));
        assert_eq!(crossfade(2.0).0, 0.0);
        assert_eq!(crossfade(10.0).1, 0.0);
    }

    #[test]
    fn progress_drives_cards_and_leave_completes() {
        let mut rt = runtime(continuous(), DESKTOP);
        let (mut seq, done) = mounted(&mut rt, 5);
        assert_eq!(seq.mode(), Some(GalleryMode::ContinuousScroll));
        let h = seq.handle().unwrap();
        assert!(rt.observer.is_pinned(h));

        // Keys are ignored in this mode.
        press(&mut rt, &mut seq, Key::ArrowDown);
        assert!(!seq.is_animating());

        let (start, end) = rt.observer.span(h).unwrap();
        let y = start + 0.5 * (end - start);
        for (handle, ev) in rt.observer.on_scroll(&rt.scene, y) {
            seq.on_observer(&mut rt.ctx(), handle, ev);
        }
        assert_eq!(seq.current_index(), 2);
        settle(&mut rt, &mut seq);
        let mid = rt.scene.style(seq.cards()[2].element).unwrap();
        assert!((mid.opacity - 1.0).abs() < 1e-9);
        // Crossfade only: no card moves sideways.
        for card in seq.cards() {
            assert_eq!(rt.scene.style(card.element).unwrap().x, 0.0);
        }
        let far = rt.scene.style(seq.cards()[0].element).unwrap();
        assert!(far.opacity.abs() < 1e-9);

        assert!(!done.is_complete());
        let events = rt.observer.on_scroll(&rt.scene, end + 10.0);
        assert!(events.contains(&(h, ObserverEvent::Leave)));
        for (handle, ev) in events {
            seq.on_observer(&mut rt.ctx(), handle, ev);
        }
        assert!(done.is_complete());
    }

    #[test]
    fn settles_onto_nearest_snap_point() {
        let mut rt = runtime(continuous(), DESKTOP);
        let (mut seq, _) = mounted(&mut rt, 5);
        let h = seq.handle().unwrap();
        let (start, end) = rt.observer.span(h).unwrap();
        let y = start + 0.3 * (end - start);
        for (handle, ev) in rt.observer.on_scroll(&rt.scene, y) {
            seq.on_observer(&mut rt.ctx(), handle, ev);
        }

        let mut snapped = None;
        for _ in 0..20 {
            for (_, id) in rt.step(16.0).timers {
                if let Some(cmd) = seq.on_timer(&mut rt.ctx(), id) {
                    snapped = Some(cmd);
                }
            }
        }
        let expected = start + 0.25 * (end - start);
        assert_eq!(snapped, Some(ScrollCommand::ScrollTo(expected)));
    }
}
