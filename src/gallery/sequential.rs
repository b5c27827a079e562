use super::{CardDriver, CardPhase, CommitOutcome, GalleryCard, GalleryMode};
use crate::{
    anim::TweenOpts,
    anim_ease::Ease,
    core::Direction,
    runtime::Ctx,
    scene::Props,
};

/// One card at a time; the outgoing card is flicked off-screen while the next slides in.
#[derive(Debug)]
pub struct SequentialDriver {
    len: usize,
    index: usize,
    outgoing: Option<usize>,
}

impl SequentialDriver {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            index: 0,
            outgoing: None,
        }
    }

    fn settled() -> Props {
        Props::new()
            .x(0.0)
            .y(0.0)
            .rotation(0.0)
            .scale(1.0)
            .opacity(1.0)
    }

    fn step(
        &mut self,
        ctx: &mut Ctx<'_>,
        cards: &mut [GalleryCard],
        dir: Direction,
    ) -> CommitOutcome {
        let target = match dir {
            Direction::Forward if self.index + 1 >= self.len => return CommitOutcome::AtEnd,
            Direction::Backward if self.index == 0 => return CommitOutcome::AtStart,
            Direction::Forward => self.index + 1,
            Direction::Backward => self.index - 1,
        };
        let (vw, vh) = (ctx.viewport.width, ctx.viewport.height);
        let anim = &ctx.config.animation;
        let range = anim.rotation_range;

        // Outgoing: flung one viewport along the gesture, drifting and spinning.
        let flick = Props::new()
            .x(ctx.rng.range(-0.5 * vw, 0.5 * vw))
            .y(-dir.sign() * vh)
            .rotation(ctx.rng.range(-range, range))
            .scale(0.8)
            .opacity(0.0);
        let out = &mut cards[self.index];
        ctx.tweens.animate(
            ctx.scene,
            out.element,
            flick,
            TweenOpts::new(anim.duration_ms, Ease::InCubic).overwrite(),
        );
        out.phase = CardPhase::Exiting;

        // Incoming: placed past the opposite edge, then settled.
        let inc = &mut cards[target];
        ctx.tweens.set_immediate(
            ctx.scene,
            inc.element,
            &Props::new()
                .x(0.0)
                .y(dir.sign() * vh)
                .rotation(0.0)
                .scale(1.0)
                .opacity(0.0),
        );
        let id = ctx.tweens.animate(
            ctx.scene,
            inc.element,
            Self::settled(),
            TweenOpts::new(anim.duration_ms, anim.ease).overwrite(),
        );
        inc.phase = CardPhase::Entering;

        self.outgoing = Some(self.index);
        self.index = target;
        CommitOutcome::Started(id)
    }
}

impl CardDriver for SequentialDriver {
    fn mode(&self) -> GalleryMode {
        GalleryMode::Sequential
    }

    fn positions(&self) -> usize {
        self.len
    }

    fn position(&self) -> usize {
        self.index
    }

    fn init(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard]) {
        self.index = 0;
        self.outgoing = None;
        let n = cards.len();
        for (i, card) in cards.iter_mut().enumerate() {
            card.slot = 0;
            let props = if i == 0 {
                card.phase = CardPhase::Settled;
                Self::settled()
            } else {
                card.phase = CardPhase::Hidden;
                Props::new().x(0.0).y(0.0).rotation(0.0).scale(1.0).opacity(0.0)
            };
            ctx.tweens
                .set_immediate(ctx.scene, card.element, &props.z_index((n - i) as f64));
        }
    }

    fn on_forward(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard]) -> CommitOutcome {
        self.step(ctx, cards, Direction::Forward)
    }

    fn on_backward(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard]) -> CommitOutcome {
        self.step(ctx, cards, Direction::Backward)
    }

    fn on_tween_done(&mut self, cards: &mut [GalleryCard]) {
        if let Some(prev) = self.outgoing.take()
            && let Some(card) = cards.get_mut(prev)
        {
            card.phase = CardPhase::Hidden;
        }
        if let Some(card) = cards.get_mut(self.index) {
            card.phase = CardPhase::Settled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::{config::ShowreelConfig, gesture::Key};

    #[test]
    fn only_first_card_visible_after_init() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (seq, _) = mounted(&mut rt, 4);
        assert_eq!(seq.mode(), Some(GalleryMode::Sequential));
        for (i, card) in seq.cards().iter().enumerate() {
            let style = rt.scene.style(card.element).unwrap();
            assert_eq!(style.opacity, if i == 0 { 1.0 } else { 0.0 });
            assert_eq!(card.is_visible(), i == 0);
        }
    }

    #[test]
    fn three_down_one_up_lands_on_two() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (mut seq, _) = mounted(&mut rt, 5);
        for _ in 0..3 {
            press(&mut rt, &mut seq, Key::ArrowDown);
            settle(&mut rt, &mut seq);
        }
        assert_eq!(seq.current_index(), 3);
        press(&mut rt, &mut seq, Key::ArrowUp);
        settle(&mut rt, &mut seq);
        assert_eq!(seq.current_index(), 2);

        let visible: Vec<usize> = seq
            .cards()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_visible())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(visible, vec![2]);
        assert_eq!(rt.scene.style(seq.cards()[2].element).unwrap().opacity, 1.0);
        assert_eq!(rt.scene.style(seq.cards()[3].element).unwrap().opacity, 0.0);
    }

    #[test]
    fn boundaries_are_noops_and_end_completes() {
        let mut rt = runtime(ShowreelConfig::default(), MOBILE);
        let (mut seq, done) = mounted(&mut rt, 2);
        press(&mut rt, &mut seq, Key::ArrowUp);
        assert!(!seq.is_animating());
        assert_eq!(seq.current_index(), 0);

        press(&mut rt, &mut seq, Key::ArrowDown);
        assert!(!done.is_complete());
        settle(&mut rt, &mut seq);
        assert!(done.is_complete());

        press(&mut rt, &mut seq, Key::ArrowDown);
        assert!(!seq.is_animating());
        assert_eq!(seq.current_index(), 1);
    }
}
