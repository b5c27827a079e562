use std::ops::Range;

use super::{CardDriver, CardPhase, CommitOutcome, GalleryCard, GalleryMode};
use crate::{
    anim::{TweenId, TweenOpts},
    anim_ease::Ease,
    config::GalleryConfig,
    core::Direction,
    runtime::Ctx,
    scene::Props,
};

/// Fanned groups of cards (left/center/right for a group of 3), one group visible at a time.
///
/// The center card's tween is the authoritative completion signal for a group change; for a
/// short trailing group the first card is used instead. Reordering slots changes which tween
/// gates the sequencer.
#[derive(Debug)]
pub struct GroupedDriver {
    len: usize,
    group_size: usize,
    group: usize,
    outgoing: Option<usize>,
}

/// Settled `(x, rotation)` of a card at `slot` in a group of `group_len` cards.
///
/// Slots left of center shift left and tilt counter-clockwise; slots right of center shift right
/// with a slightly smaller clockwise tilt.
pub fn slot_layout(
    slot: usize,
    group_len: usize,
    viewport_width: f64,
    cfg: &GalleryConfig,
) -> (f64, f64) {
    let center = group_len.saturating_sub(1) / 2;
    let rel = slot as f64 - center as f64;
    let x = rel * cfg.side_offset * viewport_width;
    let rotation = if rel < 0.0 {
        rel * cfg.tilt_deg
    } else {
        rel * cfg.tilt_deg * 0.8
    };
    (x, rotation)
}

impl GroupedDriver {
    pub fn new(len: usize, group_size: usize) -> Self {
        Self {
            len,
            group_size: group_size.max(1),
            group: 0,
            outgoing: None,
        }
    }

    fn groups(&self) -> usize {
        self.len.div_ceil(self.group_size)
    }

    pub fn group_range(&self, group: usize) -> Range<usize> {
        let start = (group * self.group_size).min(self.len);
        start..(start + self.group_size).min(self.len)
    }

    fn authoritative_slot(&self, group_len: usize) -> usize {
        if group_len == self.group_size {
            self.group_size / 2
        } else {
            0
        }
    }

    fn settled_props(slot: usize, group_len: usize, vw: f64, cfg: &GalleryConfig) -> Props {
        let (x, rotation) = slot_layout(slot, group_len, vw, cfg);
        Props::new()
            .x(x)
            .y(0.0)
            .rotation(rotation)
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
            Direction::Forward if self.group + 1 >= self.groups() => return CommitOutcome::AtEnd,
            Direction::Backward if self.group == 0 => return CommitOutcome::AtStart,
            Direction::Forward => self.group + 1,
            Direction::Backward => self.group - 1,
        };
        let anim = &ctx.config.animation;
        for card in &mut cards[self.group_range(self.group)] {
            ctx.tweens.animate(
                ctx.scene,
                card.element,
                Props::new().scale(0.9).opacity(0.0),
                TweenOpts::new(anim.duration_ms, Ease::InCubic).overwrite(),
            );
            card.phase = CardPhase::Exiting;
        }

        let range = self.group_range(target);
        let group_len = range.len();
        let gate_idx = range.start + self.authoritative_slot(group_len);
        for i in range.clone().filter(|&i| i != gate_idx) {
            Self::enter(ctx, &mut cards[i], i - range.start, group_len, dir);
        }
        let gate = Self::enter(ctx, &mut cards[gate_idx], gate_idx - range.start, group_len, dir);

        self.outgoing = Some(self.group);
        self.group = target;
        CommitOutcome::Started(gate)
    }

    /// Drops `card` in from the travel direction and tweens it to its settled slot.
    fn enter(
        ctx: &mut Ctx<'_>,
        card: &mut GalleryCard,
        slot: usize,
        group_len: usize,
        dir: Direction,
    ) -> TweenId {
        let (vw, vh) = (ctx.viewport.width, ctx.viewport.height);
        let anim = &ctx.config.animation;
        let gallery = &ctx.config.gallery;
        let (x, rotation) = slot_layout(slot, group_len, vw, gallery);
        ctx.tweens.set_immediate(
            ctx.scene,
            card.element,
            &Props::new()
                .x(x * 1.5)
                .y(dir.sign() * 0.25 * vh)
                .rotation(rotation * 2.0)
                .scale(0.9)
                .opacity(0.0),
        );
        let opts = TweenOpts::new(anim.duration_ms, anim.ease)
            .delay(slot as f64 * gallery.group_stagger_ms)
            .overwrite();
        let id = ctx.tweens.animate(
            ctx.scene,
            card.element,
            Self::settled_props(slot, group_len, vw, gallery),
            opts,
        );
        card.slot = slot;
        card.phase = CardPhase::Entering;
        id
    }
}

impl CardDriver for GroupedDriver {
    fn mode(&self) -> GalleryMode {
        GalleryMode::Grouped {
            group_size: self.group_size,
        }
    }

    fn positions(&self) -> usize {
        self.groups()
    }

    fn position(&self) -> usize {
        self.group
    }

    fn init(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard]) {
        self.group = 0;
        self.outgoing = None;
        let first = self.group_range(0);
        let group_len = first.len();
        let vw = ctx.viewport.width;
        for (i, card) in cards.iter_mut().enumerate() {
            let props = if first.contains(&i) {
                card.slot = i - first.start;
                card.phase = CardPhase::Settled;
                Self::settled_props(card.slot, group_len, vw, &ctx.config.gallery)
            } else {
                card.slot = i % self.group_size;
                card.phase = CardPhase::Hidden;
                Props::new().x(0.0).y(0.0).rotation(0.0).scale(0.9).opacity(0.0)
            };
            ctx.tweens.set_immediate(ctx.scene, card.element, &props);
        }
    }

    fn on_forward(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard]) -> CommitOutcome {
        self.step(ctx, cards, Direction::Forward)
    }

    fn on_backward(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard]) -> CommitOutcome {
        self.step(ctx, cards, Direction::Backward)
    }

    fn on_tween_done(&mut self, cards: &mut [GalleryCard]) {
        if let Some(prev) = self.outgoing.take() {
            for card in &mut cards[self.group_range(prev)] {
                card.phase = CardPhase::Hidden;
            }
        }
        for card in &mut cards[self.group_range(self.group)] {
            card.phase = CardPhase::Settled;
        }
    }

    fn relayout(&mut self, ctx: &mut Ctx<'_>, cards: &mut [GalleryCard]) {
        let range = self.group_range(self.group);
        let group_len = range.len();
        for card in &cards[range] {
            let vw = ctx.viewport.width;
            let props = Self::settled_props(card.slot, group_len, vw, &ctx.config.gallery);
            ctx.tweens.set_immediate(ctx.scene, card.element, &props);
        }
    }
}
