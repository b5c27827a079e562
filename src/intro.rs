//! About-section entrance: particles fade in, then text, images and social links, with each
//! step overlapping the previous one. Particles keep floating afterwards.

use crate::{
    anim::{TweenEvent, TweenId, TweenOpts},
    anim_ease::Ease,
    runtime::Ctx,
    scene::{ElementId, Props},
    timeline::{Position, Timeline},
};

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct IntroTargets {
    pub particles: Vec<ElementId>,
    pub text: Vec<ElementId>,
    pub images: Vec<ElementId>,
    pub socials: Vec<ElementId>,
}

impl IntroTargets {
    fn retain_mounted(&mut self, ctx: &Ctx<'_>) {
        for group in [
            &mut self.particles,
            &mut self.text,
            &mut self.images,
            &mut self.socials,
        ] {
            let before = group.len();
            group.retain(|e| ctx.scene.is_mounted(*e));
            if group.len() != before {
                tracing::warn!(missing = before - group.len(), "intro targets not mounted");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
            && self.text.is_empty()
            && self.images.is_empty()
            && self.socials.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Running(TweenId),
    Done,
}

#[derive(Debug)]
pub struct IntroSequence {
    targets: IntroTargets,
    state: State,
    floats: Vec<TweenId>,
}

/// Image `i` lands tilted, alternating sides.
fn image_tilt(i: usize) -> f64 {
    if i % 2 == 0 { -5.0 } else { 5.0 }
}

impl IntroSequence {
    /// Puts every target in its pre-entrance state.
    #[tracing::instrument(skip_all)]
    pub fn mount(ctx: &mut Ctx<'_>, targets: IntroTargets) -> Self {
        let mut targets = targets;
        targets.retain_mounted(ctx);

        let hidden = Props::new().opacity(0.0).y(30.0);
        for &el in targets
            .text
            .iter()
            .chain(&targets.images)
            .chain(&targets.socials)
        {
            ctx.tweens.set_immediate(ctx.scene, el, &hidden);
        }
        for &p in &targets.particles {
            ctx.tweens
                .set_immediate(ctx.scene, p, &Props::new().opacity(0.0).scale(0.0));
        }
        Self {
            targets,
            state: State::Idle,
            floats: Vec::new(),
        }
    }

    pub fn timeline(&self) -> Timeline {
        let t = &self.targets;
        let ease = Ease::OutQuart;
        Timeline::new()
            .to(
                &t.particles,
                Props::new().opacity(0.4).scale(1.0),
                TweenOpts::new(800.0, ease).stagger(30.0),
                Position::After,
            )
            .to(
                &t.text,
                Props::new().opacity(1.0).y(0.0),
                TweenOpts::new(1000.0, Ease::OutCubic),
                Position::Overlap(300.0),
            )
            .to_each(
                &t.images,
                |i| Props::new().opacity(1.0).y(0.0).rotation(image_tilt(i)),
                TweenOpts::new(800.0, ease).stagger(150.0),
                Position::Overlap(800.0),
            )
            .to(
                &t.socials,
                Props::new().opacity(1.0).y(0.0),
                TweenOpts::new(400.0, ease),
                Position::Overlap(400.0),
            )
    }

    /// Plays the entrance once. A second call is ignored.
    #[tracing::instrument(skip_all)]
    pub fn start(&mut self, ctx: &mut Ctx<'_>) -> bool {
        if self.state != State::Idle {
            tracing::debug!("intro already started");
            return false;
        }
        if self.targets.is_empty() {
            self.state = State::Done;
            return false;
        }

        let playback = self.timeline().play(ctx.tweens, ctx.scene);
        tracing::debug!(tweens = playback.tweens.len(), ms = playback.duration_ms, "intro");
        self.state = match playback.last {
            Some(id) => State::Running(id),
            None => State::Done,
        };

        for &p in &self.targets.particles {
            let props = Props::new()
                .x(ctx.rng.range(-15.0, 15.0))
                .y(ctx.rng.range(-15.0, 15.0))
                .rotation(ctx.rng.range(-90.0, 90.0));
            let opts = TweenOpts::new(ctx.rng.range(3000.0, 5000.0), Ease::InOutSine)
                .delay(self.floats.len() as f64 * 100.0)
                .repeat(-1, true);
            self.floats.push(ctx.tweens.animate(ctx.scene, p, props, opts));
        }
        true
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn floats(&self) -> &[TweenId] {
        &self.floats
    }

    pub fn on_tween_event(&mut self, event: TweenEvent) -> bool {
        match self.state {
            State::Running(last) if last == event.id() => {
                self.state = State::Done;
                true
            }
            _ => false,
        }
    }

    pub fn unmount(&mut self, ctx: &mut Ctx<'_>) {
        let t = &self.targets;
        for &el in t
            .particles
            .iter()
            .chain(&t.text)
            .chain(&t.images)
            .chain(&t.socials)
        {
            ctx.tweens.kill_target(el);
        }
        self.floats.clear();
        if self.is_running() {
            self.state = State::Done;
        }
    }
}
