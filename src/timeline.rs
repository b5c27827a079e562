use crate::{
    anim::{TweenEngine, TweenId, TweenOpts},
    scene::{ElementId, Props, Scene},
};

/// Where a step starts relative to the timeline built so far.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Position {
    /// At the current end of the timeline.
    After,
    /// `ms` before the current end ("-=0.3").
    Overlap(f64),
    /// At an absolute offset from the timeline start.
    At(f64),
}

#[derive(Clone, Debug)]
struct Step {
    targets: Vec<(ElementId, Props)>,
    opts: TweenOpts,
    position: Position,
}

/// A sequence of staggered tween steps laid out on one clock.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    steps: Vec<Step>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimelinePlayback {
    pub tweens: Vec<TweenId>,
    /// The tween that finishes last; its completion is the timeline's completion.
    pub last: Option<TweenId>,
    pub duration_ms: f64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(
        self,
        targets: &[ElementId],
        props: Props,
        opts: TweenOpts,
        position: Position,
    ) -> Self {
        self.to_each(targets, |_| props.clone(), opts, position)
    }

    /// Like [`Timeline::to`], with props computed per target index.
    pub fn to_each(
        mut self,
        targets: &[ElementId],
        props: impl Fn(usize) -> Props,
        opts: TweenOpts,
        position: Position,
    ) -> Self {
        self.steps.push(Step {
            targets: targets
                .iter()
                .enumerate()
                .map(|(i, &t)| (t, props(i)))
                .collect(),
            opts,
            position,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Start offset of every step, plus total duration.
    pub fn layout(&self) -> (Vec<f64>, f64) {
        let mut end = 0.0f64;
        let mut starts = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let start = match step.position {
                Position::After => end,
                Position::Overlap(ms) => (end - ms).max(0.0),
                Position::At(ms) => ms.max(0.0),
            };
            let span = step.opts.delay_ms
                + step.targets.len().saturating_sub(1) as f64 * step.opts.stagger_ms
                + step.opts.duration_ms;
            end = end.max(start + span);
            starts.push(start);
        }
        (starts, end)
    }

    pub fn play(&self, engine: &mut dyn TweenEngine, scene: &Scene) -> TimelinePlayback {
        let (starts, duration_ms) = self.layout();
        let mut out = TimelinePlayback {
            duration_ms,
            ..TimelinePlayback::default()
        };
        let mut last_end = f64::NEG_INFINITY;

        for (step, start) in self.steps.iter().zip(starts) {
            for (i, (target, props)) in step.targets.iter().enumerate() {
                let opts = TweenOpts {
                    delay_ms: start + step.opts.delay_ms + i as f64 * step.opts.stagger_ms,
                    ..step.opts
                };
                let id = engine.animate(scene, *target, props.clone(), opts);
                let end = opts.delay_ms + opts.duration_ms;
                if end >= last_end {
                    last_end = end;
                    out.last = Some(id);
                }
                out.tweens.push(id);
            }
        }
        out
    }
}
