use crate::{
    anim_ease::Ease,
    scene::{ElementId, Props, Scene},
};

pub trait Lerp: Sized {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for f32 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        (*a as f64 + ((*b as f64 - *a as f64) * t)) as f32
    }
}

impl Lerp for kurbo::Point {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        kurbo::Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct TweenId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum TweenEvent {
    Completed(TweenId),
    /// Cancelled before reaching its end. Owners must treat this like completion for any guard
    /// they hold on the tween.
    Killed(TweenId),
}

impl TweenEvent {
    pub fn id(self) -> TweenId {
        match self {
            Self::Completed(id) | Self::Killed(id) => id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TweenOpts {
    pub duration_ms: f64,
    pub ease: Ease,
    pub delay_ms: f64,
    pub stagger_ms: f64, // per-target delay increment for staggered tweens
    pub repeat: i32,     // -1 = forever
    pub yoyo: bool,
    pub overwrite: bool, // kill other tweens on the same target first
}

impl Default for TweenOpts {
    fn default() -> Self {
        Self {
            duration_ms: 500.0,
            ease: Ease::OutCubic,
            delay_ms: 0.0,
            stagger_ms: 0.0,
            repeat: 0,
            yoyo: false,
            overwrite: false,
        }
    }
}

impl TweenOpts {
    pub fn new(duration_ms: f64, ease: Ease) -> Self {
        Self {
            duration_ms,
            ease,
            ..Self::default()
        }
    }

    pub fn delay(mut self, ms: f64) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn stagger(mut self, ms: f64) -> Self {
        self.stagger_ms = ms;
        self
    }

    pub fn repeat(mut self, n: i32, yoyo: bool) -> Self {
        self.repeat = n;
        self.yoyo = yoyo;
        self
    }

    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }
}

/// Imperative property animation, the capability every controller animates through.
pub trait TweenEngine {
    fn animate(&mut self, scene: &Scene, target: ElementId, props: Props, opts: TweenOpts)
    -> TweenId;

    /// One tween per target, the i-th delayed by `opts.delay_ms + i * opts.stagger_ms`.
    fn animate_staggered(
        &mut self,
        scene: &Scene,
        targets: &[ElementId],
        props: Props,
        opts: TweenOpts,
    ) -> Vec<TweenId> {
        targets
            .iter()
            .enumerate()
            .map(|(i, &target)| {
                let o = TweenOpts {
                    delay_ms: opts.delay_ms + i as f64 * opts.stagger_ms,
                    ..opts
                };
                self.animate(scene, target, props.clone(), o)
            })
            .collect()
    }

    fn set_immediate(&mut self, scene: &mut Scene, target: ElementId, props: &Props);

    fn kill(&mut self, id: TweenId) -> bool;

    fn kill_target(&mut self, target: ElementId) -> usize;

    fn kill_all(&mut self) -> usize;

    fn is_active(&self, id: TweenId) -> bool;

    fn active_count(&self) -> usize;

    /// Advances every tween by `dt_ms`, writing into `scene`.
    fn tick(&mut self, scene: &mut Scene, dt_ms: f64) -> Vec<TweenEvent>;
}

#[derive(Clone, Debug)]
struct Tween {
    id: TweenId,
    target: ElementId,
    to: Props,
    from: Option<Props>, // captured when the delay elapses
    opts: TweenOpts,
    delay_left: f64,
    elapsed: f64,
    repeats_left: i32,
    reversed: bool,
}

impl Tween {
    fn sample(&self, t: f64) -> Props {
        let Some(from) = &self.from else {
            return Props::new();
        };
        let te = self.opts.ease.apply(if self.reversed { 1.0 - t } else { t });
        let mut out = Props::new();
        for &(prop, to) in self.to.iter() {
            let a = from.get(prop).unwrap_or(to);
            out = out.with(prop, f64::lerp(&a, &to, te));
        }
        out
    }
}

/// Frame-stepped [`TweenEngine`].
#[derive(Debug, Default)]
pub struct Tweener {
    next_id: u64,
    tweens: Vec<Tween>,
    pending: Vec<TweenEvent>,
}

impl Tweener {
    pub fn new() -> Self {
        Self::default()
    }

    fn capture(scene: &Scene, target: ElementId, props: &Props) -> Option<Props> {
        let style = scene.style(target)?;
        let mut from = Props::new();
        for &(prop, _) in props.iter() {
            from = from.with(prop, style.get(prop));
        }
        Some(from)
    }

    pub fn tweens_on(&self, target: ElementId) -> usize {
        self.tweens.iter().filter(|t| t.target == target).count()
    }
}

impl TweenEngine for Tweener {
    fn animate(
        &mut self,
        scene: &Scene,
        target: ElementId,
        props: Props,
        opts: TweenOpts,
    ) -> TweenId {
        if opts.overwrite {
            self.kill_target(target);
        }

        self.next_id += 1;
        let id = TweenId(self.next_id);

        if let Err(e) = props.validate() {
            tracing::warn!(tween = id.0, error = %e, "dropping tween with invalid props");
            self.pending.push(TweenEvent::Killed(id));
            return id;
        }
        if !scene.is_mounted(target) {
            tracing::warn!(tween = id.0, element = target.0, "animate on unmounted element");
            self.pending.push(TweenEvent::Killed(id));
            return id;
        }

        let delay_left = opts.delay_ms.max(0.0);
        let from = if delay_left <= 0.0 {
            Self::capture(scene, target, &props)
        } else {
            None
        };
        self.tweens.push(Tween {
            id,
            target,
            to: props,
            from,
            opts,
            delay_left,
            elapsed: 0.0,
            repeats_left: opts.repeat,
            reversed: false,
        });
        id
    }

    fn set_immediate(&mut self, scene: &mut Scene, target: ElementId, props: &Props) {
        match scene.get_mut(target) {
            Some(el) => el.style.apply(props),
            None => tracing::warn!(element = target.0, "set on unmounted element"),
        }
    }

    fn kill(&mut self, id: TweenId) -> bool {
        let before = self.tweens.len();
        self.tweens.retain(|t| t.id != id);
        let killed = self.tweens.len() != before;
        if killed {
            self.pending.push(TweenEvent::Killed(id));
        }
        killed
    }

    fn kill_target(&mut self, target: ElementId) -> usize {
        let mut n = 0;
        let pending = &mut self.pending;
        self.tweens.retain(|t| {
            if t.target == target {
                pending.push(TweenEvent::Killed(t.id));
                n += 1;
                false
            } else {
                true
            }
        });
        n
    }

    fn kill_all(&mut self) -> usize {
        let n = self.tweens.len();
        self.pending
            .extend(self.tweens.drain(..).map(|t| TweenEvent::Killed(t.id)));
        n
    }

    fn is_active(&self, id: TweenId) -> bool {
        self.tweens.iter().any(|t| t.id == id)
    }

    fn active_count(&self) -> usize {
        self.tweens.len()
    }

    fn tick(&mut self, scene: &mut Scene, dt_ms: f64) -> Vec<TweenEvent> {
        let mut events = std::mem::take(&mut self.pending);
        let dt = dt_ms.max(0.0);

        let mut i = 0;
        while i < self.tweens.len() {
            let tw = &mut self.tweens[i];
            let mut step = dt;

            if tw.delay_left > 0.0 {
                if step < tw.delay_left {
                    tw.delay_left -= step;
                    i += 1;
                    continue;
                }
                step -= tw.delay_left;
                tw.delay_left = 0.0;
            }

            if tw.from.is_none() {
                match Self::capture(scene, tw.target, &tw.to) {
                    Some(from) => tw.from = Some(from),
                    None => {
                        tracing::warn!(tween = tw.id.0, "target unmounted before tween start");
                        events.push(TweenEvent::Killed(tw.id));
                        self.tweens.remove(i);
                        continue;
                    }
                }
            }

            tw.elapsed += step;
            let duration = tw.opts.duration_ms.max(0.0);
            let t = if duration <= 0.0 {
                1.0
            } else {
                (tw.elapsed / duration).min(1.0)
            };

            let values = tw.sample(t);
            match scene.get_mut(tw.target) {
                Some(el) => el.style.apply(&values),
                None => {
                    tracing::warn!(tween = tw.id.0, "target unmounted mid-tween");
                    events.push(TweenEvent::Killed(tw.id));
                    self.tweens.remove(i);
                    continue;
                }
            }

            if t < 1.0 {
                i += 1;
                continue;
            }

            if tw.repeats_left != 0 && duration > 0.0 {
                if tw.repeats_left > 0 {
                    tw.repeats_left -= 1;
                }
                tw.elapsed = (tw.elapsed - duration).min(duration);
                if tw.opts.yoyo {
                    tw.reversed = !tw.reversed;
                }
                i += 1;
                continue;
            }

            events.push(TweenEvent::Completed(tw.id));
            self.tweens.remove(i);
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_card() -> (Scene, ElementId) {
        let mut scene = Scene::default();
        let id = scene.mount("card");
        (scene, id)
    }

    #[test]
    fn tween_reaches_target_and_completes_once() {
        let (mut scene, id) = scene_with_card();
        let mut tw = Tweener::new();
        let t = tw.animate(
            &scene,
            id,
            Props::new().x(100.0).opacity(0.0),
            TweenOpts::new(100.0, Ease::Linear),
        );

        assert!(tw.tick(&mut scene, 50.0).is_empty());
        assert_eq!(scene.style(id).unwrap().x, 50.0);

        let events = tw.tick(&mut scene, 60.0);
        assert_eq!(events, vec![TweenEvent::Completed(t)]);
        let s = scene.style(id).unwrap();
        assert_eq!((s.x, s.opacity), (100.0, 0.0));
        assert!(tw.tick(&mut scene, 16.0).is_empty());
    }

    #[test]
    fn delay_defers_start_capture() {
        let (mut scene, id) = scene_with_card();
        let mut tw = Tweener::new();
        tw.animate(
            &scene,
            id,
            Props::new().x(10.0),
            TweenOpts::new(10.0, Ease::Linear).delay(20.0),
        );
        tw.set_immediate(&mut scene, id, &Props::new().x(5.0));
        tw.tick(&mut scene, 15.0);
        assert_eq!(scene.style(id).unwrap().x, 5.0);
        tw.tick(&mut scene, 10.0); // 5ms into the tween
        assert_eq!(scene.style(id).unwrap().x, 7.5);
    }

    #[test]
    fn stagger_offsets_each_target() {
        let mut scene = Scene::default();
        let a = scene.mount("a");
        let b = scene.mount("b");
        let mut tw = Tweener::new();
        let ids = tw.animate_staggered(
            &scene,
            &[a, b],
            Props::new().opacity(0.0),
            TweenOpts::new(10.0, Ease::Linear).stagger(10.0),
        );
        let events = tw.tick(&mut scene, 10.0);
        assert_eq!(events, vec![TweenEvent::Completed(ids[0])]);
        assert_eq!(scene.style(b).unwrap().opacity, 1.0);
    }

    #[test]
    fn kill_reports_killed_on_next_tick() {
        let (mut scene, id) = scene_with_card();
        let mut tw = Tweener::new();
        let t = tw.animate(&scene, id, Props::new().y(1.0), TweenOpts::default());
        assert!(tw.kill(t));
        assert!(!tw.kill(t));
        assert_eq!(tw.tick(&mut scene, 1.0), vec![TweenEvent::Killed(t)]);
        assert_eq!(tw.active_count(), 0);
    }

    #[test]
    fn overwrite_kills_previous_tweens_on_target() {
        let (mut scene, id) = scene_with_card();
        let mut tw = Tweener::new();
        let first = tw.animate(&scene, id, Props::new().x(1.0), TweenOpts::default());
        let second = tw.animate(
            &scene,
            id,
            Props::new().x(2.0),
            TweenOpts::default().overwrite(),
        );
        assert!(!tw.is_active(first));
        assert!(tw.is_active(second));
        assert_eq!(tw.tweens_on(id), 1);
    }

    #[test]
    fn animate_on_unmounted_target_is_killed_not_panicking() {
        let mut scene = Scene::default();
        let id = scene.mount("gone");
        scene.unmount(id);
        let mut tw = Tweener::new();
        let t = tw.animate(&scene, id, Props::new().x(1.0), TweenOpts::default());
        assert_eq!(tw.tick(&mut scene, 16.0), vec![TweenEvent::Killed(t)]);
    }

    #[test]
    fn infinite_yoyo_never_completes() {
        let (mut scene, id) = scene_with_card();
        let mut tw = Tweener::new();
        tw.animate(
            &scene,
            id,
            Props::new().y(10.0),
            TweenOpts::new(100.0, Ease::Linear).repeat(-1, true),
        );
        for _ in 0..50 {
            assert!(tw.tick(&mut scene, 16.0).is_empty());
        }
        let y = scene.style(id).unwrap().y;
        assert!((0.0..=10.0).contains(&y));
        assert_eq!(tw.active_count(), 1);
    }
}
