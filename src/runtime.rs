//! The shared capabilities every page component drives: scene, tweens, timers, listeners and
//! the scroll observer, bundled so components can borrow them together.

use crate::{
    anim::{TweenEngine, TweenEvent, Tweener},
    config::ShowreelConfig,
    core::{SplitMix64, Viewport},
    listeners::{ListenerRegistry, Owner},
    observer::ScrollObserver,
    scene::Scene,
    timer::{TimerId, Timers},
};

/// A scroll position a controller wants the page forced to.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub enum ScrollCommand {
    ScrollTo(f64),
}

/// Borrowed view of a [`Runtime`] handed to components.
pub struct Ctx<'a> {
    pub scene: &'a mut Scene,
    pub tweens: &'a mut dyn TweenEngine,
    pub timers: &'a mut Timers,
    pub listeners: &'a mut ListenerRegistry,
    pub observer: &'a mut ScrollObserver,
    pub rng: &'a mut SplitMix64,
    pub config: &'a ShowreelConfig,
    pub viewport: Viewport,
    pub now_ms: f64,
}

/// What happened during one [`Runtime::step`].
#[derive(Debug, Default)]
pub struct StepEvents {
    pub timers: Vec<(Owner, TimerId)>,
    pub tweens: Vec<TweenEvent>,
}

#[derive(Debug)]
pub struct Runtime {
    pub scene: Scene,
    pub tweens: Tweener,
    pub timers: Timers,
    pub listeners: ListenerRegistry,
    pub observer: ScrollObserver,
    pub rng: SplitMix64,
    pub config: ShowreelConfig,
    pub viewport: Viewport,
    pub now_ms: f64,
}

impl Runtime {
    pub fn new(config: ShowreelConfig, viewport: Viewport) -> Self {
        Self {
            scene: Scene::default(),
            tweens: Tweener::new(),
            timers: Timers::new(),
            listeners: ListenerRegistry::new(),
            observer: ScrollObserver::new(viewport),
            rng: SplitMix64::new(config.seed),
            config,
            viewport,
            now_ms: 0.0,
        }
    }

    pub fn ctx(&mut self) -> Ctx<'_> {
        Ctx {
            scene: &mut self.scene,
            tweens: &mut self.tweens,
            timers: &mut self.timers,
            listeners: &mut self.listeners,
            observer: &mut self.observer,
            rng: &mut self.rng,
            config: &self.config,
            viewport: self.viewport,
            now_ms: self.now_ms,
        }
    }

    /// Advances the clock by one frame: fires due timers, then steps every tween.
    pub fn step(&mut self, dt_ms: f64) -> StepEvents {
        self.now_ms += dt_ms.max(0.0);
        let timers = self.timers.due(self.now_ms);
        let tweens = self.tweens.tick(&mut self.scene, dt_ms);
        StepEvents { timers, tweens }
    }
}
