//! The page orchestrator.
//!
//! A [`Stage`] owns the runtime and every page component. It lays the page out in its element
//! arena, routes input to components that currently listen for it, advances the clock one frame
//! at a time and applies scroll positions forced by the controllers.

use crate::{
    completion::{CompletionReader, section_completion},
    config::ShowreelConfig,
    core::{Point, Viewport, ViewportClass},
    error::{ShowreelError, ShowreelResult},
    gallery::{CardSequencer, GalleryCard, GalleryMode, Orientation, mode_for},
    gesture::Key,
    handoff::{HorizontalHandoff, bodypaint_strip_width},
    intro::{IntroSequence, IntroTargets},
    listeners::{ListenerKind, ListenerRegistry, Owner},
    observer::{ObserverEvent, ObserverHandle, ScrollObserver},
    parallax::{DepthParallax, ParallaxTargets, ScrollParallax},
    pinning::{SectionPinning, SectionRole, SectionSpec},
    runtime::{Runtime, ScrollCommand},
    scene::{ElementId, Scene},
    shader::{
        CpuSurface, Effect, MagnifierParams, ShaderGallery, ShaderImage, SpotlightParams,
        SurfaceFactory, TextureSource,
    },
    timer::Timers,
};

fn one() -> f64 {
    1.0
}

/// Pointer position inside an element, as fractions of its box measured from the top-left.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointerHit {
    pub element: ElementId,
    pub u: f64,
    pub v: f64,
}

/// Everything the browser would deliver as an event.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    Scroll {
        y: f64,
    },
    Wheel {
        delta_y: f64,
    },
    TouchStart {
        x: f64,
    },
    TouchEnd {
        x: f64,
    },
    Key {
        key: Key,
    },
    /// `x`/`y` in viewport pixels.
    PointerMove {
        x: f64,
        y: f64,
        #[serde(default)]
        hit: Option<PointerHit>,
    },
    PointerEnter {
        element: ElementId,
    },
    PointerLeave {
        element: ElementId,
    },
    Click {
        element: ElementId,
    },
    Resize {
        width: f64,
        height: f64,
        #[serde(default = "one")]
        dpr: f64,
    },
}

impl InputEvent {
    pub fn kind(&self) -> ListenerKind {
        match self {
            Self::Scroll { .. } => ListenerKind::Scroll,
            Self::Wheel { .. } => ListenerKind::Wheel,
            Self::TouchStart { .. } => ListenerKind::TouchStart,
            Self::TouchEnd { .. } => ListenerKind::TouchEnd,
            Self::Key { .. } => ListenerKind::Key,
            Self::PointerMove { .. } => ListenerKind::PointerMove,
            Self::PointerEnter { .. } => ListenerKind::PointerEnter,
            Self::PointerLeave { .. } => ListenerKind::PointerLeave,
            Self::Click { .. } => ListenerKind::Click,
            Self::Resize { .. } => ListenerKind::Resize,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AboutLayout {
    pub particles: usize,
    pub text: usize,
    pub images: usize,
    pub socials: usize,
    pub bubble: bool,
}

impl Default for AboutLayout {
    fn default() -> Self {
        Self {
            particles: 8,
            text: 2,
            images: 3,
            socials: 3,
            bubble: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CardLayout {
    pub source: String,
    #[serde(default)]
    pub orientation: Orientation,
}

/// What the page contains. Element slots are allocated from this up front.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PageLayout {
    pub about: AboutLayout,
    /// Drift speed of the about background; 0 disables it.
    pub background_speed: f64,
    pub beauty: Vec<CardLayout>,
    pub bodypaint_panels: usize,
    pub sfx: Vec<TextureSource>,
    pub shader_images: Vec<TextureSource>,
}

impl Default for PageLayout {
    fn default() -> Self {
        let solid = |color| TextureSource::Solid {
            width: 16,
            height: 12,
            color,
        };
        Self {
            about: AboutLayout::default(),
            background_speed: 1.0,
            beauty: (0..9)
                .map(|i| CardLayout {
                    source: format!("beauty_{i}.jpg"),
                    orientation: if i % 3 == 1 {
                        Orientation::Horizontal
                    } else {
                        Orientation::Vertical
                    },
                })
                .collect(),
            bodypaint_panels: 3,
            sfx: vec![
                solid([180, 40, 40, 255]),
                solid([40, 180, 40, 255]),
                solid([40, 40, 180, 255]),
            ],
            shader_images: vec![solid([220, 200, 180, 255]), solid([90, 60, 50, 255])],
        }
    }
}

impl PageLayout {
    pub fn validate(&self) -> ShowreelResult<()> {
        if !self.background_speed.is_finite() {
            return Err(ShowreelError::validation("background_speed must be finite"));
        }
        if self.beauty.iter().any(|c| c.source.trim().is_empty()) {
            return Err(ShowreelError::validation("gallery card source must be non-empty"));
        }
        Ok(())
    }
}

/// Arena slots of every page element.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PageRefs {
    pub about: ElementId,
    pub background: ElementId,
    pub bubble: Option<ElementId>,
    pub particles: Vec<ElementId>,
    pub text: Vec<ElementId>,
    pub images: Vec<ElementId>,
    pub socials: Vec<ElementId>,
    pub beauty: ElementId,
    pub cards: Vec<ElementId>,
    pub shader_images: Vec<ElementId>,
    pub strip_wrapper: ElementId,
    pub strip: ElementId,
    pub bodypaint: ElementId,
    pub sfx: ElementId,
    pub sfx_image: ElementId,
    pub sfx_light: ElementId,
}

impl PageRefs {
    fn allocate(scene: &mut Scene, layout: &PageLayout) -> Self {
        let mut many = |prefix: &str, n: usize| -> Vec<ElementId> {
            (0..n).map(|i| scene.mount(format!("{prefix}-{i}"))).collect()
        };
        let particles = many("particle", layout.about.particles);
        let text = many("about-text", layout.about.text);
        let images = many("about-image", layout.about.images);
        let socials = many("social", layout.about.socials);
        let cards = many("beauty-card", layout.beauty.len());
        let shader_images = many("shader-image", layout.shader_images.len());
        Self {
            about: scene.mount("about"),
            background: scene.mount("about-background"),
            bubble: layout.about.bubble.then(|| scene.mount("bubble")),
            particles,
            text,
            images,
            socials,
            beauty: scene.mount("beauty"),
            cards,
            shader_images,
            strip_wrapper: scene.mount("strip-wrapper"),
            strip: scene.mount("strip"),
            bodypaint: scene.mount("bodypaint"),
            sfx: scene.mount("sfx"),
            sfx_image: scene.mount("sfx-image"),
            sfx_light: scene.mount("sfx-light"),
        }
    }

    fn all(&self) -> Vec<ElementId> {
        let mut out = vec![
            self.about,
            self.background,
            self.beauty,
            self.strip_wrapper,
            self.strip,
            self.bodypaint,
            self.sfx,
            self.sfx_image,
            self.sfx_light,
        ];
        out.extend(self.bubble);
        for group in [
            &self.particles,
            &self.text,
            &self.images,
            &self.socials,
            &self.cards,
            &self.shader_images,
        ] {
            out.extend(group.iter().copied());
        }
        out
    }
}

/// State reported after each scripted step.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StageSnapshot {
    pub now_ms: f64,
    pub scroll_y: f64,
    pub index: usize,
    pub mode: Option<GalleryMode>,
    pub animating: bool,
    pub complete: bool,
    pub locked: bool,
    pub intro_running: bool,
    pub active_tweens: usize,
}

struct Page {
    refs: PageRefs,
    layout: PageLayout,
    pinning: SectionPinning,
    gallery: CardSequencer,
    gate: CompletionReader,
    gate_epoch: u64,
    handoff: HorizontalHandoff,
    intro: IntroSequence,
    parallax: DepthParallax,
    background: ScrollParallax,
    shader_images: Vec<ShaderImage>,
    sfx: Option<ShaderGallery>,
}

pub struct Stage {
    rt: Runtime,
    surfaces: SurfaceFactory,
    page: Option<Page>,
    scroll_y: f64,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("viewport", &self.rt.viewport)
            .field("now_ms", &self.rt.now_ms)
            .field("scroll_y", &self.scroll_y)
            .field("mounted", &self.page.is_some())
            .finish()
    }
}

pub const FRAME_MS: f64 = 1000.0 / 60.0;

impl Stage {
    pub fn new(config: ShowreelConfig, viewport: Viewport) -> ShowreelResult<Self> {
        config.validate()?;
        let surfaces = CpuSurface::factory(&config.shader);
        Ok(Self {
            rt: Runtime::new(config, viewport),
            surfaces,
            page: None,
            scroll_y: 0.0,
        })
    }

    /// Replaces how render surfaces are created for shader components mounted from now on.
    pub fn with_surface_factory(mut self, factory: SurfaceFactory) -> Self {
        self.surfaces = factory;
        self
    }

    fn class(&self) -> ViewportClass {
        self.rt.viewport.class(self.rt.config.breakpoint_px)
    }

    /// Allocates the page elements, lays them out and mounts every component.
    ///
    /// Mounting twice is a no-op that returns the existing refs.
    #[tracing::instrument(skip_all)]
    pub fn mount_page(&mut self, layout: &PageLayout) -> ShowreelResult<PageRefs> {
        if let Some(page) = &self.page {
            tracing::warn!("page already mounted; ignoring");
            return Ok(page.refs.clone());
        }
        layout.validate()?;

        let refs = PageRefs::allocate(&mut self.rt.scene, layout);
        let mode = mode_for(self.class(), &self.rt.config);
        Self::layout_page(&mut self.rt.scene, &self.rt.config, self.rt.viewport, &refs, layout, mode);

        let (writer, gate) = section_completion();
        let sections = [
            SectionSpec {
                element: refs.about,
                role: SectionRole::Slide,
            },
            SectionSpec {
                element: refs.beauty,
                role: SectionRole::Gated,
            },
            SectionSpec {
                element: refs.strip_wrapper,
                role: SectionRole::StripPlaceholder,
            },
        ];
        let mut pinning =
            SectionPinning::mount(&mut self.rt.observer, &self.rt.scene, &sections, gate.clone());

        let mut ctx = self.rt.ctx();
        let cards = refs
            .cards
            .iter()
            .zip(&layout.beauty)
            .map(|(&el, c)| GalleryCard::new(el, c.source.clone(), c.orientation))
            .collect();
        let gallery = CardSequencer::mount(&mut ctx, refs.beauty, cards, writer);
        pinning.set_gate_active(gallery.mode() != Some(GalleryMode::ContinuousScroll));

        let handoff =
            HorizontalHandoff::mount(&mut ctx, refs.strip_wrapper, refs.strip, &[refs.bodypaint, refs.sfx]);
        let background = ScrollParallax::mount(&mut ctx, refs.background, layout.background_speed);

        let mut intro = IntroSequence::mount(
            &mut ctx,
            IntroTargets {
                particles: refs.particles.clone(),
                text: refs.text.clone(),
                images: refs.images.clone(),
                socials: refs.socials.clone(),
            },
        );
        intro.start(&mut ctx);
        let parallax = DepthParallax::mount(
            &mut ctx,
            ParallaxTargets {
                bubble: refs.bubble,
                images: refs.images.clone(),
                particles: refs.particles.clone(),
            },
        );

        let gate_epoch = gate.epoch();
        self.page = Some(Page {
            refs: refs.clone(),
            layout: layout.clone(),
            pinning,
            gallery,
            gate,
            gate_epoch,
            handoff,
            intro,
            parallax,
            background,
            shader_images: Vec::new(),
            sfx: None,
        });
        self.mount_visuals();
        Ok(refs)
    }

    /// Vertical stack: about, beauty (plus its scrub distance in continuous mode), then the
    /// horizontal strip.
    fn layout_page(
        scene: &mut Scene,
        config: &ShowreelConfig,
        vp: Viewport,
        refs: &PageRefs,
        layout: &PageLayout,
        mode: GalleryMode,
    ) {
        let (vw, vh) = (vp.width, vp.height);
        scene.set_layout(refs.about, 0.0, vw, vh);
        scene.set_layout(refs.background, 0.0, vw, vh);
        if let Some(b) = refs.bubble {
            scene.set_layout(b, 0.0, 0.1 * vw, 0.1 * vw);
        }
        for &el in refs.particles.iter().chain(&refs.socials) {
            scene.set_layout(el, 0.0, 0.02 * vw, 0.02 * vw);
        }
        for &el in refs.text.iter().chain(&refs.images) {
            scene.set_layout(el, 0.25 * vh, 0.3 * vw, 0.3 * vh);
        }

        scene.set_layout(refs.beauty, vh, vw, vh);
        for &card in &refs.cards {
            scene.set_layout(card, vh + 0.2 * vh, 0.3 * vw, 0.6 * vh);
        }
        for &img in &refs.shader_images {
            scene.set_layout(img, vh + 0.3 * vh, 0.25 * vw, 0.35 * vh);
        }

        let scrub = match mode {
            GalleryMode::ContinuousScroll => config.gallery.continuous_span * vh,
            _ => 0.0,
        };
        let strip_top = 2.0 * vh + scrub;
        let bodypaint = bodypaint_strip_width(layout.bodypaint_panels, vw);
        scene.set_layout(refs.strip_wrapper, strip_top, vw, vh);
        scene.set_layout(refs.strip, strip_top, bodypaint + vw, vh);
        scene.set_layout(refs.bodypaint, strip_top, bodypaint, vh);
        scene.set_layout(refs.sfx, strip_top, vw, vh);
        scene.set_layout(refs.sfx_image, strip_top + 0.2 * vh, 0.4 * vw, 0.6 * vh);
        scene.set_layout(refs.sfx_light, strip_top + 0.2 * vh, 0.4 * vw, 0.6 * vh);
    }

    /// Shader images and the sfx gallery depend on the viewport class.
    fn mount_visuals(&mut self) {
        let class = self.class();
        let Some(page) = self.page.as_mut() else {
            return;
        };
        let mut ctx = self.rt.ctx();
        let refs = &page.refs;
        match class {
            ViewportClass::Desktop => {
                let magnifier = Effect::Magnifier(MagnifierParams::from(&ctx.config.shader));
                page.shader_images = refs
                    .shader_images
                    .iter()
                    .zip(&page.layout.shader_images)
                    .filter_map(|(&el, src)| {
                        ShaderImage::mount(&mut ctx, el, src, (self.surfaces)(magnifier))
                    })
                    .collect();
                let spotlight = Effect::Spotlight(SpotlightParams::from(&ctx.config.shader));
                page.sfx = ShaderGallery::mount_desktop(
                    &mut ctx,
                    refs.sfx_image,
                    page.layout.sfx.clone(),
                    (self.surfaces)(spotlight),
                );
            }
            ViewportClass::Mobile => {
                page.shader_images.clear();
                page.sfx = ShaderGallery::mount_mobile(
                    &mut ctx,
                    refs.sfx_image,
                    Some(refs.sfx_light),
                    page.layout.sfx.clone(),
                );
            }
        }
    }

    fn unmount_visuals(&mut self) {
        let Some(page) = self.page.as_mut() else {
            return;
        };
        let mut ctx = self.rt.ctx();
        for mut img in page.shader_images.drain(..) {
            img.unmount(&mut ctx);
        }
        if let Some(mut sfx) = page.sfx.take() {
            sfx.unmount(&mut ctx);
        }
    }

    /// Tears every component down, then frees the page's element slots.
    #[tracing::instrument(skip_all)]
    pub fn unmount_page(&mut self) {
        self.unmount_visuals();
        let Some(mut page) = self.page.take() else {
            return;
        };
        let mut ctx = self.rt.ctx();
        page.gallery.unmount(&mut ctx);
        page.handoff.unmount(&mut ctx);
        page.background.unmount(&mut ctx);
        page.parallax.unmount(&mut ctx);
        page.intro.unmount(&mut ctx);
        page.pinning.unmount(ctx.observer);
        for el in page.refs.all() {
            ctx.tweens.kill_target(el);
            ctx.scene.unmount(el);
        }
        self.scroll_y = 0.0;
    }

    fn listens(listeners: &ListenerRegistry, owner: Option<Owner>, kind: ListenerKind) -> bool {
        owner.is_some_and(|o| listeners.has(o, kind))
    }

    /// Routes one input event. Scroll positions forced by controllers are applied afterwards.
    pub fn dispatch(&mut self, event: &InputEvent) -> ShowreelResult<()> {
        let kind = event.kind();
        match *event {
            InputEvent::Scroll { y } => self.scroll_to(y),
            InputEvent::Wheel { delta_y } => {
                self.deliver_gesture(event, kind);
                self.scroll_to(self.scroll_y + delta_y);
            }
            InputEvent::TouchStart { x } | InputEvent::TouchEnd { x } => {
                self.deliver_gesture(event, kind);
                if let Some(page) = self.page.as_mut()
                    && let Some(sfx) = page.sfx.as_mut()
                    && self.rt.listeners.has(sfx.owner(), kind)
                {
                    if kind == ListenerKind::TouchStart {
                        sfx.on_touch_start(x);
                    } else {
                        sfx.on_touch_end(x);
                    }
                }
            }
            InputEvent::Key { .. } => self.deliver_gesture(event, kind),
            InputEvent::PointerMove { x, y, hit } => self.pointer_move(Point::new(x, y), hit),
            InputEvent::PointerEnter { element } | InputEvent::PointerLeave { element } => {
                let Some(page) = self.page.as_mut() else {
                    return Ok(());
                };
                let mut ctx = self.rt.ctx();
                for img in page.shader_images.iter_mut() {
                    if img.element() != element || !ctx.listeners.has(img.owner(), kind) {
                        continue;
                    }
                    if kind == ListenerKind::PointerEnter {
                        img.on_pointer_enter(&mut ctx);
                    } else {
                        img.on_pointer_leave(&mut ctx);
                    }
                }
            }
            InputEvent::Click { element } => {
                if let Some(page) = self.page.as_mut()
                    && let Some(sfx) = page.sfx.as_mut()
                    && element == page.refs.sfx_image
                    && self.rt.listeners.has(sfx.owner(), kind)
                {
                    sfx.on_click();
                }
            }
            InputEvent::Resize { width, height, dpr } => {
                let vp = Viewport::new(width, height)?.with_dpr(dpr);
                self.resize(vp);
            }
        }
        Ok(())
    }

    fn deliver_gesture(&mut self, event: &InputEvent, kind: ListenerKind) {
        let Some(page) = self.page.as_mut() else {
            return;
        };
        if Self::listens(&self.rt.listeners, page.gallery.owner(), kind) {
            page.gallery.handle_input(&mut self.rt.ctx(), event);
        }
    }

    fn pointer_move(&mut self, pointer: Point, hit: Option<PointerHit>) {
        let Some(page) = self.page.as_mut() else {
            return;
        };
        let kind = ListenerKind::PointerMove;
        let mut ctx = self.rt.ctx();
        if ctx.listeners.has(page.parallax.owner(), kind) {
            let running = page.intro.is_running();
            page.parallax.on_pointer_move(&mut ctx, pointer, running);
        }
        let Some(hit) = hit else {
            return;
        };
        for img in page.shader_images.iter_mut() {
            if img.element() == hit.element && ctx.listeners.has(img.owner(), kind) {
                img.on_pointer_move(hit.u, hit.v);
            }
        }
        if let Some(sfx) = page.sfx.as_mut()
            && hit.element == page.refs.sfx_image
            && ctx.listeners.has(sfx.owner(), kind)
        {
            sfx.on_pointer_move(&mut ctx, hit.u, hit.v);
        }
    }

    fn max_scroll(&self) -> f64 {
        let Some(page) = &self.page else {
            return 0.0;
        };
        match page.handoff.handle().and_then(|h| self.rt.observer.span(h)) {
            Some((_, end)) => end,
            None => self
                .rt
                .scene
                .get(page.refs.strip_wrapper)
                .map_or(0.0, |el| el.top),
        }
    }

    fn clamp_scroll(&self, y: f64) -> f64 {
        let mut y = if y.is_finite() { y } else { self.scroll_y };
        if let Some(page) = &self.page {
            let ctx_lock = page
                .handoff
                .handle()
                .filter(|_| page.handoff.is_locked())
                .and_then(|h| self.rt.observer.span(h));
            if let Some((start, end)) = ctx_lock {
                y = y.clamp(start - 1.0, end);
            }
        }
        y.clamp(0.0, self.max_scroll().max(0.0))
    }

    /// Moves the page scroll position (clamped to the page and to the body lock) and routes the
    /// resulting observer events.
    pub fn scroll_to(&mut self, y: f64) {
        let y = self.clamp_scroll(y);
        self.scroll_y = y;
        let events = self.rt.observer.on_scroll(&self.rt.scene, y);
        let commands = self.route_observer(events);
        self.apply_forced(commands);
    }

    /// Applies one forced position: the first one, so the section gate (registered ahead of the
    /// strip) wins. Events it produces are delivered, but commands they return are dropped.
    fn apply_forced(&mut self, commands: Vec<ScrollCommand>) {
        let Some(&ScrollCommand::ScrollTo(target)) = commands.first() else {
            return;
        };
        let y = target.clamp(0.0, self.max_scroll().max(0.0));
        tracing::debug!(from = self.scroll_y, to = y, "forced scroll");
        self.scroll_y = y;
        let events = self.rt.observer.on_scroll(&self.rt.scene, y);
        let dropped = self.route_observer(events);
        if !dropped.is_empty() {
            tracing::trace!(dropped = dropped.len(), "nested scroll commands ignored");
        }
    }

    fn route_observer(&mut self, events: Vec<(ObserverHandle, ObserverEvent)>) -> Vec<ScrollCommand> {
        let Some(page) = self.page.as_mut() else {
            return Vec::new();
        };
        let mut ctx = self.rt.ctx();
        let mut commands = Vec::new();
        for (h, ev) in events {
            commands.extend(page.pinning.on_observer(ctx.observer, h, ev));
            commands.extend(page.gallery.on_observer(&mut ctx, h, ev));
            commands.extend(page.handoff.on_observer(&mut ctx, h, ev));
            page.background.on_observer(&mut ctx, h, ev);
        }
        commands
    }

    /// Re-lays the page out for a new viewport and refreshes every scroll span.
    #[tracing::instrument(skip(self))]
    fn resize(&mut self, vp: Viewport) {
        let old_class = self.class();
        self.rt.viewport = vp;
        let class = self.class();
        let Some(page) = self.page.as_mut() else {
            self.rt.observer.set_viewport(vp);
            return;
        };

        let mode = mode_for(class, &self.rt.config);
        Self::layout_page(&mut self.rt.scene, &self.rt.config, vp, &page.refs, &page.layout, mode);
        let mut ctx = self.rt.ctx();
        // Triggers registered from here on resolve against the new viewport.
        ctx.observer.set_viewport(vp);
        page.gallery.on_resize(&mut ctx, vp);
        page.pinning
            .set_gate_active(page.gallery.mode() != Some(GalleryMode::ContinuousScroll));
        page.handoff.refresh(&mut ctx);

        let refreshed = ctx.observer.refresh(ctx.scene, vp);
        for img in page.shader_images.iter_mut() {
            if ctx.listeners.has(img.owner(), ListenerKind::Resize) {
                img.on_resize(&mut ctx);
            }
        }
        if let Some(sfx) = page.sfx.as_mut() {
            sfx.on_resize(&mut ctx);
        }

        if let Some(y) = refreshed.realign {
            self.scroll_y = y;
        }
        self.scroll_y = self.scroll_y.clamp(0.0, self.max_scroll().max(0.0));
        let commands = self.route_observer(refreshed.events);
        self.apply_forced(commands);
        if class != old_class {
            tracing::debug!(?class, "viewport class changed; remounting image effects");
            self.unmount_visuals();
            self.mount_visuals();
        }
    }

    /// One animation frame: timers, tweens, completion changes, then per-frame subscribers.
    pub fn advance(&mut self, dt_ms: f64) {
        let step = self.rt.step(dt_ms);
        let Some(page) = self.page.as_mut() else {
            return;
        };
        let mut ctx = self.rt.ctx();
        let mut commands = Vec::new();

        for (owner, id) in step.timers {
            if page.gallery.owner() == Some(owner) {
                commands.extend(page.gallery.on_timer(&mut ctx, id));
            } else if page.parallax.owner() == owner {
                page.parallax.on_timer(&mut ctx, id);
            }
        }
        for ev in step.tweens {
            if page.gallery.on_tween_event(ev) || page.intro.on_tween_event(ev) {
                continue;
            }
            for img in page.shader_images.iter_mut() {
                if img.on_tween_event(ev) {
                    break;
                }
            }
        }

        let mut refreshed = Vec::new();
        let epoch = page.gate.epoch();
        if epoch != page.gate_epoch {
            page.gate_epoch = epoch;
            tracing::debug!(complete = page.gate.is_complete(), "gallery completion changed");
            let r = ctx.observer.refresh(ctx.scene, ctx.viewport);
            if let Some(y) = r.realign {
                self.scroll_y = y;
            }
            refreshed = r.events;
        }

        if ctx.listeners.has(page.parallax.owner(), ListenerKind::Frame) {
            page.parallax.on_frame(&mut ctx);
        }
        for img in page.shader_images.iter_mut() {
            if ctx.listeners.has(img.owner(), ListenerKind::Frame) {
                img.on_frame(&mut ctx);
            }
        }
        if let Some(sfx) = page.sfx.as_mut()
            && ctx.listeners.has(sfx.owner(), ListenerKind::Frame)
        {
            sfx.on_frame();
        }
        commands.extend(self.route_observer(refreshed));
        self.apply_forced(commands);
    }

    /// Advances `ms` in whole frames (the last one possibly shorter).
    pub fn run_for(&mut self, ms: f64) {
        let mut left = ms;
        while left > 0.0 {
            let dt = left.min(FRAME_MS);
            self.advance(dt);
            left -= dt;
        }
    }

    pub fn snapshot(&self) -> StageSnapshot {
        let gallery = self.page.as_ref().map(|p| &p.gallery);
        StageSnapshot {
            now_ms: self.rt.now_ms,
            scroll_y: self.scroll_y,
            index: self.current_index(),
            mode: gallery.and_then(CardSequencer::mode),
            animating: gallery.is_some_and(CardSequencer::is_animating),
            complete: self.completion().is_some_and(|c| c.is_complete()),
            locked: self.is_locked(),
            intro_running: self.intro_running(),
            active_tweens: self.active_tweens(),
        }
    }

    pub fn config(&self) -> &ShowreelConfig {
        &self.rt.config
    }

    pub fn viewport(&self) -> Viewport {
        self.rt.viewport
    }

    pub fn now_ms(&self) -> f64 {
        self.rt.now_ms
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    pub fn scene(&self) -> &Scene {
        &self.rt.scene
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.rt.listeners
    }

    pub fn timers(&self) -> &Timers {
        &self.rt.timers
    }

    pub fn observer(&self) -> &ScrollObserver {
        &self.rt.observer
    }

    pub fn active_tweens(&self) -> usize {
        use crate::anim::TweenEngine;
        self.rt.tweens.active_count()
    }

    pub fn refs(&self) -> Option<&PageRefs> {
        self.page.as_ref().map(|p| &p.refs)
    }

    pub fn gallery(&self) -> Option<&CardSequencer> {
        self.page.as_ref().map(|p| &p.gallery)
    }

    pub fn current_index(&self) -> usize {
        self.gallery().map_or(0, CardSequencer::current_index)
    }

    pub fn completion(&self) -> Option<CompletionReader> {
        self.page.as_ref().map(|p| p.gate.clone())
    }

    pub fn is_locked(&self) -> bool {
        self.page.as_ref().is_some_and(|p| p.handoff.is_locked())
    }

    pub fn handoff(&self) -> Option<&HorizontalHandoff> {
        self.page.as_ref().map(|p| &p.handoff)
    }

    pub fn intro_running(&self) -> bool {
        self.page.as_ref().is_some_and(|p| p.intro.is_running())
    }

    pub fn parallax(&self) -> Option<&DepthParallax> {
        self.page.as_ref().map(|p| &p.parallax)
    }

    pub fn shader_images(&self) -> &[ShaderImage] {
        self.page
            .as_ref()
            .map(|p| p.shader_images.as_slice())
            .unwrap_or_default()
    }

    pub fn sfx(&self) -> Option<&ShaderGallery> {
        self.page.as_ref().and_then(|p| p.sfx.as_ref())
    }
}

/// One scripted step: an optional event, then a wait.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScriptStep {
    #[serde(default)]
    pub event: Option<InputEvent>,
    #[serde(default)]
    pub wait_ms: f64,
}

/// A replayable input session.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Script {
    pub viewport: ScriptViewport,
    #[serde(default)]
    pub page: PageLayout,
    pub steps: Vec<ScriptStep>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScriptViewport {
    pub width: f64,
    pub height: f64,
    #[serde(default = "one")]
    pub dpr: f64,
}

impl Script {
    pub fn from_json_str(s: &str) -> ShowreelResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Mounts the page on a fresh stage and records a snapshot after every step.
    #[tracing::instrument(skip_all, fields(steps = self.steps.len()))]
    pub fn run(&self, config: ShowreelConfig) -> ShowreelResult<Vec<StageSnapshot>> {
        let vp = Viewport::new(self.viewport.width, self.viewport.height)?.with_dpr(self.viewport.dpr);
        let mut stage = Stage::new(config, vp)?;
        stage.mount_page(&self.page)?;
        let mut trace = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            if let Some(ev) = &step.event {
                stage.dispatch(ev)?;
            }
            stage.run_for(step.wait_ms.max(0.0));
            trace.push(stage.snapshot());
        }
        stage.unmount_page();
        Ok(trace)
    }
}
