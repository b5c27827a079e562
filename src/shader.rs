//! Pointer-reactive image effects.
//!
//! The fragment functions are the per-pixel programs ([`magnify_fragment`] for the beauty images,
//! [`spotlight_fragment`] for the sfx gallery). A [`RenderSurface`] runs them over a textured
//! quad; [`CpuSurface`] does so into an RGBA8 buffer. [`ShaderImage`] and [`ShaderGallery`] are the
//! page components that feed pointer and hover state into a surface once per frame.
//!
//! Texture coordinates follow the GL convention: `v` grows upwards.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::{
    anim::{TweenEvent, TweenId, TweenOpts},
    anim_ease::Ease,
    config::ShaderConfig,
    core::{Direction, Point, Rgba8, Vec2},
    error::{ShowreelError, ShowreelResult},
    gesture::SwipeDetector,
    listeners::{ListenerKind, Owner},
    parallax::PointerCell,
    runtime::Ctx,
    scene::{ElementId, Props},
};

/// Straight-alpha color with channels in `[0, 1]`.
pub type Color = [f64; 4];

const WHITE: Color = [1.0, 1.0, 1.0, 1.0];

pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn mix(a: Color, b: Color, t: f64) -> Color {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MagnifierParams {
    pub radius: f64,
    pub zoom_strength: f64,
    pub border_width: f64,
}

impl Default for MagnifierParams {
    fn default() -> Self {
        Self::from(&ShaderConfig::default())
    }
}

impl From<&ShaderConfig> for MagnifierParams {
    fn from(cfg: &ShaderConfig) -> Self {
        Self {
            radius: cfg.radius,
            zoom_strength: cfg.zoom_strength,
            border_width: cfg.border_width,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MagnifierUniforms {
    /// Pointer in texture coordinates.
    pub pointer: Point,
    /// Hover zoom in `[0, 1]`.
    pub zoom: f64,
    pub hovering: bool,
    /// Output size in device pixels.
    pub resolution: Vec2,
}

/// Magnifying lens around the pointer.
///
/// Inside `radius` the texture is sampled at `pointer + (uv - pointer) / zoom_factor`, blended
/// into the plain sample by a smooth falloff over the outer fifth of the radius. A soft white
/// ring, peaking at half strength on the radius, marks the lens edge. Distances are aspect-corrected so the lens stays circular.
pub fn magnify_fragment(
    uv: Point,
    u: &MagnifierUniforms,
    p: &MagnifierParams,
    sample: impl Fn(Point) -> Color,
) -> Color {
    let base = sample(uv);
    if !u.hovering {
        return base;
    }
    let aspect = if u.resolution.y > 0.0 {
        u.resolution.x / u.resolution.y
    } else {
        1.0
    };
    let offset = uv - u.pointer;
    let d = Vec2::new(offset.x * aspect, offset.y).hypot();

    let zoom_factor = 1.0 + (p.zoom_strength - 1.0) * u.zoom.clamp(0.0, 1.0);
    let zoomed = sample(u.pointer + offset / zoom_factor);
    let mask = 1.0 - smoothstep(0.8 * p.radius, p.radius, d);
    let color = mix(base, zoomed, mask);

    let (r, bw) = (p.radius, p.border_width);
    let ring = smoothstep(r - bw, r, d) * (1.0 - smoothstep(r, r + bw, d));
    let mut out = mix(color, WHITE, ring * 0.5);
    out[3] = color[3];
    out
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpotlightParams {
    pub radius_px: f64,
    pub softness_px: f64,
    pub ambient: f64,
}

impl Default for SpotlightParams {
    fn default() -> Self {
        Self::from(&ShaderConfig::default())
    }
}

impl From<&ShaderConfig> for SpotlightParams {
    fn from(cfg: &ShaderConfig) -> Self {
        Self {
            radius_px: cfg.spotlight_radius_px,
            softness_px: cfg.spotlight_softness_px,
            ambient: cfg.ambient,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotlightUniforms {
    /// Pointer in CSS pixels, GL orientation.
    pub pointer_px: Point,
    /// Container size in CSS pixels.
    pub resolution: Vec2,
}

/// Flashlight: full color near the pointer, falling off to an ambient level.
pub fn spotlight_fragment(
    uv: Point,
    u: &SpotlightUniforms,
    p: &SpotlightParams,
    sample: impl Fn(Point) -> Color,
) -> Color {
    let px = Point::new(uv.x * u.resolution.x, uv.y * u.resolution.y);
    let d = px.distance(u.pointer_px);
    let falloff = 1.0 - smoothstep(p.radius_px - p.softness_px, p.radius_px + p.softness_px, d);
    let brightness = falloff.powf(1.5);
    let light = p.ambient + (1.0 - p.ambient) * brightness;
    let c = sample(uv);
    [c[0] * light, c[1] * light, c[2] * light, 1.0]
}

/// Quad scale that keeps the image aspect inside a container: the shorter axis shrinks.
pub fn fit_quad_scale(image_aspect: f64, container_aspect: f64) -> Vec2 {
    if !(image_aspect > 0.0 && container_aspect > 0.0) {
        return Vec2::new(1.0, 1.0);
    }
    if image_aspect > container_aspect {
        Vec2::new(1.0, container_aspect / image_aspect)
    } else {
        Vec2::new(image_aspect / container_aspect, 1.0)
    }
}

/// Decoded RGBA8 image.
#[derive(Clone, Debug)]
pub struct Texture {
    image: image::RgbaImage,
}

impl Texture {
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> ShowreelResult<Self> {
        let path = path.as_ref();
        let img = image::open(path).with_context(|| format!("open texture '{}'", path.display()))?;
        Self::from_image(img.to_rgba8())
    }

    pub fn from_rgba8(width: u32, height: u32, rgba: Vec<u8>) -> ShowreelResult<Self> {
        let img = image::RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
            ShowreelError::asset(format!("rgba buffer does not match {width}x{height}"))
        })?;
        Self::from_image(img)
    }

    pub fn solid(width: u32, height: u32, color: Rgba8) -> ShowreelResult<Self> {
        Self::from_image(image::RgbaImage::from_pixel(
            width,
            height,
            image::Rgba(color.to_array()),
        ))
    }

    fn from_image(image: image::RgbaImage) -> ShowreelResult<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ShowreelError::asset("texture has zero size"));
        }
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn aspect(&self) -> f64 {
        self.width() as f64 / self.height() as f64
    }

    fn texel(&self, x: i64, y: i64) -> Color {
        let x = x.clamp(0, self.width() as i64 - 1) as u32;
        let y = y.clamp(0, self.height() as i64 - 1) as u32;
        let px = self.image.get_pixel(x, y).0;
        std::array::from_fn(|i| px[i] as f64 / 255.0)
    }

    /// Bilinear sample with clamp-to-edge addressing.
    pub fn sample(&self, uv: Point) -> Color {
        let fx = uv.x * self.width() as f64 - 0.5;
        let fy = (1.0 - uv.y) * self.height() as f64 - 0.5;
        let (x0, y0) = (fx.floor(), fy.floor());
        let (tx, ty) = (fx - x0, fy - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);
        let top = mix(self.texel(x0, y0), self.texel(x0 + 1, y0), tx);
        let bottom = mix(self.texel(x0, y0 + 1), self.texel(x0 + 1, y0 + 1), tx);
        mix(top, bottom, ty)
    }
}

/// Where a component's image comes from.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextureSource {
    Path { path: PathBuf },
    Solid { width: u32, height: u32, color: [u8; 4] },
}

impl TextureSource {
    pub fn load(&self) -> ShowreelResult<Texture> {
        match self {
            Self::Path { path } => Texture::load(path),
            Self::Solid {
                width,
                height,
                color,
            } => Texture::solid(
                *width,
                *height,
                Rgba8::new(color[0], color[1], color[2], color[3]),
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect {
    Magnifier(MagnifierParams),
    Spotlight(SpotlightParams),
}

/// Per-frame input shared by both effects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInput {
    /// Pointer in texture coordinates.
    pub pointer: Point,
    pub zoom: f64,
    pub hovering: bool,
}

impl Default for FrameInput {
    fn default() -> Self {
        Self {
            pointer: Point::new(0.5, 0.5),
            zoom: 0.0,
            hovering: false,
        }
    }
}

/// A drawable target for one image effect.
pub trait RenderSurface {
    /// Attaches the surface with its first texture.
    fn mount(&mut self, texture: Texture);

    /// Swaps the displayed texture.
    fn set_texture(&mut self, texture: Texture);

    /// `width`/`height` in CSS pixels.
    fn resize(&mut self, width: f64, height: f64, device_pixel_ratio: f64);

    fn render(&mut self, frame: &FrameInput) -> ShowreelResult<()>;

    /// Releases every resource. Calling it again does nothing.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

/// Builds the surface for a newly mounted component.
pub type SurfaceFactory = Box<dyn FnMut(Effect) -> Box<dyn RenderSurface>>;

/// Software [`RenderSurface`]: rasterizes the fragment into an RGBA8 buffer.
#[derive(Debug)]
pub struct CpuSurface {
    effect: Effect,
    max_pixel_ratio: f64,
    texture: Option<Texture>,
    css_size: Vec2,
    pixel_ratio: f64,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    frames: u64,
    disposed: bool,
}

impl CpuSurface {
    pub fn new(effect: Effect, max_pixel_ratio: f64) -> Self {
        Self {
            effect,
            max_pixel_ratio: max_pixel_ratio.max(1.0),
            texture: None,
            css_size: Vec2::ZERO,
            pixel_ratio: 1.0,
            width: 0,
            height: 0,
            pixels: Vec::new(),
            frames: 0,
            disposed: false,
        }
    }

    pub fn factory(config: &ShaderConfig) -> SurfaceFactory {
        let max = config.max_pixel_ratio;
        Box::new(move |effect| Box::new(CpuSurface::new(effect, max)) as Box<dyn RenderSurface>)
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// Output size in device pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    pub fn to_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

impl RenderSurface for CpuSurface {
    fn mount(&mut self, texture: Texture) {
        self.texture = Some(texture);
    }

    fn set_texture(&mut self, texture: Texture) {
        if !self.disposed {
            self.texture = Some(texture);
        }
    }

    fn resize(&mut self, width: f64, height: f64, device_pixel_ratio: f64) {
        let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio.min(self.max_pixel_ratio)
        } else {
            1.0
        };
        self.css_size = Vec2::new(width.max(0.0), height.max(0.0));
        self.pixel_ratio = dpr;
        self.width = (self.css_size.x * dpr).round() as u32;
        self.height = (self.css_size.y * dpr).round() as u32;
        self.pixels = vec![0; self.width as usize * self.height as usize * 4];
    }

    fn render(&mut self, frame: &FrameInput) -> ShowreelResult<()> {
        if self.disposed {
            return Err(ShowreelError::render("render on a disposed surface"));
        }
        let Some(texture) = &self.texture else {
            return Ok(());
        };
        let (w, h) = (self.width, self.height);
        if w == 0 || h == 0 {
            return Ok(());
        }

        let scale = fit_quad_scale(texture.aspect(), w as f64 / h as f64);
        let resolution = Vec2::new(w as f64, h as f64);
        let sample = |uv: Point| texture.sample(uv);

        for j in 0..h {
            for i in 0..w {
                let screen = Point::new(
                    (i as f64 + 0.5) / w as f64,
                    1.0 - (j as f64 + 0.5) / h as f64,
                );
                let uv = Point::new(
                    (screen.x - 0.5) / scale.x + 0.5,
                    (screen.y - 0.5) / scale.y + 0.5,
                );
                let color = if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
                    [0.0; 4]
                } else {
                    match &self.effect {
                        Effect::Magnifier(params) => {
                            let u = MagnifierUniforms {
                                pointer: frame.pointer,
                                zoom: frame.zoom,
                                hovering: frame.hovering,
                                resolution,
                            };
                            magnify_fragment(uv, &u, params, sample)
                        }
                        Effect::Spotlight(params) => {
                            let u = SpotlightUniforms {
                                pointer_px: Point::new(
                                    frame.pointer.x * self.css_size.x,
                                    frame.pointer.y * self.css_size.y,
                                ),
                                resolution: self.css_size,
                            };
                            spotlight_fragment(uv, &u, params, sample)
                        }
                    }
                };
                let idx = (j as usize * w as usize + i as usize) * 4;
                for (c, v) in color.iter().enumerate() {
                    self.pixels[idx + c] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
        }
        self.frames += 1;
        Ok(())
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        tracing::debug!(frames = self.frames, "disposing cpu surface");
        self.texture = None;
        self.pixels = Vec::new();
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

pub const IMAGE_LISTENS: [ListenerKind; 5] = [
    ListenerKind::PointerMove,
    ListenerKind::PointerEnter,
    ListenerKind::PointerLeave,
    ListenerKind::Resize,
    ListenerKind::Frame,
];

/// A magnifier-enabled image.
///
/// The zoom uniform lives in the element's `value` style slot so the tween engine can animate it
/// like any other property.
pub struct ShaderImage {
    owner: Owner,
    element: ElementId,
    surface: Option<Box<dyn RenderSurface>>,
    pointer: PointerCell<Point>,
    frame: FrameInput,
    rendered: Option<FrameInput>,
    leave_tween: Option<TweenId>,
}

impl std::fmt::Debug for ShaderImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderImage")
            .field("owner", &self.owner)
            .field("element", &self.element)
            .field("mounted", &self.surface.is_some())
            .field("frame", &self.frame)
            .finish()
    }
}

impl ShaderImage {
    /// Returns `None` (after logging) when the element is missing or its texture fails to load.
    #[tracing::instrument(skip(ctx, source, surface))]
    pub fn mount(
        ctx: &mut Ctx<'_>,
        element: ElementId,
        source: &TextureSource,
        mut surface: Box<dyn RenderSurface>,
    ) -> Option<Self> {
        let Some(el) = ctx.scene.get(element) else {
            tracing::warn!("shader image element not mounted; skipped");
            return None;
        };
        let (w, h) = (el.width, el.height);
        let texture = match source.load() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "shader image texture failed to load");
                surface.dispose();
                return None;
            }
        };
        surface.mount(texture);
        surface.resize(w, h, ctx.viewport.device_pixel_ratio);
        ctx.tweens
            .set_immediate(ctx.scene, element, &Props::new().value(0.0));

        let owner = ctx.listeners.allocate_owner();
        ctx.listeners.add_all(owner, &IMAGE_LISTENS);
        Some(Self {
            owner,
            element,
            surface: Some(surface),
            pointer: PointerCell::new(),
            frame: FrameInput::default(),
            rendered: None,
            leave_tween: None,
        })
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn frame(&self) -> FrameInput {
        self.frame
    }

    /// `u`/`v` are element-local fractions with `v` measured from the top.
    pub fn on_pointer_move(&mut self, u: f64, v: f64) {
        self.pointer.write(Point::new(u, 1.0 - v));
    }

    pub fn on_pointer_enter(&mut self, ctx: &mut Ctx<'_>) {
        self.frame.hovering = true;
        self.leave_tween = None;
        self.animate_zoom(ctx, 1.0);
    }

    pub fn on_pointer_leave(&mut self, ctx: &mut Ctx<'_>) {
        self.leave_tween = Some(self.animate_zoom(ctx, 0.0));
    }

    fn animate_zoom(&self, ctx: &mut Ctx<'_>, to: f64) -> TweenId {
        ctx.tweens.animate(
            ctx.scene,
            self.element,
            Props::new().value(to),
            TweenOpts::new(ctx.config.shader.hover_zoom_ms, Ease::OutCubic).overwrite(),
        )
    }

    /// The lens switches off once the zoom-out has finished.
    pub fn on_tween_event(&mut self, event: TweenEvent) -> bool {
        if self.leave_tween != Some(event.id()) {
            return false;
        }
        self.leave_tween = None;
        self.frame.hovering = false;
        true
    }

    pub fn on_resize(&mut self, ctx: &mut Ctx<'_>) {
        let Some(el) = ctx.scene.get(self.element) else {
            return;
        };
        let (w, h) = (el.width, el.height);
        if let Some(s) = self.surface.as_mut() {
            s.resize(w, h, ctx.viewport.device_pixel_ratio);
        }
        self.rendered = None;
    }

    /// Consumes the latest pointer sample and renders if anything changed since the last frame.
    pub fn on_frame(&mut self, ctx: &mut Ctx<'_>) {
        if let Some(p) = self.pointer.take() {
            self.frame.pointer = p;
        }
        if let Some(style) = ctx.scene.style(self.element) {
            self.frame.zoom = style.value;
        }
        if self.rendered == Some(self.frame) {
            return;
        }
        let Some(s) = self.surface.as_mut() else {
            return;
        };
        match s.render(&self.frame) {
            Ok(()) => self.rendered = Some(self.frame),
            Err(e) => tracing::warn!(error = %e, "shader image render failed"),
        }
    }

    #[tracing::instrument(skip_all, fields(owner = self.owner.0))]
    pub fn unmount(&mut self, ctx: &mut Ctx<'_>) {
        ctx.listeners.remove_all(self.owner);
        ctx.tweens.kill_target(self.element);
        if let Some(mut s) = self.surface.take() {
            s.dispose();
        }
    }
}

pub const GALLERY_DESKTOP_LISTENS: [ListenerKind; 4] = [
    ListenerKind::Click,
    ListenerKind::PointerMove,
    ListenerKind::Resize,
    ListenerKind::Frame,
];

pub const GALLERY_MOBILE_LISTENS: [ListenerKind; 3] = [
    ListenerKind::TouchStart,
    ListenerKind::TouchEnd,
    ListenerKind::PointerMove,
];

/// Click-to-cycle spotlight gallery; swipeable images with a cursor light on mobile.
pub struct ShaderGallery {
    owner: Owner,
    element: ElementId,
    light: Option<ElementId>,
    sources: Vec<TextureSource>,
    index: usize,
    transitioning: bool,
    pending_load: Option<usize>,
    surface: Option<Box<dyn RenderSurface>>,
    swipe: Option<SwipeDetector>,
    pointer: PointerCell<Point>,
    frame: FrameInput,
    dirty: bool,
}

impl std::fmt::Debug for ShaderGallery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderGallery")
            .field("element", &self.element)
            .field("index", &self.index)
            .field("len", &self.sources.len())
            .field("transitioning", &self.transitioning)
            .field("mobile", &self.swipe.is_some())
            .finish()
    }
}

impl ShaderGallery {
    /// Desktop variant. The first texture is loaded on the first frame.
    #[tracing::instrument(skip(ctx, sources, surface), fields(images = sources.len()))]
    pub fn mount_desktop(
        ctx: &mut Ctx<'_>,
        element: ElementId,
        sources: Vec<TextureSource>,
        mut surface: Box<dyn RenderSurface>,
    ) -> Option<Self> {
        let size = match ctx.scene.get(element) {
            Some(el) if !sources.is_empty() => (el.width, el.height),
            _ => {
                tracing::warn!("sfx gallery element or images missing; skipped");
                surface.dispose();
                return None;
            }
        };
        surface.resize(size.0, size.1, ctx.viewport.device_pixel_ratio);
        let owner = ctx.listeners.allocate_owner();
        ctx.listeners.add_all(owner, &GALLERY_DESKTOP_LISTENS);
        Some(Self {
            owner,
            element,
            light: None,
            sources,
            index: 0,
            transitioning: true,
            pending_load: Some(0),
            surface: Some(surface),
            swipe: None,
            pointer: PointerCell::new(),
            frame: FrameInput {
                hovering: true,
                ..FrameInput::default()
            },
            dirty: true,
        })
    }

    /// Mobile variant: no surface, swipe navigation and a mask light following the pointer.
    #[tracing::instrument(skip(ctx, sources), fields(images = sources.len()))]
    pub fn mount_mobile(
        ctx: &mut Ctx<'_>,
        element: ElementId,
        light: Option<ElementId>,
        sources: Vec<TextureSource>,
    ) -> Option<Self> {
        if !ctx.scene.is_mounted(element) || sources.is_empty() {
            tracing::warn!("sfx gallery element or images missing; skipped");
            return None;
        }
        let light = light.filter(|l| ctx.scene.is_mounted(*l));
        let owner = ctx.listeners.allocate_owner();
        ctx.listeners.add_all(owner, &GALLERY_MOBILE_LISTENS);
        Some(Self {
            owner,
            element,
            light,
            sources,
            index: 0,
            transitioning: false,
            pending_load: None,
            surface: None,
            swipe: Some(SwipeDetector::new(ctx.config.gesture.swipe_min_px)),
            pointer: PointerCell::new(),
            frame: FrameInput::default(),
            dirty: false,
        })
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    pub fn is_mobile(&self) -> bool {
        self.swipe.is_some()
    }

    pub fn on_click(&mut self) {
        if self.is_mobile() {
            return;
        }
        if self.transitioning {
            tracing::trace!("click ignored; texture still loading");
            return;
        }
        self.index = (self.index + 1) % self.sources.len();
        self.transitioning = true;
        self.pending_load = Some(self.index);
    }

    pub fn on_touch_start(&mut self, x: f64) {
        if let Some(s) = self.swipe.as_mut() {
            s.start(x);
        }
    }

    /// Swipes step by one image and stop at both ends.
    pub fn on_touch_end(&mut self, x: f64) {
        let Some(dir) = self.swipe.as_mut().and_then(|s| s.end(x)) else {
            return;
        };
        self.index = match dir {
            Direction::Forward => (self.index + 1).min(self.sources.len() - 1),
            Direction::Backward => self.index.saturating_sub(1),
        };
    }

    /// `u`/`v` are element-local fractions with `v` measured from the top.
    pub fn on_pointer_move(&mut self, ctx: &mut Ctx<'_>, u: f64, v: f64) {
        match self.light {
            Some(light) => {
                let Some(el) = ctx.scene.get(self.element) else {
                    return;
                };
                let props = Props::new().x(u * el.width).y(v * el.height);
                ctx.tweens.set_immediate(ctx.scene, light, &props);
            }
            None => self.pointer.write(Point::new(u, 1.0 - v)),
        }
    }

    pub fn on_resize(&mut self, ctx: &mut Ctx<'_>) {
        let Some(el) = ctx.scene.get(self.element) else {
            return;
        };
        let (w, h) = (el.width, el.height);
        if let Some(s) = self.surface.as_mut() {
            s.resize(w, h, ctx.viewport.device_pixel_ratio);
            self.dirty = true;
        }
    }

    /// Finishes a pending texture load, then renders.
    ///
    /// A failed load keeps the previous texture on screen; either way the click guard is
    /// released.
    pub fn on_frame(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if let Some(i) = self.pending_load.take() {
            match self.sources[i].load() {
                Ok(tex) => surface.set_texture(tex),
                Err(e) => tracing::warn!(index = i, error = %e, "sfx texture failed to load"),
            }
            self.transitioning = false;
            self.dirty = true;
        }
        if let Some(p) = self.pointer.take() {
            self.dirty |= p != self.frame.pointer;
            self.frame.pointer = p;
        }
        if !self.dirty {
            return;
        }
        match surface.render(&self.frame) {
            Ok(()) => self.dirty = false,
            Err(e) => tracing::warn!(error = %e, "sfx gallery render failed"),
        }
    }

    #[tracing::instrument(skip_all, fields(owner = self.owner.0))]
    pub fn unmount(&mut self, ctx: &mut Ctx<'_>) {
        ctx.listeners.remove_all(self.owner);
        if let Some(mut s) = self.surface.take() {
            s.dispose();
        }
        self.pending_load = None;
        self.transitioning = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ShowreelConfig, core::Viewport, runtime::Runtime};

    fn checker(uv: Point) -> Color {
        let on = ((uv.x * 10.0).floor() as i64 + (uv.y * 10.0).floor() as i64) % 2 == 0;
        if on { [1.0, 0.0, 0.0, 1.0] } else { [0.0, 0.0, 1.0, 1.0] }
    }

    fn uniforms(hovering: bool, zoom: f64) -> MagnifierUniforms {
        MagnifierUniforms {
            pointer: Point::new(0.5, 0.5),
            zoom,
            hovering,
            resolution: Vec2::new(100.0, 100.0),
        }
    }

    #[test]
    fn smoothstep_edges() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
    }

    #[test]
    fn magnifier_is_identity_without_hover() {
        let p = MagnifierParams::default();
        let uv = Point::new(0.52, 0.51);
        assert_eq!(magnify_fragment(uv, &uniforms(false, 1.0), &p, checker), checker(uv));
    }

    #[test]
    fn magnifier_zooms_inside_and_passes_through_outside() {
        let p = MagnifierParams::default();
        let u = uniforms(true, 1.0);
        let inside = Point::new(0.54, 0.5);
        // zoom_strength 2 halves the offset from the pointer
        assert_eq!(magnify_fragment(inside, &u, &p, checker), checker(Point::new(0.52, 0.5)));
        let outside = Point::new(0.9, 0.9);
        assert_eq!(magnify_fragment(outside, &u, &p, checker), checker(outside));
    }

    #[test]
    fn magnifier_draws_border_ring() {
        let p = MagnifierParams::default();
        let u = uniforms(true, 0.0);
        let flat = |_: Point| [0.0, 0.0, 0.0, 1.0];
        let gray = |x: f64| magnify_fragment(Point::new(x, 0.5), &u, &p, flat)[0];

        assert!((gray(0.5 + p.radius) - 0.5).abs() < 1e-6);
        // half a border width inside the edge the band is half way up
        assert!((gray(0.5 + p.radius - p.border_width / 2.0) - 0.25).abs() < 1e-6);
        assert_eq!(gray(0.5 + p.radius + 2.0 * p.border_width), 0.0);
        assert_eq!(gray(0.5 + p.radius - 2.0 * p.border_width), 0.0);
        assert_eq!(magnify_fragment(Point::new(0.6, 0.5), &u, &p, flat)[3], 1.0);
    }

    #[test]
    fn spotlight_falls_off_to_ambient() {
        let p = SpotlightParams::default();
        let u = SpotlightUniforms {
            pointer_px: Point::new(0.0, 0.0),
            resolution: Vec2::new(1000.0, 1000.0),
        };
        let white = |_: Point| [1.0, 1.0, 1.0, 0.5];
        assert_eq!(spotlight_fragment(Point::new(0.0, 0.0), &u, &p, white), [1.0, 1.0, 1.0, 1.0]);
        let far = spotlight_fragment(Point::new(1.0, 1.0), &u, &p, white);
        assert!((far[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn quad_scale_shrinks_shorter_axis() {
        assert_eq!(fit_quad_scale(2.0, 1.0), Vec2::new(1.0, 0.5));
        assert_eq!(fit_quad_scale(0.5, 1.0), Vec2::new(0.5, 1.0));
        assert_eq!(fit_quad_scale(1.0, 1.0), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn texture_rejects_bad_buffers() {
        assert!(Texture::from_rgba8(2, 2, vec![0; 3]).is_err());
        assert!(Texture::solid(0, 4, Rgba8::WHITE).is_err());
        let t = Texture::solid(4, 2, Rgba8::WHITE).unwrap();
        assert_eq!(t.aspect(), 2.0);
        assert_eq!(t.sample(Point::new(0.3, 0.7)), [1.0; 4]);
    }

    #[test]
    fn cpu_surface_caps_dpr_and_letterboxes() {
        let effect = Effect::Magnifier(MagnifierParams::default());
        let mut s = CpuSurface::new(effect, 2.0);
        s.mount(Texture::solid(4, 2, Rgba8::WHITE).unwrap());
        s.resize(10.0, 10.0, 3.0);
        assert_eq!(s.size(), (20, 20));
        s.render(&FrameInput::default()).unwrap();
        let img = s.to_image().unwrap();
        // 2:1 image in a square: top and bottom quarters stay empty
        assert_eq!(img.get_pixel(10, 1).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(10, 10).0, [255, 255, 255, 255]);

        s.dispose();
        s.dispose();
        assert!(s.is_disposed());
        assert!(s.render(&FrameInput::default()).is_err());
    }

    fn runtime() -> Runtime {
        Runtime::new(
            ShowreelConfig::default(),
            Viewport::new(1280.0, 800.0).unwrap(),
        )
    }

    fn solid() -> TextureSource {
        TextureSource::Solid {
            width: 8,
            height: 8,
            color: [200, 100, 50, 255],
        }
    }

    fn cpu(effect: Effect) -> Box<dyn RenderSurface> {
        Box::new(CpuSurface::new(effect, 2.0))
    }

    #[test]
    fn shader_image_hover_zoom_and_teardown() {
        let mut rt = runtime();
        let el = rt.scene.mount("beauty-1");
        rt.scene.set_layout(el, 0.0, 40.0, 40.0);
        let effect = Effect::Magnifier(MagnifierParams::default());
        let mut img = ShaderImage::mount(&mut rt.ctx(), el, &solid(), cpu(effect)).unwrap();
        assert_eq!(rt.listeners.count_for(img.owner()), IMAGE_LISTENS.len());

        img.on_pointer_move(0.25, 0.25);
        img.on_pointer_enter(&mut rt.ctx());
        for _ in 0..30 {
            rt.step(16.0);
        }
        img.on_frame(&mut rt.ctx());
        assert_eq!(img.frame().pointer, Point::new(0.25, 0.75));
        assert_eq!(img.frame().zoom, 1.0);
        assert!(img.frame().hovering);

        img.on_pointer_leave(&mut rt.ctx());
        for _ in 0..30 {
            for ev in rt.step(16.0).tweens {
                img.on_tween_event(ev);
            }
        }
        assert!(!img.frame().hovering);

        img.unmount(&mut rt.ctx());
        assert_eq!(rt.listeners.total(), 0);
    }

    #[test]
    fn missing_texture_skips_mount() {
        let mut rt = runtime();
        let el = rt.scene.mount("beauty-1");
        let src = TextureSource::Path {
            path: PathBuf::from("target/does-not-exist.png"),
        };
        let effect = Effect::Magnifier(MagnifierParams::default());
        assert!(ShaderImage::mount(&mut rt.ctx(), el, &src, cpu(effect)).is_none());
        assert_eq!(rt.listeners.total(), 0);
    }

    #[test]
    fn gallery_click_cycles_under_guard() {
        let mut rt = runtime();
        let el = rt.scene.mount("sfx");
        rt.scene.set_layout(el, 0.0, 16.0, 16.0);
        let effect = Effect::Spotlight(SpotlightParams::default());
        let sources = vec![solid(), solid(), solid()];
        let mut g = ShaderGallery::mount_desktop(&mut rt.ctx(), el, sources, cpu(effect)).unwrap();
        assert!(g.is_transitioning());
        g.on_click();
        assert_eq!(g.index(), 0);
        g.on_frame();
        assert!(!g.is_transitioning());

        g.on_click();
        g.on_click();
        assert_eq!(g.index(), 1);
        g.on_frame();
        g.on_click();
        g.on_frame();
        g.on_click();
        assert_eq!(g.index(), 0);
    }

    #[test]
    fn failed_load_releases_guard() {
        let mut rt = runtime();
        let el = rt.scene.mount("sfx");
        rt.scene.set_layout(el, 0.0, 16.0, 16.0);
        let effect = Effect::Spotlight(SpotlightParams::default());
        let sources = vec![
            solid(),
            TextureSource::Path {
                path: PathBuf::from("target/missing-sfx.png"),
            },
        ];
        let mut g = ShaderGallery::mount_desktop(&mut rt.ctx(), el, sources, cpu(effect)).unwrap();
        g.on_frame();
        g.on_click();
        g.on_frame();
        assert_eq!(g.index(), 1);
        assert!(!g.is_transitioning());
    }

    #[test]
    fn mobile_swipe_clamps_and_light_follows_pointer() {
        let mut rt = runtime();
        let el = rt.scene.mount("sfx");
        rt.scene.set_layout(el, 0.0, 400.0, 600.0);
        let light = rt.scene.mount("sfx-light");
        let mut g =
            ShaderGallery::mount_mobile(&mut rt.ctx(), el, Some(light), vec![solid(), solid()])
                .unwrap();
        for _ in 0..3 {
            g.on_touch_start(300.0);
            g.on_touch_end(100.0);
        }
        assert_eq!(g.index(), 1);
        g.on_touch_start(100.0);
        g.on_touch_end(300.0);
        g.on_touch_start(100.0);
        g.on_touch_end(300.0);
        assert_eq!(g.index(), 0);

        g.on_pointer_move(&mut rt.ctx(), 0.5, 0.25);
        let s = rt.scene.style(light).unwrap();
        assert_eq!((s.x, s.y), (200.0, 150.0));
    }
}
