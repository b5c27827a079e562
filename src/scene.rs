//! Element arena.
//!
//! Every animated thing on the page (cards, images, particles, the strip container, shader
//! uniforms) owns one slot in a [`Scene`]. Slots are allocated up front and addressed by a stable
//! [`ElementId`], so sequencing logic indexes directly instead of depending on mount order.

use crate::{
    anim::Lerp,
    core::{Affine, Vec2},
    error::{ShowreelError, ShowreelResult},
};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ElementId(pub u32);

impl ElementId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Animatable properties of one element.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Style {
    pub x: f64,
    pub y: f64,
    pub rotation: f64, // degrees
    pub rotation_x: f64,
    pub rotation_y: f64,
    pub scale: f64,
    pub opacity: f64,
    pub brightness: f64,
    pub z_index: f64,
    pub value: f64, // free scalar, used for shader uniforms
}

impl Default for Style {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            rotation_x: 0.0,
            rotation_y: 0.0,
            scale: 1.0,
            opacity: 1.0,
            brightness: 1.0,
            z_index: 0.0,
            value: 0.0,
        }
    }
}

impl Style {
    pub fn get(&self, prop: Prop) -> f64 {
        match prop {
            Prop::X => self.x,
            Prop::Y => self.y,
            Prop::Rotation => self.rotation,
            Prop::RotationX => self.rotation_x,
            Prop::RotationY => self.rotation_y,
            Prop::Scale => self.scale,
            Prop::Opacity => self.opacity,
            Prop::Brightness => self.brightness,
            Prop::ZIndex => self.z_index,
            Prop::Value => self.value,
        }
    }

    pub fn set(&mut self, prop: Prop, v: f64) {
        let slot = match prop {
            Prop::X => &mut self.x,
            Prop::Y => &mut self.y,
            Prop::Rotation => &mut self.rotation,
            Prop::RotationX => &mut self.rotation_x,
            Prop::RotationY => &mut self.rotation_y,
            Prop::Scale => &mut self.scale,
            Prop::Opacity => &mut self.opacity,
            Prop::Brightness => &mut self.brightness,
            Prop::ZIndex => &mut self.z_index,
            Prop::Value => &mut self.value,
        };
        *slot = v;
    }

    pub fn apply(&mut self, props: &Props) {
        for &(prop, v) in props.iter() {
            self.set(prop, v);
        }
    }

    /// 2D affine for the planar part of the transform (rotate X/Y are perspective-only).
    pub fn to_affine(&self) -> Affine {
        Affine::translate(Vec2::new(self.x, self.y))
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale(self.scale)
    }

    pub fn is_hidden(&self) -> bool {
        self.opacity <= 0.0
    }
}

impl Lerp for Style {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        let mut out = *a;
        for prop in Prop::ALL {
            out.set(prop, f64::lerp(&a.get(prop), &b.get(prop), t));
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Prop {
    X,
    Y,
    Rotation,
    RotationX,
    RotationY,
    Scale,
    Opacity,
    Brightness,
    ZIndex,
    Value,
}

impl Prop {
    pub const ALL: [Prop; 10] = [
        Prop::X,
        Prop::Y,
        Prop::Rotation,
        Prop::RotationX,
        Prop::RotationY,
        Prop::Scale,
        Prop::Opacity,
        Prop::Brightness,
        Prop::ZIndex,
        Prop::Value,
    ];
}

/// A partial property map: only the listed properties are touched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props(Vec<(Prop, f64)>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, prop: Prop, v: f64) -> Self {
        match self.0.iter_mut().find(|(p, _)| *p == prop) {
            Some(slot) => slot.1 = v,
            None => self.0.push((prop, v)),
        }
        self
    }

    pub fn x(self, v: f64) -> Self {
        self.with(Prop::X, v)
    }

    pub fn y(self, v: f64) -> Self {
        self.with(Prop::Y, v)
    }

    pub fn rotation(self, v: f64) -> Self {
        self.with(Prop::Rotation, v)
    }

    pub fn rotation_x(self, v: f64) -> Self {
        self.with(Prop::RotationX, v)
    }

    pub fn rotation_y(self, v: f64) -> Self {
        self.with(Prop::RotationY, v)
    }

    pub fn scale(self, v: f64) -> Self {
        self.with(Prop::Scale, v)
    }

    pub fn opacity(self, v: f64) -> Self {
        self.with(Prop::Opacity, v)
    }

    pub fn brightness(self, v: f64) -> Self {
        self.with(Prop::Brightness, v)
    }

    pub fn z_index(self, v: f64) -> Self {
        self.with(Prop::ZIndex, v)
    }

    pub fn value(self, v: f64) -> Self {
        self.with(Prop::Value, v)
    }

    pub fn get(&self, prop: Prop) -> Option<f64> {
        self.0.iter().find(|(p, _)| *p == prop).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Prop, f64)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self) -> ShowreelResult<()> {
        if let Some((prop, _)) = self.0.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ShowreelError::animation(format!(
                "property {prop:?} must be finite"
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct ElementState {
    pub label: String,
    pub style: Style,
    pub width: f64,
    pub height: f64,
    pub top: f64, // page-space offset of the element's top edge
}

/// Fixed-capacity arena of elements.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    slots: Vec<Option<ElementState>>,
}

impl Scene {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Reserves a new slot at the end of the arena and mounts `label` there.
    pub fn mount(&mut self, label: impl Into<String>) -> ElementId {
        let id = ElementId(self.slots.len() as u32);
        self.slots.push(Some(ElementState {
            label: label.into(),
            style: Style::default(),
            width: 0.0,
            height: 0.0,
            top: 0.0,
        }));
        id
    }

    /// Mounts into a pre-allocated slot.
    pub fn mount_at(&mut self, id: ElementId, label: impl Into<String>) -> ShowreelResult<()> {
        let slot = self
            .slots
            .get_mut(id.index())
            .ok_or_else(|| ShowreelError::validation(format!("element slot {} out of range", id.0)))?;
        *slot = Some(ElementState {
            label: label.into(),
            style: Style::default(),
            width: 0.0,
            height: 0.0,
            top: 0.0,
        });
        Ok(())
    }

    pub fn unmount(&mut self, id: ElementId) -> Option<ElementState> {
        self.slots.get_mut(id.index()).and_then(Option::take)
    }

    pub fn is_mounted(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: ElementId) -> Option<&ElementState> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut ElementState> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn style(&self, id: ElementId) -> Option<Style> {
        self.get(id).map(|e| e.style)
    }

    /// Sets layout metrics; ignored (with a warning) when the element is gone.
    pub fn set_layout(&mut self, id: ElementId, top: f64, width: f64, height: f64) {
        match self.get_mut(id) {
            Some(el) => {
                el.top = top;
                el.width = width;
                el.height = height;
            }
            None => tracing::warn!(element = id.0, "set_layout on unmounted element"),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn mounted_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
