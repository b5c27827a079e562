//! Tunables for the whole page, loadable from JSON.
//!
//! Every section defaults independently, so a config file only needs the keys it changes.

use std::path::Path;

use crate::{
    anim_ease::Ease,
    core::DEFAULT_BREAKPOINT_PX,
    error::{ShowreelError, ShowreelResult},
    gesture::WheelSettings,
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub duration_ms: f64,
    pub ease: Ease,
    pub snap_threshold: f64,
    /// Flick rotation is drawn from `[-rotation_range, rotation_range]` degrees.
    pub rotation_range: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 500.0,
            ease: Ease::OutCubic,
            snap_threshold: 0.1,
            rotation_range: 45.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub wheel_threshold: f64,
    pub idle_gap_ms: f64,
    pub debounce_ms: f64,
    pub swipe_min_px: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            wheel_threshold: 50.0,
            idle_gap_ms: 150.0,
            debounce_ms: 30.0,
            swipe_min_px: 50.0,
        }
    }
}

impl GestureConfig {
    pub fn wheel(&self) -> WheelSettings {
        WheelSettings {
            idle_gap_ms: self.idle_gap_ms,
            debounce_ms: self.debounce_ms,
            threshold: self.wheel_threshold,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesktopGalleryMode {
    #[default]
    Grouped,
    Continuous,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub desktop_mode: DesktopGalleryMode,
    pub group_size: usize,
    /// Side-card offset as a fraction of viewport width.
    pub side_offset: f64,
    pub tilt_deg: f64,
    pub group_stagger_ms: f64,
    /// Continuous mode: scroll length of the pinned span, in viewport heights.
    pub continuous_span: f64,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            desktop_mode: DesktopGalleryMode::Grouped,
            group_size: 3,
            side_offset: 0.22,
            tilt_deg: 6.0,
            group_stagger_ms: 80.0,
            continuous_span: 3.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ParallaxConfig {
    pub damping: f64,
    pub intensity: f64,
    pub pointer_debounce_ms: f64,
}

impl Default for ParallaxConfig {
    fn default() -> Self {
        Self {
            damping: 20.0,
            intensity: 15.0,
            pointer_debounce_ms: 16.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub radius: f64,
    pub zoom_strength: f64,
    pub border_width: f64,
    pub hover_zoom_ms: f64,
    pub spotlight_radius_px: f64,
    pub spotlight_softness_px: f64,
    pub ambient: f64,
    pub max_pixel_ratio: f64,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            radius: 0.1,
            zoom_strength: 2.0,
            border_width: 0.002,
            hover_zoom_ms: 300.0,
            spotlight_radius_px: 300.0,
            spotlight_softness_px: 200.0,
            ambient: 0.1,
            max_pixel_ratio: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShowreelConfig {
    pub animation: AnimationConfig,
    pub gesture: GestureConfig,
    pub gallery: GalleryConfig,
    pub parallax: ParallaxConfig,
    pub shader: ShaderConfig,
    pub breakpoint_px: f64,
    pub seed: u64,
}

impl Default for ShowreelConfig {
    fn default() -> Self {
        Self {
            animation: AnimationConfig::default(),
            gesture: GestureConfig::default(),
            gallery: GalleryConfig::default(),
            parallax: ParallaxConfig::default(),
            shader: ShaderConfig::default(),
            breakpoint_px: DEFAULT_BREAKPOINT_PX,
            seed: 0x5EED,
        }
    }
}

fn positive(name: &str, v: f64) -> ShowreelResult<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(ShowreelError::validation(format!(
            "{name} must be finite and > 0 (got {v})"
        )));
    }
    Ok(())
}

fn non_negative(name: &str, v: f64) -> ShowreelResult<()> {
    if !v.is_finite() || v < 0.0 {
        return Err(ShowreelError::validation(format!(
            "{name} must be finite and >= 0 (got {v})"
        )));
    }
    Ok(())
}

impl ShowreelConfig {
    pub fn from_json_str(s: &str) -> ShowreelResult<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ShowreelResult<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|e| {
            ShowreelError::validation(format!("read config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> ShowreelResult<()> {
        let a = &self.animation;
        positive("animation.duration_ms", a.duration_ms)?;
        non_negative("animation.snap_threshold", a.snap_threshold)?;
        non_negative("animation.rotation_range", a.rotation_range)?;

        let g = &self.gesture;
        positive("gesture.wheel_threshold", g.wheel_threshold)?;
        positive("gesture.idle_gap_ms", g.idle_gap_ms)?;
        positive("gesture.debounce_ms", g.debounce_ms)?;
        positive("gesture.swipe_min_px", g.swipe_min_px)?;

        if self.gallery.group_size == 0 {
            return Err(ShowreelError::validation("gallery.group_size must be >= 1"));
        }
        non_negative("gallery.side_offset", self.gallery.side_offset)?;
        non_negative("gallery.tilt_deg", self.gallery.tilt_deg)?;
        non_negative("gallery.group_stagger_ms", self.gallery.group_stagger_ms)?;
        positive("gallery.continuous_span", self.gallery.continuous_span)?;

        let p = &self.parallax;
        if !p.damping.is_finite() || p.damping < 1.0 {
            return Err(ShowreelError::validation(
                "parallax.damping must be finite and >= 1",
            ));
        }
        non_negative("parallax.intensity", p.intensity)?;
        non_negative("parallax.pointer_debounce_ms", p.pointer_debounce_ms)?;

        let s = &self.shader;
        positive("shader.radius", s.radius)?;
        if !s.zoom_strength.is_finite() || s.zoom_strength < 1.0 {
            return Err(ShowreelError::validation(
                "shader.zoom_strength must be finite and >= 1",
            ));
        }
        non_negative("shader.border_width", s.border_width)?;
        positive("shader.hover_zoom_ms", s.hover_zoom_ms)?;
        positive("shader.spotlight_radius_px", s.spotlight_radius_px)?;
        non_negative("shader.spotlight_softness_px", s.spotlight_softness_px)?;
        if !(0.0..=1.0).contains(&s.ambient) {
            return Err(ShowreelError::validation("shader.ambient must be in [0, 1]"));
        }
        positive("shader.max_pixel_ratio", s.max_pixel_ratio)?;

        positive("breakpoint_px", self.breakpoint_px)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ShowreelConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg = ShowreelConfig::from_json_str(
            r#"{ "gallery": { "desktop_mode": "continuous" }, "animation": { "ease": "power2.in" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.gallery.desktop_mode, DesktopGalleryMode::Continuous);
        assert_eq!(cfg.gallery.group_size, 3);
        assert_eq!(cfg.animation.ease, Ease::InCubic);
        assert_eq!(cfg.animation.duration_ms, 500.0);
        assert_eq!(cfg.breakpoint_px, 768.0);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ShowreelConfig::from_json_str(r#"{ "gallery": { "group_size": 0 } }"#).is_err());
        assert!(ShowreelConfig::from_json_str(r#"{ "parallax": { "damping": 0.5 } }"#).is_err());
        assert!(
            ShowreelConfig::from_json_str(r#"{ "animation": { "duration_ms": 0 } }"#).is_err()
        );
        assert!(ShowreelConfig::from_json_str(r#"{ "animation": { "ease": "bounce" } }"#).is_err());
    }

    #[test]
    fn wheel_settings_mirror_gesture_section() {
        let w = GestureConfig::default().wheel();
        assert_eq!(w, WheelSettings::default());
    }
}
