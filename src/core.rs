use crate::error::{ShowreelError, ShowreelResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Width at or below which a viewport is treated as mobile.
pub const DEFAULT_BREAKPOINT_PX: f64 = 768.0;

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_dpr")]
    pub device_pixel_ratio: f64,
}

fn default_dpr() -> f64 {
    1.0
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> ShowreelResult<Self> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(ShowreelError::validation(
                "viewport width/height must be finite and > 0",
            ));
        }
        Ok(Self {
            width,
            height,
            device_pixel_ratio: 1.0,
        })
    }

    pub fn with_dpr(mut self, dpr: f64) -> Self {
        self.device_pixel_ratio = if dpr.is_finite() && dpr > 0.0 {
            dpr
        } else {
            1.0
        };
        self
    }

    pub fn class(self, breakpoint: f64) -> ViewportClass {
        if self.width <= breakpoint {
            ViewportClass::Mobile
        } else {
            ViewportClass::Desktop
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewportClass {
    Desktop,
    Mobile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// `None` for a zero (or NaN) delta.
    pub fn from_delta(delta: f64) -> Option<Self> {
        if delta > 0.0 {
            Some(Self::Forward)
        } else if delta < 0.0 {
            Some(Self::Backward)
        } else {
            None
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Backward => -1.0,
        }
    }
}

/// Straight (non-premultiplied) RGBA8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Deterministic generator for the "random" tilts and flicks.
#[derive(Clone, Debug)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn range(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.next_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_rejects_degenerate_sizes() {
        assert!(Viewport::new(0.0, 100.0).is_err());
        assert!(Viewport::new(100.0, f64::NAN).is_err());
        assert!(Viewport::new(1280.0, 800.0).is_ok());
    }

    #[test]
    fn breakpoint_is_inclusive_for_mobile() {
        let vp = Viewport::new(768.0, 1024.0).unwrap();
        assert_eq!(vp.class(DEFAULT_BREAKPOINT_PX), ViewportClass::Mobile);
        let vp = Viewport::new(769.0, 1024.0).unwrap();
        assert_eq!(vp.class(DEFAULT_BREAKPOINT_PX), ViewportClass::Desktop);
    }

    #[test]
    fn direction_from_delta_ignores_zero() {
        assert_eq!(Direction::from_delta(3.0), Some(Direction::Forward));
        assert_eq!(Direction::from_delta(-0.1), Some(Direction::Backward));
        assert_eq!(Direction::from_delta(0.0), None);
        assert_eq!(Direction::from_delta(f64::NAN), None);
    }

    #[test]
    fn splitmix_is_seed_stable_and_in_range() {
        let mut a = SplitMix64::new(7);
        let mut b = SplitMix64::new(7);
        for _ in 0..32 {
            let v = a.range(-45.0, 45.0);
            assert_eq!(v, b.range(-45.0, 45.0));
            assert!((-45.0..45.0).contains(&v));
        }
    }

    #[test]
    fn dpr_falls_back_to_one() {
        let vp = Viewport::new(10.0, 10.0).unwrap().with_dpr(-2.0);
        assert_eq!(vp.device_pixel_ratio, 1.0);
    }
}
