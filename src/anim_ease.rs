use std::{fmt, str::FromStr};

use crate::error::ShowreelError;

/// Easing curves, named after their polynomial order.
///
/// The `power1`/`power2`/`power3` names accepted by [`Ease::from_str`] map onto
/// quad/cubic/quart respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Ease {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
    InQuart,
    OutQuart,
    InOutQuart,
    InOutSine,
}

impl Ease {
    pub const ALL: [Ease; 11] = [
        Ease::Linear,
        Ease::InQuad,
        Ease::OutQuad,
        Ease::InOutQuad,
        Ease::InCubic,
        Ease::OutCubic,
        Ease::InOutCubic,
        Ease::InQuart,
        Ease::OutQuart,
        Ease::InOutQuart,
        Ease::InOutSine,
    ];

    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
            Self::InQuart => t.powi(4),
            Self::OutQuart => 1.0 - (1.0 - t).powi(4),
            Self::InOutQuart => {
                if t < 0.5 {
                    8.0 * t.powi(4)
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(4) / 2.0)
                }
            }
            Self::InOutSine => -((std::f64::consts::PI * t).cos() - 1.0) / 2.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "none",
            Self::InQuad => "power1.in",
            Self::OutQuad => "power1.out",
            Self::InOutQuad => "power1.inOut",
            Self::InCubic => "power2.in",
            Self::OutCubic => "power2.out",
            Self::InOutCubic => "power2.inOut",
            Self::InQuart => "power3.in",
            Self::OutQuart => "power3.out",
            Self::InOutQuart => "power3.inOut",
            Self::InOutSine => "sine.inOut",
        }
    }
}

impl fmt::Display for Ease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Ease {
    type Err = ShowreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['_', '-'], "");
        let ease = match key.as_str() {
            "none" | "linear" => Self::Linear,
            "power1.in" | "inquad" => Self::InQuad,
            "power1" | "power1.out" | "outquad" => Self::OutQuad,
            "power1.inout" | "inoutquad" => Self::InOutQuad,
            "power2.in" | "incubic" => Self::InCubic,
            "power2" | "power2.out" | "outcubic" => Self::OutCubic,
            "power2.inout" | "inoutcubic" => Self::InOutCubic,
            "power3.in" | "inquart" => Self::InQuart,
            "power3" | "power3.out" | "outquart" => Self::OutQuart,
            "power3.inout" | "inoutquart" => Self::InOutQuart,
            "sine.inout" | "inoutsine" => Self::InOutSine,
            _ => {
                return Err(ShowreelError::validation(format!("unknown ease '{s}'")));
            }
        };
        Ok(ease)
    }
}

impl TryFrom<String> for Ease {
    type Error = ShowreelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ease> for String {
    fn from(value: Ease) -> Self {
        value.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_stable() {
        for ease in Ease::ALL {
            assert!(ease.apply(0.0).abs() < 1e-12, "{ease}");
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-12, "{ease}");
        }
    }

    #[test]
    fn monotonic_spot_check() {
        for ease in Ease::ALL {
            let a = ease.apply(0.25);
            let b = ease.apply(0.5);
            let c = ease.apply(0.75);
            assert!(a < b);
            assert!(b < c);
        }
    }

    #[test]
    fn power_names_round_trip() {
        for ease in Ease::ALL {
            assert_eq!(ease.name().parse::<Ease>().unwrap(), ease);
        }
        assert_eq!("power2".parse::<Ease>().unwrap(), Ease::OutCubic);
        assert!("bounce.out".parse::<Ease>().is_err());
    }

    #[test]
    fn deserializes_from_string() {
        let e: Ease = serde_json::from_str("\"power2.in\"").unwrap();
        assert_eq!(e, Ease::InCubic);
        assert_eq!(serde_json::to_string(&Ease::OutQuad).unwrap(), "\"power1.out\"");
    }
}
