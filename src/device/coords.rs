//! Tap coordinate resolution.
//!
//! Maps a logical tap request onto device pixels. In `ratio` space a
//! coordinate of 1.0 lands on the last pixel (`dimension - 1`). Results are
//! rounded half-to-even and clamped to the screen.

use crate::error::{GuiAgentError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Coordinate space of a tap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordSpace {
    /// `ratio` when both axes lie in [0, 1], otherwise `pixel`.
    Auto,
    Pixel,
    Ratio,
}

impl fmt::Display for CoordSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordSpace::Auto => write!(f, "auto"),
            CoordSpace::Pixel => write!(f, "pixel"),
            CoordSpace::Ratio => write!(f, "ratio"),
        }
    }
}

impl FromStr for CoordSpace {
    type Err = GuiAgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CoordSpace::Auto),
            "pixel" => Ok(CoordSpace::Pixel),
            "ratio" => Ok(CoordSpace::Ratio),
            _ => Err(GuiAgentError::InvalidArgument(format!(
                "Unsupported coord_space: {} (expected auto, pixel or ratio)",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TapInput {
    pub x: f64,
    pub y: f64,
    pub coord_space: CoordSpace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScreenSize {
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// Outcome of resolving one tap request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateResolution {
    pub input: TapInput,
    pub effective_coord_space: CoordSpace,
    pub screen_size: ScreenSize,
    /// Rounded point before clamping.
    pub computed: Point,
    /// Point actually tapped; always on screen.
    pub tap: Point,
    pub clamped: bool,
}

/// Resolve `(x, y)` in `space` against a `width` x `height` screen.
pub fn resolve(
    x: f64,
    y: f64,
    space: CoordSpace,
    width: i64,
    height: i64,
) -> Result<CoordinateResolution> {
    if width <= 0 || height <= 0 {
        return Err(GuiAgentError::InvalidArgument(
            "Invalid screen size. Width/height must be > 0.".to_string(),
        ));
    }
    if !x.is_finite() || !y.is_finite() {
        return Err(GuiAgentError::InvalidArgument(
            "Invalid tap coordinate: x and y must be finite numbers.".to_string(),
        ));
    }

    let effective = match space {
        CoordSpace::Auto if (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y) => {
            CoordSpace::Ratio
        }
        CoordSpace::Auto => CoordSpace::Pixel,
        other => other,
    };

    let (raw_x, raw_y) = match effective {
        CoordSpace::Ratio => (x * (width - 1) as f64, y * (height - 1) as f64),
        _ => (x, y),
    };

    let computed = Point {
        x: round_to_i64(raw_x),
        y: round_to_i64(raw_y),
    };
    let tap = Point {
        x: computed.x.clamp(0, width - 1),
        y: computed.y.clamp(0, height - 1),
    };

    Ok(CoordinateResolution {
        input: TapInput {
            x,
            y,
            coord_space: space,
        },
        effective_coord_space: effective,
        screen_size: ScreenSize { width, height },
        computed,
        clamped: tap != computed,
        tap,
    })
}

/// Half-to-even rounding; saturates at the i64 range.
fn round_to_i64(value: f64) -> i64 {
    value.round_ties_even() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_center_of_phone_screen() {
        let r = resolve(0.5, 0.5, CoordSpace::Ratio, 1080, 2400).unwrap();
        // 0.5 * 1079 = 539.5 rounds to even 540; 0.5 * 2399 = 1199.5 -> 1200.
        assert_eq!(r.computed, Point { x: 540, y: 1200 });
        assert_eq!(r.tap, r.computed);
        assert!(!r.clamped);
    }

    #[test]
    fn ties_round_to_even() {
        let r = resolve(0.5, 0.5, CoordSpace::Pixel, 1080, 2400).unwrap();
        assert_eq!(r.computed, Point { x: 0, y: 0 });

        let r = resolve(2.5, 3.5, CoordSpace::Pixel, 1080, 2400).unwrap();
        assert_eq!(r.computed, Point { x: 2, y: 4 });
    }

    #[test]
    fn auto_detects_ratio_inside_unit_square() {
        let r = resolve(0.9, 0.9, CoordSpace::Auto, 1080, 2400).unwrap();
        assert_eq!(r.effective_coord_space, CoordSpace::Ratio);
        assert_eq!(r.input.coord_space, CoordSpace::Auto);
    }

    #[test]
    fn auto_detects_pixels_outside_unit_square() {
        let r = resolve(900.0, 1900.0, CoordSpace::Auto, 1080, 2400).unwrap();
        assert_eq!(r.effective_coord_space, CoordSpace::Pixel);
        assert_eq!(r.tap, Point { x: 900, y: 1900 });
    }

    #[test]
    fn auto_needs_both_axes_in_range() {
        let r = resolve(0.5, 1.5, CoordSpace::Auto, 1080, 2400).unwrap();
        assert_eq!(r.effective_coord_space, CoordSpace::Pixel);
    }

    #[test]
    fn ratio_overflow_is_clamped_to_last_pixel() {
        let r = resolve(1.5, 0.5, CoordSpace::Ratio, 1080, 2400).unwrap();
        assert!(r.clamped);
        assert_eq!(r.tap.x, 1079);
        assert_eq!(r.computed.x, 1618);
    }

    #[test]
    fn negative_pixels_clamp_to_zero() {
        let r = resolve(-20.0, 100.0, CoordSpace::Pixel, 1080, 2400).unwrap();
        assert!(r.clamped);
        assert_eq!(r.tap, Point { x: 0, y: 100 });
    }

    #[test]
    fn rejects_non_positive_screen_size() {
        assert!(resolve(1.0, 1.0, CoordSpace::Pixel, 0, 2400).is_err());
        assert!(resolve(1.0, 1.0, CoordSpace::Pixel, 1080, -1).is_err());
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let err = resolve(f64::NAN, 0.5, CoordSpace::Auto, 1080, 2400).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
        assert!(resolve(0.5, f64::INFINITY, CoordSpace::Ratio, 1080, 2400).is_err());
    }

    #[test]
    fn parses_coord_space_names() {
        assert_eq!("auto".parse::<CoordSpace>().unwrap(), CoordSpace::Auto);
        assert_eq!("PIXEL".parse::<CoordSpace>().unwrap(), CoordSpace::Pixel);
        assert_eq!(" ratio ".parse::<CoordSpace>().unwrap(), CoordSpace::Ratio);

        let err = "percent".parse::<CoordSpace>().unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
        assert!(err.to_string().contains("percent"));
    }

    #[test]
    fn serializes_with_lowercase_spaces() {
        let r = resolve(0.5, 0.5, CoordSpace::Auto, 1080, 2400).unwrap();
        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["input"]["coord_space"], "auto");
        assert_eq!(value["effective_coord_space"], "ratio");
        assert_eq!(value["screen_size"]["width"], 1080);
        assert_eq!(value["tap"]["y"], 1200);
        assert_eq!(value["clamped"], false);
    }
}
