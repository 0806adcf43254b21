use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 3.0;
pub const SCALE_STEP: f64 = 0.25;
pub const ROTATION_STEP: u16 = 90;

/// Zoom and rotation applied by the document viewer. Independent of the
/// fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ViewerTransform {
    pub scale: f64,
    /// Degrees, one of 0, 90, 180, 270
    pub rotation: u16,
}

impl ViewerTransform {
    /// Build a transform from untrusted input, snapping to valid values.
    pub fn new(scale: f64, rotation_degrees: i64) -> Self {
        Self {
            scale: snap_scale(scale),
            rotation: normalize_rotation(rotation_degrees),
        }
    }

    pub fn zoom_in(self) -> Self {
        Self {
            scale: snap_scale(self.scale + SCALE_STEP),
            ..self
        }
    }

    pub fn zoom_out(self) -> Self {
        Self {
            scale: snap_scale(self.scale - SCALE_STEP),
            ..self
        }
    }

    pub fn rotate_clockwise(self) -> Self {
        Self {
            rotation: normalize_rotation(i64::from(self.rotation) + i64::from(ROTATION_STEP)),
            ..self
        }
    }

    pub fn rotate_counter_clockwise(self) -> Self {
        Self {
            rotation: normalize_rotation(i64::from(self.rotation) - i64::from(ROTATION_STEP)),
            ..self
        }
    }
}

impl Default for ViewerTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation: 0,
        }
    }
}

fn snap_scale(scale: f64) -> f64 {
    if !scale.is_finite() {
        return 1.0;
    }
    let snapped = (scale / SCALE_STEP).round() * SCALE_STEP;
    snapped.clamp(MIN_SCALE, MAX_SCALE)
}

/// Snap to the nearest quarter turn in `0..360`. Reduced modulo four turns
/// before scaling so any `i64` input is accepted.
fn normalize_rotation(degrees: i64) -> u16 {
    let quarter_turns = (degrees as f64 / f64::from(ROTATION_STEP))
        .round()
        .rem_euclid(4.0);
    quarter_turns as u16 * ROTATION_STEP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_is_clamped() {
        let mut t = ViewerTransform::default();
        for _ in 0..20 {
            t = t.zoom_in();
        }
        assert_eq!(t.scale, MAX_SCALE);
        for _ in 0..20 {
            t = t.zoom_out();
        }
        assert_eq!(t.scale, MIN_SCALE);
    }

    #[test]
    fn scale_snaps_to_quarter_steps() {
        assert_eq!(ViewerTransform::new(1.1, 0).scale, 1.0);
        assert_eq!(ViewerTransform::new(1.2, 0).scale, 1.25);
        assert_eq!(ViewerTransform::new(f64::NAN, 0).scale, 1.0);
        assert_eq!(ViewerTransform::new(10.0, 0).scale, 3.0);
    }

    #[test]
    fn rotation_wraps() {
        let t = ViewerTransform::default().rotate_counter_clockwise();
        assert_eq!(t.rotation, 270);
        assert_eq!(t.rotate_clockwise().rotation, 0);
        assert_eq!(ViewerTransform::new(1.0, 450).rotation, 90);
        assert_eq!(ViewerTransform::new(1.0, -90).rotation, 270);
        assert_eq!(ViewerTransform::new(1.0, 100).rotation, 90);
        assert_eq!(ViewerTransform::new(1.0, 100).rotation, 90);
    }

    #[test]
    fn extreme_rotations_stay_in_range() {
        for degrees in [i64::MAX, i64::MIN, i64::MAX - 45, i64::MIN + 1] {
            let rotation = ViewerTransform::new(1.0, degrees).rotation;
            assert!(rotation < 360 && rotation % ROTATION_STEP == 0, "{} -> {}", degrees, rotation);
        }
    }
}
