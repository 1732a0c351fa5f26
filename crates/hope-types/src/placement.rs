//! Leaf layout on the tree illustration.
//!
//! Leaves are placed on a golden-angle spiral: each new leaf turns a further
//! 137.5° around the canvas center and moves out so that the enclosed area
//! grows linearly with the leaf index. Successive prefixes of the sequence stay
//! evenly spread without any collision checks.

use serde::{Deserialize, Serialize};

/// Angular step between consecutive leaves, in degrees.
pub const GOLDEN_ANGLE_DEGREES: f64 = 137.5;

/// Distance scale: leaf `i` sits `sqrt(i) * SPIRAL_SCALE` pixels from the center.
pub const SPIRAL_SCALE: f64 = 30.0;

/// Center of the reference canvas the illustration is drawn on.
pub const CANVAS_CENTER: Position = Position { x: 500, y: 300 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

/// Unrounded polar coordinates `(radius, angle_radians)` of leaf `index`.
pub fn spiral_polar(index: u64) -> (f64, f64) {
    let step = index as f64;
    let angle = step * GOLDEN_ANGLE_DEGREES.to_radians();
    let radius = step.sqrt() * SPIRAL_SCALE;
    (radius, angle)
}

/// Pixel position of the leaf with the given zero-based index.
///
/// The index is the campaign's leaf count immediately before the leaf is
/// inserted, so the first leaf lands exactly on [`CANVAS_CENTER`].
pub fn leaf_position(index: u64) -> Position {
    leaf_position_around(index, CANVAS_CENTER)
}

pub fn leaf_position_around(index: u64, center: Position) -> Position {
    let (radius, angle) = spiral_polar(index);
    Position {
        x: center.x + (radius * angle.cos()).round() as i64,
        y: center.y + (radius * angle.sin()).round() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_leaf_sits_on_the_center() {
        assert_eq!(leaf_position(0), CANVAS_CENTER);
    }

    #[test]
    fn placement_is_deterministic() {
        for i in [0, 1, 7, 42, 1_000, 123_456] {
            assert_eq!(leaf_position(i), leaf_position(i));
        }
    }

    #[test]
    fn known_positions_match_the_spiral() {
        // r = 30, angle = 137.5deg
        assert_eq!(leaf_position(1), Position { x: 478, y: 320 });
        // r = 30 * sqrt(2), angle = 275deg
        assert_eq!(leaf_position(2), Position { x: 504, y: 258 });
    }

    #[test]
    fn radius_grows_with_square_root_of_index() {
        for i in 1..200u64 {
            let (radius, _) = spiral_polar(i);
            assert!((radius - 30.0 * (i as f64).sqrt()).abs() < 1e-9);

            // Rounding each axis moves the point by at most half a pixel per axis.
            let p = leaf_position(i);
            let dx = (p.x - CANVAS_CENTER.x) as f64;
            let dy = (p.y - CANVAS_CENTER.y) as f64;
            assert!(((dx * dx + dy * dy).sqrt() - radius).abs() <= 0.75);
        }
    }

    #[test]
    fn angle_advances_by_the_golden_angle() {
        for i in 1..200u64 {
            let (_, prev) = spiral_polar(i - 1);
            let (_, next) = spiral_polar(i);
            let step = (next - prev).to_degrees().rem_euclid(360.0);
            assert!((step - GOLDEN_ANGLE_DEGREES).abs() < 1e-6, "step {step} at {i}");
        }
    }

    #[test]
    fn custom_center_shifts_every_point() {
        let origin = Position { x: 0, y: 0 };
        for i in 0..50 {
            let a = leaf_position(i);
            let b = leaf_position_around(i, origin);
            assert_eq!((a.x - b.x, a.y - b.y), (500, 300));
        }
    }
}
