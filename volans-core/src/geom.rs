//! Small geometry helpers consumed by the navigation loop.

use nalgebra::Vector2;

const EPS: f64 = 1e-12;

/// True when the mean of the recent horizontal positions sits within
/// `accuracy` of `target`. An empty history never counts as reached.
pub fn target_reached(target: Vector2<f64>, recent: &[Vector2<f64>], accuracy: f64) -> bool {
    if recent.is_empty() {
        return false;
    }
    let mean = recent.iter().sum::<Vector2<f64>>() / recent.len() as f64;
    (mean - target).norm() < accuracy
}

/// Rotate `v` counterclockwise by `angle` radians.
pub fn rotate2(v: Vector2<f64>, angle: f64) -> Vector2<f64> {
    let (sin, cos) = angle.sin_cos();
    Vector2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Unit vector in the direction of `v`, or zero when `v` is (near) zero.
pub fn unit_or_zero(v: Vector2<f64>) -> Vector2<f64> {
    let norm = v.norm();
    if norm < EPS {
        Vector2::zeros()
    } else {
        v / norm
    }
}

/// Clip the magnitude of `v` to `max_speed`, preserving direction.
pub fn limit_speed(v: Vector2<f64>, max_speed: f64) -> Vector2<f64> {
    let norm = v.norm();
    if norm > max_speed && norm > EPS {
        v * (max_speed / norm)
    } else {
        v
    }
}
