//! Potential-field velocity law: seek the target, repel from close peers.

use std::f64::consts::FRAC_PI_2;

use nalgebra::Vector2;

use crate::geom::{limit_speed, rotate2, unit_or_zero};

/// Below this separation, directions are treated as degenerate.
const MIN_SEPARATION: f64 = 1e-6;

/// Repulsion gain. At gain 20 the standoff distance where repulsion balances
/// a full-speed approach sits at 20/21 of the safety radius.
const REPULSE_GAIN: f64 = 20.0;

/// Compute the horizontal velocity that moves `self_xy` toward `target_xy`
/// while repelling from every neighbor closer than `safety_radius`.
///
/// The attractive term saturates at `max_speed`; each repulsive term grows
/// as separation shrinks and vanishes at the safety radius; the resultant is
/// clipped to `max_speed`. A neighbor sitting exactly on the line to the
/// target would repel straight backwards and only cancel forward progress,
/// so that case gets an extra perpendicular component.
pub fn compute_swarm_velocity(
    self_xy: Vector2<f64>,
    neighbors: &[Vector2<f64>],
    target_xy: Vector2<f64>,
    safety_radius: f64,
    max_speed: f64,
) -> Vector2<f64> {
    let to_target = target_xy - self_xy;
    let target_dist = to_target.norm();
    let attract = unit_or_zero(to_target) * target_dist.min(max_speed);

    let mut repulse = Vector2::zeros();
    for neighbor in neighbors {
        let away = self_xy - neighbor;
        let dist = away.norm();
        if dist >= safety_radius {
            continue;
        }
        let dir = if dist < MIN_SEPARATION {
            // coincident: sidestep perpendicular to the direction of travel
            if target_dist < MIN_SEPARATION {
                Vector2::x()
            } else {
                rotate2(to_target / target_dist, FRAC_PI_2)
            }
        } else {
            away / dist
        };
        let strength =
            REPULSE_GAIN * max_speed * (safety_radius - dist) / dist.max(MIN_SEPARATION);
        repulse += dir * strength;
        if opposes_head_on(attract, dir) {
            repulse += rotate2(dir, FRAC_PI_2) * strength;
        }
    }

    limit_speed(attract + repulse, max_speed)
}

/// True when the repulsion direction is exactly anti-parallel to the
/// attraction, which would cancel forward progress without any deviation.
fn opposes_head_on(attract: Vector2<f64>, repulse_dir: Vector2<f64>) -> bool {
    if attract.norm() < MIN_SEPARATION {
        return false;
    }
    let cross = attract.x * repulse_dir.y - attract.y * repulse_dir.x;
    cross.abs() < MIN_SEPARATION && attract.dot(&repulse_dir) < 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: f64 = 1.0;
    const MAX: f64 = 1.0;

    #[test]
    fn no_neighbors_is_pure_seek() {
        let v = compute_swarm_velocity(
            Vector2::new(0.0, 0.0),
            &[],
            Vector2::new(3.0, 4.0),
            R,
            MAX,
        );
        // far target: full speed along the unit direction
        assert!((v.x - 0.6).abs() < 1e-12);
        assert!((v.y - 0.8).abs() < 1e-12);
    }

    #[test]
    fn near_target_scales_down_to_distance() {
        let v = compute_swarm_velocity(
            Vector2::new(0.0, 0.0),
            &[],
            Vector2::new(0.3, 0.4),
            R,
            MAX,
        );
        assert!((v.norm() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn at_target_with_no_neighbors_velocity_is_zero() {
        let v = compute_swarm_velocity(
            Vector2::new(2.0, 2.0),
            &[],
            Vector2::new(2.0, 2.0),
            R,
            MAX,
        );
        assert_eq!(v, Vector2::zeros());
    }

    #[test]
    fn at_target_a_close_neighbor_still_displaces() {
        // attraction is zero at the target; the repulsion must stay finite
        // and clipped even so
        let v = compute_swarm_velocity(
            Vector2::new(2.0, 2.0),
            &[Vector2::new(2.5, 2.0)],
            Vector2::new(2.0, 2.0),
            R,
            MAX,
        );
        assert!(v.x < 0.0, "must push away from the neighbor, got {v:?}");
        assert!(v.norm() <= MAX + 1e-9);
        assert!(v.x.is_finite() && v.y.is_finite());
    }

    #[test]
    fn neighbor_outside_radius_is_ignored() {
        let free = compute_swarm_velocity(
            Vector2::new(0.0, 0.0),
            &[],
            Vector2::new(4.0, 0.0),
            R,
            MAX,
        );
        let with_far = compute_swarm_velocity(
            Vector2::new(0.0, 0.0),
            &[Vector2::new(2.0, 0.0)],
            Vector2::new(4.0, 0.0),
            R,
            MAX,
        );
        assert_eq!(free, with_far);
    }

    #[test]
    fn neighbor_on_path_deviates_laterally() {
        let v = compute_swarm_velocity(
            Vector2::new(0.0, 0.0),
            &[Vector2::new(0.5, 0.0)],
            Vector2::new(4.0, 0.0),
            R,
            MAX,
        );
        assert!(
            v.y.abs() > 1e-3,
            "head-on neighbor must push the resultant off the direct line, got {v:?}"
        );
        assert!(v.norm() <= MAX + 1e-9);
    }

    #[test]
    fn closer_neighbors_repel_harder() {
        let grazing = compute_swarm_velocity(
            Vector2::new(0.0, 0.0),
            &[Vector2::new(0.99, 0.0)],
            Vector2::new(4.0, 0.0),
            R,
            MAX,
        );
        let close = compute_swarm_velocity(
            Vector2::new(0.0, 0.0),
            &[Vector2::new(0.1, 0.0)],
            Vector2::new(4.0, 0.0),
            R,
            MAX,
        );
        assert!(
            grazing.x > 0.0,
            "a neighbor near the edge of the radius barely slows progress"
        );
        assert!(
            close.x < 0.0,
            "a neighbor about to be hit drives the velocity backwards"
        );
    }

    #[test]
    fn coincident_neighbor_stays_finite_and_clipped() {
        let v = compute_swarm_velocity(
            Vector2::new(1.0, 1.0),
            &[Vector2::new(1.0, 1.0)],
            Vector2::new(5.0, 1.0),
            R,
            MAX,
        );
        assert!(v.x.is_finite() && v.y.is_finite());
        assert!(v.norm() <= MAX + 1e-9);
    }

    #[test]
    fn magnitude_never_exceeds_max_speed() {
        let self_xy = Vector2::new(0.0, 0.0);
        let cases: &[&[Vector2<f64>]] = &[
            &[],
            &[Vector2::new(0.01, 0.0)],
            &[Vector2::new(0.2, 0.1), Vector2::new(-0.1, 0.3)],
            &[
                Vector2::new(0.0, 0.0),
                Vector2::new(0.5, 0.0),
                Vector2::new(0.0, 0.5),
                Vector2::new(-0.5, 0.0),
            ],
        ];
        for neighbors in cases {
            for target in [
                Vector2::new(0.0, 0.0),
                Vector2::new(100.0, -40.0),
                Vector2::new(0.001, 0.0),
            ] {
                let v = compute_swarm_velocity(self_xy, neighbors, target, R, MAX);
                assert!(
                    v.norm() <= MAX + 1e-9,
                    "|v| = {} for target {target:?} with {} neighbors",
                    v.norm(),
                    neighbors.len()
                );
                assert!(v.x.is_finite() && v.y.is_finite());
            }
        }
    }

    #[test]
    fn multiple_neighbors_sum_their_repulsion() {
        // two neighbors ahead must cut forward progress harder than one
        let single = compute_swarm_velocity(
            Vector2::new(0.0, 0.0),
            &[Vector2::new(0.6, 0.2)],
            Vector2::new(4.0, 0.0),
            R,
            MAX,
        );
        let double = compute_swarm_velocity(
            Vector2::new(0.0, 0.0),
            &[Vector2::new(0.6, 0.2), Vector2::new(0.6, -0.2)],
            Vector2::new(4.0, 0.0),
            R,
            MAX,
        );
        assert!(double.x < single.x);
    }
}
