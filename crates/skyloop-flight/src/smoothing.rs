//! Critically-damped smoothing and angle helpers.
//!
//! [`smooth_damp`] is the classic game-engine "SmoothDamp" law: a
//! critically-damped spring integrated with a cubic approximation of
//! `exp(-ω·dt)`, with the per-step displacement capped by `max_speed` and a
//! final clamp that forbids overshooting the target. The caller owns the
//! velocity estimate and passes it back in on every step.
//!
//! All angles are in degrees.

use nalgebra::Vector3;

/// Shortest smoothing time accepted; smaller values are clamped up to it.
const MIN_SMOOTH_TIME: f32 = 1e-4;

/// `exp(-x)` approximation used by the damping step.
fn decay_factor(omega: f32, dt: f32) -> f32 {
    let x = omega * dt;
    1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x)
}

/// Move `current` toward `target` along a critically-damped trajectory.
///
/// `velocity` is the auxiliary rate estimate, updated in place. The
/// displacement toward the target is limited to `max_speed * smooth_time`,
/// which bounds the approach speed. The result never passes the target.
pub fn smooth_damp(
    current: Vector3<f32>,
    target: Vector3<f32>,
    velocity: &mut Vector3<f32>,
    smooth_time: f32,
    max_speed: f32,
    dt: f32,
) -> Vector3<f32> {
    let smooth_time = smooth_time.max(MIN_SMOOTH_TIME);
    let omega = 2.0 / smooth_time;
    let decay = decay_factor(omega, dt);

    let mut change = current - target;
    let max_change = max_speed * smooth_time;
    let distance_sq = change.norm_squared();
    if distance_sq > max_change * max_change {
        change *= max_change / distance_sq.sqrt();
    }
    let reachable = current - change;

    let temp = (*velocity + change * omega) * dt;
    *velocity = (*velocity - temp * omega) * decay;
    let output = reachable + (change + temp) * decay;

    if (target - current).dot(&(output - target)) > 0.0 {
        *velocity = Vector3::zeros();
        return target;
    }
    output
}

/// Scalar form of [`smooth_damp`].
pub fn smooth_damp_scalar(
    current: f32,
    target: f32,
    velocity: &mut f32,
    smooth_time: f32,
    max_speed: f32,
    dt: f32,
) -> f32 {
    let smooth_time = smooth_time.max(MIN_SMOOTH_TIME);
    let omega = 2.0 / smooth_time;
    let decay = decay_factor(omega, dt);

    let max_change = max_speed * smooth_time;
    let change = (current - target).clamp(-max_change, max_change);
    let reachable = current - change;

    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * decay;
    let output = reachable + (change + temp) * decay;

    if (target - current > 0.0) == (output > target) {
        *velocity = 0.0;
        return target;
    }
    output
}

/// [`smooth_damp_scalar`] for angles: approaches `target` along the shortest
/// arc. The result is not wrapped.
pub fn smooth_damp_angle(
    current: f32,
    target: f32,
    velocity: &mut f32,
    smooth_time: f32,
    max_speed: f32,
    dt: f32,
) -> f32 {
    let target = current + delta_angle(current, target);
    smooth_damp_scalar(current, target, velocity, smooth_time, max_speed, dt)
}

/// Signed shortest difference `target - current`, in `(-180, 180]`.
pub fn delta_angle(current: f32, target: f32) -> f32 {
    let delta = (target - current).rem_euclid(360.0);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

/// Linear interpolation with `t` clamped to `[0, 1]`.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// Interpolate from `a` toward `b` along the shortest arc, `t` clamped to
/// `[0, 1]`.
pub fn lerp_angle(a: f32, b: f32, t: f32) -> f32 {
    a + delta_angle(a, b) * t.clamp(0.0, 1.0)
}

/// Wrap to `[0, 360)`.
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Wrap to `[-180, 180)`.
pub fn normalize_signed(angle: f32) -> f32 {
    wrap_degrees(angle + 180.0) - 180.0
}
