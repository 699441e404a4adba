//! Rotation representations and the conversions between them.
//!
//! Three interchangeable forms of the same rotation are provided:
//!
//! - [`Quaternion`] – the canonical form used by every filter.  Always kept
//!   at unit norm; composed with the Hamilton product.
//! - [`RotationMatrix`] – row-major 3×3 orthonormal matrix for consumers
//!   that prefer matrices.
//! - [`EulerAngles`] – yaw / pitch / roll in **degrees**.  This is the only
//!   degree-valued type in the workspace; everything else is radians.
//!
//! All rotations map vectors from the **device frame** into the **world
//! frame** (east, north, up).
//!
//! # Example
//!
//! ```rust
//! use gyrofuse_types::rotation::{Quaternion, Vec3};
//!
//! let q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), std::f32::consts::FRAC_PI_2);
//! let euler = q.to_euler_angles();
//! assert!((euler.yaw - 90.0).abs() < 1e-3);
//! ```

use serde::{Deserialize, Serialize};

/// Dot-product above which [`Quaternion::slerp`] falls back to normalized
/// linear interpolation.
const SLERP_LINEAR_THRESHOLD: f32 = 0.9995;

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector (sensor reading, axis, or angular velocity).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Right-handed cross product `self × rhs`.
    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// Euclidean length.
    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Self> {
        let n = self.norm();
        if n > f32::EPSILON {
            Some(self.scale(1.0 / n))
        } else {
            None
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
///
/// `q` and `-q` describe the same rotation; comparisons that care about the
/// rotation rather than the components should use [`Quaternion::angle_to`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1) or calling [`Quaternion::normalized`].
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle_rad` around `axis`.  A zero axis yields identity.
    pub fn from_axis_angle(axis: Vec3, angle_rad: f32) -> Self {
        match axis.normalized() {
            Some(a) => {
                let half = 0.5 * angle_rad;
                let s = half.sin();
                Self::new(half.cos(), a.x * s, a.y * s, a.z * s)
            }
            None => Self::identity(),
        }
    }

    /// Exponential map of a rotation vector `θ·axis` (radians).
    ///
    /// For very small angles the first-order expansion `(1, v/2)` is used and
    /// renormalized, which avoids dividing by a vanishing `θ`.
    pub fn from_rotation_vector(v: Vec3) -> Self {
        let theta = v.norm();
        if theta < 1e-6 {
            return Self::new(1.0, 0.5 * v.x, 0.5 * v.y, 0.5 * v.z).normalized();
        }
        let half = 0.5 * theta;
        let k = half.sin() / theta;
        Self::new(half.cos(), v.x * k, v.y * k, v.z * k)
    }

    /// Decode a platform rotation-vector reading, whose components are
    /// `axis·sin(θ/2)`; the scalar part is reconstructed from the unit-norm
    /// constraint.
    pub fn from_rotation_vector_sample(v: Vec3) -> Self {
        let w_sq = 1.0 - v.dot(v);
        let w = if w_sq > 0.0 { w_sq.sqrt() } else { 0.0 };
        Self::new(w, v.x, v.y, v.z).normalized()
    }

    /// Hamilton product: compose two rotations (`self` then `rhs` in the
    /// body frame).
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Four-dimensional dot product.
    pub fn dot(self, rhs: Self) -> f32 {
        self.w * rhs.w + self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit-norm copy.  A zero quaternion carries no rotation information and
    /// becomes the identity.
    pub fn normalized(self) -> Self {
        let n = self.norm();
        if n > f32::EPSILON {
            let inv = 1.0 / n;
            Self::new(self.w * inv, self.x * inv, self.y * inv, self.z * inv)
        } else {
            Self::identity()
        }
    }

    fn scale(self, k: f32) -> Self {
        Self::new(self.w * k, self.x * k, self.y * k, self.z * k)
    }

    fn add(self, rhs: Self) -> Self {
        Self::new(self.w + rhs.w, self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    /// Geodesic angle (radians, `[0, π]`) between the two rotations.
    pub fn angle_to(self, other: Self) -> f32 {
        // atan2 of the relative rotation stays well conditioned near zero,
        // where acos(dot) loses half its digits.
        let d = self.conjugate().mul(other);
        let sin_half = (d.x * d.x + d.y * d.y + d.z * d.z).sqrt();
        2.0 * sin_half.atan2(d.w.abs())
    }

    /// Spherical linear interpolation from `self` (t = 0) to `other` (t = 1)
    /// along the shorter arc.  `t` is clamped to `[0, 1]`.
    pub fn slerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mut dot = self.dot(other);

        // q and -q are the same rotation; flip to take the short way round.
        let other = if dot < 0.0 {
            dot = -dot;
            other.scale(-1.0)
        } else {
            other
        };

        if dot > SLERP_LINEAR_THRESHOLD {
            return self.scale(1.0 - t).add(other.scale(t)).normalized();
        }

        let theta_0 = dot.clamp(-1.0, 1.0).acos();
        let sin_theta_0 = theta_0.sin();
        let s0 = ((1.0 - t) * theta_0).sin() / sin_theta_0;
        let s1 = (t * theta_0).sin() / sin_theta_0;

        self.scale(s0).add(other.scale(s1)).normalized()
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    pub fn to_rotation_matrix(self) -> RotationMatrix {
        let Self { w, x, y, z } = self;
        RotationMatrix::from_row_major([
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - w * z),
            2.0 * (x * z + w * y),
            2.0 * (x * y + w * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - w * x),
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            1.0 - 2.0 * (x * x + y * y),
        ])
    }

    /// Z-Y-X Euler angles in degrees.
    ///
    /// Near pitch = ±90° the decomposition is degenerate (gimbal lock): pitch
    /// saturates at ±90° and yaw/roll are no longer separable, so only their
    /// combination is meaningful there.
    pub fn to_euler_angles(self) -> EulerAngles {
        let Self { w, x, y, z } = self;

        let sinr_cosp = 2.0 * (w * x + y * z);
        let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
        let roll = sinr_cosp.atan2(cosr_cosp);

        let sinp = 2.0 * (w * y - z * x);
        let pitch = if sinp.abs() >= 1.0 {
            std::f32::consts::FRAC_PI_2.copysign(sinp)
        } else {
            sinp.asin()
        };

        let siny_cosp = 2.0 * (w * z + x * y);
        let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
        let yaw = siny_cosp.atan2(cosy_cosp);

        EulerAngles {
            yaw: yaw.to_degrees(),
            pitch: pitch.to_degrees(),
            roll: roll.to_degrees(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RotationMatrix
// ────────────────────────────────────────────────────────────────────────────

/// Orthonormal 3×3 rotation matrix in row-major order.
///
/// Returns 9 values: `[r00, r01, r02, r10, r11, r12, r20, r21, r22]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationMatrix {
    m: [f32; 9],
}

impl Default for RotationMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl RotationMatrix {
    pub fn identity() -> Self {
        Self::from_row_major([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    pub fn from_row_major(m: [f32; 9]) -> Self {
        Self { m }
    }

    /// Build a matrix from its three rows.
    pub fn from_rows(r0: Vec3, r1: Vec3, r2: Vec3) -> Self {
        Self::from_row_major([r0.x, r0.y, r0.z, r1.x, r1.y, r1.z, r2.x, r2.y, r2.z])
    }

    pub fn as_array(&self) -> &[f32; 9] {
        &self.m
    }

    /// Element at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.m[row * 3 + col]
    }

    /// Transpose (== inverse for an orthonormal matrix).
    pub fn transpose(&self) -> Self {
        let m = &self.m;
        Self::from_row_major([m[0], m[3], m[6], m[1], m[4], m[7], m[2], m[5], m[8]])
    }

    pub fn multiply_vector(&self, v: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3::new(
            m[0] * v.x + m[1] * v.y + m[2] * v.z,
            m[3] * v.x + m[4] * v.y + m[5] * v.z,
            m[6] * v.x + m[7] * v.y + m[8] * v.z,
        )
    }

    /// Convert to a unit quaternion, picking the numerically largest
    /// component first so the division never approaches zero.
    pub fn to_quaternion(&self) -> Quaternion {
        let m = |r: usize, c: usize| self.get(r, c);
        let trace = m(0, 0) + m(1, 1) + m(2, 2);

        let q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Quaternion::new(
                0.25 * s,
                (m(2, 1) - m(1, 2)) / s,
                (m(0, 2) - m(2, 0)) / s,
                (m(1, 0) - m(0, 1)) / s,
            )
        } else if m(0, 0) > m(1, 1) && m(0, 0) > m(2, 2) {
            let s = (1.0 + m(0, 0) - m(1, 1) - m(2, 2)).sqrt() * 2.0;
            Quaternion::new(
                (m(2, 1) - m(1, 2)) / s,
                0.25 * s,
                (m(0, 1) + m(1, 0)) / s,
                (m(0, 2) + m(2, 0)) / s,
            )
        } else if m(1, 1) > m(2, 2) {
            let s = (1.0 + m(1, 1) - m(0, 0) - m(2, 2)).sqrt() * 2.0;
            Quaternion::new(
                (m(0, 2) - m(2, 0)) / s,
                (m(0, 1) + m(1, 0)) / s,
                0.25 * s,
                (m(1, 2) + m(2, 1)) / s,
            )
        } else {
            let s = (1.0 + m(2, 2) - m(0, 0) - m(1, 1)).sqrt() * 2.0;
            Quaternion::new(
                (m(1, 0) - m(0, 1)) / s,
                (m(0, 2) + m(2, 0)) / s,
                (m(1, 2) + m(2, 1)) / s,
                0.25 * s,
            )
        };

        q.normalized()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// EulerAngles
// ────────────────────────────────────────────────────────────────────────────

/// Yaw / pitch / roll in **degrees**, Z-Y-X (yaw about Z, then pitch about
/// the new Y, then roll about the new X).
///
/// Pitch lies in `[-90, 90]`; at the ends of that range the representation
/// loses a degree of freedom (gimbal lock), so a quaternion → Euler → quaternion
/// round trip is only exact away from ±90° pitch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl EulerAngles {
    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Arithmetic mean of the three angles (the scalar plotted by the
    /// history chart).
    pub fn mean(&self) -> f32 {
        (self.yaw + self.pitch + self.roll) / 3.0
    }

    pub fn to_quaternion(&self) -> Quaternion {
        let (sy, cy) = (0.5 * self.yaw.to_radians()).sin_cos();
        let (sp, cp) = (0.5 * self.pitch.to_radians()).sin_cos();
        let (sr, cr) = (0.5 * self.roll.to_radians()).sin_cos();

        Quaternion::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
        .normalized()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn close(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn identity_rotates_nothing() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let r = Quaternion::identity().rotate(v);
        assert!(close(r.x, 1.0, 1e-6) && close(r.y, 2.0, 1e-6) && close(r.z, 3.0, 1e-6));
    }

    #[test]
    fn quarter_turn_about_z_maps_x_to_y() {
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), FRAC_PI_2);
        let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(close(r.x, 0.0, 1e-6));
        assert!(close(r.y, 1.0, 1e-6));
    }

    #[test]
    fn cross_product_is_right_handed() {
        let z = Vec3::new(1.0, 0.0, 0.0).cross(Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(z, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(Vec3::zero().normalized().is_none());
    }

    #[test]
    fn normalizing_zero_quaternion_yields_identity() {
        let q = Quaternion::new(0.0, 0.0, 0.0, 0.0).normalized();
        assert_eq!(q, Quaternion::identity());
    }

    #[test]
    fn normalized_has_unit_norm() {
        let q = Quaternion::new(2.0, 2.0, 2.0, 2.0).normalized();
        assert!(close(q.norm(), 1.0, 1e-6));
    }

    #[test]
    fn rotation_vector_matches_axis_angle() {
        let axis = Vec3::new(1.0, 2.0, -0.5).normalized().unwrap();
        let a = Quaternion::from_rotation_vector(axis.scale(0.7));
        let b = Quaternion::from_axis_angle(axis, 0.7);
        assert!(a.angle_to(b) < 1e-5);
    }

    #[test]
    fn tiny_rotation_vector_stays_unit() {
        let q = Quaternion::from_rotation_vector(Vec3::new(1e-8, 0.0, 0.0));
        assert!(close(q.norm(), 1.0, 1e-6));
    }

    #[test]
    fn rotation_vector_sample_reconstructs_scalar() {
        let truth = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 1.0);
        let decoded =
            Quaternion::from_rotation_vector_sample(Vec3::new(truth.x, truth.y, truth.z));
        assert!(decoded.angle_to(truth) < 1e-4);
    }

    #[test]
    fn angle_to_ignores_sign() {
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.3);
        let neg = Quaternion::new(-q.w, -q.x, -q.y, -q.z);
        assert!(q.angle_to(neg) < 1e-6);
    }

    #[test]
    fn slerp_endpoints_and_midpoint() {
        let a = Quaternion::identity();
        let b = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), FRAC_PI_2);
        assert!(a.slerp(b, 0.0).angle_to(a) < 1e-4);
        assert!(a.slerp(b, 1.0).angle_to(b) < 1e-4);
        let mid = a.slerp(b, 0.5);
        assert!(close(mid.angle_to(a), FRAC_PI_2 / 2.0, 1e-4));
    }

    #[test]
    fn slerp_takes_shorter_arc_for_negated_target() {
        let a = Quaternion::identity();
        let b = Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), 0.4);
        let neg_b = Quaternion::new(-b.w, -b.x, -b.y, -b.z);
        let via_neg = a.slerp(neg_b, 0.5);
        assert!(close(via_neg.angle_to(a), 0.2, 1e-4));
    }

    #[test]
    fn slerp_clamps_weight() {
        let a = Quaternion::identity();
        let b = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 1.0);
        assert!(a.slerp(b, 3.0).angle_to(b) < 1e-4);
        assert!(a.slerp(b, -1.0).angle_to(a) < 1e-4);
    }

    #[test]
    fn quaternion_matrix_round_trip() {
        let cases = [
            Quaternion::identity(),
            Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), PI - 0.01),
            Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), PI - 0.01),
            Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), PI - 0.01),
            Quaternion::from_axis_angle(Vec3::new(0.3, -0.4, 0.8), 2.1),
        ];
        for q in cases {
            let back = q.to_rotation_matrix().to_quaternion();
            assert!(q.angle_to(back) < 1e-3, "round trip failed for {q:?}");
        }
    }

    #[test]
    fn matrix_transpose_is_inverse() {
        let m = Quaternion::from_axis_angle(Vec3::new(0.2, 1.0, 0.1), 0.9).to_rotation_matrix();
        let v = Vec3::new(0.5, -1.0, 2.0);
        let back = m.transpose().multiply_vector(m.multiply_vector(v));
        assert!(close(back.x, v.x, 1e-5) && close(back.y, v.y, 1e-5) && close(back.z, v.z, 1e-5));
    }

    #[test]
    fn matrix_agrees_with_quaternion_rotation() {
        let q = Quaternion::from_axis_angle(Vec3::new(-0.3, 0.2, 0.9), 1.3);
        let v = Vec3::new(1.0, 0.0, -2.0);
        let a = q.rotate(v);
        let b = q.to_rotation_matrix().multiply_vector(v);
        assert!(close(a.x, b.x, 1e-5) && close(a.y, b.y, 1e-5) && close(a.z, b.z, 1e-5));
    }

    #[test]
    fn euler_round_trip_away_from_gimbal_lock() {
        for &(yaw, pitch, roll) in &[
            (0.0, 0.0, 0.0),
            (45.0, 10.0, -20.0),
            (-170.0, 60.0, 120.0),
            (90.0, -80.0, 5.0),
        ] {
            let e = EulerAngles::new(yaw, pitch, roll);
            let q = e.to_quaternion();
            let back = q.to_euler_angles().to_quaternion();
            assert!(q.angle_to(back) < 1e-3, "round trip failed for {e:?}");
        }
    }

    #[test]
    fn euler_pitch_saturates_at_gimbal_lock() {
        let q = EulerAngles::new(30.0, 90.0, 0.0).to_quaternion();
        let e = q.to_euler_angles();
        assert!(close(e.pitch.abs(), 90.0, 0.5));
        assert!(!e.yaw.is_nan() && !e.roll.is_nan());
    }

    #[test]
    fn euler_mean_averages_components() {
        assert!(close(EulerAngles::new(30.0, 60.0, -90.0).mean(), 0.0, 1e-6));
    }

    #[test]
    fn serde_round_trip_matrix() {
        let m = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.5).to_rotation_matrix();
        let json = serde_json::to_string(&m).unwrap();
        let back: RotationMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
