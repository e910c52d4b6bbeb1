//! Orientation and texture-space math.

use glam::{Mat3, Quat, Vec2, Vec3};

/// Rotation in X3D's axis + angle (radians) form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAngle {
    pub axis: Vec3,
    pub angle: f32,
}

impl Default for AxisAngle {
    fn default() -> Self {
        Self {
            axis: Vec3::Z,
            angle: 0.0,
        }
    }
}

impl AxisAngle {
    pub fn new(axis: Vec3, angle: f32) -> Self {
        Self { axis, angle }
    }

    pub fn from_array(values: [f32; 4]) -> Self {
        Self::new(Vec3::new(values[0], values[1], values[2]), values[3])
    }

    /// Convert to a quaternion. A degenerate axis yields identity.
    pub fn to_quat(self) -> Quat {
        match self.axis.try_normalize() {
            Some(axis) => Quat::from_axis_angle(axis, self.angle),
            None => Quat::IDENTITY,
        }
    }

    pub fn from_quat(rotation: Quat) -> Self {
        let (axis, angle) = rotation.normalize().to_axis_angle();
        Self { axis, angle }
    }
}

/// Orientation of a node whose local -Z should point along `direction`.
///
/// Straight up and straight down are special-cased because the basis built
/// from the up vector degenerates there.
pub fn direction_to_orientation(direction: Vec3) -> Quat {
    let d = -direction;
    if d.x == 0.0 && d.z == 0.0 {
        if d.y > 0.0 {
            return Quat::from_axis_angle(Vec3::X, -std::f32::consts::FRAC_PI_2);
        } else if d.y < 0.0 {
            return Quat::from_axis_angle(Vec3::X, std::f32::consts::FRAC_PI_2);
        }
        return Quat::IDENTITY;
    }
    let d = d.normalize();
    let s = d.cross(Vec3::Y).normalize();
    let u = d.cross(s).normalize();
    Quat::from_mat3(&Mat3::from_cols(s, u, d))
}

/// The four texture-transform components and the 3x3 matrix derived from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureTransform {
    pub translation: Vec2,
    pub center: Vec2,
    pub scale: Vec2,
    /// Radians.
    pub rotation: f32,
}

impl Default for TextureTransform {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            center: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

impl TextureTransform {
    /// `T(-C) * S * R * T(C) * T(translation)`, homogeneous 2D.
    ///
    /// Always computed from the current components, never accumulated.
    pub fn matrix(&self) -> Mat3 {
        Mat3::from_translation(-self.center)
            * Mat3::from_scale(self.scale)
            * Mat3::from_angle(self.rotation)
            * Mat3::from_translation(self.center)
            * Mat3::from_translation(self.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Quat, b: Quat) -> bool {
        // q and -q are the same rotation
        a.abs_diff_eq(b, 1e-5) || a.abs_diff_eq(-b, 1e-5)
    }

    #[test]
    fn test_axis_angle_round_trip() {
        let original = AxisAngle::new(Vec3::new(0.0, 2.0, 0.0), 0.75);
        let back = AxisAngle::from_quat(original.to_quat());
        assert!((back.angle - 0.75).abs() < 1e-5);
        assert!(back.axis.abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn test_degenerate_axis_is_identity() {
        assert_eq!(AxisAngle::new(Vec3::ZERO, 1.0).to_quat(), Quat::IDENTITY);
    }

    #[test]
    fn test_vertical_directions() {
        let down = direction_to_orientation(Vec3::new(0.0, -1.0, 0.0));
        assert!(approx(down, Quat::from_axis_angle(Vec3::X, -std::f32::consts::FRAC_PI_2)));
        let up = direction_to_orientation(Vec3::new(0.0, 1.0, 0.0));
        assert!(approx(up, Quat::from_axis_angle(Vec3::X, std::f32::consts::FRAC_PI_2)));
        assert_eq!(direction_to_orientation(Vec3::ZERO), Quat::IDENTITY);
    }

    #[test]
    fn test_direction_orientation_maps_z_axis() {
        let dir = Vec3::new(1.0, 0.0, -1.0).normalize();
        let q = direction_to_orientation(dir);
        // third basis column is -direction
        let mapped = q * Vec3::Z;
        assert!(mapped.abs_diff_eq(-dir, 1e-5));
    }

    #[test]
    fn test_texture_matrix_identity_by_default() {
        assert!(TextureTransform::default()
            .matrix()
            .abs_diff_eq(Mat3::IDENTITY, 1e-6));
    }

    #[test]
    fn test_texture_matrix_translation_only() {
        let tt = TextureTransform {
            translation: Vec2::new(0.25, 0.5),
            ..Default::default()
        };
        let p = tt.matrix().transform_point2(Vec2::ZERO);
        assert!(p.abs_diff_eq(Vec2::new(0.25, 0.5), 1e-6));
    }
}
