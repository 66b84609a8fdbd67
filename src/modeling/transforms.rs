// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Affine transforms for solids and shapes

use super::Geometry;
use nalgebra::{Matrix3, Matrix4, Point3, UnitQuaternion, Vector3};

/// Transformation operations; angles are in radians
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Translate(Vector3<f64>),
    Rotate(Vector3<f64>),
    Scale(Vector3<f64>),
    /// Reflection across the plane through `origin` with the given normal
    Mirror {
        origin: Point3<f64>,
        normal: Vector3<f64>,
    },
    Matrix(Matrix4<f64>),
}

impl Transform {
    /// Convert transformation to a 4x4 matrix
    pub fn to_matrix(&self) -> Matrix4<f64> {
        match self {
            Transform::Translate(v) => Matrix4::new_translation(v),
            Transform::Rotate(angles) => {
                let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angles.x);
                let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angles.y);
                let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angles.z);
                (rz * ry * rx).to_homogeneous()
            }
            Transform::Scale(s) => Matrix4::new_nonuniform_scaling(s),
            Transform::Mirror { origin, normal } => {
                let Some(n) = normal.try_normalize(1e-12) else {
                    return Matrix4::identity();
                };
                let reflect = Matrix3::identity() - 2.0 * n * n.transpose();
                let to_origin = Matrix4::new_translation(&-origin.coords);
                let back = Matrix4::new_translation(&origin.coords);
                back * reflect.to_homogeneous() * to_origin
            }
            Transform::Matrix(m) => *m,
        }
    }

    pub fn apply(&self, geometry: &Geometry) -> Geometry {
        let matrix = self.to_matrix();
        match geometry {
            Geometry::Solid(solid) => Geometry::Solid(solid.transform(&matrix)),
            Geometry::Shape(shape) => Geometry::Shape(shape.transform(&matrix)),
        }
    }
}

/// Translation that moves the bounds centre onto `relative_to` along the selected axes
pub fn centering(geometry: &Geometry, axes: [bool; 3], relative_to: Point3<f64>) -> Transform {
    let Some((min, max)) = geometry.bounds() else {
        return Transform::Translate(Vector3::zeros());
    };
    let center = nalgebra::center(&min, &max);
    let mut offset = relative_to - center;
    for (axis, enabled) in axes.iter().enumerate() {
        if !enabled {
            offset[axis] = 0.0;
        }
    }
    Transform::Translate(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modeling::primitives::cuboid;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_rotate_z_quarter_turn() {
        let m = Transform::Rotate(Vector3::new(0.0, 0.0, FRAC_PI_2)).to_matrix();
        let p = m.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_mirror_through_offset_plane() {
        let m = Transform::Mirror {
            origin: Point3::new(1.0, 0.0, 0.0),
            normal: Vector3::new(2.0, 0.0, 0.0),
        }
        .to_matrix();
        let p = m.transform_point(&Point3::new(3.0, 4.0, 5.0));
        assert_relative_eq!(p, Point3::new(-1.0, 4.0, 5.0), epsilon = 1e-12);
    }

    #[test]
    fn test_mirrored_solid_keeps_positive_volume() {
        let solid = Geometry::Solid(cuboid([1.0, 2.0, 3.0]));
        let mirrored = Transform::Mirror {
            origin: Point3::origin(),
            normal: Vector3::x(),
        }
        .apply(&solid);
        match mirrored {
            Geometry::Solid(s) => assert_relative_eq!(s.volume(), 6.0, epsilon = 1e-9),
            Geometry::Shape(_) => panic!("expected a solid"),
        }
    }

    #[test]
    fn test_centering_selected_axes() {
        let moved = Transform::Translate(Vector3::new(5.0, 5.0, 5.0))
            .apply(&Geometry::Solid(cuboid([2.0, 2.0, 2.0])));
        let t = centering(&moved, [true, false, true], Point3::origin());
        assert_eq!(t, Transform::Translate(Vector3::new(-5.0, 0.0, -5.0)));
    }
}
