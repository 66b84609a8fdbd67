// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Convex hulls: 3D through parry3d, 2D by monotone chain

use super::shape2::Shape2;
use super::solid::Solid;
use super::{check_budget, Geometry, ModelingError};
use nalgebra::{Point2, Point3};
use parry3d::na;
use parry3d::transformation::{try_convex_hull, ConvexHullError};

/// Most input points a single hull accepts
pub const MAX_HULL_POINTS: usize = 1 << 20;

impl From<ConvexHullError> for ModelingError {
    fn from(err: ConvexHullError) -> Self {
        ModelingError::new(format!("hull computation failed: {}", err))
    }
}

/// True when the points span a volume rather than a plane, line or point
fn spans_volume(points: &[Point3<f64>]) -> bool {
    let Some(first) = points.first() else {
        return false;
    };
    let extent = points
        .iter()
        .map(|p| (p - first).norm())
        .fold(0.0_f64, f64::max);
    let tolerance = 1e-9 * extent.max(1.0);
    if extent <= tolerance {
        return false;
    }

    let far = points
        .iter()
        .max_by(|a, b| (*a - first).norm().total_cmp(&(*b - first).norm()));
    let Some(far) = far else {
        return false;
    };
    let axis = (far - first).normalize();

    let off_line = |p: &Point3<f64>| (p - first).cross(&axis).norm();
    let Some(side) = points.iter().max_by(|a, b| off_line(a).total_cmp(&off_line(b))) else {
        return false;
    };
    if off_line(side) <= tolerance {
        return false;
    }

    let normal = axis.cross(&(side - first)).normalize();
    points
        .iter()
        .any(|p| normal.dot(&(p - first)).abs() > tolerance)
}

/// Convex hull of a point cloud as an outward-facing solid
///
/// parry3d works in `f32`, so the cloud is checked again after narrowing:
/// points that only differ beyond single precision collapse into a flat set.
pub fn hull_points(points: &[Point3<f64>]) -> Result<Solid, ModelingError> {
    check_budget("hull point count", Some(points.len()), MAX_HULL_POINTS)?;
    if points.iter().any(|p| !p.coords.iter().all(|c| c.is_finite())) {
        return Err(ModelingError::new("hull points must be finite"));
    }
    if points.len() < 4 || !spans_volume(points) {
        return Err(ModelingError::new(
            "hull needs at least four points that are not coplanar",
        ));
    }

    let cloud: Vec<na::Point3<f32>> = points
        .iter()
        .map(|p| na::Point3::new(p.x as f32, p.y as f32, p.z as f32))
        .collect();
    let widen = |p: &na::Point3<f32>| Point3::new(f64::from(p.x), f64::from(p.y), f64::from(p.z));
    let narrowed: Vec<Point3<f64>> = cloud.iter().map(widen).collect();
    if !spans_volume(&narrowed) {
        return Err(ModelingError::new(
            "hull points collapse to a flat set in single precision",
        ));
    }
    let (vertices, triangles) = try_convex_hull(&cloud)?;

    let corners: Vec<Point3<f64>> = vertices.iter().map(widen).collect();
    if corners.is_empty() {
        return Err(ModelingError::new("hull computation produced no vertices"));
    }
    let centroid = Point3::from(
        corners.iter().fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords) / corners.len() as f64,
    );

    Ok(Solid::from_loops(triangles.iter().map(|t| {
        let mut face = vec![
            corners[t[0] as usize],
            corners[t[1] as usize],
            corners[t[2] as usize],
        ];
        let normal = (face[1] - face[0]).cross(&(face[2] - face[0]));
        let middle = Point3::from((face[0].coords + face[1].coords + face[2].coords) / 3.0);
        if normal.dot(&(middle - centroid)) < 0.0 {
            face.reverse();
        }
        face
    })))
}

fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Counter-clockwise convex hull of planar points
pub fn hull_2d(points: &[Point2<f64>]) -> Result<Shape2, ModelingError> {
    check_budget("hull point count", Some(points.len()), MAX_HULL_POINTS)?;
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup_by(|a, b| (*a - *b).norm() <= 1e-12);
    if sorted.len() < 3 {
        return Err(ModelingError::new("hull needs at least three distinct points"));
    }

    let mut lower: Vec<Point2<f64>> = Vec::new();
    for p in &sorted {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<Point2<f64>> = Vec::new();
    for p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);

    if lower.len() < 3 {
        return Err(ModelingError::new("hull points are collinear"));
    }
    Ok(Shape2::new(vec![lower]))
}

/// Hull of several geometries of the same dimension
pub fn hull(geometries: &[Geometry]) -> Result<Geometry, ModelingError> {
    let all_solids = geometries.iter().all(|g| matches!(g, Geometry::Solid(_)));
    let all_shapes = geometries.iter().all(|g| matches!(g, Geometry::Shape(_)));

    if geometries.is_empty() {
        Err(ModelingError::new("hull needs at least one geometry"))
    } else if all_solids {
        let points: Vec<_> = geometries
            .iter()
            .filter_map(|g| match g {
                Geometry::Solid(s) => Some(s.vertices().copied().collect::<Vec<_>>()),
                Geometry::Shape(_) => None,
            })
            .flatten()
            .collect();
        hull_points(&points).map(Geometry::Solid)
    } else if all_shapes {
        let points: Vec<_> = geometries
            .iter()
            .filter_map(|g| match g {
                Geometry::Shape(s) => Some(s.points().copied().collect::<Vec<_>>()),
                Geometry::Solid(_) => None,
            })
            .flatten()
            .collect();
        hull_2d(&points).map(Geometry::Shape)
    } else {
        Err(ModelingError::new("hull cannot mix 2D and 3D geometry"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modeling::primitives::{cuboid, rectangle};
    use crate::modeling::transforms::Transform;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_hull_of_two_cubes() {
        let a = Geometry::Solid(cuboid([1.0, 1.0, 1.0]));
        let b = Transform::Translate(Vector3::new(4.0, 0.0, 0.0)).apply(&a);
        let Geometry::Solid(solid) = hull(&[a, b]).unwrap() else {
            panic!("expected a solid");
        };
        assert_relative_eq!(solid.volume(), 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_coplanar_points_are_rejected() {
        let flat = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        assert!(hull_points(&flat).is_err());
        assert!(hull_points(&flat[..3]).is_err());
    }

    #[test]
    fn test_hull_2d_drops_interior_points() {
        let points = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(1.0, 0.5),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
            Point2::new(1.0, 1.0),
        ];
        let shape = hull_2d(&points).unwrap();
        assert_eq!(shape.outlines[0].len(), 4);
        assert_relative_eq!(shape.area(), 4.0);
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let solid = Geometry::Solid(cuboid([1.0, 1.0, 1.0]));
        let shape = Geometry::Shape(rectangle([1.0, 1.0]).unwrap());
        assert!(hull(&[solid, shape]).is_err());
    }

    #[test]
    fn test_points_lost_to_single_precision_are_rejected() {
        let base = 1.0e7;
        let tiny = [
            Point3::new(base, base, base),
            Point3::new(base + 1e-6, base, base),
            Point3::new(base, base + 1e-6, base),
            Point3::new(base, base, base + 1e-6),
        ];
        let err = hull_points(&tiny).unwrap_err();
        assert!(err.to_string().contains("single precision"), "{}", err);
    }

    #[test]
    fn test_hull_rejects_oversized_and_non_finite_clouds() {
        let mut cloud = vec![Point3::origin(); MAX_HULL_POINTS + 1];
        assert!(hull_points(&cloud).is_err());
        cloud.truncate(3);
        cloud.push(Point3::new(f64::NAN, 0.0, 0.0));
        assert!(hull_points(&cloud).is_err());
    }

    #[test]
    fn test_hull_error_maps_into_modeling_error() {
        let err: ModelingError = ConvexHullError::MissingSupportPoint.into();
        assert!(err.to_string().starts_with("hull computation failed"));
    }
}
