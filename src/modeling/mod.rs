// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Modeling library exposed to scripts: primitives, booleans, transforms,
//! extrusions and hulls over polygon solids and outline shapes

pub mod cancel;
pub mod csg;
pub mod extrusions;
pub mod hull;
pub mod primitives;
pub mod shape2;
pub mod solid;
pub mod transforms;

pub use shape2::Shape2;
pub use solid::{Plane, Polygon, Solid};
pub use transforms::Transform;

use nalgebra::Point3;
use thiserror::Error;

/// Invalid arguments or unsupported combinations in a modeling call
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct ModelingError(String);

impl ModelingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Most polygons a single modeling call may generate
pub const MAX_POLYGONS: usize = 1 << 20;
/// Most vertices a single modeling call may generate or take in
pub const MAX_POINTS: usize = 1 << 22;

/// Reject counts above `limit` before anything is allocated for them
pub(crate) fn check_budget(what: &str, count: Option<usize>, limit: usize) -> Result<usize, ModelingError> {
    match count {
        Some(n) if n <= limit => Ok(n),
        Some(n) => Err(ModelingError::new(format!(
            "{} {} exceeds the limit of {}",
            what, n, limit
        ))),
        None => Err(ModelingError::new(format!("{} exceeds the limit of {}", what, limit))),
    }
}

/// Anything a modeling call can produce
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Solid(Solid),
    Shape(Shape2),
}

impl Geometry {
    pub fn is_solid(&self) -> bool {
        matches!(self, Geometry::Solid(_))
    }

    /// Bounds in 3D; shapes sit at z = 0
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        match self {
            Geometry::Solid(solid) => solid.bounds(),
            Geometry::Shape(shape) => shape
                .bounds()
                .map(|(min, max)| (Point3::new(min.x, min.y, 0.0), Point3::new(max.x, max.y, 0.0))),
        }
    }
}

enum Operands<'a> {
    Solids(Vec<&'a Solid>),
    Shapes(Vec<&'a Shape2>),
}

fn split_operands<'a>(operation: &str, geometries: &'a [Geometry]) -> Result<Operands<'a>, ModelingError> {
    if geometries.is_empty() {
        return Err(ModelingError::new(format!("{} needs at least one geometry", operation)));
    }
    if geometries.iter().all(Geometry::is_solid) {
        Ok(Operands::Solids(
            geometries
                .iter()
                .filter_map(|g| match g {
                    Geometry::Solid(s) => Some(s),
                    Geometry::Shape(_) => None,
                })
                .collect(),
        ))
    } else if geometries.iter().all(|g| !g.is_solid()) {
        Ok(Operands::Shapes(
            geometries
                .iter()
                .filter_map(|g| match g {
                    Geometry::Shape(s) => Some(s),
                    Geometry::Solid(_) => None,
                })
                .collect(),
        ))
    } else {
        Err(ModelingError::new(format!("{} cannot mix 2D and 3D geometry", operation)))
    }
}

/// Union of every operand
pub fn union(geometries: &[Geometry]) -> Result<Geometry, ModelingError> {
    Ok(match split_operands("union", geometries)? {
        Operands::Solids(solids) => Geometry::Solid(
            solids
                .into_iter()
                .fold(Solid::default(), |acc, s| csg::union(&acc, s)),
        ),
        Operands::Shapes(shapes) => Geometry::Shape(
            shapes
                .into_iter()
                .fold(Shape2::default(), |acc, s| acc.union(s)),
        ),
    })
}

/// First operand minus all the others
pub fn subtract(geometries: &[Geometry]) -> Result<Geometry, ModelingError> {
    Ok(match split_operands("subtract", geometries)? {
        Operands::Solids(solids) => {
            let (first, rest) = solids.split_first().ok_or_else(|| ModelingError::new("subtract needs a geometry"))?;
            Geometry::Solid(rest.iter().fold((*first).clone(), |acc, s| csg::subtract(&acc, s)))
        }
        Operands::Shapes(shapes) => {
            let (first, rest) = shapes.split_first().ok_or_else(|| ModelingError::new("subtract needs a geometry"))?;
            Geometry::Shape(rest.iter().fold((*first).clone(), |acc, s| acc.subtract(s)))
        }
    })
}

/// Volume shared by every operand; solids only
pub fn intersect(geometries: &[Geometry]) -> Result<Geometry, ModelingError> {
    match split_operands("intersect", geometries)? {
        Operands::Solids(solids) => {
            let (first, rest) = solids.split_first().ok_or_else(|| ModelingError::new("intersect needs a geometry"))?;
            Ok(Geometry::Solid(rest.iter().fold((*first).clone(), |acc, s| csg::intersect(&acc, s))))
        }
        Operands::Shapes(_) => Err(ModelingError::new("intersect is not supported for 2D shapes")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::{cuboid, rectangle};

    #[test]
    fn test_union_of_shapes_concatenates_outlines() {
        let a = Geometry::Shape(rectangle([1.0, 1.0]).unwrap());
        let b = Geometry::Shape(rectangle([2.0, 2.0]).unwrap());
        let Geometry::Shape(shape) = union(&[a, b]).unwrap() else {
            panic!("expected a shape");
        };
        assert_eq!(shape.outlines.len(), 2);
    }

    #[test]
    fn test_mixed_and_2d_intersect_rejected() {
        let solid = Geometry::Solid(cuboid([1.0, 1.0, 1.0]));
        let shape = Geometry::Shape(rectangle([1.0, 1.0]).unwrap());
        assert!(union(&[solid.clone(), shape.clone()]).is_err());
        assert!(intersect(&[shape.clone(), shape]).is_err());
        assert!(subtract(&[]).is_err());
        assert!(intersect(&[solid]).is_ok());
    }
}
