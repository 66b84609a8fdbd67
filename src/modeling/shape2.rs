// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Planar outline shapes

use nalgebra::{Matrix4, Point2, Point3};

/// Set of closed outlines in the XY plane.
///
/// Counter-clockwise outlines are solid, clockwise outlines are holes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape2 {
    pub outlines: Vec<Vec<Point2<f64>>>,
}

/// Shoelace area of one outline, positive when counter-clockwise
pub fn outline_area(outline: &[Point2<f64>]) -> f64 {
    let n = outline.len();
    (0..n)
        .map(|i| {
            let a = &outline[i];
            let b = &outline[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        * 0.5
}

impl Shape2 {
    pub fn new(outlines: Vec<Vec<Point2<f64>>>) -> Self {
        Self {
            outlines: outlines.into_iter().filter(|o| o.len() >= 3).collect(),
        }
    }

    /// Single solid outline, reoriented counter-clockwise
    pub fn from_outline(mut outline: Vec<Point2<f64>>) -> Self {
        if outline_area(&outline) < 0.0 {
            outline.reverse();
        }
        Self::new(vec![outline])
    }

    pub fn is_empty(&self) -> bool {
        self.outlines.is_empty()
    }

    /// Net enclosed area (holes subtract)
    pub fn area(&self) -> f64 {
        self.outlines.iter().map(|o| outline_area(o)).sum()
    }

    pub fn points(&self) -> impl Iterator<Item = &Point2<f64>> {
        self.outlines.iter().flatten()
    }

    pub fn bounds(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        let mut iter = self.points();
        let first = *iter.next()?;
        Some(iter.fold((first, first), |(min, max), p| (min.inf(p), max.sup(p))))
    }

    /// Apply the XY part of an affine transform; mirroring keeps orientation meaning
    pub fn transform(&self, matrix: &Matrix4<f64>) -> Self {
        let mirror = matrix.fixed_view::<2, 2>(0, 0).determinant() < 0.0;
        Self::new(
            self.outlines
                .iter()
                .map(|outline| {
                    let mut moved: Vec<_> = outline
                        .iter()
                        .map(|p| {
                            let q = matrix.transform_point(&Point3::new(p.x, p.y, 0.0));
                            Point2::new(q.x, q.y)
                        })
                        .collect();
                    if mirror {
                        moved.reverse();
                    }
                    moved
                })
                .collect(),
        )
    }

    /// Outlines of both shapes side by side
    pub fn union(&self, other: &Shape2) -> Shape2 {
        let mut outlines = self.outlines.clone();
        outlines.extend(other.outlines.iter().cloned());
        Shape2 { outlines }
    }

    /// The other shape's solid outlines become holes in this one
    pub fn subtract(&self, other: &Shape2) -> Shape2 {
        let mut outlines = self.outlines.clone();
        outlines.extend(other.outlines.iter().map(|o| {
            let mut hole = o.clone();
            hole.reverse();
            hole
        }));
        Shape2 { outlines }
    }

    pub fn solids(&self) -> impl Iterator<Item = &Vec<Point2<f64>>> {
        self.outlines.iter().filter(|o| outline_area(o) > 0.0)
    }

    pub fn holes(&self) -> impl Iterator<Item = &Vec<Point2<f64>>> {
        self.outlines.iter().filter(|o| outline_area(o) < 0.0)
    }
}
