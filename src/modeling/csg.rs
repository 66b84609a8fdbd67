// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG (Constructive Solid Geometry) operations using BSP tree
//!
//! Tree building and clipping stop early once the worker's cancel flag is
//! set; the partial result is discarded by the caller.

use super::cancel::is_cancelled;
use super::solid::{Plane, Polygon, Solid};
use crate::utils::math::{lerp_point, EPSILON};

/// Where a polygon ended up relative to a splitting plane
enum Split {
    CoplanarFront(Polygon),
    CoplanarBack(Polygon),
    Front(Polygon),
    Back(Polygon),
    Spanning {
        front: Option<Polygon>,
        back: Option<Polygon>,
    },
}

const COPLANAR: u8 = 0;
const FRONT: u8 = 1;
const BACK: u8 = 2;
const SPANNING: u8 = 3;

fn split_polygon(plane: &Plane, polygon: Polygon) -> Split {
    let types: Vec<u8> = polygon
        .vertices
        .iter()
        .map(|v| {
            let t = plane.distance(v);
            if t < -EPSILON {
                BACK
            } else if t > EPSILON {
                FRONT
            } else {
                COPLANAR
            }
        })
        .collect();
    let polygon_type = types.iter().fold(COPLANAR, |acc, t| acc | t);

    match polygon_type {
        COPLANAR => {
            if plane.normal.dot(&polygon.plane.normal) > 0.0 {
                Split::CoplanarFront(polygon)
            } else {
                Split::CoplanarBack(polygon)
            }
        }
        FRONT => Split::Front(polygon),
        BACK => Split::Back(polygon),
        _ => {
            let n = polygon.vertices.len();
            let mut f = Vec::with_capacity(n + 1);
            let mut b = Vec::with_capacity(n + 1);
            for i in 0..n {
                let j = (i + 1) % n;
                let (ti, tj) = (types[i], types[j]);
                let (vi, vj) = (&polygon.vertices[i], &polygon.vertices[j]);
                if ti != BACK {
                    f.push(*vi);
                }
                if ti != FRONT {
                    b.push(*vi);
                }
                if (ti | tj) == SPANNING {
                    let t = (plane.w - plane.normal.dot(&vi.coords))
                        / plane.normal.dot(&(vj - vi));
                    let v = lerp_point(vi, vj, t);
                    f.push(v);
                    b.push(v);
                }
            }
            let plane = polygon.plane;
            Split::Spanning {
                front: (f.len() >= 3).then(|| Polygon::with_plane(f, plane)),
                back: (b.len() >= 3).then(|| Polygon::with_plane(b, plane)),
            }
        }
    }
}

/// BSP tree node for CSG operations
#[derive(Debug, Clone, Default)]
struct Node {
    plane: Option<Plane>,
    front: Option<Box<Node>>,
    back: Option<Box<Node>>,
    polygons: Vec<Polygon>,
}

impl Node {
    fn new(polygons: Vec<Polygon>) -> Self {
        let mut node = Self::default();
        node.build(polygons);
        node
    }

    fn build(&mut self, polygons: Vec<Polygon>) {
        if polygons.is_empty() || is_cancelled() {
            return;
        }
        let plane = *self.plane.get_or_insert(polygons[0].plane);

        let mut front = Vec::new();
        let mut back = Vec::new();
        for polygon in polygons {
            match split_polygon(&plane, polygon) {
                Split::CoplanarFront(p) | Split::CoplanarBack(p) => self.polygons.push(p),
                Split::Front(p) => front.push(p),
                Split::Back(p) => back.push(p),
                Split::Spanning { front: f, back: b } => {
                    front.extend(f);
                    back.extend(b);
                }
            }
        }

        if !front.is_empty() {
            self.front.get_or_insert_with(Box::default).build(front);
        }
        if !back.is_empty() {
            self.back.get_or_insert_with(Box::default).build(back);
        }
    }

    fn invert(&mut self) {
        for polygon in &mut self.polygons {
            polygon.flip();
        }
        if let Some(plane) = &mut self.plane {
            plane.flip();
        }
        if let Some(front) = &mut self.front {
            front.invert();
        }
        if let Some(back) = &mut self.back {
            back.invert();
        }
        std::mem::swap(&mut self.front, &mut self.back);
    }

    /// Remove the parts of `polygons` that lie inside this tree
    fn clip_polygons(&self, polygons: Vec<Polygon>) -> Vec<Polygon> {
        let Some(plane) = &self.plane else {
            return polygons;
        };
        if is_cancelled() {
            return Vec::new();
        }

        let mut front = Vec::new();
        let mut back = Vec::new();
        for polygon in polygons {
            match split_polygon(plane, polygon) {
                Split::CoplanarFront(p) | Split::Front(p) => front.push(p),
                Split::CoplanarBack(p) | Split::Back(p) => back.push(p),
                Split::Spanning { front: f, back: b } => {
                    front.extend(f);
                    back.extend(b);
                }
            }
        }

        let mut front = match &self.front {
            Some(node) => node.clip_polygons(front),
            None => front,
        };
        if let Some(node) = &self.back {
            front.extend(node.clip_polygons(back));
        }
        front
    }

    fn clip_to(&mut self, other: &Node) {
        self.polygons = other.clip_polygons(std::mem::take(&mut self.polygons));
        if let Some(front) = &mut self.front {
            front.clip_to(other);
        }
        if let Some(back) = &mut self.back {
            back.clip_to(other);
        }
    }

    fn all_polygons(&self) -> Vec<Polygon> {
        let mut result = self.polygons.clone();
        if let Some(front) = &self.front {
            result.extend(front.all_polygons());
        }
        if let Some(back) = &self.back {
            result.extend(back.all_polygons());
        }
        result
    }
}

/// a ∪ b
pub fn union(a: &Solid, b: &Solid) -> Solid {
    if a.is_empty() {
        return b.clone();
    }
    if b.is_empty() {
        return a.clone();
    }
    let mut a = Node::new(a.polygons.clone());
    let mut b = Node::new(b.polygons.clone());

    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.all_polygons());

    Solid::new(a.all_polygons())
}

/// a \ b
pub fn subtract(a: &Solid, b: &Solid) -> Solid {
    if a.is_empty() || b.is_empty() {
        return a.clone();
    }
    let mut a = Node::new(a.polygons.clone());
    let mut b = Node::new(b.polygons.clone());

    a.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.all_polygons());
    a.invert();

    Solid::new(a.all_polygons())
}

/// a ∩ b
pub fn intersect(a: &Solid, b: &Solid) -> Solid {
    if a.is_empty() || b.is_empty() {
        return Solid::default();
    }
    let mut a = Node::new(a.polygons.clone());
    let mut b = Node::new(b.polygons.clone());

    a.invert();
    b.clip_to(&a);
    b.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    a.build(b.all_polygons());
    a.invert();

    Solid::new(a.all_polygons())
}
