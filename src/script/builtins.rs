// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Allow-listed globals: the modeling API, `Math`, `console` and a few
//! conversion helpers

use super::interpreter::{console_log, Interpreter, Scope};
use super::value::{number_to_string, NativeFn, Object, Value};
use super::ScriptError;
use crate::modeling::extrusions::{extrude_linear, extrude_rotate, RotateOptions};
use crate::modeling::primitives::{self, DEFAULT_SEGMENTS, MAX_SEGMENTS};
use crate::modeling::transforms::{centering, Transform};
use crate::modeling::{self, hull, Geometry, ModelingError};
use crate::utils::math::{deg_to_rad, rad_to_deg};
use nalgebra::{Point2, Point3, Vector3};
use std::f64::consts::TAU;

type Result<T> = std::result::Result<T, ScriptError>;

/// Module name accepted by `require`
pub const MODELING_MODULE: &str = "@jscad/modeling";

const PRIMITIVES: &[(&str, NativeFn)] = &[
    ("cuboid", cuboid),
    ("cube", cuboid),
    ("roundedCuboid", rounded_cuboid),
    ("sphere", sphere),
    ("cylinder", cylinder),
    ("roundedCylinder", rounded_cylinder),
    ("torus", torus),
    ("circle", circle),
    ("rectangle", rectangle),
    ("roundedRectangle", rounded_rectangle),
    ("polygon", polygon),
];

const BOOLEANS: &[(&str, NativeFn)] = &[
    ("union", union),
    ("subtract", subtract),
    ("intersect", intersect),
];

const TRANSFORMS: &[(&str, NativeFn)] = &[
    ("translate", translate),
    ("rotate", rotate),
    ("rotateX", rotate_x),
    ("rotateY", rotate_y),
    ("rotateZ", rotate_z),
    ("scale", scale),
    ("mirror", mirror),
    ("mirrorX", mirror_x),
    ("mirrorY", mirror_y),
    ("mirrorZ", mirror_z),
    ("center", center),
];

const EXTRUSIONS: &[(&str, NativeFn)] = &[
    ("extrudeLinear", extrude_linear_native),
    ("extrudeRotate", extrude_rotate_native),
];

const HULLS: &[(&str, NativeFn)] = &[("hull", hull_native)];

const UTILS: &[(&str, NativeFn)] = &[("degToRad", deg_to_rad_native), ("radToDeg", rad_to_deg_native)];

const COLORS: &[(&str, NativeFn)] = &[("colorize", colorize)];

const MEASUREMENTS: &[(&str, NativeFn)] = &[("measureBoundingBox", measure_bounding_box)];

const OBJECT_FUNCTIONS: &[(&str, NativeFn)] = &[
    ("keys", object_keys),
    ("values", object_values),
    ("entries", object_entries),
    ("assign", object_assign),
];

const ARRAY_FUNCTIONS: &[(&str, NativeFn)] = &[("isArray", array_is_array)];

const NAMESPACES: &[(&str, &[(&str, NativeFn)])] = &[
    ("primitives", PRIMITIVES),
    ("booleans", BOOLEANS),
    ("transforms", TRANSFORMS),
    ("extrusions", EXTRUSIONS),
    ("hulls", HULLS),
    ("utils", UTILS),
    ("colors", COLORS),
    ("measurements", MEASUREMENTS),
];

fn table(entries: &[(&'static str, NativeFn)]) -> Object {
    entries
        .iter()
        .fold(Object::new(), |object, &(name, func)| object.with(name, Value::native(name, func)))
}

/// Populate the global scope and return the modeling namespace object
pub fn install(scope: &mut Scope) -> Value {
    let mut library = Object::new();
    for (namespace, entries) in NAMESPACES {
        library.set(namespace, Value::object(table(entries)));
        for &(name, func) in entries.iter() {
            scope.declare(name, Value::native(name, func), false);
        }
    }
    let library = Value::object(library);

    scope.declare("Math", math(), false);
    scope.declare(
        "console",
        Value::object(Object::new().with("log", Value::native("log", console_log_native))),
        false,
    );
    scope.declare("require", Value::native("require", require), false);
    let exports = Value::object(Object::new());
    scope.declare("exports", exports.clone(), false);
    scope.declare("module", Value::object(Object::new().with("exports", exports)), false);
    scope.declare(
        "Object",
        Value::object(table(OBJECT_FUNCTIONS)),
        false,
    );
    scope.declare("Array", Value::object(table(ARRAY_FUNCTIONS)), false);
    scope.declare("Number", Value::native("Number", to_number), false);
    scope.declare("String", Value::native("String", to_string), false);
    scope.declare("parseFloat", Value::native("parseFloat", parse_float), false);
    scope.declare("parseInt", Value::native("parseInt", parse_int), false);
    scope.declare("isNaN", Value::native("isNaN", is_nan), false);
    scope.declare("degToRad", Value::native("degToRad", deg_to_rad_native), false);
    scope.declare("radToDeg", Value::native("radToDeg", rad_to_deg_native), false);
    scope.declare("__safeRoundRadius", Value::native("__safeRoundRadius", safe_round_radius), false);
    library
}

// Argument helpers

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn num(args: &[Value], i: usize) -> f64 {
    arg(args, i).to_number()
}

fn option(options: &Value, key: &str) -> Value {
    match options {
        Value::Object(o) => o.borrow().get(key).cloned().unwrap_or_default(),
        _ => Value::Undefined,
    }
}

fn number_or(value: Value, default: f64, what: &str) -> Result<f64> {
    match value {
        Value::Undefined => Ok(default),
        Value::Number(n) => Ok(n),
        other => Err(ScriptError::Type(format!(
            "{} must be a number, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn segments_or(value: Value, what: &str) -> Result<usize> {
    let n = number_or(value, DEFAULT_SEGMENTS as f64, what)?;
    if !(n.is_finite() && n >= 0.0) {
        return Err(ScriptError::Type(format!("{} must be a non-negative integer", what)));
    }
    if n.round() > MAX_SEGMENTS as f64 {
        return Err(ScriptError::Range(format!(
            "{} must be at most {}, got {}",
            what,
            MAX_SEGMENTS,
            number_to_string(n)
        )));
    }
    Ok(n.round() as usize)
}

/// Fixed-length numeric vector; a bare number fills every component
fn vector<const N: usize>(value: Value, default: [f64; N], what: &str) -> Result<[f64; N]> {
    match value {
        Value::Undefined => Ok(default),
        Value::Number(n) => Ok([n; N]),
        Value::Array(items) => {
            let items = items.borrow();
            if items.len() != N {
                return Err(ScriptError::Type(format!(
                    "{} must have {} components, got {}",
                    what,
                    N,
                    items.len()
                )));
            }
            let mut out = [0.0; N];
            for (slot, item) in out.iter_mut().zip(items.iter()) {
                *slot = number_or(item.clone(), f64::NAN, what)?;
            }
            Ok(out)
        }
        other => Err(ScriptError::Type(format!(
            "{} must be an array, got {}",
            what,
            other.type_name()
        ))),
    }
}

/// Up to three components, missing ones taken from `fill`
fn padded_vector(value: &Value, fill: f64, what: &str) -> Result<Vector3<f64>> {
    match value {
        Value::Number(n) => Ok(Vector3::repeat(*n)),
        Value::Array(items) => {
            let items = items.borrow();
            if items.is_empty() || items.len() > 3 {
                return Err(ScriptError::Type(format!("{} must have 1 to 3 components", what)));
            }
            let mut out = Vector3::repeat(fill);
            for (i, item) in items.iter().enumerate() {
                out[i] = number_or(item.clone(), f64::NAN, what)?;
            }
            Ok(out)
        }
        other => Err(ScriptError::Type(format!(
            "{} must be an array, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn bool_vector(value: Value, what: &str) -> Result<[bool; 3]> {
    match value {
        Value::Undefined => Ok([true; 3]),
        Value::Array(items) => {
            let items = items.borrow();
            let mut out = [false; 3];
            for (slot, item) in out.iter_mut().zip(items.iter()) {
                *slot = item.truthy();
            }
            Ok(out)
        }
        other => Err(ScriptError::Type(format!(
            "{} must be an array of booleans, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn collect_geometries(value: &Value, what: &str, out: &mut Vec<Geometry>) -> Result<()> {
    match value {
        Value::Geometry(g) => {
            out.push((**g).clone());
            Ok(())
        }
        Value::Array(items) => {
            for item in items.borrow().iter() {
                collect_geometries(item, what, out)?;
            }
            Ok(())
        }
        other => Err(ScriptError::Type(format!(
            "{} expects geometries, got {}",
            what,
            other.type_name()
        ))),
    }
}

/// Flattened geometry arguments; at least one is required
fn geometries(args: &[Value], what: &str) -> Result<Vec<Geometry>> {
    let mut out = Vec::new();
    for value in args {
        collect_geometries(value, what, &mut out)?;
    }
    if out.is_empty() {
        return Err(ScriptError::Type(format!("{} expects at least one geometry", what)));
    }
    Ok(out)
}

/// One geometry in, one geometry out; several in, an array out
fn wrap(mut results: Vec<Geometry>) -> Value {
    if results.len() == 1 {
        if let Some(single) = results.pop() {
            return Value::geometry(single);
        }
    }
    Value::array(results.into_iter().map(Value::geometry).collect())
}

fn placed(geometry: Geometry, offset: Vector3<f64>) -> Geometry {
    if offset == Vector3::zeros() {
        geometry
    } else {
        Transform::Translate(offset).apply(&geometry)
    }
}

fn center3(options: &Value) -> Result<Vector3<f64>> {
    Ok(Vector3::from(vector(option(options, "center"), [0.0; 3], "center")?))
}

fn center2(options: &Value) -> Result<Vector3<f64>> {
    let [x, y] = vector(option(options, "center"), [0.0; 2], "center")?;
    Ok(Vector3::new(x, y, 0.0))
}

fn solid(result: std::result::Result<modeling::Solid, ModelingError>) -> Result<Geometry> {
    Ok(Geometry::Solid(result?))
}

fn shape(result: std::result::Result<modeling::Shape2, ModelingError>) -> Result<Geometry> {
    Ok(Geometry::Shape(result?))
}

// Primitives

fn cuboid(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let size = vector(option(&o, "size"), [2.0; 3], "size")?;
    let geometry = solid(primitives::checked_cuboid(size))?;
    Ok(Value::geometry(placed(geometry, center3(&o)?)))
}

fn rounded_cuboid(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let size = vector(option(&o, "size"), [2.0; 3], "size")?;
    let radius = number_or(option(&o, "roundRadius"), 0.2, "roundRadius")?;
    let segments = segments_or(option(&o, "segments"), "segments")?;
    let geometry = solid(primitives::rounded_cuboid(size, radius, segments))?;
    Ok(Value::geometry(placed(geometry, center3(&o)?)))
}

fn sphere(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let radius = number_or(option(&o, "radius"), 1.0, "radius")?;
    let segments = segments_or(option(&o, "segments"), "segments")?;
    let geometry = solid(primitives::sphere(radius, segments))?;
    Ok(Value::geometry(placed(geometry, center3(&o)?)))
}

fn cylinder(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let height = number_or(option(&o, "height"), 2.0, "height")?;
    let radius = number_or(option(&o, "radius"), 1.0, "radius")?;
    let segments = segments_or(option(&o, "segments"), "segments")?;
    let geometry = solid(primitives::cylinder(height, radius, segments))?;
    Ok(Value::geometry(placed(geometry, center3(&o)?)))
}

fn rounded_cylinder(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let height = number_or(option(&o, "height"), 2.0, "height")?;
    let radius = number_or(option(&o, "radius"), 1.0, "radius")?;
    let round_radius = number_or(option(&o, "roundRadius"), 0.2, "roundRadius")?;
    let segments = segments_or(option(&o, "segments"), "segments")?;
    let geometry = solid(primitives::rounded_cylinder(height, radius, round_radius, segments))?;
    Ok(Value::geometry(placed(geometry, center3(&o)?)))
}

fn torus(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let inner = number_or(option(&o, "innerRadius"), 1.0, "innerRadius")?;
    let outer = number_or(option(&o, "outerRadius"), 4.0, "outerRadius")?;
    let inner_segments = segments_or(option(&o, "innerSegments"), "innerSegments")?;
    let outer_segments = segments_or(option(&o, "outerSegments"), "outerSegments")?;
    let geometry = solid(primitives::torus(inner, outer, inner_segments, outer_segments))?;
    Ok(Value::geometry(placed(geometry, center3(&o)?)))
}

fn circle(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let radius = number_or(option(&o, "radius"), 1.0, "radius")?;
    let segments = segments_or(option(&o, "segments"), "segments")?;
    let geometry = shape(primitives::circle(radius, segments))?;
    Ok(Value::geometry(placed(geometry, center2(&o)?)))
}

fn rectangle(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let size = vector(option(&o, "size"), [2.0; 2], "size")?;
    let geometry = shape(primitives::rectangle(size))?;
    Ok(Value::geometry(placed(geometry, center2(&o)?)))
}

fn rounded_rectangle(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let size = vector(option(&o, "size"), [2.0; 2], "size")?;
    let radius = number_or(option(&o, "roundRadius"), 0.2, "roundRadius")?;
    let segments = segments_or(option(&o, "segments"), "segments")?;
    let geometry = shape(primitives::rounded_rectangle(size, radius, segments))?;
    Ok(Value::geometry(placed(geometry, center2(&o)?)))
}

fn polygon(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let points = match option(&o, "points") {
        Value::Array(items) => items
            .borrow()
            .iter()
            .map(|p| vector(p.clone(), [f64::NAN; 2], "point").map(|[x, y]| Point2::new(x, y)))
            .collect::<Result<Vec<_>>>()?,
        other => {
            return Err(ScriptError::Type(format!(
                "polygon points must be an array, got {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::geometry(shape(primitives::polygon(points))?))
}

// Booleans

fn union(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::geometry(modeling::union(&geometries(&args, "union")?)?))
}

fn subtract(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::geometry(modeling::subtract(&geometries(&args, "subtract")?)?))
}

fn intersect(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::geometry(modeling::intersect(&geometries(&args, "intersect")?)?))
}

// Transforms

fn apply_all(transform: &Transform, args: &[Value], what: &str) -> Result<Value> {
    Ok(wrap(
        geometries(args, what)?
            .iter()
            .map(|g| transform.apply(g))
            .collect(),
    ))
}

fn rest(args: &[Value]) -> &[Value] {
    args.get(1..).unwrap_or_default()
}

fn translate(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let offset = padded_vector(&arg(&args, 0), 0.0, "translate offset")?;
    apply_all(&Transform::Translate(offset), rest(&args), "translate")
}

fn rotate(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let angles = padded_vector(&arg(&args, 0), 0.0, "rotate angles")?;
    apply_all(&Transform::Rotate(angles), rest(&args), "rotate")
}

fn rotate_axis(args: &[Value], axis: usize, what: &str) -> Result<Value> {
    let mut angles = Vector3::zeros();
    angles[axis] = number_or(arg(args, 0), 0.0, "angle")?;
    apply_all(&Transform::Rotate(angles), rest(args), what)
}

fn rotate_x(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    rotate_axis(&args, 0, "rotateX")
}

fn rotate_y(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    rotate_axis(&args, 1, "rotateY")
}

fn rotate_z(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    rotate_axis(&args, 2, "rotateZ")
}

fn scale(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let factors = padded_vector(&arg(&args, 0), 1.0, "scale factors")?;
    apply_all(&Transform::Scale(factors), rest(&args), "scale")
}

fn mirror(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let normal = vector(option(&o, "normal"), [0.0, 0.0, 1.0], "normal")?;
    let origin = vector(option(&o, "origin"), [0.0; 3], "origin")?;
    let transform = Transform::Mirror {
        origin: Point3::from(origin),
        normal: Vector3::from(normal),
    };
    apply_all(&transform, rest(&args), "mirror")
}

fn mirror_axis(args: &[Value], normal: Vector3<f64>, what: &str) -> Result<Value> {
    let transform = Transform::Mirror {
        origin: Point3::origin(),
        normal,
    };
    apply_all(&transform, args, what)
}

fn mirror_x(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    mirror_axis(&args, Vector3::x(), "mirrorX")
}

fn mirror_y(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    mirror_axis(&args, Vector3::y(), "mirrorY")
}

fn mirror_z(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    mirror_axis(&args, Vector3::z(), "mirrorZ")
}

fn center(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    // options may be left out entirely
    let (o, targets) = match args.first() {
        Some(Value::Object(_)) => (arg(&args, 0), rest(&args)),
        _ => (Value::Undefined, &args[..]),
    };
    let axes = bool_vector(option(&o, "axes"), "axes")?;
    let relative_to = Point3::from(vector(option(&o, "relativeTo"), [0.0; 3], "relativeTo")?);
    Ok(wrap(
        geometries(targets, "center")?
            .iter()
            .map(|g| centering(g, axes, relative_to).apply(g))
            .collect(),
    ))
}

// Extrusions and hulls

fn shapes(args: &[Value], what: &str) -> Result<Vec<modeling::Shape2>> {
    geometries(args, what)?
        .into_iter()
        .map(|g| match g {
            Geometry::Shape(s) => Ok(s),
            Geometry::Solid(_) => Err(ScriptError::Type(format!("{} expects 2D shapes", what))),
        })
        .collect()
}

fn extrude_linear_native(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let height = number_or(option(&o, "height"), 1.0, "height")?;
    let solids = shapes(rest(&args), "extrudeLinear")?
        .iter()
        .map(|s| extrude_linear(s, height).map(Geometry::Solid))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(wrap(solids))
}

fn extrude_rotate_native(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let o = arg(&args, 0);
    let options = RotateOptions {
        angle: number_or(option(&o, "angle"), TAU, "angle")?,
        start_angle: number_or(option(&o, "startAngle"), 0.0, "startAngle")?,
        segments: segments_or(option(&o, "segments"), "segments")?,
    };
    let solids = shapes(rest(&args), "extrudeRotate")?
        .iter()
        .map(|s| extrude_rotate(s, &options).map(Geometry::Solid))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(wrap(solids))
}

fn hull_native(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::geometry(hull::hull(&geometries(&args, "hull")?)?))
}

fn colorize(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(wrap(geometries(rest(&args), "colorize")?))
}

fn bounding_box_value(geometry: &Geometry) -> Value {
    let (min, max) = geometry
        .bounds()
        .unwrap_or((Point3::origin(), Point3::origin()));
    let corner = |p: Point3<f64>| Value::array(vec![p.x.into(), p.y.into(), p.z.into()]);
    Value::array(vec![corner(min), corner(max)])
}

fn measure_bounding_box(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let all = geometries(&args, "measureBoundingBox")?;
    Ok(match all.as_slice() {
        [single] => bounding_box_value(single),
        many => Value::array(many.iter().map(bounding_box_value).collect()),
    })
}

fn deg_to_rad_native(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Number(deg_to_rad(num(&args, 0))))
}

fn rad_to_deg_native(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Number(rad_to_deg(num(&args, 0))))
}

/// Lower bound `__safeRoundRadius` applies to any requested radius
pub const MIN_ROUND_RADIUS: f64 = 0.5;

/// Largest safe radius as a fraction of the smallest size component
pub const MAX_RADIUS_FRACTION: f64 = 0.45;

/// `min(max(radius, 0.5), 0.45 × smallest size)`
pub fn safe_round_radius_value(size: &[f64], radius: f64) -> f64 {
    let smallest = size.iter().copied().fold(f64::INFINITY, f64::min);
    radius.max(MIN_ROUND_RADIUS).min(MAX_RADIUS_FRACTION * smallest)
}

fn safe_round_radius(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let size: Vec<f64> = match arg(&args, 0) {
        Value::Array(items) => items.borrow().iter().map(Value::to_number).collect(),
        other => vec![other.to_number()],
    };
    Ok(Value::Number(safe_round_radius_value(&size, num(&args, 1))))
}

// Math and conversions

macro_rules! math_functions {
    ($($name:literal => $f:expr),* $(,)?) => {
        [$(($name, Value::native($name, |_, args| Ok(Value::Number(($f)(num(&args, 0), num(&args, 1))))))),*]
    };
}

fn js_round(x: f64) -> f64 {
    (x + 0.5).floor()
}

fn js_sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 {
        x
    } else {
        x.signum()
    }
}

fn math() -> Value {
    let functions = math_functions![
        "abs" => |x: f64, _| x.abs(),
        "floor" => |x: f64, _| x.floor(),
        "ceil" => |x: f64, _| x.ceil(),
        "round" => |x: f64, _| js_round(x),
        "sqrt" => |x: f64, _| x.sqrt(),
        "pow" => |x: f64, y: f64| x.powf(y),
        "sin" => |x: f64, _| x.sin(),
        "cos" => |x: f64, _| x.cos(),
        "tan" => |x: f64, _| x.tan(),
        "asin" => |x: f64, _| x.asin(),
        "acos" => |x: f64, _| x.acos(),
        "atan" => |x: f64, _| x.atan(),
        "atan2" => |y: f64, x: f64| y.atan2(x),
        "sign" => |x: f64, _| js_sign(x),
        "trunc" => |x: f64, _| x.trunc(),
        "log" => |x: f64, _| x.ln(),
        "exp" => |x: f64, _| x.exp(),
    ];
    let object = functions
        .into_iter()
        .fold(Object::new(), |object, (name, f)| object.with(name, f))
        .with("PI", Value::Number(std::f64::consts::PI))
        .with("E", Value::Number(std::f64::consts::E))
        .with("min", Value::native("min", math_min))
        .with("max", Value::native("max", math_max))
        .with("hypot", Value::native("hypot", math_hypot));
    Value::object(object)
}

fn math_min(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Number(args.iter().map(Value::to_number).fold(f64::INFINITY, |a, b| {
        if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) }
    })))
}

fn math_max(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Number(args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, |a, b| {
        if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) }
    })))
}

fn math_hypot(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Number(args.iter().map(|v| v.to_number().powi(2)).sum::<f64>().sqrt()))
}

fn console_log_native(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    console_log(&args);
    Ok(Value::Undefined)
}

fn require(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    match arg(&args, 0) {
        Value::Str(name) if &*name == MODELING_MODULE => Ok(interp.library()),
        other => Err(ScriptError::Reference(format!(
            "module '{}' is not available",
            other.to_display()
        ))),
    }
}

fn object_pairs(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(o) => o.borrow().iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        Value::Array(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

fn object_keys(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::array(
        object_pairs(&arg(&args, 0)).into_iter().map(|(k, _)| Value::string(&k)).collect(),
    ))
}

fn object_values(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::array(object_pairs(&arg(&args, 0)).into_iter().map(|(_, v)| v).collect()))
}

fn object_entries(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::array(
        object_pairs(&arg(&args, 0))
            .into_iter()
            .map(|(k, v)| Value::array(vec![Value::string(&k), v]))
            .collect(),
    ))
}

fn object_assign(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let target = arg(&args, 0);
    let Value::Object(object) = &target else {
        return Err(ScriptError::Type("Object.assign target must be an object".into()));
    };
    for source in rest(&args) {
        for (key, value) in object_pairs(source) {
            object.borrow_mut().set(&key, value);
        }
    }
    Ok(target)
}

fn array_is_array(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_))))
}

fn to_number(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Number(if args.is_empty() { 0.0 } else { num(&args, 0) }))
}

fn to_string(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::string(&if args.is_empty() {
        String::new()
    } else {
        arg(&args, 0).to_display()
    }))
}

/// Longest numeric prefix, as `parseFloat` reads it
fn numeric_prefix(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits = |from: usize| {
        bytes
            .get(from..)
            .map_or(0, |tail| tail.iter().take_while(|b| b.is_ascii_digit()).count())
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let integer = digits(end);
    end += integer;
    let mut fraction = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction = digits(end + 1);
        end += 1 + fraction;
    }
    if integer + fraction == 0 {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent_start = end + 1;
        if matches!(bytes.get(exponent_start), Some(b'+' | b'-')) {
            exponent_start += 1;
        }
        let exponent = digits(exponent_start);
        if exponent > 0 {
            end = exponent_start + exponent;
        }
    }
    text[..end].parse().unwrap_or(f64::NAN)
}

fn parse_float(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Number(numeric_prefix(&arg(&args, 0).to_display())))
}

fn parse_int(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let text = arg(&args, 0).to_display();
    let text = text.trim();
    let radix = match arg(&args, 1) {
        Value::Undefined => 10,
        other => other.to_number() as u32,
    };
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let digits: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
    Ok(Value::Number(match i64::from_str_radix(&digits, radix) {
        Ok(n) if negative => -(n as f64),
        Ok(n) => n as f64,
        Err(_) => f64::NAN,
    }))
}

fn is_nan(_: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(num(&args, 0).is_nan()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::interpreter::InterpreterOptions;
    use approx::assert_relative_eq;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn run_main(source: &str) -> Result<Value> {
        let mut interp = Interpreter::new(InterpreterOptions::default(), Arc::new(AtomicBool::new(false)));
        interp.run(source)?;
        let main = interp
            .entry_point("main")
            .ok_or_else(|| ScriptError::Reference("main is not defined".into()))?;
        interp.call(&main, Vec::new())
    }

    fn solid_volume(value: &Value) -> f64 {
        match value.as_geometry() {
            Some(Geometry::Solid(s)) => s.volume(),
            other => panic!("expected a solid, got {:?}", other),
        }
    }

    #[test]
    fn test_safe_round_radius() {
        assert_relative_eq!(safe_round_radius_value(&[20.0, 20.0, 5.0], 10.0), 2.25);
        assert_relative_eq!(safe_round_radius_value(&[20.0, 20.0, 20.0], 0.1), 0.5);
        assert_relative_eq!(safe_round_radius_value(&[20.0, 20.0, 20.0], 3.0), 3.0);
    }

    #[test]
    fn test_require_and_namespaces() {
        let value = run_main(
            r#"
            const { primitives, booleans, transforms } = require('@jscad/modeling')
            const { cuboid } = primitives
            function main() {
              const a = cuboid({ size: [2, 2, 2] })
              const b = transforms.translate([1, 0, 0], cuboid({ size: [2, 2, 2] }))
              return booleans.union(a, b)
            }
            "#,
        )
        .unwrap();
        assert_relative_eq!(solid_volume(&value), 12.0, epsilon = 1e-6);
    }

    #[test]
    fn test_globals_and_center_option() {
        let value = run_main(
            "function main() { return cuboid({ size: [2, 4, 6], center: [0, 0, 3] }) }",
        )
        .unwrap();
        let (min, max) = value.as_geometry().and_then(Geometry::bounds).unwrap();
        assert_relative_eq!(min, Point3::new(-1.0, -2.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(max, Point3::new(1.0, 2.0, 6.0), epsilon = 1e-9);
    }

    #[test]
    fn test_multiple_inputs_return_array() {
        let value = run_main(
            "function main() { return translate([0, 0, 1], cuboid(), sphere({ segments: 8 })) }",
        )
        .unwrap();
        let Value::Array(items) = value else {
            panic!("expected an array");
        };
        assert_eq!(items.borrow().len(), 2);
    }

    #[test]
    fn test_extrude_and_measure() {
        let value = run_main(
            r#"
            function main() {
              const ring = subtract(circle({ radius: 5 }), circle({ radius: 3 }))
              const body = extrudeLinear({ height: 2 }, rectangle({ size: [4, 6] }))
              const box = measureBoundingBox(body)
              return [box[1][2], Math.max(1, 4, 2), Math.round(2.5), ring ? 1 : 0]
            }
            "#,
        )
        .unwrap();
        let Value::Array(items) = value else {
            panic!("expected an array");
        };
        let numbers: Vec<f64> = items.borrow().iter().map(Value::to_number).collect();
        assert_relative_eq!(numbers[0], 2.0, epsilon = 1e-6);
        assert_eq!(&numbers[1..], &[4.0, 3.0, 1.0]);
    }

    #[test]
    fn test_modeling_errors_surface() {
        let error = run_main("function main() { return roundedCuboid({ size: [20, 20, 5], roundRadius: 10 }) }")
            .unwrap_err();
        assert!(matches!(error, ScriptError::Modeling(_)));
        assert!(matches!(
            run_main("function main() { return union(1, 2) }"),
            Err(ScriptError::Type(_))
        ));
        assert!(matches!(
            run_main("const fs = require('fs')\nfunction main() { return cuboid() }"),
            Err(ScriptError::Reference(_))
        ));
    }

    #[test]
    fn test_conversions() {
        let value = run_main(
            "function main() { return [parseFloat('2.5mm'), parseInt('42px'), Number('7'), String(3), isNaN('x'), degToRad(180)] }",
        )
        .unwrap();
        let Value::Array(items) = value else {
            panic!("expected an array");
        };
        let items = items.borrow();
        assert_eq!(items[0].to_number(), 2.5);
        assert_eq!(items[1].to_number(), 42.0);
        assert_eq!(items[2].to_number(), 7.0);
        assert_eq!(items[3].to_display(), "3");
        assert!(items[4].truthy());
        assert_relative_eq!(items[5].to_number(), std::f64::consts::PI);
    }

    #[test]
    fn test_segment_counts_are_bounded() {
        for script in [
            "function main() { return cylinder({ segments: 1e13 }) }",
            "function main() { return torus({ outerSegments: 2048 }) }",
            "function main() { return circle({ segments: Infinity }) }",
        ] {
            assert!(run_main(script).is_err(), "{}", script);
        }
        let err = run_main("function main() { return cylinder({ segments: 1e13 }) }").unwrap_err();
        assert!(matches!(err, ScriptError::Range(_)), "{:?}", err);
        assert!(run_main("function main() { return cylinder({ segments: 1024 }) }").is_ok());
    }
}
