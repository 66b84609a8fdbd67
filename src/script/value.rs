// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Runtime values of the script interpreter

use super::ast::FunctionDef;
use super::interpreter::{Interpreter, ScopeRef};
use super::ScriptError;
use crate::modeling::Geometry;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Longest array a script may build
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Longest string, in bytes, a script may build
pub const MAX_STRING_LENGTH: usize = 1 << 24;

/// Nested arrays deeper than this display as `[array]`; also stops cycles
const MAX_DISPLAY_DEPTH: usize = 64;

pub type NativeFn = fn(&mut Interpreter, Vec<Value>) -> Result<Value, ScriptError>;

/// Host function exposed to scripts
#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[native {}]", self.name)
    }
}

/// Script function together with its defining scope
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub env: ScopeRef,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[function {}]", self.def.name.as_deref().unwrap_or("anonymous"))
    }
}

/// Insertion-ordered property list
#[derive(Debug, Clone, Default)]
pub struct Object {
    entries: Vec<(Rc<str>, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| &**k == key).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| &**k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((Rc::from(key), value)),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.set(key, value);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &Rc<str>> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Function(Rc<Closure>),
    Native(NativeFunction),
    Geometry(Rc<Geometry>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(object: Object) -> Self {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn native(name: &'static str, func: NativeFn) -> Self {
        Value::Native(NativeFunction { name, func })
    }

    pub fn geometry(geometry: Geometry) -> Self {
        Value::Geometry(Rc::new(geometry))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    /// Result of the `typeof` operator
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Geometry(_) => "object",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) => {
                let items = items.borrow();
                match items.as_slice() {
                    [] => 0.0,
                    [single] => single.to_number(),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    /// String conversion as done by `String(value)` and template concatenation
    pub fn to_display(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(_) => self
                .to_display_bounded(MAX_STRING_LENGTH)
                .unwrap_or_else(|| "[array]".into()),
            Value::Object(_) => "[object Object]".into(),
            Value::Function(c) => format!("{:?}", c),
            Value::Native(n) => format!("{:?}", n),
            Value::Geometry(g) => match **g {
                Geometry::Solid(_) => "[geom3]".into(),
                Geometry::Shape(_) => "[geom2]".into(),
            },
        }
    }

    /// Display text, or `None` once it would exceed `limit` bytes or nest too deeply
    pub fn to_display_bounded(&self, limit: usize) -> Option<String> {
        let mut out = String::new();
        self.write_display(&mut out, limit, 0).then_some(out)
    }

    fn write_display(&self, out: &mut String, limit: usize, depth: usize) -> bool {
        match self {
            Value::Array(items) => {
                if depth >= MAX_DISPLAY_DEPTH {
                    return false;
                }
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    if !item.is_nullish() && !item.write_display(out, limit, depth + 1) {
                        return false;
                    }
                    if out.len() > limit {
                        return false;
                    }
                }
            }
            other => out.push_str(&other.to_display()),
        }
        out.len() <= limit
    }

    /// `===`
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.name == b.name,
            (Value::Geometry(a), Value::Geometry(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`, with the usual null/undefined and number coercions
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Number(_), Value::Str(_) | Value::Bool(_))
            | (Value::Str(_) | Value::Bool(_), Value::Number(_))
            | (Value::Bool(_), Value::Str(_))
            | (Value::Str(_), Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_eq(other),
        }
    }

    pub fn as_geometry(&self) -> Option<&Geometry> {
        match self {
            Value::Geometry(g) => Some(g),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Number formatting close to JavaScript's `Number.prototype.toString`
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.into()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(2.25), "2.25");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_coercions() {
        assert_eq!(Value::string(" 12 ").to_number(), 12.0);
        assert!(Value::string("abc").to_number().is_nan());
        assert_eq!(Value::array(vec![Value::Number(4.0)]).to_number(), 4.0);
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(Value::array(Vec::new()).truthy());
        assert_eq!(
            Value::array(vec![Value::Number(1.0), Value::Null, Value::string("a")]).to_display(),
            "1,,a"
        );
    }

    #[test]
    fn test_display_of_cyclic_array_terminates() {
        let cyclic = Value::array(vec![Value::Number(1.0)]);
        if let Value::Array(items) = &cyclic {
            items.borrow_mut().push(cyclic.clone());
        }
        assert_eq!(cyclic.to_display(), "[array]");
        assert!(cyclic.to_display_bounded(1 << 20).is_none());

        let wide = Value::array(vec![Value::string("abcd"); 4]);
        assert_eq!(wide.to_display_bounded(64).as_deref(), Some("abcd,abcd,abcd,abcd"));
        assert!(wide.to_display_bounded(8).is_none());
    }

    #[test]
    fn test_equality() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.strict_eq(&Value::Undefined));
        assert!(Value::string("1").loose_eq(&Value::Number(1.0)));
        assert!(!Value::string("1").strict_eq(&Value::Number(1.0)));
        let shared = Value::array(Vec::new());
        assert!(shared.strict_eq(&shared.clone()));
        assert!(!shared.strict_eq(&Value::array(Vec::new())));
    }

    #[test]
    fn test_object_keeps_insertion_order() {
        let object = Object::new()
            .with("b", Value::Number(1.0))
            .with("a", Value::Number(2.0))
            .with("b", Value::Number(3.0));
        let keys: Vec<_> = object.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(object.get("b").map(Value::to_number), Some(3.0));
    }
}
