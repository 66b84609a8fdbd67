// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Tree-walking interpreter with an allow-listed global scope

use super::ast::{
    AssignOp, BinaryOp, Expr, FunctionBody, FunctionDef, Item, LogicalOp, Param, Pattern, Property,
    PropertyKey, Stmt, UnaryOp,
};
use super::builtins;
use super::parser::parse_program;
use super::value::{number_to_string, Closure, Object, Value, MAX_ARRAY_LENGTH, MAX_STRING_LENGTH};
use super::ScriptError;
use ahash::AHashMap;
use log::debug;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Result<T> = std::result::Result<T, ScriptError>;

pub type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// Lexical scope; lookups walk the parent chain
#[derive(Debug, Default)]
pub struct Scope {
    vars: AHashMap<String, Binding>,
    parent: Option<ScopeRef>,
}

impl Scope {
    pub fn declare(&mut self, name: &str, value: Value, mutable: bool) {
        self.vars.insert(name.to_string(), Binding { value, mutable });
    }

    fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let s = s.borrow();
            if let Some(binding) = s.vars.get(name) {
                return Some(binding.value.clone());
            }
            current = s.parent.clone();
        }
        None
    }

    fn assign(scope: &ScopeRef, name: &str, value: Value) -> Result<()> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let mut s = s.borrow_mut();
            if let Some(binding) = s.vars.get_mut(name) {
                if !binding.mutable {
                    return Err(ScriptError::Type(format!(
                        "assignment to constant variable '{}'",
                        name
                    )));
                }
                binding.value = value;
                return Ok(());
            }
            current = s.parent.clone();
        }
        Err(ScriptError::Reference(format!("{} is not defined", name)))
    }
}

/// Outcome of executing a statement
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterOptions {
    pub max_call_depth: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self { max_call_depth: 256 }
    }
}

/// Resolved assignment target
enum Place {
    Var(String),
    Property(Value, Rc<str>),
    Element(Value, Value),
}

pub struct Interpreter {
    globals: ScopeRef,
    /// Every scope created so far, so that closure cycles can be broken on drop
    scopes: Vec<Weak<RefCell<Scope>>>,
    prune_at: usize,
    depth: usize,
    options: InterpreterOptions,
    cancel: Arc<AtomicBool>,
    library: Value,
}

impl Interpreter {
    pub fn new(options: InterpreterOptions, cancel: Arc<AtomicBool>) -> Self {
        let globals: ScopeRef = Rc::new(RefCell::new(Scope::default()));
        let library = builtins::install(&mut globals.borrow_mut());
        Self {
            scopes: vec![Rc::downgrade(&globals)],
            globals,
            prune_at: 1024,
            depth: 0,
            options,
            cancel,
            library,
        }
    }

    /// Namespace object returned by `require('@jscad/modeling')`
    pub fn library(&self) -> Value {
        self.library.clone()
    }

    /// Parse and execute top-level statements in the global scope
    pub fn run(&mut self, source: &str) -> Result<()> {
        let program = parse_program(source)?;
        let globals = self.globals.clone();
        self.exec_block(&program, &globals)?;
        Ok(())
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        Scope::lookup(&self.globals, name)
    }

    /// Function named `name`, declared globally or exported through `module.exports`
    pub fn entry_point(&self, name: &str) -> Option<Value> {
        if let Some(exports) = self
            .global("module")
            .and_then(|module| property_of(&module, "exports"))
        {
            if let Value::Object(object) = &exports {
                if let Some(f) = object.borrow().get(name).filter(|f| f.is_callable()) {
                    return Some(f.clone());
                }
            } else if exports.is_callable() && name == "main" {
                return Some(exports);
            }
        }
        self.global(name).filter(Value::is_callable)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(ScriptError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn new_scope(&mut self, parent: &ScopeRef) -> ScopeRef {
        let scope = Rc::new(RefCell::new(Scope {
            vars: AHashMap::new(),
            parent: Some(parent.clone()),
        }));
        if self.scopes.len() >= self.prune_at {
            self.scopes.retain(|s| s.strong_count() > 0);
            self.prune_at = (self.scopes.len() * 2).max(1024);
        }
        self.scopes.push(Rc::downgrade(&scope));
        scope
    }

    fn closure(&self, def: &Rc<FunctionDef>, scope: &ScopeRef) -> Value {
        Value::Function(Rc::new(Closure {
            def: def.clone(),
            env: scope.clone(),
        }))
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> Result<Flow> {
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    let f = self.closure(def, scope);
                    scope.borrow_mut().declare(name, f, true);
                }
            }
        }
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    /// Loop body outcome: `Some` stops the loop with that flow
    fn loop_flow(flow: Flow) -> Option<Flow> {
        match flow {
            Flow::Break => Some(Flow::Normal),
            Flow::Return(v) => Some(Flow::Return(v)),
            Flow::Normal | Flow::Continue => None,
        }
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Result<Flow> {
        self.check_cancelled()?;
        match stmt {
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
            Stmt::Var { kind, declarators } => {
                for (pattern, init) in declarators {
                    let value = match init {
                        Some(expr) => self.eval(expr, scope)?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(pattern, value, scope, kind.is_mutable())?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => Ok(Flow::Return(match value {
                Some(expr) => self.eval(expr, scope)?,
                None => Value::Undefined,
            })),
            Stmt::If {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition, scope)?.truthy() {
                    self.exec_stmt(then, scope)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::For {
                init,
                condition,
                update,
                body,
            } => {
                let loop_scope = self.new_scope(scope);
                if let Some(init) = init {
                    self.exec_stmt(init, &loop_scope)?;
                }
                loop {
                    self.check_cancelled()?;
                    if let Some(condition) = condition {
                        if !self.eval(condition, &loop_scope)?.truthy() {
                            break;
                        }
                    }
                    let flow = self.exec_stmt(body, &loop_scope)?;
                    if let Some(flow) = Self::loop_flow(flow) {
                        return Ok(flow);
                    }
                    if let Some(update) = update {
                        self.eval(update, &loop_scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForOf {
                kind,
                pattern,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable, scope)? {
                    Value::Array(items) => items.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::string(&c.to_string())).collect(),
                    other => {
                        return Err(ScriptError::Type(format!(
                            "{} is not iterable",
                            other.type_name()
                        )))
                    }
                };
                for item in items {
                    self.check_cancelled()?;
                    let iteration = self.new_scope(scope);
                    self.bind_pattern(pattern, item, &iteration, kind.is_mutable())?;
                    let flow = self.exec_stmt(body, &iteration)?;
                    if let Some(flow) = Self::loop_flow(flow) {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::While { condition, body } => {
                loop {
                    self.check_cancelled()?;
                    if !self.eval(condition, scope)?.truthy() {
                        break;
                    }
                    let flow = self.exec_stmt(body, scope)?;
                    if let Some(flow) = Self::loop_flow(flow) {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Block(stmts) => {
                let inner = self.new_scope(scope);
                self.exec_block(stmts, &inner)
            }
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn bind_pattern(&mut self, pattern: &Pattern, value: Value, scope: &ScopeRef, mutable: bool) -> Result<()> {
        match pattern {
            Pattern::Ident(name) => {
                scope.borrow_mut().declare(name, value, mutable);
                Ok(())
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(ScriptError::Type(format!(
                        "cannot destructure '{}'",
                        value.to_display()
                    )));
                }
                for prop in props {
                    let mut item = self.get_property(&value, &prop.key)?;
                    if let (Value::Undefined, Some(default)) = (&item, &prop.default) {
                        item = self.eval(default, scope)?;
                    }
                    self.bind_pattern(&prop.target, item, scope, mutable)?;
                }
                if let Some(rest) = rest {
                    let mut remaining = Object::new();
                    if let Value::Object(object) = &value {
                        for (key, item) in object.borrow().iter() {
                            if !props.iter().any(|p| *p.key == **key) {
                                remaining.set(key, item.clone());
                            }
                        }
                    }
                    scope.borrow_mut().declare(rest, Value::object(remaining), mutable);
                }
                Ok(())
            }
            Pattern::Array { elements, rest } => {
                let items = match &value {
                    Value::Array(items) => items.borrow().clone(),
                    other => {
                        return Err(ScriptError::Type(format!(
                            "{} is not iterable",
                            other.type_name()
                        )))
                    }
                };
                for (i, (target, default)) in elements.iter().enumerate() {
                    let mut item = items.get(i).cloned().unwrap_or_default();
                    if let (Value::Undefined, Some(default)) = (&item, default) {
                        item = self.eval(default, scope)?;
                    }
                    self.bind_pattern(target, item, scope, mutable)?;
                }
                if let Some(rest) = rest {
                    let tail = items.get(elements.len()..).unwrap_or_default().to_vec();
                    scope.borrow_mut().declare(rest, Value::array(tail), mutable);
                }
                Ok(())
            }
        }
    }

    fn eval_items(&mut self, items: &[Item], scope: &ScopeRef) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Item::Expr(expr) => values.push(self.eval(expr, scope)?),
                Item::Spread(expr) => match self.eval(expr, scope)? {
                    Value::Array(spread) => {
                        check_length(values.len().saturating_add(spread.borrow().len()))?;
                        values.extend(spread.borrow().iter().cloned());
                    }
                    Value::Str(s) => values.extend(s.chars().map(|c| Value::string(&c.to_string()))),
                    other => {
                        return Err(ScriptError::Type(format!(
                            "{} is not iterable",
                            other.type_name()
                        )))
                    }
                },
            }
        }
        Ok(values)
    }

    pub fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Ident(name) => Scope::lookup(scope, name)
                .ok_or_else(|| ScriptError::Reference(format!("{} is not defined", name))),
            Expr::Array(items) => Ok(Value::array(self.eval_items(items, scope)?)),
            Expr::Object(props) => {
                let mut object = Object::new();
                for prop in props {
                    match prop {
                        Property::Entry(key, value) => {
                            let key = match key {
                                PropertyKey::Static(k) => k.to_string(),
                                PropertyKey::Computed(e) => self.eval(e, scope)?.to_display(),
                            };
                            let value = self.eval(value, scope)?;
                            object.set(&key, value);
                        }
                        Property::Spread(e) => match self.eval(e, scope)? {
                            Value::Object(source) => {
                                for (k, v) in source.borrow().iter() {
                                    object.set(k, v.clone());
                                }
                            }
                            Value::Array(source) => {
                                for (i, v) in source.borrow().iter().enumerate() {
                                    object.set(&i.to_string(), v.clone());
                                }
                            }
                            _ => {}
                        },
                    }
                }
                Ok(Value::object(object))
            }
            Expr::Function(def) => Ok(self.closure(def, scope)),
            Expr::Unary(op, operand) => {
                if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, &**operand) {
                    let value = Scope::lookup(scope, name).unwrap_or_default();
                    return Ok(Value::string(value.type_name()));
                }
                let value = self.eval(operand, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::string(value.type_name()),
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs, scope)?;
                let rhs = self.eval(rhs, scope)?;
                binary(*op, &lhs, &rhs)
            }
            Expr::Logical(op, lhs, rhs) => {
                let lhs = self.eval(lhs, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !lhs.truthy(),
                    LogicalOp::Or => lhs.truthy(),
                    LogicalOp::Nullish => !lhs.is_nullish(),
                };
                if short_circuit {
                    Ok(lhs)
                } else {
                    self.eval(rhs, scope)
                }
            }
            Expr::Conditional(test, yes, no) => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(yes, scope)
                } else {
                    self.eval(no, scope)
                }
            }
            Expr::Assign(op, target, value) => {
                let place = self.resolve_place(target, scope)?;
                let value = match op {
                    AssignOp::Assign => self.eval(value, scope)?,
                    AssignOp::Compound(op) => {
                        let current = self.read_place(&place, scope)?;
                        let rhs = self.eval(value, scope)?;
                        binary(*op, &current, &rhs)?
                    }
                };
                self.write_place(place, value.clone(), scope)?;
                Ok(value)
            }
            Expr::Update(target, delta) => {
                let place = self.resolve_place(target, scope)?;
                let old = self.read_place(&place, scope)?.to_number();
                self.write_place(place, Value::Number(old + delta), scope)?;
                Ok(Value::Number(old))
            }
            Expr::Call(callee, args) => match &**callee {
                Expr::Member(object, name) => {
                    let receiver = self.eval(object, scope)?;
                    let args = self.eval_items(args, scope)?;
                    self.call_method(receiver, name, args)
                }
                Expr::Index(object, key) => {
                    let receiver = self.eval(object, scope)?;
                    let key = self.eval(key, scope)?.to_display();
                    let args = self.eval_items(args, scope)?;
                    self.call_method(receiver, &key, args)
                }
                other => {
                    let f = self.eval(other, scope)?;
                    if !f.is_callable() {
                        return Err(ScriptError::Type(format!("{} is not a function", describe(other))));
                    }
                    let args = self.eval_items(args, scope)?;
                    self.call(&f, args)
                }
            },
            Expr::Member(object, name) => {
                let object = self.eval(object, scope)?;
                self.get_property(&object, name)
            }
            Expr::Index(object, key) => {
                let object = self.eval(object, scope)?;
                let key = self.eval(key, scope)?;
                self.get_index(&object, &key)
            }
        }
    }

    fn resolve_place(&mut self, target: &Expr, scope: &ScopeRef) -> Result<Place> {
        match target {
            Expr::Ident(name) => Ok(Place::Var(name.clone())),
            Expr::Member(object, name) => Ok(Place::Property(self.eval(object, scope)?, name.clone())),
            Expr::Index(object, key) => {
                let object = self.eval(object, scope)?;
                let key = self.eval(key, scope)?;
                Ok(Place::Element(object, key))
            }
            _ => Err(ScriptError::Syntax("invalid assignment target".into())),
        }
    }

    fn read_place(&mut self, place: &Place, scope: &ScopeRef) -> Result<Value> {
        match place {
            Place::Var(name) => Scope::lookup(scope, name)
                .ok_or_else(|| ScriptError::Reference(format!("{} is not defined", name))),
            Place::Property(object, name) => self.get_property(object, name),
            Place::Element(object, key) => self.get_index(object, key),
        }
    }

    fn write_place(&mut self, place: Place, value: Value, scope: &ScopeRef) -> Result<()> {
        match place {
            Place::Var(name) => Scope::assign(scope, &name, value),
            Place::Property(object, name) => set_property(&object, &name, value),
            Place::Element(object, key) => match (&object, &key) {
                (Value::Array(items), Value::Number(n)) => set_element(items, *n, value),
                _ => set_property(&object, &key.to_display(), value),
            },
        }
    }

    pub fn get_property(&self, object: &Value, name: &str) -> Result<Value> {
        if object.is_nullish() {
            return Err(ScriptError::Type(format!(
                "cannot read properties of {} (reading '{}')",
                object.to_display(),
                name
            )));
        }
        Ok(property_of(object, name).unwrap_or_default())
    }

    fn get_index(&self, object: &Value, key: &Value) -> Result<Value> {
        match (object, key) {
            (Value::Array(items), Value::Number(n)) => Ok(index_of(*n)
                .and_then(|i| items.borrow().get(i).cloned())
                .unwrap_or_default()),
            (Value::Str(s), Value::Number(n)) => Ok(index_of(*n)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::string(&c.to_string()))
                .unwrap_or_default()),
            _ => self.get_property(object, &key.to_display()),
        }
    }

    /// Call a script or native function
    pub fn call(&mut self, f: &Value, args: Vec<Value>) -> Result<Value> {
        self.check_cancelled()?;
        match f {
            Value::Native(native) => (native.func)(self, args),
            Value::Function(closure) => {
                if self.depth >= self.options.max_call_depth {
                    return Err(ScriptError::CallDepthExceeded(self.options.max_call_depth));
                }
                self.depth += 1;
                let result = self.invoke(closure, args);
                self.depth -= 1;
                result
            }
            other => Err(ScriptError::Type(format!("{} is not a function", other.to_display()))),
        }
    }

    fn invoke(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Result<Value> {
        let scope = self.new_scope(&closure.env);
        if let Some(name) = &closure.def.name {
            scope
                .borrow_mut()
                .declare(name, Value::Function(closure.clone()), true);
        }

        for (i, param) in closure.def.params.iter().enumerate() {
            match param {
                Param::Pattern(pattern, default) => {
                    let mut value = args.get(i).cloned().unwrap_or_default();
                    if let (Value::Undefined, Some(default)) = (&value, default) {
                        value = self.eval(default, &scope)?;
                    }
                    self.bind_pattern(pattern, value, &scope, true)?;
                }
                Param::Rest(name) => {
                    let rest = args.get(i..).unwrap_or_default().to_vec();
                    scope.borrow_mut().declare(name, Value::array(rest), true);
                }
            }
        }

        match &closure.def.body {
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
            FunctionBody::Block(stmts) => match self.exec_block(stmts, &scope)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    fn call_method(&mut self, receiver: Value, name: &str, args: Vec<Value>) -> Result<Value> {
        match &receiver {
            Value::Array(items) => self.array_method(items, name, args),
            Value::Str(s) => string_method(s, name, &args),
            Value::Number(n) => number_method(*n, name, &args),
            _ => {
                let f = self.get_property(&receiver, name)?;
                if !f.is_callable() {
                    return Err(ScriptError::Type(format!("{} is not a function", name)));
                }
                self.call(&f, args)
            }
        }
    }

    fn array_method(&mut self, items: &Rc<RefCell<Vec<Value>>>, name: &str, args: Vec<Value>) -> Result<Value> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        let this = Value::Array(items.clone());
        match name {
            "push" => {
                let mut items = items.borrow_mut();
                check_length(items.len().saturating_add(args.len()))?;
                items.extend(args.iter().cloned());
                Ok(Value::Number(items.len() as f64))
            }
            "pop" => Ok(items.borrow_mut().pop().unwrap_or_default()),
            "map" | "forEach" | "filter" | "some" | "every" | "find" => {
                let f = arg(0);
                let snapshot = items.borrow().clone();
                let mut mapped = Vec::new();
                for (i, item) in snapshot.into_iter().enumerate() {
                    let result = self.call(&f, vec![item.clone(), Value::Number(i as f64), this.clone()])?;
                    match name {
                        "map" => mapped.push(result),
                        "filter" if result.truthy() => mapped.push(item),
                        "some" if result.truthy() => return Ok(Value::Bool(true)),
                        "every" if !result.truthy() => return Ok(Value::Bool(false)),
                        "find" if result.truthy() => return Ok(item),
                        _ => {}
                    }
                }
                Ok(match name {
                    "map" | "filter" => Value::array(mapped),
                    "some" => Value::Bool(false),
                    "every" => Value::Bool(true),
                    _ => Value::Undefined,
                })
            }
            "reduce" => {
                let f = arg(0);
                let snapshot = items.borrow().clone();
                let mut entries = snapshot.into_iter().enumerate();
                let mut acc = if args.len() > 1 {
                    arg(1)
                } else {
                    entries
                        .next()
                        .map(|(_, v)| v)
                        .ok_or_else(|| ScriptError::Type("reduce of empty array with no initial value".into()))?
                };
                for (i, item) in entries {
                    acc = self.call(&f, vec![acc, item, Value::Number(i as f64), this.clone()])?;
                }
                Ok(acc)
            }
            "concat" => {
                let mut joined = items.borrow().clone();
                for value in &args {
                    match value {
                        Value::Array(other) => {
                            check_length(joined.len().saturating_add(other.borrow().len()))?;
                            joined.extend(other.borrow().iter().cloned());
                        }
                        other => joined.push(other.clone()),
                    }
                }
                check_length(joined.len())?;
                Ok(Value::array(joined))
            }
            "flat" => {
                let mut flat = Vec::new();
                for value in items.borrow().iter() {
                    match value {
                        Value::Array(inner) => {
                            check_length(flat.len().saturating_add(inner.borrow().len()))?;
                            flat.extend(inner.borrow().iter().cloned());
                        }
                        other => flat.push(other.clone()),
                    }
                }
                check_length(flat.len())?;
                Ok(Value::array(flat))
            }
            "slice" => {
                let items = items.borrow();
                let (start, end) = slice_range(items.len(), &arg(0), &arg(1));
                Ok(Value::array(items[start..end].to_vec()))
            }
            "reverse" => {
                items.borrow_mut().reverse();
                Ok(this)
            }
            "join" => {
                let separator = match arg(0) {
                    Value::Undefined => ",".to_string(),
                    other => other.to_display(),
                };
                let mut joined = String::new();
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        joined.push_str(&separator);
                    }
                    if !item.is_nullish() {
                        joined.push_str(&item.to_display());
                    }
                    if joined.len() > MAX_STRING_LENGTH {
                        return Err(ScriptError::Range(format!(
                            "joined string exceeds the limit of {} bytes",
                            MAX_STRING_LENGTH
                        )));
                    }
                }
                Ok(Value::string(&joined))
            }
            "includes" => {
                let needle = arg(0);
                Ok(Value::Bool(items.borrow().iter().any(|v| v.strict_eq(&needle))))
            }
            "indexOf" => {
                let needle = arg(0);
                let position = items.borrow().iter().position(|v| v.strict_eq(&needle));
                Ok(Value::Number(position.map_or(-1.0, |i| i as f64)))
            }
            _ => Err(ScriptError::Type(format!("array.{} is not a function", name))),
        }
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        // closures hold their defining scope, which may hold the closure
        for scope in self.scopes.drain(..).filter_map(|s| s.upgrade()) {
            if let Ok(mut scope) = scope.try_borrow_mut() {
                scope.vars.clear();
                scope.parent = None;
            }
        }
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member(object, name) => format!("{}.{}", describe(object), name),
        _ => "expression".into(),
    }
}

fn index_of(n: f64) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

/// Own properties plus the `length` of arrays and strings
fn property_of(object: &Value, name: &str) -> Option<Value> {
    match object {
        Value::Object(o) => o.borrow().get(name).cloned(),
        Value::Array(items) => {
            let items = items.borrow();
            if name == "length" {
                Some(Value::Number(items.len() as f64))
            } else {
                name.parse::<usize>().ok().and_then(|i| items.get(i).cloned())
            }
        }
        Value::Str(s) if name == "length" => Some(Value::Number(s.chars().count() as f64)),
        _ => None,
    }
}

fn set_property(object: &Value, name: &str, value: Value) -> Result<()> {
    match object {
        Value::Object(o) => {
            o.borrow_mut().set(name, value);
            Ok(())
        }
        Value::Array(items) if name == "length" => {
            let len = index_of(value.to_number())
                .ok_or_else(|| ScriptError::Type("invalid array length".into()))?;
            items.borrow_mut().resize(check_length(len)?, Value::Undefined);
            Ok(())
        }
        Value::Array(items) => match name.parse::<usize>() {
            Ok(i) => set_element(items, i as f64, value),
            Err(_) => Err(ScriptError::Type(format!("cannot set property '{}' on an array", name))),
        },
        other => Err(ScriptError::Type(format!(
            "cannot set property '{}' on {}",
            name,
            other.type_name()
        ))),
    }
}

fn set_element(items: &Rc<RefCell<Vec<Value>>>, index: f64, value: Value) -> Result<()> {
    let i = index_of(index).ok_or_else(|| ScriptError::Type(format!("invalid array index {}", index)))?;
    let mut items = items.borrow_mut();
    if i >= items.len() {
        items.resize(check_length(i.saturating_add(1))?, Value::Undefined);
    }
    items[i] = value;
    Ok(())
}

/// Clamp `start`/`end` arguments the way `slice` does
fn slice_range(len: usize, start: &Value, end: &Value) -> (usize, usize) {
    let resolve = |v: &Value, default: usize| -> usize {
        match v {
            Value::Undefined => default,
            other => {
                let n = other.to_number();
                let n = if n.is_nan() { 0.0 } else { n.trunc() };
                if n < 0.0 {
                    (len as f64 + n).max(0.0) as usize
                } else {
                    (n as usize).min(len)
                }
            }
        }
    };
    let start = resolve(start, 0);
    let end = resolve(end, len);
    (start, end.max(start))
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    use BinaryOp::*;
    let textual = |v: &Value| matches!(v, Value::Str(_) | Value::Array(_) | Value::Object(_));
    Ok(match op {
        Add if textual(lhs) || textual(rhs) => {
            let mut joined = lhs.to_display();
            joined.push_str(&rhs.to_display());
            Value::string(&check_string(joined)?)
        }
        Add => Value::Number(lhs.to_number() + rhs.to_number()),
        Sub => Value::Number(lhs.to_number() - rhs.to_number()),
        Mul => Value::Number(lhs.to_number() * rhs.to_number()),
        Div => Value::Number(lhs.to_number() / rhs.to_number()),
        Rem => Value::Number(lhs.to_number() % rhs.to_number()),
        Pow => Value::Number(lhs.to_number().powf(rhs.to_number())),
        StrictEq => Value::Bool(lhs.strict_eq(rhs)),
        StrictNe => Value::Bool(!lhs.strict_eq(rhs)),
        LooseEq => Value::Bool(lhs.loose_eq(rhs)),
        LooseNe => Value::Bool(!lhs.loose_eq(rhs)),
        Lt | Le | Gt | Ge => {
            let ordering = match (lhs, rhs) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => lhs.to_number().partial_cmp(&rhs.to_number()),
            };
            Value::Bool(match ordering {
                None => false,
                Some(o) => match op {
                    Lt => o.is_lt(),
                    Le => o.is_le(),
                    Gt => o.is_gt(),
                    _ => o.is_ge(),
                },
            })
        }
    })
}

/// Reject arrays that would grow past [`MAX_ARRAY_LENGTH`]
fn check_length(len: usize) -> Result<usize> {
    if len > MAX_ARRAY_LENGTH {
        return Err(ScriptError::Range(format!(
            "array length {} exceeds the limit of {}",
            len, MAX_ARRAY_LENGTH
        )));
    }
    Ok(len)
}

fn check_string(s: String) -> Result<String> {
    if s.len() > MAX_STRING_LENGTH {
        return Err(ScriptError::Range(format!(
            "string length {} exceeds the limit of {}",
            s.len(),
            MAX_STRING_LENGTH
        )));
    }
    Ok(s)
}

fn string_method(s: &Rc<str>, name: &str, args: &[Value]) -> Result<Value> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
    Ok(match name {
        "toUpperCase" => Value::string(&s.to_uppercase()),
        "toLowerCase" => Value::string(&s.to_lowercase()),
        "trim" => Value::string(s.trim()),
        "includes" => Value::Bool(s.contains(arg(0).to_display().as_str())),
        "startsWith" => Value::Bool(s.starts_with(arg(0).to_display().as_str())),
        "endsWith" => Value::Bool(s.ends_with(arg(0).to_display().as_str())),
        "split" => {
            let separator = arg(0).to_display();
            let parts: Vec<Value> = if separator.is_empty() {
                s.chars().map(|c| Value::string(&c.to_string())).collect()
            } else {
                s.split(separator.as_str()).map(Value::string).collect()
            };
            Value::array(parts)
        }
        "toString" => Value::Str(s.clone()),
        _ => return Err(ScriptError::Type(format!("string.{} is not a function", name))),
    })
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "toFixed" => {
            let digits = args.first().map_or(0.0, Value::to_number);
            if !(0.0..=100.0).contains(&digits) {
                return Err(ScriptError::Type("toFixed() digits argument must be between 0 and 100".into()));
            }
            Ok(Value::string(&format!("{:.*}", digits as usize, n)))
        }
        "toString" => Ok(Value::string(&number_to_string(n))),
        _ => Err(ScriptError::Type(format!("number.{} is not a function", name))),
    }
}

/// Log target for `console.log`
pub(crate) fn console_log(args: &[Value]) {
    let line = args.iter().map(Value::to_display).collect::<Vec<_>>().join(" ");
    debug!("script console: {}", line);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter() -> Interpreter {
        Interpreter::new(InterpreterOptions::default(), Arc::new(AtomicBool::new(false)))
    }

    fn eval_main(source: &str) -> Result<Value> {
        let mut interp = interpreter();
        interp.run(source)?;
        let main = interp
            .entry_point("main")
            .ok_or_else(|| ScriptError::Reference("main is not defined".into()))?;
        interp.call(&main, vec![Value::object(Object::new())])
    }

    fn number(source: &str) -> f64 {
        eval_main(source).unwrap().to_number()
    }

    #[test]
    fn test_arithmetic_and_control_flow() {
        let source = r#"
            function main() {
              let total = 0
              for (let i = 0; i < 10; i++) {
                if (i % 2 === 0) continue
                if (i > 7) break
                total += i
              }
              let n = 3
              while (n > 0) { total += 100; n-- }
              return total
            }
        "#;
        assert_eq!(number(source), 1.0 + 3.0 + 5.0 + 7.0 + 300.0);
    }

    #[test]
    fn test_closures_and_destructuring() {
        let source = r#"
            const makeCounter = (start = 10) => {
              let count = start
              return () => { count += 1; return count }
            }
            const main = ({ scale = 2 } = {}) => {
              const next = makeCounter()
              next()
              const [a, skipped, ...rest] = [1, 2, 3, 4]
              const { x, y: renamed = 5, ...others } = { x: 1, z: 7, w: 8 }
              const sum = [a, ...rest].reduce((acc, v) => acc + v, 0)
              return sum * scale + x + renamed + Object.keys(others).length + next()
            }
        "#;
        assert_eq!(number(source), (1.0 + 3.0 + 4.0) * 2.0 + 1.0 + 5.0 + 2.0 + 12.0);
    }

    #[test]
    fn test_array_methods_and_strings() {
        let source = r#"
            function main() {
              const xs = [3, 1, 2]
              const doubled = xs.map(x => x * 2).filter(x => x > 2)
              xs.push(10)
              const label = `n=` + xs.length + ' ' + [1, 2].join('-') + ' ' + (2.256).toFixed(2)
              return [doubled.join(','), label, xs.indexOf(10), xs.includes(7), typeof missing]
            }
        "#;
        let Value::Array(items) = eval_main(source).unwrap() else {
            panic!("expected an array");
        };
        let items: Vec<String> = items.borrow().iter().map(Value::to_display).collect();
        assert_eq!(items, ["6,4", "n=4 1-2 2.26", "3", "false", "undefined"]);
    }

    #[test]
    fn test_module_exports_entry_point() {
        let mut interp = interpreter();
        interp
            .run("const build = () => 42\nmodule.exports = { main: build }")
            .unwrap();
        let main = interp.entry_point("main").unwrap();
        assert_eq!(interp.call(&main, Vec::new()).unwrap().to_number(), 42.0);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            eval_main("function main() { return nope + 1 }"),
            Err(ScriptError::Reference(_))
        ));
        assert!(matches!(
            eval_main("function main() { const a = 1; a = 2; return a }"),
            Err(ScriptError::Type(_))
        ));
        assert!(matches!(
            eval_main("function main() { const o = undefined; return o.x }"),
            Err(ScriptError::Type(_))
        ));
        assert!(matches!(
            eval_main("function main() { return [].reduce((a, b) => a + b) }"),
            Err(ScriptError::Type(_))
        ));
    }

    #[test]
    fn test_call_depth_limit() {
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024 * 1024)
            .spawn(|| {
                let mut interp = Interpreter::new(
                    InterpreterOptions { max_call_depth: 64 },
                    Arc::new(AtomicBool::new(false)),
                );
                interp
                    .run("function main(n) { return main(n + 1) }")
                    .unwrap();
                let main = interp.entry_point("main").unwrap();
                interp.call(&main, vec![Value::Number(0.0)]).map(|_| ())
            })
            .unwrap();
        assert!(matches!(
            handle.join().unwrap(),
            Err(ScriptError::CallDepthExceeded(64))
        ));
    }

    #[test]
    fn test_cancellation_stops_loops() {
        let cancel = Arc::new(AtomicBool::new(true));
        let mut interp = Interpreter::new(InterpreterOptions::default(), cancel);
        assert!(matches!(interp.run("while (true) {}"), Err(ScriptError::Cancelled)));
    }

    #[test]
    fn test_growth_limits() {
        assert!(matches!(
            eval_main("function main() { const a = []; a[1e15] = 1; return a.length }"),
            Err(ScriptError::Range(_))
        ));
        assert!(matches!(
            eval_main("function main() { const a = [1]; a.length = 1e12; return a }"),
            Err(ScriptError::Range(_))
        ));
        assert!(matches!(
            eval_main("function main() { let s = 'ab'; for (let i = 0; i < 64; i++) { s = s + s } return s }"),
            Err(ScriptError::Range(_))
        ));
        assert!(matches!(
            eval_main("function main() { let a = [1]; for (let i = 0; i < 64; i++) { a = a.concat(a) } return a }"),
            Err(ScriptError::Range(_))
        ));
        assert_eq!(number("function main() { const a = []; a[9] = 1; return a.length }"), 10.0);
    }
}
