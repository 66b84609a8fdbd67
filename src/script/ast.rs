// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Syntax tree for modeling scripts

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Const,
    Let,
    Var,
}

impl DeclKind {
    pub fn is_mutable(self) -> bool {
        !matches!(self, DeclKind::Const)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Function(Rc<FunctionDef>),
    Var {
        kind: DeclKind,
        declarators: Vec<(Pattern, Option<Expr>)>,
    },
    Return(Option<Expr>),
    If {
        condition: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForOf {
        kind: DeclKind,
        pattern: Pattern,
        iterable: Expr,
        body: Box<Stmt>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Block(Vec<Stmt>),
    Empty,
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// Arrow function with an expression body
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Pattern(Pattern, Option<Expr>),
    Rest(String),
}

/// Binding target in declarations, parameters and `for...of`
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(String),
    Object {
        props: Vec<ObjectPatternProp>,
        rest: Option<String>,
    },
    Array {
        elements: Vec<(Pattern, Option<Expr>)>,
        rest: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPatternProp {
    pub key: String,
    pub target: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

/// `=` or a compound assignment carrying its arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Expr(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Static(Rc<str>),
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Entry(PropertyKey, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(Rc<str>),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Array(Vec<Item>),
    Object(Vec<Property>),
    Function(Rc<FunctionDef>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Target is always `Ident`, `Member` or `Index`
    Assign(AssignOp, Box<Expr>, Box<Expr>),
    /// Postfix `++` (delta 1) or `--` (delta -1)
    Update(Box<Expr>, f64),
    Call(Box<Expr>, Vec<Item>),
    Member(Box<Expr>, Rc<str>),
    Index(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..))
    }
}
