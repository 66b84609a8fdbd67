// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Modeling script language: a JavaScript subset parsed with pest and run by
//! a tree-walking interpreter whose globals are the modeling API only

pub mod ast;
pub mod builtins;
pub mod interpreter;
pub mod parser;
pub mod value;

pub use interpreter::{Interpreter, InterpreterOptions};
pub use parser::parse_program;
pub use value::{Object, Value};

use crate::modeling::ModelingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("ReferenceError: {0}")]
    Reference(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("RangeError: {0}")]
    Range(String),

    #[error("modeling error: {0}")]
    Modeling(#[from] ModelingError),

    #[error("maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("execution cancelled")]
    Cancelled,
}
