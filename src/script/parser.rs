// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script parser using pest

use super::ast::{
    AssignOp, BinaryOp, DeclKind, Expr, FunctionBody, FunctionDef, Item, LogicalOp,
    ObjectPatternProp, Param, Pattern, Property, PropertyKey, Stmt, UnaryOp,
};
use super::ScriptError;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::rc::Rc;

#[derive(Parser)]
#[grammar = "script/grammar.pest"]
struct ScriptParser;

type Result<T> = std::result::Result<T, ScriptError>;

/// Parse script source into a list of top-level statements
pub fn parse_program(source: &str) -> Result<Vec<Stmt>> {
    let mut pairs = ScriptParser::parse(Rule::program, source)
        .map_err(|e| ScriptError::Syntax(e.to_string()))?;
    let program = pairs.next().ok_or_else(|| syntax("empty program"))?;

    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_stmt)
        .collect()
}

fn syntax(message: impl Into<String>) -> ScriptError {
    ScriptError::Syntax(message.into())
}

fn unexpected(pair: &Pair<Rule>) -> ScriptError {
    let (line, col) = pair.line_col();
    syntax(format!("unexpected {:?} at {}:{}", pair.as_rule(), line, col))
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_function
            | Rule::kw_return
            | Rule::kw_if
            | Rule::kw_else
            | Rule::kw_for
            | Rule::kw_of
            | Rule::kw_while
            | Rule::kw_break
            | Rule::kw_continue
    )
}

/// Inner pairs without keyword tokens
fn children(pair: Pair<Rule>) -> Vec<Pair<Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule())).collect()
}

fn take<'a>(
    items: &mut impl Iterator<Item = Pair<'a, Rule>>,
    what: &str,
) -> Result<Pair<'a, Rule>> {
    items.next().ok_or_else(|| syntax(format!("missing {}", what)))
}

fn build_stmt(pair: Pair<Rule>) -> Result<Stmt> {
    let rule = pair.as_rule();
    match rule {
        Rule::function_decl => Ok(Stmt::Function(Rc::new(build_function(pair)?))),
        Rule::var_decl => build_var_decl(pair),
        Rule::return_stmt => {
            let value = children(pair).into_iter().next().map(build_expr).transpose()?;
            Ok(Stmt::Return(value))
        }
        Rule::if_stmt => {
            let mut inner = children(pair).into_iter();
            let condition = build_expr(take(&mut inner, "if condition")?)?;
            let then = Box::new(build_stmt(take(&mut inner, "if body")?)?);
            let otherwise = inner.next().map(build_stmt).transpose()?.map(Box::new);
            Ok(Stmt::If {
                condition,
                then,
                otherwise,
            })
        }
        Rule::for_of_stmt => {
            let mut inner = children(pair).into_iter();
            let kind = decl_kind(&take(&mut inner, "declaration")?)?;
            let pattern = build_pattern(take(&mut inner, "loop binding")?)?;
            let iterable = build_expr(take(&mut inner, "iterable")?)?;
            let body = Box::new(build_stmt(take(&mut inner, "loop body")?)?);
            Ok(Stmt::ForOf {
                kind,
                pattern,
                iterable,
                body,
            })
        }
        Rule::for_stmt => {
            let mut inner = children(pair).into_iter();
            let init = take(&mut inner, "for initializer")?
                .into_inner()
                .next()
                .map(|p| match p.as_rule() {
                    Rule::var_decl => build_var_decl(p),
                    _ => build_expr(p).map(Stmt::Expr),
                })
                .transpose()?
                .map(Box::new);
            let condition = optional_expr(take(&mut inner, "for condition")?)?;
            let update = optional_expr(take(&mut inner, "for update")?)?;
            let body = Box::new(build_stmt(take(&mut inner, "loop body")?)?);
            Ok(Stmt::For {
                init,
                condition,
                update,
                body,
            })
        }
        Rule::while_stmt => {
            let mut inner = children(pair).into_iter();
            let condition = build_expr(take(&mut inner, "while condition")?)?;
            let body = Box::new(build_stmt(take(&mut inner, "loop body")?)?);
            Ok(Stmt::While { condition, body })
        }
        Rule::break_stmt => Ok(Stmt::Break),
        Rule::continue_stmt => Ok(Stmt::Continue),
        Rule::block => Ok(Stmt::Block(build_block(pair)?)),
        Rule::empty_stmt => Ok(Stmt::Empty),
        Rule::expr_stmt => {
            let mut inner = pair.into_inner();
            Ok(Stmt::Expr(build_expr(take(&mut inner, "expression")?)?))
        }
        Rule::body => {
            let mut inner = pair.into_inner();
            build_stmt(take(&mut inner, "statement")?)
        }
        _ => Err(unexpected(&pair)),
    }
}

fn optional_expr(pair: Pair<Rule>) -> Result<Option<Expr>> {
    pair.into_inner().next().map(build_expr).transpose()
}

fn build_block(pair: Pair<Rule>) -> Result<Vec<Stmt>> {
    pair.into_inner().map(build_stmt).collect()
}

fn decl_kind(pair: &Pair<Rule>) -> Result<DeclKind> {
    match pair.as_str() {
        "const" => Ok(DeclKind::Const),
        "let" => Ok(DeclKind::Let),
        "var" => Ok(DeclKind::Var),
        _ => Err(unexpected(pair)),
    }
}

fn build_var_decl(pair: Pair<Rule>) -> Result<Stmt> {
    let mut inner = pair.into_inner();
    let kind = decl_kind(&take(&mut inner, "declaration kind")?)?;
    let declarators = inner
        .map(|declarator| {
            let mut parts = declarator.into_inner();
            let pattern = build_pattern(take(&mut parts, "binding")?)?;
            let init = parts.next().map(build_expr).transpose()?;
            if init.is_none() && kind == DeclKind::Const {
                return Err(syntax("missing initializer in const declaration"));
            }
            Ok((pattern, init))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Stmt::Var { kind, declarators })
}

fn build_function(pair: Pair<Rule>) -> Result<FunctionDef> {
    let mut name = None;
    let mut params = Vec::new();
    let mut body = FunctionBody::Block(Vec::new());
    for part in children(pair) {
        match part.as_rule() {
            Rule::ident | Rule::prop_name => name = Some(part.as_str().to_string()),
            Rule::params => params = build_params(part)?,
            Rule::block => body = FunctionBody::Block(build_block(part)?),
            _ => return Err(unexpected(&part)),
        }
    }
    Ok(FunctionDef { name, params, body })
}

fn build_params(pair: Pair<Rule>) -> Result<Vec<Param>> {
    pair.into_inner()
        .map(|param| {
            let mut parts = param.into_inner();
            let first = take(&mut parts, "parameter")?;
            if first.as_rule() == Rule::rest_param {
                return Ok(Param::Rest(rest_name(first)?));
            }
            let pattern = build_pattern(first)?;
            let default = parts.next().map(build_expr).transpose()?;
            Ok(Param::Pattern(pattern, default))
        })
        .collect()
}

fn rest_name(pair: Pair<Rule>) -> Result<String> {
    let mut inner = pair.into_inner();
    Ok(take(&mut inner, "rest name")?.as_str().to_string())
}

fn build_pattern(pair: Pair<Rule>) -> Result<Pattern> {
    let pair = match pair.as_rule() {
        Rule::pattern => {
            let mut inner = pair.into_inner();
            take(&mut inner, "pattern")?
        }
        _ => pair,
    };

    match pair.as_rule() {
        Rule::ident => Ok(Pattern::Ident(pair.as_str().to_string())),
        Rule::object_pattern => {
            let mut props = Vec::new();
            let mut rest = None;
            for prop in pair.into_inner() {
                let mut parts = prop.into_inner();
                let first = take(&mut parts, "property")?;
                if first.as_rule() == Rule::rest_param {
                    rest = Some(rest_name(first)?);
                    continue;
                }
                let key = first.as_str().to_string();
                let mut target = Pattern::Ident(key.clone());
                let mut default = None;
                for part in parts {
                    match part.as_rule() {
                        Rule::pattern => target = build_pattern(part)?,
                        _ => default = Some(build_expr(part)?),
                    }
                }
                props.push(ObjectPatternProp {
                    key,
                    target,
                    default,
                });
            }
            Ok(Pattern::Object { props, rest })
        }
        Rule::array_pattern => {
            let mut elements = Vec::new();
            let mut rest = None;
            for element in pair.into_inner() {
                let mut parts = element.into_inner();
                let first = take(&mut parts, "element")?;
                if first.as_rule() == Rule::rest_param {
                    rest = Some(rest_name(first)?);
                    continue;
                }
                let target = build_pattern(first)?;
                let default = parts.next().map(build_expr).transpose()?;
                elements.push((target, default));
            }
            Ok(Pattern::Array { elements, rest })
        }
        _ => Err(unexpected(&pair)),
    }
}

fn binary_op(op: &str) -> Result<BinaryOp> {
    Ok(match op {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Rem,
        "**" => BinaryOp::Pow,
        "===" => BinaryOp::StrictEq,
        "!==" => BinaryOp::StrictNe,
        "==" => BinaryOp::LooseEq,
        "!=" => BinaryOp::LooseNe,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        other => return Err(syntax(format!("unknown operator '{}'", other))),
    })
}

fn combine(op: &str, lhs: Expr, rhs: Expr) -> Result<Expr> {
    let (lhs, rhs) = (Box::new(lhs), Box::new(rhs));
    Ok(match op {
        "&&" => Expr::Logical(LogicalOp::And, lhs, rhs),
        "||" => Expr::Logical(LogicalOp::Or, lhs, rhs),
        "??" => Expr::Logical(LogicalOp::Nullish, lhs, rhs),
        _ => Expr::Binary(binary_op(op)?, lhs, rhs),
    })
}

/// Left-associative `operand (op operand)*` chains
fn fold_left(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let mut lhs = build_expr(take(&mut inner, "operand")?)?;
    while let Some(op) = inner.next() {
        let rhs = build_expr(take(&mut inner, "operand")?)?;
        lhs = combine(op.as_str(), lhs, rhs)?;
    }
    Ok(lhs)
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::assignment => {
            let mut inner = pair.into_inner();
            let first = take(&mut inner, "expression")?;
            let target = build_expr(first)?;
            let Some(op) = inner.next() else {
                return Ok(target);
            };
            if !target.is_assignable() {
                return Err(syntax("invalid assignment target"));
            }
            let op = match op.as_str() {
                "=" => AssignOp::Assign,
                compound => AssignOp::Compound(binary_op(&compound[..compound.len() - 1])?),
            };
            let value = build_expr(take(&mut inner, "assigned value")?)?;
            Ok(Expr::Assign(op, Box::new(target), Box::new(value)))
        }
        Rule::arrow_function => {
            let mut inner = pair.into_inner();
            let head = take(&mut inner, "arrow parameters")?;
            let params = match head.into_inner().next() {
                Some(p) if p.as_rule() == Rule::ident => {
                    vec![Param::Pattern(Pattern::Ident(p.as_str().to_string()), None)]
                }
                Some(p) => build_params(p)?,
                None => Vec::new(),
            };
            let body_pair = take(&mut inner, "arrow body")?;
            let body = match body_pair.as_rule() {
                Rule::block => FunctionBody::Block(build_block(body_pair)?),
                _ => FunctionBody::Expr(build_expr(body_pair)?),
            };
            Ok(Expr::Function(Rc::new(FunctionDef {
                name: None,
                params,
                body,
            })))
        }
        Rule::conditional => {
            let mut inner = pair.into_inner();
            let test = build_expr(take(&mut inner, "condition")?)?;
            match inner.next() {
                None => Ok(test),
                Some(yes) => {
                    let yes = build_expr(yes)?;
                    let no = build_expr(take(&mut inner, "else branch")?)?;
                    Ok(Expr::Conditional(Box::new(test), Box::new(yes), Box::new(no)))
                }
            }
        }
        Rule::logical_or
        | Rule::logical_and
        | Rule::equality
        | Rule::relational
        | Rule::additive
        | Rule::multiplicative => fold_left(pair),
        Rule::exponent => {
            let mut inner = pair.into_inner();
            let base = build_expr(take(&mut inner, "operand")?)?;
            match inner.next() {
                None => Ok(base),
                Some(_) => {
                    let power = build_expr(take(&mut inner, "exponent")?)?;
                    Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(power)))
                }
            }
        }
        Rule::unary => {
            let parts: Vec<_> = pair.into_inner().collect();
            let Some((operand, ops)) = parts.split_last() else {
                return Err(syntax("empty unary expression"));
            };
            let mut expr = build_expr(operand.clone())?;
            for op in ops.iter().rev() {
                let op = match op.as_str() {
                    "!" => UnaryOp::Not,
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Plus,
                    _ => UnaryOp::TypeOf,
                };
                expr = Expr::Unary(op, Box::new(expr));
            }
            Ok(expr)
        }
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let target = build_expr(take(&mut inner, "operand")?)?;
            match inner.next() {
                None => Ok(target),
                Some(op) => {
                    if !target.is_assignable() {
                        return Err(syntax("invalid update target"));
                    }
                    let delta = if op.as_str() == "++" { 1.0 } else { -1.0 };
                    Ok(Expr::Update(Box::new(target), delta))
                }
            }
        }
        Rule::call_expr => {
            let mut inner = pair.into_inner();
            let mut expr = build_expr(take(&mut inner, "callee")?)?;
            for suffix in inner {
                expr = match suffix.as_rule() {
                    Rule::call_args => Expr::Call(Box::new(expr), build_items(suffix)?),
                    Rule::member => {
                        let mut name = suffix.into_inner();
                        Expr::Member(Box::new(expr), Rc::from(take(&mut name, "property")?.as_str()))
                    }
                    Rule::index => {
                        let mut key = suffix.into_inner();
                        Expr::Index(Box::new(expr), Box::new(build_expr(take(&mut key, "index")?)?))
                    }
                    _ => return Err(unexpected(&suffix)),
                };
            }
            Ok(expr)
        }
        Rule::number => parse_number(pair.as_str()).map(Expr::Number),
        Rule::string | Rule::template => Ok(Expr::Str(Rc::from(string_content(pair).as_str()))),
        Rule::boolean => Ok(Expr::Bool(pair.as_str() == "true")),
        Rule::null_lit => Ok(Expr::Null),
        Rule::undefined_lit => Ok(Expr::Undefined),
        Rule::ident => Ok(Expr::Ident(pair.as_str().to_string())),
        Rule::function_expr => Ok(Expr::Function(Rc::new(build_function(pair)?))),
        Rule::array_lit => Ok(Expr::Array(build_items(pair)?)),
        Rule::object_lit => pair
            .into_inner()
            .map(build_property)
            .collect::<Result<Vec<_>>>()
            .map(Expr::Object),
        _ => Err(unexpected(&pair)),
    }
}

/// Call arguments or array elements, each possibly spread
fn build_items(pair: Pair<Rule>) -> Result<Vec<Item>> {
    pair.into_inner()
        .map(|item| {
            let mut inner = item.into_inner();
            let value = take(&mut inner, "element")?;
            if value.as_rule() == Rule::spread {
                let mut spread = value.into_inner();
                Ok(Item::Spread(build_expr(take(&mut spread, "spread value")?)?))
            } else {
                Ok(Item::Expr(build_expr(value)?))
            }
        })
        .collect()
}

fn build_property(pair: Pair<Rule>) -> Result<Property> {
    let mut inner = pair.into_inner();
    let first = take(&mut inner, "property")?;
    match first.as_rule() {
        Rule::spread => {
            let mut spread = first.into_inner();
            Ok(Property::Spread(build_expr(take(&mut spread, "spread value")?)?))
        }
        Rule::method_prop => {
            let function = build_function(first)?;
            let name = function.name.clone().unwrap_or_default();
            Ok(Property::Entry(
                PropertyKey::Static(Rc::from(name.as_str())),
                Expr::Function(Rc::new(function)),
            ))
        }
        Rule::prop_key => {
            let mut key_parts = first.into_inner();
            let key_pair = take(&mut key_parts, "property key")?;
            let key = match key_pair.as_rule() {
                Rule::computed_key => {
                    let mut computed = key_pair.into_inner();
                    PropertyKey::Computed(build_expr(take(&mut computed, "computed key")?)?)
                }
                Rule::string => PropertyKey::Static(Rc::from(string_content(key_pair).as_str())),
                _ => PropertyKey::Static(Rc::from(key_pair.as_str())),
            };
            let value = build_expr(take(&mut inner, "property value")?)?;
            Ok(Property::Entry(key, value))
        }
        Rule::shorthand_prop => {
            let mut ident = first.into_inner();
            let name = take(&mut ident, "property name")?.as_str().to_string();
            Ok(Property::Entry(
                PropertyKey::Static(Rc::from(name.as_str())),
                Expr::Ident(name),
            ))
        }
        _ => Err(unexpected(&first)),
    }
}

fn parse_number(text: &str) -> Result<f64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .map_err(|e| syntax(format!("invalid number '{}': {}", text, e)));
    }
    text.parse::<f64>()
        .map_err(|e| syntax(format!("invalid number '{}': {}", text, e)))
}

fn string_content(pair: Pair<Rule>) -> String {
    let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
    unescape(raw)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
