// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Static checks run on a script before it reaches the execution context

use crate::script::builtins::MODELING_MODULE;
use regex::Regex;
use std::sync::OnceLock;

/// Categories of forbidden constructs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Network,
    Storage,
    Environment,
    DynamicCode,
    Prototype,
    ModuleLoading,
    MissingEntryPoint,
}

impl ViolationKind {
    pub fn describe(self) -> &'static str {
        match self {
            ViolationKind::Network => "network access is not allowed",
            ViolationKind::Storage => "storage access is not allowed",
            ViolationKind::Environment => "access to the host environment is not allowed",
            ViolationKind::DynamicCode => "dynamic code evaluation is not allowed",
            ViolationKind::Prototype => "prototype manipulation is not allowed",
            ViolationKind::ModuleLoading => "only the @jscad/modeling module may be loaded",
            ViolationKind::MissingEntryPoint => {
                "script must define a main function that returns geometry"
            }
        }
    }
}

const DENY_LIST: &[(ViolationKind, &str)] = &[
    (ViolationKind::Network, r"\bfetch\s*\("),
    (ViolationKind::Network, r"\bXMLHttpRequest\b"),
    (ViolationKind::Network, r"\bWebSocket\b"),
    (ViolationKind::Network, r"\bEventSource\b"),
    (ViolationKind::Network, r"\bsendBeacon\b"),
    (ViolationKind::Storage, r"\blocalStorage\b"),
    (ViolationKind::Storage, r"\bsessionStorage\b"),
    (ViolationKind::Storage, r"\bindexedDB\b"),
    (ViolationKind::Storage, r"\bdocument\s*\.\s*cookie\b"),
    (ViolationKind::Environment, r"\bwindow\s*\."),
    (ViolationKind::Environment, r"\bdocument\s*\."),
    (ViolationKind::Environment, r"\bglobalThis\b"),
    (ViolationKind::Environment, r"\bprocess\s*\."),
    (ViolationKind::Environment, r"\bnavigator\s*\."),
    (ViolationKind::Environment, r"\blocation\s*\."),
    (ViolationKind::DynamicCode, r"\beval\s*\("),
    (ViolationKind::DynamicCode, r"\bnew\s+Function\b"),
    (ViolationKind::DynamicCode, r"\bFunction\s*\("),
    (ViolationKind::DynamicCode, r"\bimportScripts\b"),
    (ViolationKind::DynamicCode, r#"\bset(Timeout|Interval)\s*\(\s*['"`]"#),
    (ViolationKind::Prototype, r"__proto__"),
    (ViolationKind::Prototype, r"\.\s*prototype\b"),
    (ViolationKind::Prototype, r"\.\s*constructor\b"),
    (ViolationKind::Prototype, r"\b(setPrototypeOf|defineProperty)\b"),
    (ViolationKind::ModuleLoading, r"\bimport\s*\("),
    (ViolationKind::ModuleLoading, r#"\brequire\s*\(\s*[^'"`\s]"#),
];

struct DenyRule {
    kind: ViolationKind,
    pattern: Regex,
}

fn deny_rules() -> &'static [DenyRule] {
    static RULES: OnceLock<Vec<DenyRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        DENY_LIST
            .iter()
            .filter_map(|(kind, pattern)| {
                Regex::new(pattern).ok().map(|pattern| DenyRule { kind: *kind, pattern })
            })
            .collect()
    })
}

fn compiled(slot: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    slot.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Literal module names passed to `require` or `import ... from`
fn module_references(script: &str) -> Vec<String> {
    static REQUIRE: OnceLock<Option<Regex>> = OnceLock::new();
    static IMPORT: OnceLock<Option<Regex>> = OnceLock::new();
    let patterns = [
        compiled(&REQUIRE, r#"\brequire\s*\(\s*['"`]([^'"`]*)['"`]"#),
        compiled(&IMPORT, r#"\bimport\b[^;'"`]*?\bfrom\s*['"`]([^'"`]*)['"`]"#),
    ];
    patterns
        .into_iter()
        .flatten()
        .flat_map(|re| re.captures_iter(script))
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Byte offset of the `main` definition, if any
fn entry_point_offset(script: &str) -> Option<usize> {
    static ENTRY: OnceLock<Option<Regex>> = OnceLock::new();
    let entry = compiled(
        &ENTRY,
        r"\bfunction\s+main\s*\(|\bmain\s*[:=]\s*(function\b|async\b|\(|[A-Za-z_$][\w$]*\s*=>)",
    )?;
    entry.find(script).map(|m| m.start())
}

fn has_return_after(script: &str, offset: usize) -> bool {
    static RETURN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RETURN, r"\breturn\b")
        .zip(script.get(offset..))
        .is_some_and(|(re, tail)| re.is_match(tail))
}

/// Categorised violations found in `script`, in deny-list order
pub fn find_violations(script: &str) -> Vec<(ViolationKind, String)> {
    let mut violations: Vec<(ViolationKind, String)> = deny_rules()
        .iter()
        .filter_map(|rule| {
            rule.pattern.find(script).map(|m| {
                (
                    rule.kind,
                    format!("{} (found `{}`)", rule.kind.describe(), m.as_str().trim()),
                )
            })
        })
        .collect();

    for module in module_references(script) {
        if module != MODELING_MODULE {
            violations.push((
                ViolationKind::ModuleLoading,
                format!("{} (found '{}')", ViolationKind::ModuleLoading.describe(), module),
            ));
        }
    }

    let has_entry = entry_point_offset(script).is_some_and(|offset| has_return_after(script, offset));
    if !has_entry {
        violations.push((
            ViolationKind::MissingEntryPoint,
            ViolationKind::MissingEntryPoint.describe().to_string(),
        ));
    }
    violations
}

/// Every violation as a human-readable message; empty when the script may run
pub fn validate_script(script: &str) -> Vec<String> {
    find_violations(script).into_iter().map(|(_, message)| message).collect()
}
