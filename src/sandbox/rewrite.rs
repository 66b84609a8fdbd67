// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Textual safety patch for `roundedCuboid` calls.
//!
//! The rounding radius of every `roundedCuboid({ size: [...], roundRadius: r })`
//! call is wrapped in `__safeRoundRadius(size, r)` so that generated scripts
//! with oversized radii still produce geometry. This is a regex heuristic: it
//! only fires for literal size arrays without nested brackets and radius
//! expressions without commas or parentheses.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Name of the injected clamping helper
pub const SAFE_RADIUS_HELPER: &str = "__safeRoundRadius";

const SIZE_THEN_RADIUS: &str = r"(roundedCuboid\(\s*\{[^{}]*?\bsize\s*:\s*)(\[[^\[\]]*\])([^{}]*?\broundRadius\s*:\s*)([^,{}()]+?)(\s*[,}])";
const RADIUS_THEN_SIZE: &str = r"(roundedCuboid\(\s*\{[^{}]*?\broundRadius\s*:\s*)([^,{}()]+?)(\s*,[^{}]*?\bsize\s*:\s*)(\[[^\[\]]*\])";

fn patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (SIZE_THEN_RADIUS, "${1}${2}${3}__safeRoundRadius(${2}, ${4})${5}"),
            (RADIUS_THEN_SIZE, "${1}__safeRoundRadius(${4}, ${2})${3}${4}"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

/// Number of `roundedCuboid` calls the patch would rewrite
pub fn rewrite_sites(script: &str) -> usize {
    patterns().iter().map(|(re, _)| re.find_iter(script).count()).sum()
}

/// Wrap rounding radii in the clamping helper; already wrapped calls are left alone
pub fn apply_safety_patch(script: &str) -> String {
    let mut patched = Cow::Borrowed(script);
    for (re, replacement) in patterns() {
        if let Cow::Owned(rewritten) = re.replace_all(&patched, *replacement) {
            patched = Cow::Owned(rewritten);
        }
    }
    patched.into_owned()
}
