// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! End-to-end script sandbox behaviour

use serde_json::json;
use solidcraft::geometry::analysis::signed_volume;
use solidcraft::sandbox::{apply_safety_patch, Sandbox, SandboxOptions, SandboxStage, WorkerOptions};
use solidcraft::{Kernel, KernelError};
use std::time::Duration;

fn sandbox_with_timeout(timeout: Duration) -> Sandbox {
    Sandbox::new(SandboxOptions {
        timeout,
        worker: WorkerOptions::default(),
    })
}

const JSCAD_SCRIPT: &str = r#"
const jscad = require('@jscad/modeling')
const { cuboid, cylinder } = jscad.primitives
const { subtract } = jscad.booleans
const { translate } = jscad.transforms

function getParameterDefinitions() {
  return [
    { name: 'width', type: 'float', initial: 30, caption: 'Width' },
    { name: 'holes', type: 'int', initial: 2, caption: 'Hole count' }
  ]
}

const main = (params) => {
  const plate = cuboid({ size: [params.width, 20, 4] })
  const holes = []
  for (let i = 0; i < params.holes; i++) {
    const x = -params.width / 4 + i * params.width / 2
    holes.push(translate([x, 0, 0], cylinder({ radius: 2, height: 10, segments: 16 })))
  }
  return subtract(plate, ...holes)
}

module.exports = { main, getParameterDefinitions }
"#;

#[test]
fn test_oversized_round_radius_is_clamped() {
    let mut sandbox = Sandbox::default();
    let patched = sandbox
        .execute(
            "function main() { return roundedCuboid({ size: [20, 20, 5], roundRadius: 10 }) }",
            &json!({}),
        )
        .unwrap();
    let explicit = sandbox
        .execute(
            "function main() { return roundedCuboid({ size: [20, 20, 5], roundRadius: 2.25 }) }",
            &json!({}),
        )
        .unwrap();

    assert_eq!(patched, explicit);
    let size = patched.bounds().size();
    assert!((size.x - 20.0).abs() < 1e-4);
    assert!((size.z - 5.0).abs() < 1e-4);
}

#[test]
fn test_unpatched_oversized_radius_fails() {
    let mut sandbox = Sandbox::default();
    let err = sandbox
        .execute(
            "const dims = [20, 20, 5]\n\
             function main() { return roundedCuboid({ size: dims, roundRadius: 10 }) }",
            &json!({}),
        )
        .unwrap_err();
    assert!(matches!(err, KernelError::Execution(_)), "{:?}", err);
}

#[test]
fn test_jscad_style_script() {
    let mut kernel = Kernel::default();
    let definitions = kernel.parameter_definitions(JSCAD_SCRIPT).unwrap();
    assert_eq!(definitions.len(), 2);
    assert_eq!(definitions[1].caption.as_deref(), Some("Hole count"));

    let buffer = kernel.execute_with_defaults(JSCAD_SCRIPT, json!({ "width": 40 })).unwrap();
    let size = buffer.bounds().size();
    assert!((size.x - 40.0).abs() < 1e-3);
    assert!((size.y - 20.0).abs() < 1e-3);
    // two 16-sided holes of radius 2 through a 40 x 20 x 4 plate
    let hole = 4.0 * 8.0 * 4.0 * (std::f64::consts::PI / 8.0).sin();
    assert!((signed_volume(&buffer) - (3200.0 - 2.0 * hole)).abs() < 1.0);
}

#[test]
fn test_timeout_is_distinct_and_recoverable() {
    let mut sandbox = sandbox_with_timeout(Duration::from_millis(200));
    let err = sandbox
        .execute("function main() { while (true) {} return cuboid() }", &json!({}))
        .unwrap_err();
    assert!(err.is_timeout(), "{:?}", err);
    assert!(matches!(err, KernelError::Timeout(_)));
    assert_eq!(sandbox.stage(), SandboxStage::TimedOut);

    sandbox.terminate();
    assert!(!sandbox.is_running());

    let buffer = sandbox.execute("function main() { return cuboid() }", &json!({})).unwrap();
    assert_eq!(buffer.triangle_count(), 12);
    assert_eq!(sandbox.stage(), SandboxStage::Resolved);
}

#[test]
fn test_late_response_is_ignored() {
    let mut sandbox = sandbox_with_timeout(Duration::from_millis(1));
    let slow = "function main() { let n = 0; for (let i = 0; i < 200000; i++) { n += i } return cuboid() }";
    assert!(sandbox.execute(slow, &json!({})).unwrap_err().is_timeout());

    // the same context answers the next request; the slow result is dropped as stale
    sandbox.set_timeout(Duration::from_secs(30));
    let buffer = sandbox
        .execute("function main() { return cuboid({ size: [1, 2, 3] }) }", &json!({}))
        .unwrap();
    assert!((buffer.bounds().size().z - 3.0).abs() < 1e-5);
    assert_eq!(sandbox.stage(), SandboxStage::Resolved);
}

#[test]
fn test_validation_rejects_before_execution() {
    let mut sandbox = Sandbox::default();
    let scripts = [
        "function main() { fetch('http://x'); return cuboid() }",
        "function main() { localStorage.getItem('k'); return cuboid() }",
        "function main() { return eval('cuboid()') }",
        "function main() { const fs = require('fs'); return cuboid() }",
        "function main() { window.location = 'x'; return cuboid() }",
        "function main() { Object.prototype.size = 1; return cuboid() }",
        "const shape = cuboid()",
    ];
    for script in scripts {
        match sandbox.execute(script, &json!({})) {
            Err(KernelError::Validation { violations }) => assert!(!violations.is_empty()),
            other => panic!("{} should fail validation, got {:?}", script, other.map(|b| b.triangle_count())),
        }
        assert_eq!(sandbox.stage(), SandboxStage::Rejected);
    }
    assert!(!sandbox.is_running());
}

#[test]
fn test_rewrite_is_idempotent() {
    let script = "function main() {\n\
                    const a = roundedCuboid({ size: [20, 20, 5], roundRadius: 10 })\n\
                    const b = roundedCuboid({ roundRadius: 4, size: [6, 6, 6], segments: 8 })\n\
                    return union(a, translate([30, 0, 0], b))\n\
                  }";
    let once = apply_safety_patch(script);
    assert_ne!(once, script);
    assert_eq!(apply_safety_patch(&once), once);

    let mut sandbox = Sandbox::default();
    let from_original = sandbox.execute(script, &json!({})).unwrap();
    let from_patched = sandbox.execute(&once, &json!({})).unwrap();
    assert_eq!(from_original, from_patched);
}

#[test]
fn test_runaway_recursion_is_an_execution_error() {
    let mut sandbox = Sandbox::default();
    let err = sandbox
        .execute("function f(n) { return f(n + 1) }\nfunction main() { f(0); return cuboid() }", &json!({}))
        .unwrap_err();
    match err {
        KernelError::Execution(message) => assert!(message.contains("call depth")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_oversized_sizes_are_execution_errors() {
    let mut sandbox = Sandbox::default();
    let scripts = [
        "function main() { return cylinder({ segments: 1e13 }) }",
        "function main() { return sphere({ segments: 5000 }) }",
        "function main() { return torus({ innerSegments: 1e9 }) }",
        "function main() { const a = []; a[1e12] = 1; return cuboid() }",
        "function main() { let s = 'x'; while (true) { s = s + s } }",
    ];
    for script in scripts {
        match sandbox.execute(script, &json!({})) {
            Err(KernelError::Execution(message)) => assert!(
                message.contains("at most") || message.contains("exceeds the limit"),
                "{}: {}",
                script,
                message
            ),
            other => panic!("{} should fail, got {:?}", script, other.map(|b| b.triangle_count())),
        }
    }
    // the host survives and the context stays usable
    let buffer = sandbox.execute("function main() { return cuboid() }", &json!({})).unwrap();
    assert_eq!(buffer.triangle_count(), 12);
}

#[test]
fn test_terminate_returns_during_heavy_modeling_call() {
    let mut sandbox = sandbox_with_timeout(Duration::from_millis(100));
    let heavy = "function main() {\n\
                   const a = sphere({ radius: 10, segments: 512 })\n\
                   return union(a, translate([5, 0, 0], sphere({ radius: 10, segments: 512 })))\n\
                 }";
    assert!(sandbox.execute(heavy, &json!({})).unwrap_err().is_timeout());

    let started = std::time::Instant::now();
    sandbox.terminate();
    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());
    assert!(!sandbox.is_running());

    sandbox.set_timeout(Duration::from_secs(30));
    let buffer = sandbox.execute("function main() { return cuboid() }", &json!({})).unwrap();
    assert_eq!(buffer.triangle_count(), 12);
}
