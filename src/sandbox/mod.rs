// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script sandbox: static validation, the rounding-radius safety patch, and
//! dispatch to a reusable execution context with a caller-side timeout.

pub mod params;
pub mod rewrite;
pub mod validate;
pub mod worker;

pub use params::{defaults_from_definitions, merge_params, ParameterDefinition};
pub use rewrite::apply_safety_patch;
pub use validate::{validate_script, ViolationKind};
pub use worker::{ExecutionContext, WorkerOptions};

use crate::error::{KernelError, Result};
use crate::geometry::GeometryBuffer;
use log::debug;
use std::time::Duration;
use worker::{Entry, JobOutput, ScriptJob};

/// Where the most recent invocation got to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SandboxStage {
    #[default]
    Idle,
    Received,
    Validated,
    Rewritten,
    Dispatched,
    Resolved,
    Rejected,
    TimedOut,
}

#[derive(Debug, Clone, Copy)]
pub struct SandboxOptions {
    pub timeout: Duration,
    pub worker: WorkerOptions,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            worker: WorkerOptions::default(),
        }
    }
}

/// Owns at most one execution context, created on first use
pub struct Sandbox {
    options: SandboxOptions,
    context: Option<ExecutionContext>,
    stage: SandboxStage,
}

impl Sandbox {
    pub fn new(options: SandboxOptions) -> Self {
        Self {
            options,
            context: None,
            stage: SandboxStage::Idle,
        }
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.options
    }

    /// Change how long callers wait; applies from the next invocation
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.options.timeout = timeout;
    }

    pub fn stage(&self) -> SandboxStage {
        self.stage
    }

    /// True while an execution context exists
    pub fn is_running(&self) -> bool {
        self.context.is_some()
    }

    fn transition(&mut self, stage: SandboxStage) {
        debug!("sandbox: {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    /// Validate and patch a script without running it
    pub fn prepare(&mut self, script: &str) -> Result<String> {
        self.transition(SandboxStage::Received);
        let violations = validate_script(script);
        if !violations.is_empty() {
            self.transition(SandboxStage::Rejected);
            return Err(KernelError::Validation { violations });
        }
        self.transition(SandboxStage::Validated);

        let patched = apply_safety_patch(script);
        self.transition(SandboxStage::Rewritten);
        Ok(patched)
    }

    /// Run `main(params)` and mesh whatever it returns
    pub fn execute(&mut self, script: &str, params: &serde_json::Value) -> Result<GeometryBuffer> {
        let script = self.prepare(script)?;
        let job = ScriptJob {
            script,
            params: params.clone(),
            entry: Entry::Main,
        };
        match self.dispatch(job)? {
            JobOutput::Mesh(buffer) => Ok(buffer),
            JobOutput::Definitions(_) => Err(KernelError::Execution("unexpected worker output".into())),
        }
    }

    /// Definitions from the script's optional `getParameterDefinitions()`
    pub fn parameter_definitions(&mut self, script: &str) -> Result<Vec<ParameterDefinition>> {
        let script = self.prepare(script)?;
        let job = ScriptJob {
            script,
            params: serde_json::Value::Null,
            entry: Entry::ParameterDefinitions,
        };
        match self.dispatch(job)? {
            JobOutput::Definitions(raw) => params::definitions_from_json(&raw),
            JobOutput::Mesh(_) => Err(KernelError::Execution("unexpected worker output".into())),
        }
    }

    fn dispatch(&mut self, job: ScriptJob) -> Result<JobOutput> {
        let timeout = self.options.timeout;
        let context = match self.context.take() {
            Some(context) => context,
            None => ExecutionContext::new(self.options.worker)?,
        };
        let context = self.context.insert(context);

        let id = match context.submit(job) {
            Ok(id) => id,
            Err(err) => {
                self.context = None;
                self.transition(SandboxStage::Rejected);
                return Err(err);
            }
        };
        self.transition(SandboxStage::Dispatched);

        let result = match self.context.as_ref() {
            Some(context) => context.wait(id, timeout),
            None => Err(KernelError::Execution("execution context has stopped".into())),
        };
        match &result {
            Ok(_) => self.transition(SandboxStage::Resolved),
            Err(err) if err.is_timeout() => self.transition(SandboxStage::TimedOut),
            Err(_) => self.transition(SandboxStage::Rejected),
        }
        result
    }

    /// Cancel whatever is running and forget the context; the next call starts a new one
    pub fn terminate(&mut self) {
        if let Some(context) = self.context.take() {
            context.terminate();
            debug!("sandbox: execution context terminated");
        }
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(SandboxOptions::default())
    }
}
