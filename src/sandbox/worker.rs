// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Reusable execution context: a dedicated thread that owns the interpreter.
//!
//! Requests carry an id; the caller waits for the response with the matching
//! id and drops anything older, which is how a late answer to a timed-out
//! request is discarded while the context stays usable.

use super::params::{json_to_value, value_to_json};
use crate::error::{KernelError, Result};
use crate::geometry::GeometryBuffer;
use crate::modeling::{self, Geometry};
use crate::script::{Interpreter, InterpreterOptions, Value};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use log::debug;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Entry point a job invokes after the top-level statements ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Main,
    ParameterDefinitions,
}

#[derive(Debug, Clone)]
pub struct ScriptJob {
    pub script: String,
    pub params: serde_json::Value,
    pub entry: Entry,
}

#[derive(Debug)]
pub enum JobOutput {
    Mesh(GeometryBuffer),
    Definitions(serde_json::Value),
}

enum WorkerCommand {
    Run { id: u64, job: ScriptJob },
    Stop,
}

struct WorkerResponse {
    id: u64,
    result: std::result::Result<JobOutput, String>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub stack_size: usize,
    pub max_call_depth: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            stack_size: 256 * 1024 * 1024,
            max_call_depth: InterpreterOptions::default().max_call_depth,
        }
    }
}

/// Bookkeeping shared with the worker thread
#[derive(Debug, Default)]
struct WorkerState {
    running: Option<u64>,
    completed: u64,
    last_error: Option<String>,
}

pub struct ExecutionContext {
    tx_cmd: Sender<WorkerCommand>,
    rx_result: Receiver<WorkerResponse>,
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<WorkerState>>,
    next_id: u64,
    thread_handle: Option<JoinHandle<()>>,
}

impl ExecutionContext {
    pub fn new(options: WorkerOptions) -> Result<Self> {
        let (tx_cmd, rx_cmd) = channel::unbounded::<WorkerCommand>();
        let (tx_result, rx_result) = channel::unbounded::<WorkerResponse>();
        let cancel = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(WorkerState::default()));

        let cancel_clone = Arc::clone(&cancel);
        let state_clone = Arc::clone(&state);
        let thread_handle = thread::Builder::new()
            .name("solidcraft-sandbox".into())
            .stack_size(options.stack_size)
            .spawn(move || {
                worker_thread(rx_cmd, tx_result, cancel_clone, state_clone, options);
            })?;
        debug!("execution context started ({} MiB stack)", options.stack_size / (1024 * 1024));

        Ok(Self {
            tx_cmd,
            rx_result,
            cancel,
            state,
            next_id: 0,
            thread_handle: Some(thread_handle),
        })
    }

    /// Queue a job and return its request id
    pub fn submit(&mut self, job: ScriptJob) -> Result<u64> {
        self.next_id += 1;
        let id = self.next_id;
        self.tx_cmd
            .send(WorkerCommand::Run { id, job })
            .map_err(|_| KernelError::Execution("execution context has stopped".into()))?;
        Ok(id)
    }

    /// Wait for the response to `id`, dropping stale responses
    pub fn wait(&self, id: u64, timeout: Duration) -> Result<JobOutput> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx_result.recv_timeout(remaining) {
                Ok(response) if response.id == id => {
                    return response.result.map_err(KernelError::Execution);
                }
                Ok(stale) => debug!("dropping stale response to request {}", stale.id),
                Err(RecvTimeoutError::Timeout) => return Err(KernelError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(KernelError::Execution("execution context has stopped".into()));
                }
            }
        }
    }

    pub fn run(&mut self, job: ScriptJob, timeout: Duration) -> Result<JobOutput> {
        let id = self.submit(job)?;
        self.wait(id, timeout)
    }

    /// Ask the interpreter to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Cancel and stop the worker without waiting for it.
    ///
    /// A worker busy inside one modeling call only notices the cancel flag at
    /// its next checkpoint, so the thread is detached and winds down on its
    /// own. Dropping the context instead joins the thread.
    pub fn terminate(mut self) {
        self.cancel();
        let _ = self.tx_cmd.send(WorkerCommand::Stop);
        if let Some(handle) = self.thread_handle.take() {
            debug!(
                "detaching execution context thread (busy: {})",
                self.state.lock().running.is_some()
            );
            drop(handle);
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().running.is_some()
    }

    pub fn completed_jobs(&self) -> u64 {
        self.state.lock().completed
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.cancel();
        let _ = self.tx_cmd.send(WorkerCommand::Stop);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_thread(
    rx_cmd: Receiver<WorkerCommand>,
    tx_result: Sender<WorkerResponse>,
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<WorkerState>>,
    options: WorkerOptions,
) {
    while let Ok(cmd) = rx_cmd.recv() {
        match cmd {
            WorkerCommand::Run { id, job } => {
                state.lock().running = Some(id);

                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    modeling::cancel::scoped(Arc::clone(&cancel), || run_job(&job, &cancel, options))
                }))
                .unwrap_or_else(|payload| Err(format!("script panicked: {}", panic_message(&*payload))));
                // a cancelled modeling call may have returned a partial result
                let result = if cancel.load(Ordering::Relaxed) {
                    Err("execution cancelled".to_string())
                } else {
                    result
                };

                {
                    let mut state = state.lock();
                    state.running = None;
                    state.completed += 1;
                    state.last_error = result.as_ref().err().cloned();
                }
                if tx_result.send(WorkerResponse { id, result }).is_err() {
                    return;
                }
            }
            WorkerCommand::Stop => return,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Execute one script in a fresh interpreter
fn run_job(
    job: &ScriptJob,
    cancel: &Arc<AtomicBool>,
    options: WorkerOptions,
) -> std::result::Result<JobOutput, String> {
    let mut interp = Interpreter::new(
        InterpreterOptions {
            max_call_depth: options.max_call_depth,
        },
        Arc::clone(cancel),
    );
    interp.run(&job.script).map_err(|e| e.to_string())?;

    match job.entry {
        Entry::Main => {
            let main = interp
                .entry_point("main")
                .ok_or_else(|| "script does not define a main function".to_string())?;
            let result = interp
                .call(&main, vec![json_to_value(&job.params)])
                .map_err(|e| e.to_string())?;
            let buffer = resolve_mesh(&result)?;
            debug!("script produced {} triangles", buffer.triangle_count());
            Ok(JobOutput::Mesh(buffer))
        }
        Entry::ParameterDefinitions => match interp.entry_point("getParameterDefinitions") {
            Some(f) => {
                let definitions = interp.call(&f, Vec::new()).map_err(|e| e.to_string())?;
                Ok(JobOutput::Definitions(value_to_json(&definitions)))
            }
            None => Ok(JobOutput::Definitions(serde_json::Value::Array(Vec::new()))),
        },
    }
}

fn collect_geometry(value: &Value, out: &mut Vec<Geometry>) -> std::result::Result<(), String> {
    match value {
        Value::Geometry(geometry) => {
            out.push(geometry.as_ref().clone());
            Ok(())
        }
        Value::Array(items) => items.borrow().iter().try_for_each(|item| collect_geometry(item, out)),
        other => Err(format!("main must return geometry, got {}", other.type_name())),
    }
}

/// Flatten the entry point's result, union it, and mesh the solid
pub(crate) fn resolve_mesh(result: &Value) -> std::result::Result<GeometryBuffer, String> {
    let mut geometries = Vec::new();
    collect_geometry(result, &mut geometries)?;

    let geometry = match geometries.len() {
        0 => return Err("main returned no geometry".into()),
        1 => geometries.remove(0),
        _ => modeling::union(&geometries).map_err(|e| e.to_string())?,
    };

    match geometry {
        Geometry::Solid(solid) => Ok(solid.to_buffer()),
        Geometry::Shape(_) => Err("main returned a 2D shape; extrude it before export".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(script: &str) -> ScriptJob {
        ScriptJob {
            script: script.to_string(),
            params: json!({}),
            entry: Entry::Main,
        }
    }

    #[test]
    fn test_runs_main_and_returns_mesh() {
        let mut context = ExecutionContext::new(WorkerOptions::default()).unwrap();
        let output = context
            .run(
                job("function main(p) { return cuboid({ size: [p.w || 2, 2, 2] }) }"),
                Duration::from_secs(10),
            )
            .unwrap();
        match output {
            JobOutput::Mesh(buffer) => assert_eq!(buffer.triangle_count(), 12),
            other => panic!("unexpected output {:?}", other),
        }
        assert_eq!(context.completed_jobs(), 1);
        assert!(context.last_error().is_none());
    }

    #[test]
    fn test_result_arrays_are_unioned() {
        let mut context = ExecutionContext::new(WorkerOptions::default()).unwrap();
        let output = context
            .run(
                job("function main() { return [cuboid(), [translate([5, 0, 0], cuboid())]] }"),
                Duration::from_secs(10),
            )
            .unwrap();
        let JobOutput::Mesh(buffer) = output else { panic!("expected a mesh") };
        let bounds = buffer.bounds();
        assert!((bounds.min.x + 1.0).abs() < 1e-5);
        assert!((bounds.max.x - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_script_errors_are_reported() {
        let mut context = ExecutionContext::new(WorkerOptions::default()).unwrap();
        let timeout = Duration::from_secs(10);

        let err = context.run(job("function main() { return missing }"), timeout).unwrap_err();
        assert!(err.to_string().contains("missing is not defined"));
        assert!(context.last_error().is_some());

        let err = context.run(job("function main() { return circle() }"), timeout).unwrap_err();
        assert!(err.to_string().contains("2D shape"));

        let err = context.run(job("function main() { return 3 }"), timeout).unwrap_err();
        assert!(err.to_string().contains("got number"));

        let err = context.run(job("const x = 1"), timeout).unwrap_err();
        assert!(err.to_string().contains("main function"));

        // the context stays usable after failures
        assert!(context.run(job("function main() { return sphere() }"), timeout).is_ok());
    }

    #[test]
    fn test_stale_response_is_dropped() {
        let mut context = ExecutionContext::new(WorkerOptions::default()).unwrap();
        let slow = context
            .submit(job("function main() { let i = 0; while (i < 20000) { i++ } return cuboid() }"))
            .unwrap();
        let fast = context.submit(job("function main() { return sphere({ segments: 8 }) }")).unwrap();
        assert!(fast > slow);

        let output = context.wait(fast, Duration::from_secs(30)).unwrap();
        let JobOutput::Mesh(buffer) = output else { panic!("expected a mesh") };
        assert!(buffer.triangle_count() > 12);
    }

    #[test]
    fn test_parameter_definitions_entry() {
        let mut context = ExecutionContext::new(WorkerOptions::default()).unwrap();
        let output = context
            .run(
                ScriptJob {
                    script: "function getParameterDefinitions() { return [{ name: 'w', type: 'float', initial: 4 }] }\n\
                             function main() { return cuboid() }"
                        .to_string(),
                    params: json!({}),
                    entry: Entry::ParameterDefinitions,
                },
                Duration::from_secs(10),
            )
            .unwrap();
        let JobOutput::Definitions(definitions) = output else { panic!("expected definitions") };
        assert_eq!(definitions, json!([{ "name": "w", "type": "float", "initial": 4 }]));
    }

    #[test]
    fn test_drop_cancels_running_script() {
        let mut context = ExecutionContext::new(WorkerOptions::default()).unwrap();
        let id = context.submit(job("function main() { while (true) {} }")).unwrap();
        let err = context.wait(id, Duration::from_millis(100)).unwrap_err();
        assert!(err.is_timeout());
        assert!(context.is_busy());
        drop(context);
    }

    #[test]
    fn test_terminate_does_not_wait_for_modeling_call() {
        let mut context = ExecutionContext::new(WorkerOptions::default()).unwrap();
        let id = context
            .submit(job(
                "function main() { return union(sphere({ segments: 512 }), translate([0.5, 0, 0], sphere({ segments: 512 }))) }",
            ))
            .unwrap();
        let err = context.wait(id, Duration::from_millis(100)).unwrap_err();
        assert!(err.is_timeout());

        let started = Instant::now();
        context.terminate();
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_cancelled_job_reports_cancellation() {
        let mut context = ExecutionContext::new(WorkerOptions::default()).unwrap();
        context.cancel();
        let err = context
            .run(job("function main() { return cuboid() }"), Duration::from_secs(10))
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"), "{}", err);
    }
}
