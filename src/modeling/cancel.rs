// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Cooperative cancellation for long modeling calls.
//!
//! The worker thread installs its cancel flag for the duration of a job;
//! CSG and mesh generation loops poll it without threading it through every
//! signature.

use super::ModelingError;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

thread_local! {
    static FLAG: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
}

struct Restore(Option<Arc<AtomicBool>>);

impl Drop for Restore {
    fn drop(&mut self) {
        let previous = self.0.take();
        FLAG.with(|flag| *flag.borrow_mut() = previous);
    }
}

/// Run `f` with `flag` as this thread's cancel flag
pub fn scoped<R>(flag: Arc<AtomicBool>, f: impl FnOnce() -> R) -> R {
    let previous = FLAG.with(|slot| slot.borrow_mut().replace(flag));
    let _restore = Restore(previous);
    f()
}

pub fn is_cancelled() -> bool {
    FLAG.with(|flag| {
        flag.borrow()
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    })
}

/// Error out of a generation loop once cancelled
pub fn checkpoint() -> Result<(), ModelingError> {
    if is_cancelled() {
        Err(ModelingError::new("execution cancelled"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_is_scoped_to_the_call() {
        assert!(checkpoint().is_ok());
        let flag = Arc::new(AtomicBool::new(true));
        let inside = scoped(flag.clone(), || (is_cancelled(), checkpoint().is_err()));
        assert_eq!(inside, (true, true));
        assert!(!is_cancelled());

        flag.store(false, Ordering::Relaxed);
        scoped(flag.clone(), || {
            assert!(!is_cancelled());
            flag.store(true, Ordering::Relaxed);
            assert!(is_cancelled());
        });
    }
}
