//! Task ordering through dependency tokens.
//!
//! Tokens are keyed by evaluated queue number. An in-out dependency waits
//! for the previous in-out on the same token and for every in since; an in
//! dependency waits for the previous in-out only.

use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use accord_translate::target::DependKind;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::error::RuntimeError;

/// Queue number of the synchronous queue.
pub const SYNC_QUEUE: i64 = -1;

/// The token key an evaluated queue argument lands on. The no-value and
/// default queues share queue 0.
pub fn queue_key(value: i64) -> i64 {
    match value {
        -2 | -3 => 0,
        other => other,
    }
}

/// One-shot completion flag.
#[derive(Debug, Default)]
pub struct Completion {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    pub fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }

    pub fn signal(&self) {
        *self.done.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_done(&self) -> bool {
        *self.done.lock()
    }
}

/// Signals even when the task unwinds, so dependents never hang.
struct SignalOnDrop(Arc<Completion>);

impl Drop for SignalOnDrop {
    fn drop(&mut self) {
        self.0.signal();
    }
}

#[derive(Debug, Default)]
struct TokenState {
    last_inout: Option<Arc<Completion>>,
    readers: Vec<Arc<Completion>>,
}

type TaskHandle = JoinHandle<Result<(), RuntimeError>>;

#[derive(Debug, Default)]
pub struct Scheduler {
    tokens: Mutex<FxHashMap<i64, TokenState>>,
    tasks: Mutex<Vec<TaskHandle>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `completion` against every dependency and returns what it
    /// has to wait for.
    fn register(&self, depends: &[(DependKind, i64)], completion: &Arc<Completion>) -> Vec<Arc<Completion>> {
        let mut tokens = self.tokens.lock();
        let mut predecessors = Vec::new();
        for &(kind, key) in depends {
            let state = tokens.entry(key).or_default();
            match kind {
                DependKind::InOut => {
                    predecessors.extend(state.last_inout.take());
                    predecessors.append(&mut state.readers);
                    state.last_inout = Some(completion.clone());
                }
                DependKind::In => {
                    predecessors.extend(state.last_inout.clone());
                    state.readers.push(completion.clone());
                }
            }
        }
        predecessors.retain(|p| !Arc::ptr_eq(p, completion));
        predecessors
    }

    /// Runs `work` on its own thread once its predecessors complete.
    pub fn spawn<F>(&self, name: String, depends: &[(DependKind, i64)], work: F)
    where
        F: FnOnce() -> Result<(), RuntimeError> + Send + 'static,
    {
        let completion = Arc::new(Completion::default());
        let predecessors = self.register(depends, &completion);
        log::debug!("spawning `{name}` behind {} task(s)", predecessors.len());
        let handle = thread::spawn(move || {
            let _signal = SignalOnDrop(completion);
            for predecessor in &predecessors {
                predecessor.wait();
            }
            let result = work();
            log::debug!("`{name}` finished");
            result
        });
        self.tasks.lock().push(handle);
    }

    /// Blocks the calling thread the way a task with `depends` would wait.
    pub fn wait(&self, depends: &[(DependKind, i64)]) {
        let completion = Arc::new(Completion::default());
        let predecessors = self.register(depends, &completion);
        log::trace!("waiting on {} task(s)", predecessors.len());
        for predecessor in &predecessors {
            predecessor.wait();
        }
        completion.signal();
    }

    /// Joins every task spawned so far and reports the first failure.
    pub fn join(&self) -> Result<(), RuntimeError> {
        let mut first = None;
        loop {
            let handles = mem::take(&mut *self.tasks.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                let error = match handle.join() {
                    Ok(Ok(())) => continue,
                    Ok(Err(err)) => err,
                    Err(_) => RuntimeError::TaskPanicked,
                };
                log::warn!("asynchronous task failed: {error}");
                first.get_or_insert(error);
            }
        }
        first.map_or(Ok(()), Err)
    }
}
