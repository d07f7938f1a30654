//! Host code and kernel bodies, bound by label.
//!
//! The executor never interprets the statements a translated program
//! leaves opaque. Tests bind a closure to each label instead; the closure
//! reads and writes variables through a [`KernelContext`], which resolves
//! names against whatever storage is visible where the code runs.

use std::sync::Arc;
use std::thread;

use accord_translate::VariableIdentity;
use rustc_hash::FxHashMap;

use crate::error::RuntimeError;
use crate::executor::Shared;
use crate::memory::View;

pub type Kernel = Arc<dyn Fn(&KernelContext<'_>) -> Result<(), RuntimeError> + Send + Sync>;

/// Storage visible to the statement being executed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Frame {
    pub on_device: bool,
    /// Device mappings and private copies made on region entry.
    pub views: FxHashMap<VariableIdentity, View>,
}

impl Frame {
    pub fn host() -> Self {
        Self::default()
    }

    pub fn device(views: FxHashMap<VariableIdentity, View>) -> Self {
        Self { on_device: true, views }
    }

    /// Region views first, then any device mapping when offloaded, then
    /// host memory.
    pub fn resolve(&self, shared: &Shared, identity: &VariableIdentity, index: i64) -> Option<View> {
        if let Some(view) = self.views.get(identity).filter(|v| v.contains(index, 1)) {
            return Some(view.clone());
        }
        if self.on_device {
            if let Some(view) = shared.device.locate(identity, index) {
                return Some(view);
            }
        }
        shared.host.view(identity)
    }

    pub fn load(&self, shared: &Shared, identity: &VariableIdentity, name: &str, index: i64) -> Result<i64, RuntimeError> {
        self.resolve(shared, identity, index)
            .and_then(|view| view.load(index))
            .ok_or_else(|| RuntimeError::MissingStorage {
                name: name.to_string(),
                index,
            })
    }
}

pub struct KernelContext<'a> {
    shared: &'a Shared,
    frame: &'a Frame,
}

impl<'a> KernelContext<'a> {
    pub(crate) fn new(shared: &'a Shared, frame: &'a Frame) -> Self {
        Self { shared, frame }
    }

    /// Whether the code runs inside an offloaded region.
    pub fn on_device(&self) -> bool {
        self.frame.on_device
    }

    fn identity(&self, name: &str) -> Result<VariableIdentity, RuntimeError> {
        self.shared.identity(name)
    }

    pub fn load(&self, name: &str, index: i64) -> Result<i64, RuntimeError> {
        let identity = self.identity(name)?;
        self.frame.load(self.shared, &identity, name, index)
    }

    pub fn store(&self, name: &str, index: i64, value: i64) -> Result<(), RuntimeError> {
        let identity = self.identity(name)?;
        let stored = self
            .frame
            .resolve(self.shared, &identity, index)
            .is_some_and(|view| view.store(index, value));
        if stored {
            Ok(())
        } else {
            Err(RuntimeError::MissingStorage {
                name: name.to_string(),
                index,
            })
        }
    }

    pub fn get(&self, name: &str) -> Result<i64, RuntimeError> {
        self.load(name, 0)
    }

    pub fn set(&self, name: &str, value: i64) -> Result<(), RuntimeError> {
        self.store(name, 0, value)
    }

    /// Spins until `ready` holds. Used by kernels that wait on each other.
    pub fn wait_until<F>(&self, mut ready: F) -> Result<(), RuntimeError>
    where
        F: FnMut(&Self) -> Result<bool, RuntimeError>,
    {
        while !ready(self)? {
            thread::yield_now();
        }
        Ok(())
    }
}
