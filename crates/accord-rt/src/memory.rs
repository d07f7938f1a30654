//! Host storage and the views kernels read through.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use accord_ast::{DeclKind, DeclTable, Shape};
use accord_translate::VariableIdentity;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Element storage shared between the host and running tasks.
pub type Cells = Arc<[AtomicI64]>;

pub fn allocate(len: usize) -> Cells {
    (0..len).map(|_| AtomicI64::new(0)).collect()
}

/// A run of cells holding elements `start..start + len` of a variable.
#[derive(Debug, Clone)]
pub struct View {
    pub start: i64,
    pub cells: Cells,
}

impl View {
    pub fn new(start: i64, cells: Cells) -> Self {
        Self { start, cells }
    }

    pub fn len(&self) -> i64 {
        self.cells.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn end(&self) -> i64 {
        self.start.saturating_add(self.len())
    }

    pub fn contains(&self, start: i64, len: i64) -> bool {
        start >= self.start && start.checked_add(len).is_some_and(|end| end <= self.end())
    }

    fn cell(&self, index: i64) -> Option<&AtomicI64> {
        let offset = usize::try_from(index.checked_sub(self.start)?).ok()?;
        self.cells.get(offset)
    }

    pub fn load(&self, index: i64) -> Option<i64> {
        self.cell(index).map(|c| c.load(Ordering::Acquire))
    }

    pub fn store(&self, index: i64, value: i64) -> bool {
        match self.cell(index) {
            Some(cell) => {
                cell.store(value, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// A private copy of the current contents.
    pub fn snapshot(&self) -> View {
        let cells = self
            .cells
            .iter()
            .map(|c| AtomicI64::new(c.load(Ordering::Acquire)))
            .collect();
        View::new(self.start, cells)
    }

    /// Copies elements `start..start + len` from `self` into `to`.
    /// Returns false if either side lacks one of them.
    pub fn copy_to(&self, to: &View, start: i64, len: i64) -> bool {
        if !self.contains(start, len) || !to.contains(start, len) {
            return false;
        }
        for index in start..start.saturating_add(len) {
            if let Some(value) = self.load(index) {
                to.store(index, value);
            }
        }
        true
    }
}

/// Host copies of every variable a program declares.
#[derive(Debug, Default)]
pub struct HostMemory {
    storage: RwLock<FxHashMap<VariableIdentity, Cells>>,
}

impl HostMemory {
    /// Zeroed storage for every canonical variable. Arrays of unknown
    /// length start empty until [`HostMemory::define`] sizes them.
    pub fn new(decls: &DeclTable) -> Self {
        let mut storage = FxHashMap::default();
        for decl in decls.iter() {
            if decl.kind != DeclKind::Variable || decl.canonical != decl.id {
                continue;
            }
            let len = match decl.shape {
                Shape::Scalar | Shape::Pointer | Shape::Record => 1,
                Shape::Array(Some(n)) => n as usize,
                Shape::Array(None) => 0,
            };
            storage.insert(VariableIdentity::Plain(decl.id), allocate(len));
        }
        Self {
            storage: RwLock::new(storage),
        }
    }

    /// Replaces the storage of `identity` with `values`.
    pub fn define(&self, identity: VariableIdentity, values: &[i64]) {
        let cells: Cells = values.iter().map(|v| AtomicI64::new(*v)).collect();
        self.storage.write().insert(identity, cells);
    }

    pub fn view(&self, identity: &VariableIdentity) -> Option<View> {
        self.storage.read().get(identity).map(|cells| View::new(0, cells.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_are_offset_by_their_start() {
        let view = View::new(2, allocate(3));
        assert!(view.store(4, 7));
        assert!(!view.store(5, 1));
        assert_eq!(view.load(4), Some(7));
        assert_eq!(view.load(1), None);
        assert!(view.contains(2, 3));
        assert!(!view.contains(1, 2));
    }

    #[test]
    fn snapshots_do_not_alias() {
        let view = View::new(0, allocate(1));
        view.store(0, 3);
        let copy = view.snapshot();
        view.store(0, 4);
        assert_eq!(copy.load(0), Some(3));
    }

    #[test]
    fn copies_only_whole_ranges() {
        let host = View::new(0, allocate(4));
        for i in 0..4 {
            host.store(i, i * 10);
        }
        let device = View::new(1, allocate(2));
        assert!(host.copy_to(&device, 1, 2));
        assert_eq!(device.load(2), Some(20));
        assert!(!host.copy_to(&device, 0, 2));
    }
}
