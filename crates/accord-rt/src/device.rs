//! Device storage, keyed by the host variable it is associated with.
//!
//! Each mapping carries two reference counts. The hold count is only
//! touched by `ompx_hold` maps, so storage established by a structured
//! construct survives any unbalanced `exit data` inside it.

use accord_translate::map::MotionDirection;
use accord_translate::{MapDescriptor, MapDirection, MapModifier, VariableIdentity};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::RuntimeError;
use crate::memory::{allocate, View};

/// Elements `start..start + len` of one variable, as named in a clause.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    pub identity: &'a VariableIdentity,
    pub start: i64,
    pub len: i64,
    pub text: &'a str,
}

#[derive(Debug)]
struct Mapping {
    view: View,
    dynamic: u32,
    hold: u32,
}

enum Found {
    Contained(usize),
    Overlap(usize),
    Absent,
}

fn find(mappings: &[Mapping], section: &Section<'_>) -> Found {
    if let Some(i) = mappings.iter().position(|m| m.view.contains(section.start, section.len)) {
        return Found::Contained(i);
    }
    let end = section.start.saturating_add(section.len);
    mappings
        .iter()
        .position(|m| section.start < m.view.end() && m.view.start < end)
        .map_or(Found::Absent, Found::Overlap)
}

fn missing(section: &Section<'_>) -> RuntimeError {
    RuntimeError::MissingStorage {
        name: section.text.to_string(),
        index: section.start.saturating_add(section.len).saturating_sub(1),
    }
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    entries: Mutex<FxHashMap<VariableIdentity, Vec<Mapping>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the entry half of a map clause. Returns the device view the
    /// section resolves to, or `None` when `ompx_no_alloc` found nothing.
    pub fn enter(
        &self,
        section: Section<'_>,
        map: &MapDescriptor,
        host: &View,
    ) -> Result<Option<View>, RuntimeError> {
        let hold = map.has(MapModifier::OmpxHold);
        let mut entries = self.entries.lock();
        let mappings = entries.entry(section.identity.clone()).or_default();
        match find(mappings, &section) {
            Found::Contained(i) => {
                let mapping = &mut mappings[i];
                if hold {
                    mapping.hold += 1;
                } else {
                    mapping.dynamic += 1;
                }
                log::trace!(
                    "`{}` already present (dynamic {}, hold {})",
                    section.text,
                    mapping.dynamic,
                    mapping.hold
                );
                Ok(Some(mapping.view.clone()))
            }
            Found::Overlap(i) => {
                let established = &mappings[i].view;
                Err(RuntimeError::StorageAssociation {
                    operand: section.text.to_string(),
                    start: section.start,
                    len: section.len,
                    established_start: established.start,
                    established_len: established.len(),
                })
            }
            Found::Absent if map.has(MapModifier::Present) => Err(RuntimeError::NotPresent {
                operand: section.text.to_string(),
            }),
            Found::Absent if map.has(MapModifier::OmpxNoAlloc) => Ok(None),
            Found::Absent => {
                let len = usize::try_from(section.len).map_err(|_| missing(&section))?;
                let view = View::new(section.start, allocate(len));
                if matches!(map.direction, MapDirection::To | MapDirection::ToFrom)
                    && !host.copy_to(&view, section.start, section.len)
                {
                    return Err(missing(&section));
                }
                log::debug!("allocated `{}` [{}:{}]", section.text, section.start, section.len);
                mappings.push(Mapping {
                    view: view.clone(),
                    dynamic: u32::from(!hold),
                    hold: u32::from(hold),
                });
                Ok(Some(view))
            }
        }
    }

    /// Applies the exit half of a map clause. Storage is copied back and
    /// freed once both counts reach zero.
    pub fn exit(&self, section: Section<'_>, map: &MapDescriptor, host: &View) -> Result<(), RuntimeError> {
        let mut entries = self.entries.lock();
        let Some(mappings) = entries.get_mut(section.identity) else {
            return Ok(());
        };
        let Found::Contained(i) = find(mappings, &section) else {
            return Ok(());
        };
        let mapping = &mut mappings[i];
        if map.has(MapModifier::OmpxHold) {
            mapping.hold = mapping.hold.saturating_sub(1);
        } else {
            mapping.dynamic = mapping.dynamic.saturating_sub(1);
        }
        if mapping.hold > 0 || mapping.dynamic > 0 {
            return Ok(());
        }
        let mapping = mappings.swap_remove(i);
        if matches!(map.direction, MapDirection::From | MapDirection::ToFrom)
            && !mapping.view.copy_to(host, section.start, section.len)
        {
            return Err(missing(&section));
        }
        log::debug!("freed `{}` [{}:{}]", section.text, mapping.view.start, mapping.view.len());
        Ok(())
    }

    /// `target update`: copies the section between host and device.
    pub fn update(
        &self,
        section: Section<'_>,
        direction: MotionDirection,
        present: bool,
        host: &View,
    ) -> Result<(), RuntimeError> {
        let entries = self.entries.lock();
        let found = entries
            .get(section.identity)
            .and_then(|mappings| match find(mappings, &section) {
                Found::Contained(i) => Some(&mappings[i].view),
                _ => None,
            });
        let Some(device) = found else {
            return if present {
                Err(RuntimeError::NotPresent {
                    operand: section.text.to_string(),
                })
            } else {
                Ok(())
            };
        };
        let copied = match direction {
            MotionDirection::To => host.copy_to(device, section.start, section.len),
            MotionDirection::From => device.copy_to(host, section.start, section.len),
        };
        if copied {
            Ok(())
        } else {
            Err(missing(&section))
        }
    }

    /// The device view holding element `index`, if any.
    pub fn locate(&self, identity: &VariableIdentity, index: i64) -> Option<View> {
        let entries = self.entries.lock();
        entries
            .get(identity)?
            .iter()
            .find(|m| m.view.contains(index, 1))
            .map(|m| m.view.clone())
    }

    pub fn is_present(&self, identity: &VariableIdentity, start: i64, len: i64) -> bool {
        let entries = self.entries.lock();
        entries
            .get(identity)
            .is_some_and(|mappings| mappings.iter().any(|m| m.view.contains(start, len)))
    }

    /// Number of live mappings across all variables.
    pub fn len(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use accord_ast::DeclId;

    use super::*;

    fn descriptor(direction: MapDirection, modifiers: &[MapModifier]) -> MapDescriptor {
        MapDescriptor {
            direction,
            modifiers: modifiers.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn host(values: &[i64]) -> View {
        let view = View::new(0, allocate(values.len()));
        for (i, v) in values.iter().enumerate() {
            view.store(i as i64, *v);
        }
        view
    }

    static A: VariableIdentity = VariableIdentity::Plain(DeclId(0));

    fn section(start: i64, len: i64) -> Section<'static> {
        Section {
            identity: &A,
            start,
            len,
            text: "a",
        }
    }

    #[test]
    fn held_storage_outlives_dynamic_release() {
        let registry = DeviceRegistry::new();
        let memory = host(&[1, 2, 3, 4]);
        let held = descriptor(MapDirection::ToFrom, &[MapModifier::OmpxHold]);
        let release = descriptor(MapDirection::Release, &[]);

        registry.enter(section(0, 4), &held, &memory).unwrap();
        registry.exit(section(0, 4), &release, &memory).unwrap();
        assert!(registry.is_present(&A, 0, 4));

        let device = registry.locate(&A, 2).unwrap();
        device.store(2, 30);
        registry.exit(section(0, 4), &held, &memory).unwrap();
        assert!(registry.is_empty());
        assert_eq!(memory.load(2), Some(30));
    }

    #[test]
    fn contained_sections_share_storage() {
        let registry = DeviceRegistry::new();
        let memory = host(&[0; 8]);
        let to = descriptor(MapDirection::To, &[]);
        let outer = registry.enter(section(0, 8), &to, &memory).unwrap().unwrap();
        let inner = registry.enter(section(2, 2), &to, &memory).unwrap().unwrap();
        assert!(std::sync::Arc::ptr_eq(&outer.cells, &inner.cells));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn straddling_section_is_rejected() {
        let registry = DeviceRegistry::new();
        let memory = host(&[0; 8]);
        let to = descriptor(MapDirection::To, &[]);
        registry.enter(section(0, 2), &to, &memory).unwrap();
        let err = registry.enter(section(0, 5), &to, &memory).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::StorageAssociation {
                operand: "a".to_string(),
                start: 0,
                len: 5,
                established_start: 0,
                established_len: 2,
            }
        );
        // Disjoint sections get their own storage.
        registry.enter(section(4, 2), &to, &memory).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn absent_storage_by_modifier() {
        let registry = DeviceRegistry::new();
        let memory = host(&[0; 2]);
        let present = descriptor(MapDirection::Alloc, &[MapModifier::Present]);
        let no_alloc = descriptor(MapDirection::ToFrom, &[MapModifier::OmpxNoAlloc]);
        assert!(matches!(
            registry.enter(section(0, 2), &present, &memory),
            Err(RuntimeError::NotPresent { .. })
        ));
        assert!(matches!(registry.enter(section(0, 2), &no_alloc, &memory), Ok(None)));
        assert!(registry.is_empty());
        assert!(registry.update(section(0, 2), MotionDirection::To, false, &memory).is_ok());
        assert!(registry.update(section(0, 2), MotionDirection::To, true, &memory).is_err());
    }

    #[test]
    fn sections_at_the_end_of_the_index_range() {
        let registry = DeviceRegistry::new();
        let memory = host(&[0; 2]);
        let alloc = descriptor(MapDirection::Alloc, &[]);
        let near_end = i64::MAX - 1;
        registry.enter(section(near_end, 1), &alloc, &memory).unwrap();
        assert!(matches!(
            registry.enter(section(near_end, 4), &alloc, &memory),
            Err(RuntimeError::StorageAssociation { len: 4, .. })
        ));

        let to = descriptor(MapDirection::To, &[]);
        assert_eq!(
            registry.enter(section(i64::MAX, 2), &to, &memory).unwrap_err(),
            RuntimeError::MissingStorage {
                name: "a".to_string(),
                index: i64::MAX - 1,
            }
        );
    }
}
