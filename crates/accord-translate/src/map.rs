//! Map descriptors for data clauses.
//!
//! Every clause kind has one row in [`base_map`]. The structured hold
//! modifier is added by a single gate in [`synthesize`]; nothing else
//! differs between the `hold` and `no-hold` policies.

use std::collections::BTreeSet;
use std::fmt;

use accord_ast::DataClauseKind;
use miette::SourceSpan;

use crate::config::RefCountPolicy;
use crate::error::TranslateWarning;
use crate::queue::AsyncStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapDirection {
    To,
    From,
    ToFrom,
    Alloc,
    Release,
    /// Motion clauses never map.
    None,
}

impl MapDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            MapDirection::To => "to",
            MapDirection::From => "from",
            MapDirection::ToFrom => "tofrom",
            MapDirection::Alloc => "alloc",
            MapDirection::Release => "release",
            MapDirection::None => "none",
        }
    }

    pub fn copies_in(self) -> bool {
        matches!(self, MapDirection::To | MapDirection::ToFrom)
    }

    pub fn copies_out(self) -> bool {
        matches!(self, MapDirection::From | MapDirection::ToFrom)
    }
}

/// Map-type modifiers, ordered as they are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapModifier {
    Present,
    OmpxNoAlloc,
    OmpxHold,
}

impl MapModifier {
    pub fn as_str(self) -> &'static str {
        match self {
            MapModifier::Present => "present",
            MapModifier::OmpxNoAlloc => "ompx_no_alloc",
            MapModifier::OmpxHold => "ompx_hold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapDescriptor {
    pub direction: MapDirection,
    pub modifiers: BTreeSet<MapModifier>,
}

impl MapDescriptor {
    pub fn has(&self, modifier: MapModifier) -> bool {
        self.modifiers.contains(&modifier)
    }
}

impl fmt::Display for MapDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{},", modifier.as_str())?;
        }
        f.write_str(self.direction.as_str())
    }
}

/// How a clause came to be translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseOrigin {
    /// Written on the construct, identity not established further out.
    Explicit,
    /// Synthesized for a reference in a compute region.
    Implicit,
    /// Written on the construct, but an enclosing scope already holds the
    /// identity.
    NestedInEnclosingScope,
}

/// Whether the construct owns a structured reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructClass {
    /// Data and compute constructs.
    Structured,
    /// Enter and exit data.
    Dynamic,
}

struct MapRow {
    direction: MapDirection,
    qualifiers: &'static [MapModifier],
    holdable: bool,
}

fn base_map(kind: DataClauseKind) -> MapRow {
    let (direction, qualifiers, holdable): (_, &'static [MapModifier], _) = match kind {
        DataClauseKind::Present => (MapDirection::Alloc, &[MapModifier::Present], true),
        DataClauseKind::Copy => (MapDirection::ToFrom, &[], true),
        DataClauseKind::Copyin => (MapDirection::To, &[], true),
        DataClauseKind::Copyout => (MapDirection::From, &[], true),
        DataClauseKind::Create => (MapDirection::Alloc, &[], true),
        DataClauseKind::NoCreate => (MapDirection::Alloc, &[MapModifier::OmpxNoAlloc], true),
        DataClauseKind::Delete => (MapDirection::Release, &[], false),
        DataClauseKind::Host | DataClauseKind::Device => (MapDirection::None, &[], false),
    };
    MapRow {
        direction,
        qualifiers,
        holdable,
    }
}

/// Map descriptor for one clause kind.
pub fn synthesize(
    kind: DataClauseKind,
    origin: ClauseOrigin,
    construct: ConstructClass,
    policy: RefCountPolicy,
) -> MapDescriptor {
    let row = base_map(kind);
    let mut modifiers = row.qualifiers.iter().copied().collect::<BTreeSet<_>>();
    let hold = row.holdable
        && policy == RefCountPolicy::Hold
        && construct == ConstructClass::Structured
        && origin != ClauseOrigin::NestedInEnclosingScope;
    if hold {
        modifiers.insert(MapModifier::OmpxHold);
    }
    MapDescriptor {
        direction: row.direction,
        modifiers,
    }
}

/// Warnings owed for the extension modifiers in `descriptor`.
///
/// `status` is the queue status of the construct carrying the map. A hold
/// on a construct whose queue is only known at run time pins storage for as
/// long as that queue takes to retire it.
pub fn extension_warnings(
    descriptor: &MapDescriptor,
    clause: &str,
    status: AsyncStatus,
    span: SourceSpan,
    warnings: &mut Vec<TranslateWarning>,
) {
    for modifier in &descriptor.modifiers {
        if *modifier == MapModifier::Present {
            continue;
        }
        warnings.push(TranslateWarning::ExtensionModifier {
            modifier: modifier.as_str(),
            clause: clause.to_string(),
            span,
        });
    }
    if descriptor.has(MapModifier::OmpxHold) && status == AsyncStatus::Unknown {
        warnings.push(TranslateWarning::HoldOnUnknownQueue { span });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionDirection {
    To,
    From,
}

/// Data motion of one `update` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotionDescriptor {
    pub direction: MotionDirection,
    pub present: bool,
}

impl MotionDescriptor {
    /// `None` for clause kinds that are not motion clauses.
    pub fn for_clause(kind: DataClauseKind, if_present: bool) -> Option<Self> {
        let direction = match kind {
            DataClauseKind::Host => MotionDirection::From,
            DataClauseKind::Device => MotionDirection::To,
            _ => return None,
        };
        Some(Self {
            direction,
            present: !if_present,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self.direction {
            MotionDirection::To => "to",
            MotionDirection::From => "from",
        }
    }
}
