//! Bookkeeping of which identities carry which data attribute.
//!
//! Each directive collects its clauses into a [`DirectiveTable`], which
//! catches duplicates and conflicting kinds within that directive. Tables of
//! data-establishing constructs are then pushed onto the [`ConflictLedger`]
//! scope stack so nested constructs can see what their ancestors already
//! established.

use accord_ast::{AccDirectiveKind, DataClauseKind, DataSpelling, Expr};
use indexmap::IndexMap;
use miette::SourceSpan;

use crate::identity::{DataRange, VariableIdentity};

/// One resolved clause operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataClause {
    pub kind: DataClauseKind,
    pub spelling: DataSpelling,
    pub target: VariableIdentity,
    pub range: DataRange,
    pub is_implicit: bool,
    /// The operand as written, for rendering.
    pub operand: Expr,
    pub span: SourceSpan,
}

impl DataClause {
    pub fn clause_name(&self) -> String {
        self.spelling.spell(self.kind)
    }
}

/// Why a clause could not be merged into a directive's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeConflict {
    /// Same kind for the same identity.
    DefinedAgain { first: SourceSpan },
    /// Two different kinds for the same identity.
    Incompatible { previous: DataClauseKind, first: SourceSpan },
    /// Two motion clauses of one update naming the same identity.
    SameMotionVariable { first: SourceSpan },
}

/// Clauses of a single directive, keyed by identity, in source order.
#[derive(Debug, Clone, Default)]
pub struct DirectiveTable {
    entries: IndexMap<VariableIdentity, DataClause>,
}

impl DirectiveTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `clause` unless its identity already has an entry. On
    /// conflict the first entry is kept and the incoming clause is dropped.
    pub fn record(&mut self, clause: DataClause) -> Result<(), MergeConflict> {
        if let Some(existing) = self.entries.get(&clause.target) {
            let first = existing.span;
            return Err(if existing.kind == clause.kind {
                MergeConflict::DefinedAgain { first }
            } else if existing.kind.is_motion() && clause.kind.is_motion() {
                MergeConflict::SameMotionVariable { first }
            } else {
                MergeConflict::Incompatible {
                    previous: existing.kind,
                    first,
                }
            });
        }
        self.entries.insert(clause.target.clone(), clause);
        Ok(())
    }

    pub fn get(&self, identity: &VariableIdentity) -> Option<&DataClause> {
        self.entries.get(identity)
    }

    pub fn contains(&self, identity: &VariableIdentity) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn clauses(&self) -> impl Iterator<Item = &DataClause> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What an enclosing scope established for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeEntry {
    pub kind: DataClauseKind,
    pub range: DataRange,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub directive: AccDirectiveKind,
    pub span: SourceSpan,
    entries: IndexMap<VariableIdentity, ScopeEntry>,
}

impl Scope {
    pub fn entry(&self, identity: &VariableIdentity) -> Option<&ScopeEntry> {
        self.entries.get(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Stack of data-establishing scopes matching construct nesting.
#[derive(Debug, Default)]
pub struct ConflictLedger {
    scopes: Vec<Scope>,
}

impl ConflictLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a scope holding the explicit and implicit clauses of a data
    /// or compute construct.
    pub fn push_scope<'a>(
        &mut self,
        directive: AccDirectiveKind,
        span: SourceSpan,
        clauses: impl IntoIterator<Item = &'a DataClause>,
    ) {
        let entries = clauses
            .into_iter()
            .map(|c| {
                let entry = ScopeEntry {
                    kind: c.kind,
                    range: c.range,
                    span: c.span,
                };
                (c.target.clone(), entry)
            })
            .collect::<IndexMap<_, _>>();
        log::trace!("push {} scope with {} entries", directive.name(), entries.len());
        self.scopes.push(Scope {
            directive,
            span,
            entries,
        });
    }

    pub fn pop_scope(&mut self) -> Option<Scope> {
        let scope = self.scopes.pop();
        if let Some(scope) = &scope {
            log::trace!("pop {} scope", scope.directive.name());
        }
        scope
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Nearest enclosing entry for `identity`. Fields of the owning
    /// instance are also visible through `this[0:1]`.
    pub fn visible(&self, identity: &VariableIdentity) -> Option<&ScopeEntry> {
        self.scopes.iter().rev().find_map(|scope| {
            scope.entry(identity).or_else(|| match identity {
                VariableIdentity::ImplicitMember(_) => scope.entry(&VariableIdentity::WholeImplicitOwner),
                _ => None,
            })
        })
    }

    /// Ranges of `identity` established by every live enclosing scope,
    /// innermost first.
    pub fn live_ranges<'a>(&'a self, identity: &'a VariableIdentity) -> impl Iterator<Item = DataRange> + 'a {
        self.scopes
            .iter()
            .rev()
            .filter_map(move |scope| scope.entry(identity).map(|e| e.range))
    }
}
