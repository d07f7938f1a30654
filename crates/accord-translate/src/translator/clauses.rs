use accord_ast::{AccClauseKind, AccDirective, AccDirectiveKind, DataClauseKind, Expr, Shape};
use indexmap::IndexMap;
use miette::SourceSpan;

use super::DirectiveTranslator;
use crate::error::{TranslateError, TranslateWarning};
use crate::identity::{self, IdentityError, IdentityRules};
use crate::ledger::{DataClause, DirectiveTable, MergeConflict};
use crate::map::{self, ClauseOrigin, ConstructClass, MapDescriptor, MotionDescriptor};
use crate::queue::{self, AsyncDesignator, AsyncStatus};
use crate::subarray::{self, RuntimeEscape, SubarrayVerdict};
use crate::target::{TargetClause, TargetOperand};

/// Clauses of one directive after validation.
pub(super) struct Gathered<'d> {
    pub table: DirectiveTable,
    pub condition: Option<&'d Expr>,
    pub if_present: bool,
    pub queue: Option<(AsyncDesignator, AsyncStatus)>,
    /// A structural error means the directive is not emitted.
    pub abandoned: bool,
}

fn clause_allowed(directive: AccDirectiveKind, clause: &AccClauseKind) -> bool {
    use AccDirectiveKind as D;
    use DataClauseKind as K;
    match clause {
        AccClauseKind::Data { kind, .. } => match directive {
            D::Data | D::Parallel | D::ParallelLoop => {
                matches!(kind, K::Present | K::Copy | K::Copyin | K::Copyout | K::Create | K::NoCreate)
            }
            D::EnterData => matches!(kind, K::Copyin | K::Create),
            D::ExitData => matches!(kind, K::Copyout | K::Delete),
            D::Update => kind.is_motion(),
            D::Loop | D::Wait => false,
        },
        AccClauseKind::If(_) => !matches!(directive, D::Loop | D::Wait),
        AccClauseKind::IfPresent => directive == D::Update,
        AccClauseKind::Async(_) => matches!(
            directive,
            D::EnterData | D::ExitData | D::Parallel | D::ParallelLoop | D::Update
        ),
    }
}

/// Clause kinds of which a directive needs at least one, and how the
/// requirement reads in a diagnostic.
fn required_clauses(directive: AccDirectiveKind) -> Option<(&'static [DataClauseKind], &'static str)> {
    use DataClauseKind as K;
    match directive {
        AccDirectiveKind::Data => Some((
            &[K::Present, K::Copy, K::Copyin, K::Copyout, K::Create, K::NoCreate],
            "present, copy, copyin, copyout, create, no_create",
        )),
        AccDirectiveKind::EnterData => Some((&[K::Copyin, K::Create], "copyin, create")),
        AccDirectiveKind::ExitData => Some((&[K::Copyout, K::Delete], "copyout, delete")),
        AccDirectiveKind::Update => Some((&[K::Host, K::Device], "self, host, device")),
        _ => None,
    }
}

/// Clause kinds that write the storage they name.
fn writes_storage(kind: DataClauseKind) -> bool {
    matches!(
        kind,
        DataClauseKind::Copy | DataClauseKind::Copyout | DataClauseKind::Host | DataClauseKind::Device
    )
}

fn operand_error(
    error: IdentityError,
    directive: AccDirectiveKind,
    clause: &str,
) -> TranslateError {
    let clause = clause.to_string();
    match error {
        IdentityError::MissingBounds(span) => TranslateError::MissingBounds { clause, span },
        IdentityError::NegativeLength(span) => TranslateError::NegativeLength { clause, span },
        IdentityError::SubarrayNotPermitted(span) => TranslateError::SubarrayNotPermitted {
            directive: directive.name(),
            clause,
            span,
        },
        IdentityError::MemberNotPermitted(span) => TranslateError::MemberNotPermitted {
            directive: directive.name(),
            clause,
            span,
        },
        IdentityError::NestedMember(span) => TranslateError::NestedMember { span },
        IdentityError::UnexpectedOperand(span) => TranslateError::UnexpectedOperand { clause, span },
        IdentityError::OwnerNotUnitRange(span) => TranslateError::OwnerNotUnitRange { span },
    }
}

impl<'a> DirectiveTranslator<'a> {
    /// Validates every clause of `directive` and merges its data clauses.
    pub(super) fn gather<'d>(&mut self, directive: &'d AccDirective) -> Gathered<'d> {
        let mut gathered = Gathered {
            table: DirectiveTable::new(),
            condition: None,
            if_present: false,
            queue: None,
            abandoned: false,
        };
        let mut seen_kinds = Vec::new();

        for clause in &directive.clauses {
            if !clause_allowed(directive.kind, &clause.kind) {
                self.report(TranslateError::ClauseNotAllowed {
                    clause: clause.name(),
                    directive: directive.kind.name(),
                    span: clause.span,
                });
                gathered.abandoned = true;
                continue;
            }
            match &clause.kind {
                AccClauseKind::Data {
                    kind,
                    spelling,
                    operands,
                } => {
                    seen_kinds.push(*kind);
                    for operand in operands {
                        let resolved = match identity::resolve(operand, self.decls, IdentityRules::DATA_OPERAND) {
                            Ok(resolved) => resolved,
                            Err(error) => {
                                self.report(operand_error(error, directive.kind, &clause.name()));
                                gathered.abandoned = true;
                                continue;
                            }
                        };
                        let data = DataClause {
                            kind: *kind,
                            spelling: *spelling,
                            target: resolved.identity,
                            range: resolved.range,
                            is_implicit: false,
                            operand: operand.clone(),
                            span: operand.span,
                        };
                        self.merge(&mut gathered.table, data);
                    }
                }
                AccClauseKind::If(cond) => gathered.condition = Some(cond),
                AccClauseKind::IfPresent => gathered.if_present = true,
                AccClauseKind::Async(arg) => match queue::classify(arg.as_ref(), self.decls) {
                    Ok(queue) => gathered.queue = Some(queue),
                    Err(queue::InvalidQueue(value)) => {
                        self.report(TranslateError::InvalidAsyncArgument {
                            clause: "async",
                            value,
                            span: arg.as_ref().map_or(clause.span, |a| a.span),
                        });
                        gathered.abandoned = true;
                    }
                },
            }
        }

        if let Some((required, expected)) = required_clauses(directive.kind) {
            if !seen_kinds.iter().any(|k| required.contains(k)) {
                self.report(TranslateError::MissingRequiredClause {
                    directive: directive.kind.name(),
                    expected,
                    span: directive.span,
                });
                gathered.abandoned = true;
            }
        }
        gathered
    }

    /// Drops const writes, then records the clause or reports the conflict
    /// with the clause already recorded.
    fn merge(&mut self, table: &mut DirectiveTable, clause: DataClause) {
        let name = clause.target.display(self.decls).to_string();
        if writes_storage(clause.kind) && clause.target.is_const(self.decls) {
            self.report(TranslateError::ConstWrite {
                name,
                clause: clause.clause_name(),
                span: clause.span,
            });
            return;
        }
        let (kind, span) = (clause.kind, clause.span);
        let Err(conflict) = table.record(clause) else {
            return;
        };
        let error = match conflict {
            MergeConflict::DefinedAgain { first } => TranslateError::DefinedAgain {
                name,
                kind: kind.name(),
                span,
                first,
            },
            MergeConflict::Incompatible { previous, first } => TranslateError::ConflictingKinds {
                name,
                previous: previous.name(),
                kind: kind.name(),
                span,
                first,
            },
            MergeConflict::SameMotionVariable { first } => TranslateError::UpdateSameVariable { name, span, first },
        };
        self.report(error);
    }

    /// Map clauses for the explicit data clauses of a construct, one per
    /// distinct descriptor in source order.
    pub(super) fn map_clauses(
        &mut self,
        gathered: &Gathered<'_>,
        construct: ConstructClass,
        status: AsyncStatus,
    ) -> Vec<TargetClause> {
        let mut groups: IndexMap<MapDescriptor, Vec<TargetOperand>> = IndexMap::new();
        for clause in gathered.table.clauses() {
            if clause.kind.is_motion() {
                continue;
            }
            if clause.kind != DataClauseKind::Delete {
                self.check_storage(clause);
            }
            let origin = if construct == ConstructClass::Structured && self.ledger.visible(&clause.target).is_some() {
                ClauseOrigin::NestedInEnclosingScope
            } else {
                ClauseOrigin::Explicit
            };
            let descriptor = map::synthesize(clause.kind, origin, construct, self.config.structured_ref_count);
            self.owe_warnings(&descriptor, &clause.clause_name(), status, clause.span);
            groups
                .entry(descriptor)
                .or_default()
                .push(self.operand(clause));
        }
        groups
            .into_iter()
            .map(|(map, operands)| TargetClause::Map { map, operands })
            .collect()
    }

    pub(super) fn owe_warnings(&mut self, descriptor: &MapDescriptor, clause: &str, status: AsyncStatus, span: SourceSpan) {
        let mut owed = Vec::new();
        map::extension_warnings(descriptor, clause, status, span, &mut owed);
        let extensions = self.config.extension_warnings;
        self.warnings
            .extend(owed.into_iter().filter(|w| extensions || !matches!(w, TranslateWarning::ExtensionModifier { .. })));
    }

    pub(super) fn operand(&self, clause: &DataClause) -> TargetOperand {
        TargetOperand {
            identity: clause.target.clone(),
            range: clause.range,
            text: clause.operand.display(self.decls).to_string(),
        }
    }

    /// Compares the requested range with what live scopes already hold.
    /// The operand was accepted by `gather`, so it is re-resolved for its
    /// bounds rather than checked again.
    fn check_storage(&mut self, clause: &DataClause) {
        let requested = identity::revalidate(&clause.operand, self.decls);
        let extent = match requested.identity.shape(self.decls) {
            Some(Shape::Array(extent)) => extent,
            _ => None,
        };
        let established = self.ledger.live_ranges(&requested.identity).collect::<Vec<_>>();
        let verdict = subarray::classify(requested.range, established.iter().copied(), extent);
        log::trace!(
            "`{}` {} against {:?}: {:?}",
            clause.operand.display(self.decls),
            requested.range,
            established,
            verdict
        );
        if let SubarrayVerdict::ForwardToRuntime(reason) = verdict {
            self.escapes.push(RuntimeEscape {
                operand: clause.operand.display(self.decls).to_string(),
                requested: requested.range,
                established,
                reason,
                span: clause.span,
            });
        }
    }

    pub(super) fn motion_clauses(&mut self, gathered: &Gathered<'_>) -> Vec<TargetClause> {
        let mut groups: IndexMap<MotionDescriptor, Vec<TargetOperand>> = IndexMap::new();
        for clause in gathered.table.clauses() {
            if let Some(motion) = MotionDescriptor::for_clause(clause.kind, gathered.if_present) {
                groups.entry(motion).or_default().push(self.operand(clause));
            }
        }
        groups
            .into_iter()
            .map(|(motion, operands)| TargetClause::Motion { motion, operands })
            .collect()
    }

    /// Queues named by a `wait` directive. `None` after an invalid queue.
    pub(super) fn wait_queues(&mut self, directive: &AccDirective) -> Option<Vec<AsyncDesignator>> {
        let mut queues = Vec::new();
        let mut valid = true;
        for arg in &directive.wait_args {
            match queue::classify(Some(arg), self.decls) {
                Ok((designator, _)) => queues.push(designator),
                Err(queue::InvalidQueue(value)) => {
                    self.report(TranslateError::InvalidAsyncArgument {
                        clause: "wait",
                        value,
                        span: arg.span,
                    });
                    valid = false;
                }
            }
        }
        valid.then_some(queues)
    }
}
