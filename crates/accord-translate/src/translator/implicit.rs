//! Data attributes for storage a compute region uses without naming it in
//! a clause.

use accord_ast::{AccClauseKind, DataClauseKind, DeclKind, DeclTable, Expr, ExprKind, Stmt, StmtKind};
use indexmap::IndexMap;
use miette::SourceSpan;
use rustc_hash::FxHashSet;

use super::DirectiveTranslator;
use crate::identity::{self, DataRange, IdentityRules, VariableIdentity};
use crate::ledger::DirectiveTable;
use crate::map::{self, ClauseOrigin, ConstructClass, MapDescriptor};
use crate::queue::AsyncStatus;
use crate::target::{TargetClause, TargetOperand};

/// A reference found in a compute body.
struct Reference {
    /// What the expression names, e.g. `s.f`.
    precise: VariableIdentity,
    /// The storage that gets mapped for it, e.g. `s`.
    root: VariableIdentity,
}

fn collect_stmt(stmt: &Stmt, out: &mut Vec<Reference>, decls: &DeclTable) {
    match &stmt.kind {
        StmtKind::Directive(directive) => {
            for clause in &directive.clauses {
                if let AccClauseKind::If(cond) = &clause.kind {
                    collect_expr(cond, out, decls);
                }
            }
            if let Some(body) = &directive.body {
                collect_stmt(body, out, decls);
            }
        }
        StmtKind::Compound(stmts) => stmts.iter().for_each(|s| collect_stmt(s, out, decls)),
        StmtKind::If { cond, then, otherwise } => {
            collect_expr(cond, out, decls);
            collect_stmt(then, out, decls);
            if let Some(otherwise) = otherwise {
                collect_stmt(otherwise, out, decls);
            }
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            collect_expr(cond, out, decls);
            collect_stmt(body, out, decls);
        }
        StmtKind::For { init, cond, step, body } => {
            for part in [init, step].into_iter().flatten() {
                collect_stmt(part, out, decls);
            }
            if let Some(cond) = cond {
                collect_expr(cond, out, decls);
            }
            collect_stmt(body, out, decls);
        }
        StmtKind::Switch { scrutinee, body } => {
            collect_expr(scrutinee, out, decls);
            collect_stmt(body, out, decls);
        }
        StmtKind::Code(code) => code.refs.iter().for_each(|r| collect_expr(r, out, decls)),
        StmtKind::Empty => {}
    }
}

fn collect_expr(expr: &Expr, out: &mut Vec<Reference>, decls: &DeclTable) {
    match &expr.kind {
        ExprKind::DeclRef(id) => {
            if decls.get(*id).is_some_and(|d| d.kind == DeclKind::Variable) {
                let identity = VariableIdentity::Plain(decls.canonical(*id));
                out.push(Reference {
                    precise: identity.clone(),
                    root: identity,
                });
            }
        }
        ExprKind::This { .. } => out.push(Reference {
            precise: VariableIdentity::WholeImplicitOwner,
            root: VariableIdentity::WholeImplicitOwner,
        }),
        ExprKind::Member { base, field, .. } => match &base.ignore_parens().kind {
            ExprKind::This { .. } => match identity::resolve(expr, decls, IdentityRules::OWNER_MEMBER) {
                Ok(resolved) => out.push(Reference {
                    precise: resolved.identity,
                    root: VariableIdentity::WholeImplicitOwner,
                }),
                Err(_) => collect_expr(base, out, decls),
            },
            ExprKind::DeclRef(id) if decls.get(*id).is_some_and(|d| d.kind == DeclKind::Variable) => {
                let owner = VariableIdentity::Plain(decls.canonical(*id));
                out.push(Reference {
                    precise: VariableIdentity::Member {
                        owner: Box::new(owner.clone()),
                        field: decls.canonical(*field),
                    },
                    root: owner,
                });
            }
            _ => collect_expr(base, out, decls),
        },
        ExprKind::Subarray { base, lower, length } => {
            collect_expr(base, out, decls);
            for bound in [lower, length].into_iter().flatten() {
                collect_expr(bound, out, decls);
            }
        }
        ExprKind::Subscript { base, index } => {
            collect_expr(base, out, decls);
            collect_expr(index, out, decls);
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_expr(lhs, out, decls);
            collect_expr(rhs, out, decls);
        }
        ExprKind::Neg(inner) | ExprKind::Paren(inner) => collect_expr(inner, out, decls),
        ExprKind::Call { args, .. } => args.iter().for_each(|a| collect_expr(a, out, decls)),
        ExprKind::IntLiteral(_) => {}
    }
}

impl<'a> DirectiveTranslator<'a> {
    /// Clauses for every root referenced in `body` that neither `explicit`
    /// nor an enclosing scope covers. Scalars become `firstprivate`;
    /// everything else is copied.
    pub(super) fn implicit_clauses(
        &mut self,
        explicit: &DirectiveTable,
        body: &Stmt,
        status: AsyncStatus,
        span: SourceSpan,
    ) -> Vec<TargetClause> {
        let mut references = Vec::new();
        collect_stmt(body, &mut references, self.decls);

        let mut seen = FxHashSet::default();
        let mut firstprivate = Vec::new();
        let mut copies: IndexMap<MapDescriptor, Vec<TargetOperand>> = IndexMap::new();
        for Reference { precise, root } in references {
            if explicit.contains(&precise) || explicit.contains(&root) {
                continue;
            }
            if self.ledger.visible(&precise).is_some() || self.ledger.visible(&root).is_some() {
                log::debug!("`{}` already present, no implicit attribute", precise.display(self.decls));
                continue;
            }
            if !seen.insert(root.clone()) {
                continue;
            }
            let text = match &root {
                VariableIdentity::WholeImplicitOwner => "this[0:1]".to_string(),
                other => other.display(self.decls).to_string(),
            };
            let operand = TargetOperand {
                identity: root.clone(),
                range: DataRange::Whole,
                text,
            };
            if root.shape(self.decls).is_some_and(|s| s.is_scalar_like()) {
                log::trace!("`{}` is implicitly firstprivate", operand.text);
                firstprivate.push(operand);
                continue;
            }
            let descriptor = map::synthesize(
                DataClauseKind::Copy,
                ClauseOrigin::Implicit,
                ConstructClass::Structured,
                self.config.structured_ref_count,
            );
            log::trace!("`{}` is implicitly mapped {descriptor}", operand.text);
            self.owe_warnings(&descriptor, "copy", status, span);
            copies.entry(descriptor).or_default().push(operand);
        }

        let mut clauses = copies
            .into_iter()
            .map(|(map, operands)| TargetClause::Map { map, operands })
            .collect::<Vec<_>>();
        if !firstprivate.is_empty() {
            clauses.push(TargetClause::Firstprivate(firstprivate));
        }
        clauses
    }
}
