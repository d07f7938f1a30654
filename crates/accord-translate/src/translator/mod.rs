//! Per-directive orchestration.
//!
//! [`DirectiveTranslator`] walks each function once, keeping the nesting
//! state, the scope ledger and the queue tokens in step with the tree, and
//! rebuilds the function as a [`TargetStmt`].

mod clauses;
mod implicit;

use accord_ast::{AccDirective, AccDirectiveKind, DeclTable, Function, Stmt, StmtKind, Unit};

use crate::config::TranslatorConfig;
use crate::error::{ErrorCategory, TranslateError, TranslateWarning};
use crate::ledger::ConflictLedger;
use crate::map::ConstructClass;
use crate::nesting::{self, NestingValidator};
use crate::queue::{AsyncPlan, AsyncQueueTranslator, AsyncStatus};
use crate::subarray::RuntimeEscape;
use crate::target::{TargetClause, TargetDirective, TargetDirectiveKind, TargetStmt, TargetStmtKind};

use self::clauses::Gathered;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedFunction {
    pub name: String,
    /// `None` when a nesting error made the function untranslatable.
    pub body: Option<TargetStmt>,
}

#[derive(Debug, Default)]
pub struct TranslationOutput {
    pub functions: Vec<TranslatedFunction>,
    pub errors: Vec<TranslateError>,
    pub warnings: Vec<TranslateWarning>,
    pub runtime_escapes: Vec<RuntimeEscape>,
}

impl TranslationOutput {
    pub fn function(&self, name: &str) -> Option<&TranslatedFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Translates every function of `unit`.
pub fn translate_unit(unit: &Unit, config: &TranslatorConfig) -> TranslationOutput {
    let mut translator = DirectiveTranslator::new(&unit.decls, config);
    let functions = unit
        .functions
        .iter()
        .map(|function| translator.translate_function(function))
        .collect();
    translator.finish(functions)
}

pub struct DirectiveTranslator<'a> {
    decls: &'a DeclTable,
    config: &'a TranslatorConfig,
    ledger: ConflictLedger,
    nesting: NestingValidator,
    queues: AsyncQueueTranslator,
    errors: Vec<TranslateError>,
    warnings: Vec<TranslateWarning>,
    escapes: Vec<RuntimeEscape>,
    /// Set once the current function has an error that suppresses it.
    function_failed: bool,
    structural_seen: bool,
}

impl<'a> DirectiveTranslator<'a> {
    pub fn new(decls: &'a DeclTable, config: &'a TranslatorConfig) -> Self {
        Self {
            decls,
            config,
            ledger: ConflictLedger::new(),
            nesting: NestingValidator::new(),
            queues: AsyncQueueTranslator::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            escapes: Vec::new(),
            function_failed: false,
            structural_seen: false,
        }
    }

    pub fn translate_function(&mut self, function: &Function) -> TranslatedFunction {
        log::debug!("translating function `{}`", function.name);
        self.function_failed = false;
        self.structural_seen = false;
        let body = self.translate_stmt(&function.body, None);
        debug_assert_eq!(self.ledger.depth(), 0, "unbalanced data scopes");
        let body = if self.function_failed {
            log::debug!("suppressing output of `{}` after nesting errors", function.name);
            None
        } else {
            Some(body)
        };
        TranslatedFunction {
            name: function.name.clone(),
            body,
        }
    }

    pub fn finish(self, functions: Vec<TranslatedFunction>) -> TranslationOutput {
        TranslationOutput {
            functions,
            errors: self.errors,
            warnings: self.warnings,
            runtime_escapes: self.escapes,
        }
    }

    fn report(&mut self, error: TranslateError) {
        log::debug!("{error}");
        if error.suppresses_unit(self.structural_seen) {
            self.function_failed = true;
        }
        if error.category() == ErrorCategory::Structural {
            self.structural_seen = true;
        }
        self.errors.push(error);
    }

    /// `parent` is the statement whose substatement slot `stmt` fills.
    fn translate_stmt(&mut self, stmt: &Stmt, parent: Option<&StmtKind>) -> TargetStmt {
        let kind = match &stmt.kind {
            StmtKind::Directive(directive) => return self.translate_directive(directive, parent),
            StmtKind::Compound(stmts) => TargetStmtKind::Compound(
                stmts
                    .iter()
                    .map(|s| self.translate_stmt(s, Some(&stmt.kind)))
                    .collect(),
            ),
            StmtKind::If { cond, then, otherwise } => TargetStmtKind::If {
                cond: cond.clone(),
                then: Box::new(self.translate_stmt(then, Some(&stmt.kind))),
                otherwise: otherwise
                    .as_ref()
                    .map(|s| Box::new(self.translate_stmt(s, Some(&stmt.kind)))),
            },
            StmtKind::While { cond, body } => TargetStmtKind::While {
                cond: cond.clone(),
                body: Box::new(self.translate_stmt(body, Some(&stmt.kind))),
            },
            StmtKind::DoWhile { body, cond } => TargetStmtKind::DoWhile {
                body: Box::new(self.translate_stmt(body, Some(&stmt.kind))),
                cond: cond.clone(),
            },
            StmtKind::For { init, cond, step, body } => TargetStmtKind::For {
                init: init.as_ref().map(|s| Box::new(self.translate_stmt(s, None))),
                cond: cond.clone(),
                step: step.as_ref().map(|s| Box::new(self.translate_stmt(s, None))),
                body: Box::new(self.translate_stmt(body, Some(&stmt.kind))),
            },
            StmtKind::Switch { scrutinee, body } => TargetStmtKind::Switch {
                scrutinee: scrutinee.clone(),
                body: Box::new(self.translate_stmt(body, Some(&stmt.kind))),
            },
            StmtKind::Code(code) => TargetStmtKind::Code(code.clone()),
            StmtKind::Empty => TargetStmtKind::Empty,
        };
        TargetStmt::new(kind, stmt.span)
    }

    fn translate_directive(&mut self, directive: &AccDirective, parent: Option<&StmtKind>) -> TargetStmt {
        log::debug!("translating `{}` directive", directive.kind.name());
        let mut placed = true;
        if let Err(error) = self.nesting.check(directive.kind, directive.span) {
            self.report(error);
            placed = false;
        }
        if let Err(error) = nesting::check_substatement(parent, directive.kind, directive.span) {
            self.report(error);
            placed = false;
        }
        if !placed {
            return self.translate_in_place(directive, parent);
        }

        match directive.kind {
            AccDirectiveKind::Loop => self.translate_loop(directive, parent),
            AccDirectiveKind::Data | AccDirectiveKind::Parallel | AccDirectiveKind::ParallelLoop => {
                self.translate_structured(directive, parent)
            }
            AccDirectiveKind::EnterData | AccDirectiveKind::ExitData => self.translate_enter_exit(directive),
            AccDirectiveKind::Update => self.translate_update(directive),
            AccDirectiveKind::Wait => self.translate_wait(directive),
        }
    }

    /// Drops the directive and keeps its associated statement, so nested
    /// constructs are still checked.
    fn translate_in_place(&mut self, directive: &AccDirective, parent: Option<&StmtKind>) -> TargetStmt {
        match &directive.body {
            Some(body) => self.translate_stmt(body, parent),
            None => TargetStmt::empty(directive.span),
        }
    }

    fn translate_body(&mut self, directive: &AccDirective) -> TargetStmt {
        match &directive.body {
            Some(body) => self.translate_stmt(body, None),
            None => TargetStmt::empty(directive.span),
        }
    }

    fn translate_loop(&mut self, directive: &AccDirective, parent: Option<&StmtKind>) -> TargetStmt {
        let gathered = self.gather(directive);
        if gathered.abandoned {
            return self.translate_in_place(directive, parent);
        }
        if self.nesting.is_orphaned_loop() {
            log::debug!("orphaned loop runs as written");
            return self.translate_body(directive);
        }
        self.nesting.enter(directive.kind, directive.span);
        let body = self.translate_body(directive);
        self.nesting.exit();
        let mut target = TargetDirective::new(TargetDirectiveKind::Distribute, Vec::new(), directive.span);
        target.body = Some(Box::new(body));
        TargetStmt::directive(target)
    }

    /// Data and compute constructs.
    fn translate_structured(&mut self, directive: &AccDirective, parent: Option<&StmtKind>) -> TargetStmt {
        let gathered = self.gather(directive);
        if gathered.abandoned {
            return self.translate_in_place(directive, parent);
        }
        let plan = self.async_plan(&gathered);

        let mut clauses = self.map_clauses(&gathered, ConstructClass::Structured, plan.status);
        if directive.kind.is_compute() {
            if let Some(body) = &directive.body {
                clauses.extend(self.implicit_clauses(&gathered.table, body, plan.status, directive.span));
            }
        }
        clauses.extend(gathered.if_clause(self.decls));
        clauses.extend(plan.clauses);

        let scoped = directive.kind == AccDirectiveKind::Data || !gathered.table.is_empty();
        if scoped {
            self.ledger
                .push_scope(directive.kind, directive.span, gathered.table.clauses());
        }
        self.nesting.enter(directive.kind, directive.span);
        let body = self.translate_body(directive);
        self.nesting.exit();
        if scoped {
            self.ledger.pop_scope();
        }

        let kind = match directive.kind {
            AccDirectiveKind::Data => TargetDirectiveKind::TargetData,
            AccDirectiveKind::ParallelLoop => TargetDirectiveKind::TargetTeamsDistribute,
            _ => TargetDirectiveKind::TargetTeams,
        };
        let mut target = TargetDirective::new(kind, clauses, directive.span);
        target.body = Some(Box::new(body));
        Self::with_trailing(target, plan.trailing)
    }

    fn translate_enter_exit(&mut self, directive: &AccDirective) -> TargetStmt {
        let gathered = self.gather(directive);
        if gathered.abandoned {
            return TargetStmt::empty(directive.span);
        }
        let plan = self.async_plan(&gathered);
        let mut clauses = self.map_clauses(&gathered, ConstructClass::Dynamic, plan.status);
        if clauses.is_empty() {
            log::debug!("every operand of `{}` was dropped", directive.kind.name());
            return TargetStmt::empty(directive.span);
        }
        clauses.extend(gathered.if_clause(self.decls));
        clauses.extend(plan.clauses);
        let kind = if directive.kind == AccDirectiveKind::EnterData {
            TargetDirectiveKind::TargetEnterData
        } else {
            TargetDirectiveKind::TargetExitData
        };
        Self::with_trailing(TargetDirective::new(kind, clauses, directive.span), plan.trailing)
    }

    fn translate_update(&mut self, directive: &AccDirective) -> TargetStmt {
        let gathered = self.gather(directive);
        if gathered.abandoned {
            return TargetStmt::empty(directive.span);
        }
        let plan = self.async_plan(&gathered);
        let mut clauses = self.motion_clauses(&gathered);
        if clauses.is_empty() {
            log::debug!("every operand of `update` was dropped");
            return TargetStmt::empty(directive.span);
        }
        clauses.extend(gathered.if_clause(self.decls));
        clauses.extend(plan.clauses);
        let target = TargetDirective::new(TargetDirectiveKind::TargetUpdate, clauses, directive.span);
        Self::with_trailing(target, plan.trailing)
    }

    fn translate_wait(&mut self, directive: &AccDirective) -> TargetStmt {
        let gathered = self.gather(directive);
        let queues = self.wait_queues(directive);
        let (false, Some(queues)) = (gathered.abandoned, queues) else {
            return TargetStmt::empty(directive.span);
        };
        let target = if queues.is_empty() {
            self.queues.wait_all(directive.span)
        } else {
            self.queues.wait_queues(&queues, self.decls, directive.span)
        };
        TargetStmt::directive(target)
    }

    fn async_plan(&mut self, gathered: &Gathered<'_>) -> AsyncPlan {
        match &gathered.queue {
            Some((designator, status)) => self.queues.plan(designator, *status, self.decls),
            None => AsyncPlan {
                status: AsyncStatus::Sync,
                clauses: Vec::new(),
                trailing: None,
            },
        }
    }

    /// Places the guarded synchronization after the construct, both in one
    /// compound statement so the pair fills a single statement slot.
    fn with_trailing(target: TargetDirective, trailing: Option<TargetStmt>) -> TargetStmt {
        let span = target.span;
        let stmt = TargetStmt::directive(target);
        match trailing {
            Some(trailing) => TargetStmt::new(TargetStmtKind::Compound(vec![stmt, trailing]), span),
            None => stmt,
        }
    }
}

impl Gathered<'_> {
    fn if_clause(&self, decls: &DeclTable) -> Option<TargetClause> {
        self.condition.map(|cond| TargetClause::If {
            cond: cond.clone(),
            text: cond.display(decls).to_string(),
        })
    }
}

#[cfg(test)]
mod tests;
