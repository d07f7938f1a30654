//! Builders for translator integration tests.
#![allow(dead_code)]

use accord_ast::{AccClause, AccDirective, AccDirectiveKind, DataClauseKind, DeclId, Expr, Function, Stmt, Unit};
use accord_translate::{translate_unit, TargetDirective, TranslationOutput, TranslatorConfig};
use miette::{SourceOffset, SourceSpan};

pub fn dummy_span() -> SourceSpan {
    SourceSpan::new(SourceOffset::from(0), 0)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn var(id: DeclId) -> Expr {
    Expr::decl_ref(id, dummy_span())
}

pub fn sec(id: DeclId, lower: i64, len: i64) -> Expr {
    Expr::section(var(id), lower, len, dummy_span())
}

pub fn int(value: i64) -> Expr {
    Expr::int(value, dummy_span())
}

pub fn clause(kind: DataClauseKind, operands: Vec<Expr>) -> AccClause {
    AccClause::data(kind, operands, dummy_span())
}

pub fn on_queue(queue: i64) -> AccClause {
    AccClause::async_clause(Some(int(queue)), dummy_span())
}

pub fn region(kind: AccDirectiveKind, clauses: Vec<AccClause>, body: Stmt) -> Stmt {
    Stmt::directive(AccDirective::new(kind, clauses, dummy_span()).with_body(body))
}

pub fn standalone(kind: AccDirectiveKind, clauses: Vec<AccClause>) -> Stmt {
    Stmt::directive(AccDirective::new(kind, clauses, dummy_span()))
}

pub fn wait_for(queues: Vec<Expr>) -> Stmt {
    Stmt::directive(AccDirective::new(AccDirectiveKind::Wait, vec![], dummy_span()).with_wait_args(queues))
}

pub fn code(label: &str, refs: Vec<Expr>) -> Stmt {
    Stmt::code(label, refs, dummy_span())
}

pub fn seq(stmts: Vec<Stmt>) -> Stmt {
    Stmt::compound(stmts, dummy_span())
}

/// Translates `body` as the only function of `unit`.
pub fn translate(mut unit: Unit, body: Stmt, config: &TranslatorConfig) -> (Unit, TranslationOutput) {
    unit.functions = vec![Function {
        name: "main".to_string(),
        body,
        span: dummy_span(),
    }];
    let output = translate_unit(&unit, config);
    (unit, output)
}

/// Every directive of the translated `main`, outermost first.
pub fn directives(output: &TranslationOutput) -> Vec<&TargetDirective> {
    output
        .function("main")
        .and_then(|f| f.body.as_ref())
        .map(|body| body.directives())
        .unwrap_or_default()
}

pub fn headers(output: &TranslationOutput) -> Vec<String> {
    directives(output).iter().map(|d| d.to_string()).collect()
}
