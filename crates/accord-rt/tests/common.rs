//! Builders shared by the executor's end-to-end tests.
#![allow(dead_code)]

use accord_ast::{AccClause, AccDirective, AccDirectiveKind, DataClauseKind, DeclId, DeclTable, Expr, Function, Stmt, Unit};
use accord_translate::{translate_unit, TargetStmt, TranslatorConfig};
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

pub fn on_queue(queue: Expr) -> AccClause {
    AccClause::async_clause(Some(queue), dummy_span())
}

pub fn region(kind: AccDirectiveKind, clauses: Vec<AccClause>, body: Stmt) -> Stmt {
    Stmt::directive(AccDirective::new(kind, clauses, dummy_span()).with_body(body))
}

pub fn standalone(kind: AccDirectiveKind, clauses: Vec<AccClause>) -> Stmt {
    Stmt::directive(AccDirective::new(kind, clauses, dummy_span()))
}

pub fn wait_all() -> Stmt {
    Stmt::directive(AccDirective::new(AccDirectiveKind::Wait, vec![], dummy_span()))
}

pub fn code(label: &str, refs: Vec<Expr>) -> Stmt {
    Stmt::code(label, refs, dummy_span())
}

pub fn seq(stmts: Vec<Stmt>) -> Stmt {
    Stmt::compound(stmts, dummy_span())
}

/// Translates `body` as `main` and returns the translated tree. Fails the
/// test on any translation error.
pub fn translate(decls: &DeclTable, body: Stmt) -> TargetStmt {
    translate_with(decls, body, &TranslatorConfig::default())
}

pub fn translate_with(decls: &DeclTable, body: Stmt, config: &TranslatorConfig) -> TargetStmt {
    let mut unit = Unit::new(decls.clone());
    unit.functions.push(Function {
        name: "main".to_string(),
        body,
        span: dummy_span(),
    });
    let output = translate_unit(&unit, config);
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    output
        .function("main")
        .and_then(|f| f.body.clone())
        .expect("`main` translated")
}
