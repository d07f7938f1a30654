//! Builders shared by the translator tests.

use accord_ast::{
    AccClause, AccDirective, AccDirectiveKind, DataClauseKind, DeclId, DeclTable, Expr, Function, Stmt, Unit,
};
use expect_test::Expect;
use miette::SourceSpan;

use crate::config::TranslatorConfig;
use crate::translator::{translate_unit, TranslationOutput};

pub(crate) fn dummy_span() -> SourceSpan {
    SourceSpan::from((0, 0))
}

pub(crate) fn span_at(offset: usize) -> SourceSpan {
    SourceSpan::from((offset, 1))
}

pub(crate) fn var(id: DeclId) -> Expr {
    Expr::decl_ref(id, dummy_span())
}

/// `id[lower:len]`
pub(crate) fn sec(id: DeclId, lower: i64, len: i64) -> Expr {
    Expr::section(var(id), lower, len, dummy_span())
}

pub(crate) fn int(value: i64) -> Expr {
    Expr::int(value, dummy_span())
}

pub(crate) fn data(kind: DataClauseKind, operands: Vec<Expr>) -> AccClause {
    AccClause::data(kind, operands, dummy_span())
}

pub(crate) fn async_on(queue: Option<Expr>) -> AccClause {
    AccClause::async_clause(queue, dummy_span())
}

/// A construct with an associated statement.
pub(crate) fn construct(kind: AccDirectiveKind, clauses: Vec<AccClause>, body: Stmt) -> Stmt {
    Stmt::directive(AccDirective::new(kind, clauses, dummy_span()).with_body(body))
}

/// A standalone executable directive.
pub(crate) fn exec(kind: AccDirectiveKind, clauses: Vec<AccClause>) -> Stmt {
    Stmt::directive(AccDirective::new(kind, clauses, dummy_span()))
}

pub(crate) fn wait(queues: Vec<Expr>) -> Stmt {
    Stmt::directive(AccDirective::new(AccDirectiveKind::Wait, vec![], dummy_span()).with_wait_args(queues))
}

pub(crate) fn kernel(label: &str, refs: Vec<Expr>) -> Stmt {
    Stmt::code(label, refs, dummy_span())
}

pub(crate) fn block(stmts: Vec<Stmt>) -> Stmt {
    Stmt::compound(stmts, dummy_span())
}

pub(crate) fn run(decls: &DeclTable, body: Stmt) -> TranslationOutput {
    run_with(decls, body, &TranslatorConfig::default())
}

pub(crate) fn run_with(decls: &DeclTable, body: Stmt, config: &TranslatorConfig) -> TranslationOutput {
    let mut unit = Unit::new(decls.clone());
    unit.functions.push(Function {
        name: "f".to_string(),
        body,
        span: dummy_span(),
    });
    translate_unit(&unit, config)
}

pub(crate) fn outline(decls: &DeclTable, output: &TranslationOutput) -> String {
    match output.function("f").and_then(|f| f.body.as_ref()) {
        Some(body) => body.outline(decls),
        None => "<suppressed>\n".to_string(),
    }
}

pub(crate) fn check(decls: &DeclTable, output: &TranslationOutput, expect: Expect) {
    expect.assert_eq(&outline(decls, output));
}

pub(crate) fn messages(output: &TranslationOutput) -> Vec<String> {
    output.errors.iter().map(ToString::to_string).collect()
}
