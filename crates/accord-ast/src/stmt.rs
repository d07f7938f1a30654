use miette::SourceSpan;

use crate::decl::DeclTable;
use crate::directive::AccDirective;
use crate::expr::Expr;

/// Host statements the translator does not look into beyond the
/// references they make.
///
/// `label` names the code for whoever executes the translated program;
/// `refs` lists every variable reference inside it, which is what implicit
/// data attributes are computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCode {
    pub label: String,
    pub refs: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    Directive(AccDirective),
    Compound(Vec<Stmt>),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Box<Stmt>,
    },
    Switch {
        scrutinee: Expr,
        body: Box<Stmt>,
    },
    Code(HostCode),
    Empty,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }

    pub fn directive(directive: AccDirective) -> Self {
        let span = directive.span;
        Self::new(StmtKind::Directive(directive), span)
    }

    pub fn compound(stmts: Vec<Stmt>, span: SourceSpan) -> Self {
        Self::new(StmtKind::Compound(stmts), span)
    }

    pub fn code(label: impl Into<String>, refs: Vec<Expr>, span: SourceSpan) -> Self {
        Self::new(
            StmtKind::Code(HostCode {
                label: label.into(),
                refs,
            }),
            span,
        )
    }

    pub fn while_loop(cond: Expr, body: Stmt, span: SourceSpan) -> Self {
        Self::new(
            StmtKind::While {
                cond,
                body: Box::new(body),
            },
            span,
        )
    }

    pub fn if_then(cond: Expr, then: Stmt, span: SourceSpan) -> Self {
        Self::new(
            StmtKind::If {
                cond,
                then: Box::new(then),
                otherwise: None,
            },
            span,
        )
    }

    /// Statements that introduce a substatement slot of their own.
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::If { .. }
                | StmtKind::While { .. }
                | StmtKind::DoWhile { .. }
                | StmtKind::For { .. }
                | StmtKind::Switch { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub body: Stmt,
    pub span: SourceSpan,
}

/// One translation unit: its declarations and the functions to translate.
#[derive(Debug, Clone, Default)]
pub struct Unit {
    pub decls: DeclTable,
    pub functions: Vec<Function>,
}

impl Unit {
    pub fn new(decls: DeclTable) -> Self {
        Self {
            decls,
            functions: Vec::new(),
        }
    }
}
