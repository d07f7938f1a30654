//! Already-parsed input trees for the accord translator.
//!
//! The parser lives elsewhere; this crate only fixes the shape of what it
//! hands over: declarations with canonical handles, reference expressions,
//! directive clauses and the statements that carry them.

pub mod decl;
pub mod directive;
pub mod expr;
pub mod stmt;

pub use decl::{Decl, DeclId, DeclKind, DeclTable, Shape};
pub use directive::{
    AccClause, AccClauseKind, AccDirective, AccDirectiveKind, DataClauseKind, DataSpelling,
};
pub use expr::{BinaryOp, Expr, ExprDisplay, ExprKind};
pub use stmt::{Function, HostCode, Stmt, StmtKind, Unit};
