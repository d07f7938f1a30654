//! The translated tree.
//!
//! Directives render their headers bit-exactly through `Display`; the
//! surrounding statements only render as an outline for inspection.

use std::fmt::{self, Write as _};

use accord_ast::{DeclTable, Expr, HostCode};
use miette::SourceSpan;

use crate::identity::{DataRange, VariableIdentity};
use crate::map::{MapDescriptor, MotionDescriptor};
use crate::queue::DependencyToken;

/// Name of the runtime function turning a queue number into the address
/// its dependencies are keyed on.
pub const ASYNC2DEP: &str = "acc2omp_async2dep";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetDirectiveKind {
    TargetData,
    TargetEnterData,
    TargetExitData,
    TargetTeams,
    TargetTeamsDistribute,
    Distribute,
    TargetUpdate,
    Taskwait,
}

impl TargetDirectiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetDirectiveKind::TargetData => "target data",
            TargetDirectiveKind::TargetEnterData => "target enter data",
            TargetDirectiveKind::TargetExitData => "target exit data",
            TargetDirectiveKind::TargetTeams => "target teams",
            TargetDirectiveKind::TargetTeamsDistribute => "target teams distribute",
            TargetDirectiveKind::Distribute => "distribute",
            TargetDirectiveKind::TargetUpdate => "target update",
            TargetDirectiveKind::Taskwait => "taskwait",
        }
    }

    /// Kinds that offload their body.
    pub fn is_offload(self) -> bool {
        matches!(self, TargetDirectiveKind::TargetTeams | TargetDirectiveKind::TargetTeamsDistribute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOperand {
    pub identity: VariableIdentity,
    pub range: DataRange,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependKind {
    In,
    InOut,
}

impl DependKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DependKind::In => "in",
            DependKind::InOut => "inout",
        }
    }
}

/// The queue argument a dependency is computed from at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenArg {
    Literal(i64),
    Runtime { expr: Expr, text: String },
}

impl fmt::Display for TokenArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenArg::Literal(value) => write!(f, "{value}"),
            TokenArg::Runtime { text, .. } => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependClause {
    pub kind: DependKind,
    pub token: DependencyToken,
    pub arg: TokenArg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetClause {
    Map {
        map: MapDescriptor,
        operands: Vec<TargetOperand>,
    },
    Motion {
        motion: MotionDescriptor,
        operands: Vec<TargetOperand>,
    },
    Firstprivate(Vec<TargetOperand>),
    If {
        cond: Expr,
        text: String,
    },
    Nowait,
    Depend(DependClause),
}

fn write_operands(f: &mut fmt::Formatter<'_>, operands: &[TargetOperand]) -> fmt::Result {
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_char(',')?;
        }
        f.write_str(&operand.text)?;
    }
    Ok(())
}

impl fmt::Display for TargetClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetClause::Map { map, operands } => {
                write!(f, "map({map}: ")?;
                write_operands(f, operands)?;
                f.write_char(')')
            }
            TargetClause::Motion { motion, operands } => {
                write!(f, "{}(", motion.keyword())?;
                if motion.present {
                    f.write_str("present: ")?;
                }
                write_operands(f, operands)?;
                f.write_char(')')
            }
            TargetClause::Firstprivate(operands) => {
                f.write_str("firstprivate(")?;
                write_operands(f, operands)?;
                f.write_char(')')
            }
            TargetClause::If { text, .. } => write!(f, "if({text})"),
            TargetClause::Nowait => f.write_str("nowait"),
            TargetClause::Depend(depend) => {
                write!(f, "depend({}: *{}({}))", depend.kind.as_str(), ASYNC2DEP, depend.arg)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDirective {
    pub kind: TargetDirectiveKind,
    pub clauses: Vec<TargetClause>,
    pub body: Option<Box<TargetStmt>>,
    pub span: SourceSpan,
}

impl TargetDirective {
    pub fn new(kind: TargetDirectiveKind, clauses: Vec<TargetClause>, span: SourceSpan) -> Self {
        Self {
            kind,
            clauses,
            body: None,
            span,
        }
    }

    pub fn maps(&self) -> impl Iterator<Item = (&MapDescriptor, &[TargetOperand])> {
        self.clauses.iter().filter_map(|c| match c {
            TargetClause::Map { map, operands } => Some((map, operands.as_slice())),
            _ => None,
        })
    }

    /// Every mapped operand, with the descriptor it is mapped by.
    pub fn mapped_operands(&self) -> impl Iterator<Item = (&MapDescriptor, &TargetOperand)> {
        self.maps().flat_map(|(map, operands)| operands.iter().map(move |op| (map, op)))
    }

    pub fn depends(&self) -> impl Iterator<Item = &DependClause> {
        self.clauses.iter().filter_map(|c| match c {
            TargetClause::Depend(depend) => Some(depend),
            _ => None,
        })
    }

    pub fn is_nowait(&self) -> bool {
        self.clauses.iter().any(|c| matches!(c, TargetClause::Nowait))
    }

    pub fn if_condition(&self) -> Option<&Expr> {
        self.clauses.iter().find_map(|c| match c {
            TargetClause::If { cond, .. } => Some(cond),
            _ => None,
        })
    }
}

impl fmt::Display for TargetDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#pragma omp {}", self.kind.as_str())?;
        for clause in &self.clauses {
            write!(f, " {clause}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStmt {
    pub kind: TargetStmtKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStmtKind {
    Directive(TargetDirective),
    Compound(Vec<TargetStmt>),
    If {
        cond: Expr,
        then: Box<TargetStmt>,
        otherwise: Option<Box<TargetStmt>>,
    },
    While {
        cond: Expr,
        body: Box<TargetStmt>,
    },
    DoWhile {
        body: Box<TargetStmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<TargetStmt>>,
        cond: Option<Expr>,
        step: Option<Box<TargetStmt>>,
        body: Box<TargetStmt>,
    },
    Switch {
        scrutinee: Expr,
        body: Box<TargetStmt>,
    },
    Code(HostCode),
    Empty,
}

impl TargetStmt {
    pub fn new(kind: TargetStmtKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }

    pub fn empty(span: SourceSpan) -> Self {
        Self::new(TargetStmtKind::Empty, span)
    }

    pub fn directive(directive: TargetDirective) -> Self {
        let span = directive.span;
        Self::new(TargetStmtKind::Directive(directive), span)
    }

    /// Every directive in the tree, outermost first.
    pub fn directives(&self) -> Vec<&TargetDirective> {
        let mut out = Vec::new();
        self.collect_directives(&mut out);
        out
    }

    fn collect_directives<'a>(&'a self, out: &mut Vec<&'a TargetDirective>) {
        match &self.kind {
            TargetStmtKind::Directive(directive) => {
                out.push(directive);
                if let Some(body) = &directive.body {
                    body.collect_directives(out);
                }
            }
            TargetStmtKind::Compound(stmts) => stmts.iter().for_each(|s| s.collect_directives(out)),
            TargetStmtKind::If { then, otherwise, .. } => {
                then.collect_directives(out);
                if let Some(otherwise) = otherwise {
                    otherwise.collect_directives(out);
                }
            }
            TargetStmtKind::For { init, step, body, .. } => {
                for part in [init, step].into_iter().flatten() {
                    part.collect_directives(out);
                }
                body.collect_directives(out);
            }
            TargetStmtKind::While { body, .. }
            | TargetStmtKind::DoWhile { body, .. }
            | TargetStmtKind::Switch { body, .. } => body.collect_directives(out),
            TargetStmtKind::Code(_) | TargetStmtKind::Empty => {}
        }
    }

    /// Indented outline of the tree: directive headers, control flow and
    /// host code labels.
    pub fn outline(&self, decls: &DeclTable) -> String {
        let mut out = String::new();
        match &self.kind {
            TargetStmtKind::Compound(stmts) => stmts.iter().for_each(|s| s.write_outline(decls, 0, &mut out)),
            _ => self.write_outline(decls, 0, &mut out),
        }
        out
    }

    fn write_outline(&self, decls: &DeclTable, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        match &self.kind {
            TargetStmtKind::Directive(directive) => {
                let _ = writeln!(out, "{pad}{directive}");
                if let Some(body) = &directive.body {
                    body.write_outline(decls, depth + 1, out);
                }
            }
            TargetStmtKind::Compound(stmts) => {
                let _ = writeln!(out, "{pad}{{");
                stmts.iter().for_each(|s| s.write_outline(decls, depth + 1, out));
                let _ = writeln!(out, "{pad}}}");
            }
            TargetStmtKind::If { cond, then, otherwise } => {
                let _ = writeln!(out, "{pad}if ({})", cond.display(decls));
                then.write_outline(decls, depth + 1, out);
                if let Some(otherwise) = otherwise {
                    let _ = writeln!(out, "{pad}else");
                    otherwise.write_outline(decls, depth + 1, out);
                }
            }
            TargetStmtKind::While { cond, body } => {
                let _ = writeln!(out, "{pad}while ({})", cond.display(decls));
                body.write_outline(decls, depth + 1, out);
            }
            TargetStmtKind::DoWhile { body, cond } => {
                let _ = writeln!(out, "{pad}do");
                body.write_outline(decls, depth + 1, out);
                let _ = writeln!(out, "{pad}while ({})", cond.display(decls));
            }
            TargetStmtKind::For { cond, body, .. } => {
                match cond {
                    Some(cond) => {
                        let _ = writeln!(out, "{pad}for (..; {}; ..)", cond.display(decls));
                    }
                    None => {
                        let _ = writeln!(out, "{pad}for (..)");
                    }
                }
                body.write_outline(decls, depth + 1, out);
            }
            TargetStmtKind::Switch { scrutinee, body } => {
                let _ = writeln!(out, "{pad}switch ({})", scrutinee.display(decls));
                body.write_outline(decls, depth + 1, out);
            }
            TargetStmtKind::Code(code) => {
                let _ = writeln!(out, "{pad}{}", code.label);
            }
            TargetStmtKind::Empty => {
                let _ = writeln!(out, "{pad};");
            }
        }
    }
}
