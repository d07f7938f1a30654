use miette::SourceSpan;

use crate::expr::Expr;
use crate::stmt::Stmt;

/// Data attribute a clause requests for its operands.
///
/// `Host` covers both the `self` and `host` spellings of the update clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataClauseKind {
    Present,
    Copy,
    Copyin,
    Copyout,
    Create,
    NoCreate,
    Delete,
    Host,
    Device,
}

impl DataClauseKind {
    pub const ALL: [DataClauseKind; 9] = [
        DataClauseKind::Present,
        DataClauseKind::Copy,
        DataClauseKind::Copyin,
        DataClauseKind::Copyout,
        DataClauseKind::Create,
        DataClauseKind::NoCreate,
        DataClauseKind::Delete,
        DataClauseKind::Host,
        DataClauseKind::Device,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataClauseKind::Present => "present",
            DataClauseKind::Copy => "copy",
            DataClauseKind::Copyin => "copyin",
            DataClauseKind::Copyout => "copyout",
            DataClauseKind::Create => "create",
            DataClauseKind::NoCreate => "no_create",
            DataClauseKind::Delete => "delete",
            DataClauseKind::Host => "host",
            DataClauseKind::Device => "device",
        }
    }

    /// Motion clauses of the update directive.
    pub fn is_motion(self) -> bool {
        matches!(self, DataClauseKind::Host | DataClauseKind::Device)
    }

    /// Whether the `present_or_` aliases exist for this kind.
    pub fn has_present_or_alias(self) -> bool {
        matches!(
            self,
            DataClauseKind::Copy | DataClauseKind::Copyin | DataClauseKind::Copyout | DataClauseKind::Create
        )
    }
}

/// How a data clause was spelled. Only diagnostics care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataSpelling {
    #[default]
    Base,
    /// `present_or_copy` and friends.
    PresentOr,
    /// `pcopy` and friends.
    PresentOrShort,
    /// `self` for [`DataClauseKind::Host`].
    SelfAlias,
}

impl DataSpelling {
    /// Source spelling of `kind` written this way.
    pub fn spell(self, kind: DataClauseKind) -> String {
        match self {
            DataSpelling::PresentOr if kind.has_present_or_alias() => {
                format!("present_or_{}", kind.name())
            }
            DataSpelling::PresentOrShort if kind.has_present_or_alias() => {
                format!("p{}", kind.name())
            }
            DataSpelling::SelfAlias if kind == DataClauseKind::Host => "self".to_string(),
            _ => kind.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccClauseKind {
    Data {
        kind: DataClauseKind,
        spelling: DataSpelling,
        operands: Vec<Expr>,
    },
    If(Expr),
    IfPresent,
    /// `async` or `async(arg)`.
    Async(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccClause {
    pub kind: AccClauseKind,
    pub span: SourceSpan,
}

impl AccClause {
    pub fn data(kind: DataClauseKind, operands: Vec<Expr>, span: SourceSpan) -> Self {
        Self::spelled(kind, DataSpelling::Base, operands, span)
    }

    pub fn spelled(kind: DataClauseKind, spelling: DataSpelling, operands: Vec<Expr>, span: SourceSpan) -> Self {
        Self {
            kind: AccClauseKind::Data {
                kind,
                spelling,
                operands,
            },
            span,
        }
    }

    pub fn if_clause(cond: Expr, span: SourceSpan) -> Self {
        Self {
            kind: AccClauseKind::If(cond),
            span,
        }
    }

    pub fn if_present(span: SourceSpan) -> Self {
        Self {
            kind: AccClauseKind::IfPresent,
            span,
        }
    }

    pub fn async_clause(arg: Option<Expr>, span: SourceSpan) -> Self {
        Self {
            kind: AccClauseKind::Async(arg),
            span,
        }
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> String {
        match &self.kind {
            AccClauseKind::Data { kind, spelling, .. } => spelling.spell(*kind),
            AccClauseKind::If(_) => "if".to_string(),
            AccClauseKind::IfPresent => "if_present".to_string(),
            AccClauseKind::Async(_) => "async".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccDirectiveKind {
    Data,
    EnterData,
    ExitData,
    Parallel,
    Loop,
    ParallelLoop,
    Update,
    Wait,
}

impl AccDirectiveKind {
    pub fn name(self) -> &'static str {
        match self {
            AccDirectiveKind::Data => "data",
            AccDirectiveKind::EnterData => "enter data",
            AccDirectiveKind::ExitData => "exit data",
            AccDirectiveKind::Parallel => "parallel",
            AccDirectiveKind::Loop => "loop",
            AccDirectiveKind::ParallelLoop => "parallel loop",
            AccDirectiveKind::Update => "update",
            AccDirectiveKind::Wait => "wait",
        }
    }

    /// Compute constructs, including the combined one.
    pub fn is_compute(self) -> bool {
        matches!(self, AccDirectiveKind::Parallel | AccDirectiveKind::ParallelLoop)
    }

    /// Directives without an associated statement.
    pub fn is_executable(self) -> bool {
        matches!(
            self,
            AccDirectiveKind::EnterData
                | AccDirectiveKind::ExitData
                | AccDirectiveKind::Update
                | AccDirectiveKind::Wait
        )
    }
}

/// One directive instance together with its associated statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccDirective {
    pub kind: AccDirectiveKind,
    pub clauses: Vec<AccClause>,
    /// Queue arguments of `wait(...)`. Empty means wait for everything.
    pub wait_args: Vec<Expr>,
    pub body: Option<Box<Stmt>>,
    pub span: SourceSpan,
}

impl AccDirective {
    pub fn new(kind: AccDirectiveKind, clauses: Vec<AccClause>, span: SourceSpan) -> Self {
        Self {
            kind,
            clauses,
            wait_args: Vec::new(),
            body: None,
            span,
        }
    }

    pub fn with_body(mut self, body: Stmt) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    pub fn with_wait_args(mut self, args: Vec<Expr>) -> Self {
        self.wait_args = args;
        self
    }

    pub fn async_clause(&self) -> Option<&AccClause> {
        self.clauses
            .iter()
            .find(|c| matches!(c.kind, AccClauseKind::Async(_)))
    }

    pub fn if_condition(&self) -> Option<&Expr> {
        self.clauses.iter().find_map(|c| match &c.kind {
            AccClauseKind::If(cond) => Some(cond),
            _ => None,
        })
    }

    pub fn has_if_present(&self) -> bool {
        self.clauses
            .iter()
            .any(|c| matches!(c.kind, AccClauseKind::IfPresent))
    }
}
