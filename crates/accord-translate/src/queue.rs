//! Async queues to dependency tokens.
//!
//! Every queue becomes a token. A non-blocking construct declares an
//! in-out dependency on its own token, which chains constructs of one queue
//! in encounter order, plus an in dependency on the reserved synchronous
//! token. A wait for everything is an in-out dependency on that reserved
//! token and therefore cannot complete while any queue has work left.

use accord_ast::{BinaryOp, DeclTable, Expr};
use indexmap::IndexMap;

use crate::identity::{self, IdentityRules, VariableIdentity};
use crate::target::{
    DependClause, DependKind, TargetClause, TargetDirective, TargetDirectiveKind, TargetStmt, TargetStmtKind,
    TokenArg,
};

pub const ACC_ASYNC_SYNC: i64 = -1;
pub const ACC_ASYNC_NOVAL: i64 = -2;
pub const ACC_ASYNC_DEFAULT: i64 = -3;

/// Queue named at a directive site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncDesignator {
    Literal(i64),
    Runtime(Expr),
    Synchronous,
}

/// What is known at translation time about a designator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsyncStatus {
    /// Blocking; no dependency clauses are emitted.
    Sync,
    /// Certainly an asynchronous queue.
    Async,
    /// Evaluated at run time and possibly the synchronous queue.
    Unknown,
}

/// Rejected literal queue argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidQueue(pub i64);

/// Classifies an `async` argument. A missing argument is the default
/// queue.
pub fn classify(arg: Option<&Expr>, decls: &DeclTable) -> Result<(AsyncDesignator, AsyncStatus), InvalidQueue> {
    let Some(arg) = arg else {
        return Ok((AsyncDesignator::Literal(ACC_ASYNC_NOVAL), AsyncStatus::Async));
    };
    if let Some(value) = arg.const_int() {
        return match value {
            ACC_ASYNC_SYNC => Ok((AsyncDesignator::Synchronous, AsyncStatus::Sync)),
            v if v >= 0 || v == ACC_ASYNC_NOVAL || v == ACC_ASYNC_DEFAULT => {
                Ok((AsyncDesignator::Literal(v), AsyncStatus::Async))
            }
            v => Err(InvalidQueue(v)),
        };
    }
    let unsigned = arg
        .base_decl()
        .and_then(|id| decls.get(id))
        .is_some_and(|d| d.is_unsigned);
    let status = if unsigned { AsyncStatus::Async } else { AsyncStatus::Unknown };
    Ok((AsyncDesignator::Runtime(arg.clone()), status))
}

/// Handle for one dependency token. Tokens are equal iff they stand for
/// the same literal queue or the same queue variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyToken(u32);

impl DependencyToken {
    pub const SYNC: DependencyToken = DependencyToken(0);

    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TokenKey {
    Synchronous,
    Literal(i64),
    Variable(VariableIdentity),
    /// Queue computed by an expression that is not a plain variable.
    Expression(String),
}

/// Non-blocking clauses for a construct, plus what must follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncPlan {
    pub status: AsyncStatus,
    pub clauses: Vec<TargetClause>,
    /// Guarded synchronization placed right after the construct when the
    /// queue might turn out to be the synchronous one.
    pub trailing: Option<TargetStmt>,
}

#[derive(Debug)]
pub struct AsyncQueueTranslator {
    tokens: IndexMap<TokenKey, DependencyToken>,
}

impl Default for AsyncQueueTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncQueueTranslator {
    pub fn new() -> Self {
        let mut tokens = IndexMap::new();
        tokens.insert(TokenKey::Synchronous, DependencyToken::SYNC);
        Self { tokens }
    }

    /// Number of tokens handed out, the synchronous one included.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn intern(&mut self, key: TokenKey) -> DependencyToken {
        let next = DependencyToken(self.tokens.len() as u32);
        let token = *self.tokens.entry(key).or_insert(next);
        if token == next {
            log::trace!("allocated dependency token {}", token.0);
        }
        token
    }

    pub fn token_for(&mut self, designator: &AsyncDesignator, decls: &DeclTable) -> DependencyToken {
        match designator {
            AsyncDesignator::Synchronous => DependencyToken::SYNC,
            AsyncDesignator::Literal(ACC_ASYNC_SYNC) => DependencyToken::SYNC,
            AsyncDesignator::Literal(value) => self.intern(TokenKey::Literal(*value)),
            AsyncDesignator::Runtime(expr) => {
                let key = match identity::identity_of(expr, decls, IdentityRules::SCALAR_OPERAND) {
                    VariableIdentity::Invalid => TokenKey::Expression(expr.display(decls).to_string()),
                    identity => TokenKey::Variable(identity),
                };
                self.intern(key)
            }
        }
    }

    fn token_arg(designator: &AsyncDesignator, decls: &DeclTable) -> TokenArg {
        match designator {
            AsyncDesignator::Literal(value) => TokenArg::Literal(*value),
            AsyncDesignator::Synchronous => TokenArg::Literal(ACC_ASYNC_SYNC),
            AsyncDesignator::Runtime(expr) => TokenArg::Runtime {
                expr: expr.clone(),
                text: expr.display(decls).to_string(),
            },
        }
    }

    fn depend(&mut self, kind: DependKind, designator: &AsyncDesignator, decls: &DeclTable) -> TargetClause {
        TargetClause::Depend(DependClause {
            kind,
            token: self.token_for(designator, decls),
            arg: Self::token_arg(designator, decls),
        })
    }

    fn sync_depend(kind: DependKind) -> TargetClause {
        TargetClause::Depend(DependClause {
            kind,
            token: DependencyToken::SYNC,
            arg: TokenArg::Literal(ACC_ASYNC_SYNC),
        })
    }

    /// Clauses turning a construct on `designator` into a non-blocking one.
    pub fn plan(&mut self, designator: &AsyncDesignator, status: AsyncStatus, decls: &DeclTable) -> AsyncPlan {
        if status == AsyncStatus::Sync {
            return AsyncPlan {
                status,
                clauses: Vec::new(),
                trailing: None,
            };
        }
        let clauses = vec![
            TargetClause::Nowait,
            self.depend(DependKind::InOut, designator, decls),
            Self::sync_depend(DependKind::In),
        ];
        let trailing = match (status, designator) {
            (AsyncStatus::Unknown, AsyncDesignator::Runtime(expr)) => Some(Self::guarded_sync_wait(expr)),
            _ => None,
        };
        AsyncPlan {
            status,
            clauses,
            trailing,
        }
    }

    /// `if (<queue> == -1) taskwait` on the synchronous token.
    fn guarded_sync_wait(queue: &Expr) -> TargetStmt {
        let span = queue.span;
        let cond = Expr::binary(BinaryOp::Eq, queue.clone(), Expr::int(ACC_ASYNC_SYNC, span), span);
        let wait = TargetDirective::new(
            TargetDirectiveKind::Taskwait,
            vec![Self::sync_depend(DependKind::InOut)],
            span,
        );
        TargetStmt::new(
            TargetStmtKind::If {
                cond,
                then: Box::new(TargetStmt::directive(wait)),
                otherwise: None,
            },
            span,
        )
    }

    /// Blocking wait for every queue.
    pub fn wait_all(&self, span: miette::SourceSpan) -> TargetDirective {
        TargetDirective::new(
            TargetDirectiveKind::Taskwait,
            vec![Self::sync_depend(DependKind::InOut)],
            span,
        )
    }

    /// Blocking wait for the listed queues only.
    pub fn wait_queues(
        &mut self,
        queues: &[AsyncDesignator],
        decls: &DeclTable,
        span: miette::SourceSpan,
    ) -> TargetDirective {
        if queues.iter().any(|q| matches!(q, AsyncDesignator::Synchronous)) {
            return self.wait_all(span);
        }
        let mut clauses: Vec<TargetClause> = Vec::new();
        for queue in queues {
            let clause = self.depend(DependKind::InOut, queue, decls);
            if !clauses.contains(&clause) {
                clauses.push(clause);
            }
        }
        TargetDirective::new(TargetDirectiveKind::Taskwait, clauses, span)
    }
}
