//! Legal placement of constructs.
//!
//! Two independent checks: the region state machine over enclosing
//! constructs, and the purely syntactic rule that executable directives
//! cannot be the unbraced body of a control-flow statement.

use accord_ast::{AccDirectiveKind, StmtKind};
use miette::SourceSpan;

use crate::error::TranslateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionState {
    Outside,
    InsideData,
    InsideCompute,
    InsideLoop,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    state: RegionState,
    directive: AccDirectiveKind,
    span: SourceSpan,
}

#[derive(Debug, Default)]
pub struct NestingValidator {
    stack: Vec<Frame>,
}

impl NestingValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RegionState {
        self.stack.last().map_or(RegionState::Outside, |f| f.state)
    }

    /// Whether a loop construct entered now has no enclosing compute
    /// construct.
    pub fn is_orphaned_loop(&self) -> bool {
        matches!(self.state(), RegionState::Outside | RegionState::InsideData)
    }

    /// Checks that `directive` may appear in the current region.
    pub fn check(&self, directive: AccDirectiveKind, span: SourceSpan) -> Result<(), TranslateError> {
        let in_device_region = matches!(self.state(), RegionState::InsideCompute | RegionState::InsideLoop);
        let legal = match directive {
            AccDirectiveKind::Loop => true,
            AccDirectiveKind::Data
            | AccDirectiveKind::EnterData
            | AccDirectiveKind::ExitData
            | AccDirectiveKind::Parallel
            | AccDirectiveKind::ParallelLoop
            | AccDirectiveKind::Update
            | AccDirectiveKind::Wait => !in_device_region,
        };
        if legal {
            return Ok(());
        }
        // The innermost frame is a compute or loop frame here.
        let enclosing = self.stack.last().map_or((AccDirectiveKind::Parallel, span), |f| (f.directive, f.span));
        Err(TranslateError::BadNesting {
            directive: directive.name(),
            enclosing: enclosing.0.name(),
            span,
            enclosing_span: enclosing.1,
        })
    }

    /// Enters the region of a construct with an associated statement.
    pub fn enter(&mut self, directive: AccDirectiveKind, span: SourceSpan) {
        let state = match directive {
            AccDirectiveKind::Data => RegionState::InsideData,
            AccDirectiveKind::Parallel => RegionState::InsideCompute,
            AccDirectiveKind::ParallelLoop | AccDirectiveKind::Loop => RegionState::InsideLoop,
            AccDirectiveKind::EnterData
            | AccDirectiveKind::ExitData
            | AccDirectiveKind::Update
            | AccDirectiveKind::Wait => return,
        };
        self.stack.push(Frame { state, directive, span });
    }

    pub fn exit(&mut self) {
        self.stack.pop();
    }
}

/// Rejects executable directives written as the unbraced body of a
/// control-flow statement.
pub fn check_substatement(
    parent: Option<&StmtKind>,
    directive: AccDirectiveKind,
    span: SourceSpan,
) -> Result<(), TranslateError> {
    if !directive.is_executable() {
        return Ok(());
    }
    let statement = match parent {
        Some(StmtKind::If { .. }) => "if",
        Some(StmtKind::While { .. }) => "while",
        Some(StmtKind::DoWhile { .. }) => "do",
        Some(StmtKind::For { .. }) => "for",
        Some(StmtKind::Switch { .. }) => "switch",
        _ => return Ok(()),
    };
    Err(TranslateError::ImmediateSubstatement {
        directive: directive.name(),
        statement,
        span,
    })
}
