use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Coarse classification used to decide how much of the output survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed operand or directive. Abandons the directive; sibling
    /// constructs still translate.
    Structural,
    /// Inconsistent data attributes. The first clause wins.
    Conflict,
    /// Write-intent clause on const storage. The operand is dropped.
    ConstViolation,
    /// Illegal construct placement. The construct is dropped, and the
    /// whole function once a structural error preceded it.
    Nesting,
}

/// Errors reported while translating directives.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Subarray in `{clause}` clause must specify both a lower bound and a length")]
    #[diagnostic(code(accord_translate::missing_bounds))]
    MissingBounds {
        clause: String,
        #[label("incomplete subarray")]
        span: SourceSpan,
    },

    #[error("Subarray in `{clause}` clause has a negative length")]
    #[diagnostic(code(accord_translate::negative_length))]
    NegativeLength {
        clause: String,
        #[label("length below zero")]
        span: SourceSpan,
    },

    #[error("Subarray is not permitted in `{clause}` clause on `{directive}` directive")]
    #[diagnostic(code(accord_translate::subarray_not_permitted))]
    SubarrayNotPermitted {
        directive: &'static str,
        clause: String,
        #[label("subarray here")]
        span: SourceSpan,
    },

    #[error("Member expression is not permitted in `{clause}` clause on `{directive}` directive")]
    #[diagnostic(code(accord_translate::member_not_permitted))]
    MemberNotPermitted {
        directive: &'static str,
        clause: String,
        #[label("member expression here")]
        span: SourceSpan,
    },

    #[error("Member of a member is not a valid operand")]
    #[diagnostic(
        code(accord_translate::nested_member),
        help("Name the enclosing member instead, or copy the inner member into a variable")
    )]
    NestedMember {
        #[label("base of this access is itself a member")]
        span: SourceSpan,
    },

    #[error("Expected a variable, a member or a subarray in `{clause}` clause")]
    #[diagnostic(code(accord_translate::unexpected_operand))]
    UnexpectedOperand {
        clause: String,
        #[label("unsupported operand")]
        span: SourceSpan,
    },

    #[error("The owning instance can only appear as `this[0:1]`")]
    #[diagnostic(code(accord_translate::owner_not_unit_range))]
    OwnerNotUnitRange {
        #[label("owning instance used here")]
        span: SourceSpan,
    },

    #[error("`{clause}` clause is not allowed on `{directive}` directive")]
    #[diagnostic(code(accord_translate::clause_not_allowed))]
    ClauseNotAllowed {
        clause: String,
        directive: &'static str,
        #[label("not allowed here")]
        span: SourceSpan,
    },

    #[error("`{directive}` directive requires at least one of: {expected}")]
    #[diagnostic(code(accord_translate::missing_required_clause))]
    MissingRequiredClause {
        directive: &'static str,
        expected: &'static str,
        #[label("directive here")]
        span: SourceSpan,
    },

    #[error("Argument {value} to `{clause}` is not a valid queue")]
    #[diagnostic(
        code(accord_translate::invalid_async_argument),
        help("Queues are non-negative, or one of -1 (sync), -2 (noval), -3 (default)")
    )]
    InvalidAsyncArgument {
        clause: &'static str,
        value: i64,
        #[label("invalid queue")]
        span: SourceSpan,
    },

    #[error("`{name}` is defined again as {kind} variable")]
    #[diagnostic(code(accord_translate::defined_again))]
    DefinedAgain {
        name: String,
        kind: &'static str,
        #[label("redundant clause operand")]
        span: SourceSpan,
        #[label("previously specified here")]
        first: SourceSpan,
    },

    #[error("{previous} variable cannot be {kind} variable (`{name}`)")]
    #[diagnostic(code(accord_translate::conflicting_kinds))]
    ConflictingKinds {
        name: String,
        previous: &'static str,
        kind: &'static str,
        #[label("conflicting clause operand")]
        span: SourceSpan,
        #[label("previously specified here")]
        first: SourceSpan,
    },

    #[error("`{name}` appears in more than one motion clause of the same `update` directive")]
    #[diagnostic(code(accord_translate::update_same_variable))]
    UpdateSameVariable {
        name: String,
        #[label("appears again here")]
        span: SourceSpan,
        #[label("previously specified here")]
        first: SourceSpan,
    },

    #[error("Const variable `{name}` cannot be written by `{clause}` clause")]
    #[diagnostic(code(accord_translate::const_write))]
    ConstWrite {
        name: String,
        clause: String,
        #[label("const storage")]
        span: SourceSpan,
    },

    #[error("`{directive}` directive cannot be nested within `{enclosing}` directive")]
    #[diagnostic(code(accord_translate::bad_nesting))]
    BadNesting {
        directive: &'static str,
        enclosing: &'static str,
        #[label("nested directive")]
        span: SourceSpan,
        #[label("enclosing directive")]
        enclosing_span: SourceSpan,
    },

    #[error("`{directive}` directive cannot be the immediate substatement of `{statement}`")]
    #[diagnostic(
        code(accord_translate::immediate_substatement),
        help("Enclose the directive in braces")
    )]
    ImmediateSubstatement {
        directive: &'static str,
        statement: &'static str,
        #[label("directive here")]
        span: SourceSpan,
    },
}

impl TranslateError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslateError::MissingBounds { .. }
            | TranslateError::NegativeLength { .. }
            | TranslateError::SubarrayNotPermitted { .. }
            | TranslateError::MemberNotPermitted { .. }
            | TranslateError::NestedMember { .. }
            | TranslateError::UnexpectedOperand { .. }
            | TranslateError::OwnerNotUnitRange { .. }
            | TranslateError::ClauseNotAllowed { .. }
            | TranslateError::MissingRequiredClause { .. }
            | TranslateError::InvalidAsyncArgument { .. } => ErrorCategory::Structural,
            TranslateError::DefinedAgain { .. }
            | TranslateError::ConflictingKinds { .. }
            | TranslateError::UpdateSameVariable { .. } => ErrorCategory::Conflict,
            TranslateError::ConstWrite { .. } => ErrorCategory::ConstViolation,
            TranslateError::BadNesting { .. } | TranslateError::ImmediateSubstatement { .. } => {
                ErrorCategory::Nesting
            }
        }
    }

    /// Whether the error leaves the enclosing function untranslatable.
    /// A misplaced executable directive always does, since the statement it
    /// sits in is malformed; any other nesting error does once a structural
    /// error has been reported in the same function.
    pub fn suppresses_unit(&self, after_structural: bool) -> bool {
        match self.category() {
            ErrorCategory::Nesting => {
                after_structural || matches!(self, TranslateError::ImmediateSubstatement { .. })
            }
            _ => false,
        }
    }

    pub fn span(&self) -> SourceSpan {
        match self {
            TranslateError::MissingBounds { span, .. }
            | TranslateError::NegativeLength { span, .. }
            | TranslateError::SubarrayNotPermitted { span, .. }
            | TranslateError::MemberNotPermitted { span, .. }
            | TranslateError::NestedMember { span }
            | TranslateError::UnexpectedOperand { span, .. }
            | TranslateError::OwnerNotUnitRange { span }
            | TranslateError::ClauseNotAllowed { span, .. }
            | TranslateError::MissingRequiredClause { span, .. }
            | TranslateError::InvalidAsyncArgument { span, .. }
            | TranslateError::DefinedAgain { span, .. }
            | TranslateError::ConflictingKinds { span, .. }
            | TranslateError::UpdateSameVariable { span, .. }
            | TranslateError::ConstWrite { span, .. }
            | TranslateError::BadNesting { span, .. }
            | TranslateError::ImmediateSubstatement { span, .. } => *span,
        }
    }
}

/// Non-fatal diagnostics.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum TranslateWarning {
    #[error("`{clause}` clause is translated using the `{modifier}` extension map modifier")]
    #[diagnostic(code(accord_translate::extension_modifier), severity(Warning))]
    ExtensionModifier {
        modifier: &'static str,
        clause: String,
        #[label("translated with `{modifier}`")]
        span: SourceSpan,
    },

    #[error("`ompx_hold` is applied on a construct whose queue might be asynchronous")]
    #[diagnostic(
        code(accord_translate::hold_on_unknown_queue),
        severity(Warning),
        help("Target storage stays pinned until the queue retires the construct")
    )]
    HoldOnUnknownQueue {
        #[label("queue is only known at run time")]
        span: SourceSpan,
    },
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Failed to read translator config `{path}`")]
    #[diagnostic(code(accord_translate::config_io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid translator config")]
    #[diagnostic(code(accord_translate::config_parse))]
    Parse {
        #[source]
        source: toml::de::Error,
    },
}
