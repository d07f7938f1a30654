//! Translation of data and async directives into target directives.
//!
//! The entry point is [`translate_unit`]. It walks every function of a
//! [`accord_ast::Unit`] once and returns the rewritten functions together
//! with every diagnostic raised on the way.

pub mod config;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod map;
pub mod nesting;
pub mod queue;
pub mod subarray;
pub mod target;
mod translator;

pub use config::{RefCountPolicy, TranslatorConfig};
pub use error::{ConfigError, ErrorCategory, TranslateError, TranslateWarning};
pub use identity::{DataRange, VariableIdentity};
pub use map::{MapDescriptor, MapDirection, MapModifier};
pub use queue::{AsyncDesignator, AsyncStatus, DependencyToken};
pub use subarray::{EscapeReason, RuntimeEscape};
pub use target::{TargetClause, TargetDirective, TargetDirectiveKind, TargetStmt, TargetStmtKind};
pub use translator::{translate_unit, DirectiveTranslator, TranslatedFunction, TranslationOutput};
