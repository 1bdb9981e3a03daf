//! Filter expressions over item records.
//!
//! - [`preprocess`]: rule text → canonical expression + open affix thresholds
//! - [`FilterCompiler`]/[`ItemPredicate`]: the seam to a boolean filter
//!   compiler; [`ExprCompiler`] is the built-in implementation

mod expr;
pub mod preprocess;
mod value;

use std::fmt;

use thiserror::Error;

use crate::affix::AffixCounter;
use crate::item::ItemRecord;

pub use expr::ExprCompiler;
pub use preprocess::{Preprocessed, preprocess};
pub use value::Value;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("expression is empty")]
    Empty,

    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("`{name}` takes {expected} argument(s), found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("evaluation failed: {0}")]
    Eval(String),
}

/// Per-evaluation services available to predicates.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub affixes: &'a AffixCounter,
}

/// A compiled rule predicate.
///
/// Evaluation failures are returned, never panicked; the match engine
/// treats them as "does not match".
pub trait ItemPredicate: fmt::Debug + Send + Sync {
    fn evaluate(&self, item: &ItemRecord, ctx: &EvalContext<'_>) -> Result<bool, FilterError>;
}

/// Compiles canonical expressions into predicates.
pub trait FilterCompiler {
    fn compile(&self, expression: &str) -> Result<Box<dyn ItemPredicate>, FilterError>;
}

/// Predicate backed by a closure, for hosts that bring their own filter
/// engine.
pub struct FnPredicate<F>(pub F);

impl<F> fmt::Debug for FnPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnPredicate")
    }
}

impl<F> ItemPredicate for FnPredicate<F>
where
    F: Fn(&ItemRecord) -> Result<bool, FilterError> + Send + Sync,
{
    fn evaluate(&self, item: &ItemRecord, _ctx: &EvalContext<'_>) -> Result<bool, FilterError> {
        (self.0)(item)
    }
}
