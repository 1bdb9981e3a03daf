pub mod affix;
pub mod config;
pub mod error;
pub mod filter;
pub mod host;
pub mod item;
pub mod purchase;
pub mod rewards;
pub mod rules;
pub mod session;
pub mod tabs;
pub mod vendor;

#[cfg(test)]
mod testkit;

// Re-exports for convenience
pub use affix::AffixCounter;
pub use error::{InputError, ReadError, ReadResult, ReadResultExt};
pub use filter::{ExprCompiler, FilterCompiler, FilterError, ItemPredicate, Value, preprocess};
pub use item::{ItemKind, ItemRecord};
pub use rules::{RuleDirectory, RuleError, RuleSet, RuleSource, RuleSourceProvider};
pub use session::{HiddenTabMatch, Highlight, HighlightPass, Session};
pub use tabs::{SelectionReason, TabCache, TabRecord};
