//! User rules: compiling rule text into ordered bindings, evaluating them
//! against items, and discovering rule files on disk.

mod binding;
mod engine;
mod loader;

use std::path::PathBuf;

use thiserror::Error;

use crate::filter::FilterError;

pub use binding::{CompiledRules, RuleBinding, RuleSet, RuleSource, compile_rules};
pub use engine::{color_for, color_for_any, first_match, matches};
pub use loader::{LoadedRules, RULE_FILE_EXTENSION, RuleDirectory, RuleSourceProvider};

/// Diagnostics produced while loading or compiling rules.
///
/// None of these are fatal: the offending rule never matches and the rest
/// of the set keeps working.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule `{rule}` failed to compile: {error}")]
    Compile { rule: String, error: FilterError },

    #[error("rule `{rule}` could not be read: {message}")]
    Source { rule: String, message: String },

    #[error("rule file for `{rule}` not found at {path:?}")]
    MissingFile { rule: String, path: PathBuf },

    #[error("custom rule folder {0:?} does not exist")]
    MissingCustomFolder(PathBuf),

    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
