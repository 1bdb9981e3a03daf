//! Shared configuration types for the NPC inventory highlighter.
//!
//! Everything here is plain serde data so the host can persist it with
//! whatever config backend it uses (the core crate ships a `confy` loader).

mod color;
mod settings;

pub use color::{Color, ColorParseError};
pub use settings::{AffixLimits, PluginSettings, RuleDescriptor};
