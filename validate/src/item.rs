//! Synthetic item built from command line arguments.

use std::sync::Arc;

use npcinv_core::ReadResult;
use npcinv_core::host::{FieldMap, HostItem, ModsSnapshot, Rect};
use npcinv_core::item::{FrameStamp, ItemKind, ItemRecord};
use npcinv_core::Value;

#[derive(Debug, Clone)]
pub struct CliItem {
    path: String,
    fields: FieldMap,
    mods: ModsSnapshot,
}

impl CliItem {
    pub fn new(path: &str, rarity: &str, prefixes: i64, suffixes: i64) -> Self {
        let mods = ModsSnapshot {
            fields: FieldMap::new()
                .with("Rarity", rarity)
                .with("PrefixesCount", prefixes)
                .with("SuffixesCount", suffixes),
            explicit_mods: Vec::new(),
        };
        Self {
            path: path.to_string(),
            fields: FieldMap::new().with("Rarity", rarity),
            mods,
        }
    }

    /// Add `NAME=VALUE` fields.
    pub fn with_fields(mut self, pairs: &[String]) -> Result<Self, String> {
        for pair in pairs {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected NAME=VALUE, got `{pair}`"))?;
            self.fields.insert(name.trim(), parse_value(value.trim()));
        }
        Ok(self)
    }

    pub fn into_record(self, kind: ItemKind, tab_index: i32) -> ItemRecord {
        ItemRecord::displayed(
            Arc::new(self),
            kind,
            Rect::new(0.0, 0.0, 50.0, 50.0),
            tab_index,
            FrameStamp::default(),
        )
    }
}

/// Booleans, integers and floats by shape; anything else is text.
/// A quoted value is always text.
fn parse_value(raw: &str) -> Value {
    if let Some(text) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        return Value::from(text);
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(x) = raw.parse::<f64>() {
        return Value::Float(x);
    }
    Value::from(raw)
}

impl HostItem for CliItem {
    fn address(&self) -> u64 {
        1
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn path(&self) -> Option<String> {
        Some(self.path.clone())
    }

    fn name(&self) -> String {
        self.fields
            .first_str(&["Name", "BaseName"])
            .map(str::to_string)
            .unwrap_or_else(|| self.path.rsplit('/').next().unwrap_or_default().to_string())
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn base_tags(&self) -> ReadResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn mods(&self) -> ReadResult<ModsSnapshot> {
        Ok(self.mods.clone())
    }
}
