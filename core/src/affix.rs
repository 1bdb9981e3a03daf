//! Open prefix/suffix counting.
//!
//! `open = max(0, max_allowed - used)` per affix kind. The maximum comes
//! from the item category (see [`AffixLimits`]) clamped by rarity; the used
//! count comes from an explicit count on the mods component when the host
//! reports one, otherwise from classifying each explicit modifier.
//!
//! Mods are only read for items on a real, currently rendered tab. Items on
//! the vendor pseudo-tabs or with an invalid handle always report 0.

use npcinv_types::AffixLimits;

use crate::error::ReadResultExt;
use crate::host::{AffixSnapshot, ModsSnapshot};
use crate::item::ItemRecord;

const PREFIX_COUNT_FIELDS: &[&str] = &["PrefixesCount", "PrefixCount", "NumPrefixes"];
const SUFFIX_COUNT_FIELDS: &[&str] = &["SuffixesCount", "SuffixCount", "NumSuffixes"];
const RARITY_FIELDS: &[&str] = &["ItemRarity", "Rarity"];
const GENERATION_ID_FIELDS: &[&str] = &["GenerationTypeId", "GenerationId", "GenType"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffixKind {
    Prefix,
    Suffix,
}

impl AffixKind {
    fn keyword(self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
        }
    }

    fn count_fields(self) -> &'static [&'static str] {
        match self {
            Self::Prefix => PREFIX_COUNT_FIELDS,
            Self::Suffix => SUFFIX_COUNT_FIELDS,
        }
    }

    fn flag_field(self) -> &'static str {
        match self {
            Self::Prefix => "IsPrefix",
            Self::Suffix => "IsSuffix",
        }
    }

    fn generation_id(self) -> i64 {
        match self {
            Self::Prefix => 1,
            Self::Suffix => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rarity {
    Normal,
    Magic,
    Rare,
    Unique,
}

impl Rarity {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::Magic),
            2 => Some(Self::Rare),
            3 => Some(Self::Unique),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "magic" => Some(Self::Magic),
            "rare" => Some(Self::Rare),
            "unique" => Some(Self::Unique),
            _ => None,
        }
    }

    /// Clamp a category maximum to what this rarity can carry.
    fn clamp(self, base: u32) -> u32 {
        match self {
            Self::Normal | Self::Unique => 0,
            Self::Magic => base.min(1),
            Self::Rare => base,
        }
    }
}

/// Rarity reported by the mods component, by code or by name.
pub fn rarity_of(mods: &ModsSnapshot) -> Option<Rarity> {
    if let Some(code) = mods.fields.first_int(RARITY_FIELDS) {
        return Rarity::from_code(code);
    }
    mods.fields.first_str(RARITY_FIELDS).and_then(Rarity::from_name)
}

/// Whether one explicit modifier is of `kind`, by any of the signals the
/// host may expose: affix type text, explicit flag, generation type text,
/// or numeric generation type.
fn is_affix_of_kind(affix: &AffixSnapshot, kind: AffixKind) -> bool {
    let keyword = kind.keyword();
    let text_says = |text: &str| text.to_ascii_lowercase().contains(keyword);

    if let Some(record) = &affix.mod_record {
        if record.first_str(&["AffixType"]).is_some_and(text_says) {
            return true;
        }
    }
    if affix.fields.first_bool(&[kind.flag_field()]) == Some(true) {
        return true;
    }
    let Some(record) = &affix.mod_record else {
        return false;
    };
    if record.first_str(&["GenerationType"]).is_some_and(text_says) {
        return true;
    }
    record.first_int(GENERATION_ID_FIELDS) == Some(kind.generation_id())
}

/// Number of affixes of `kind` already on the item.
pub fn used_affixes(mods: &ModsSnapshot, kind: AffixKind) -> u32 {
    if let Some(count) = mods.fields.first_int(kind.count_fields()) {
        return u32::try_from(count.max(0)).unwrap_or(u32::MAX);
    }
    mods.explicit_mods
        .iter()
        .filter(|affix| is_affix_of_kind(affix, kind))
        .count() as u32
}

/// Computes open affix counts with a configurable limit table.
#[derive(Debug, Clone, Copy, Default)]
pub struct AffixCounter {
    limits: AffixLimits,
}

impl AffixCounter {
    pub fn new(limits: AffixLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> AffixLimits {
        self.limits
    }

    pub fn open_prefixes(&self, item: &ItemRecord) -> u32 {
        self.open(item, AffixKind::Prefix)
    }

    pub fn open_suffixes(&self, item: &ItemRecord) -> u32 {
        self.open(item, AffixKind::Suffix)
    }

    pub fn open(&self, item: &ItemRecord, kind: AffixKind) -> u32 {
        if item.tab_index() < 0 || !item.is_valid() {
            return 0;
        }
        let Some(mods) = item.handle().mods().absent_on_error("mods") else {
            return 0;
        };
        let max = self.max_affixes(item, &mods);
        max.saturating_sub(used_affixes(&mods, kind))
    }

    /// Per-kind maximum for this item: category limit clamped by rarity.
    /// Unknown rarity keeps the category limit.
    pub fn max_affixes(&self, item: &ItemRecord, mods: &ModsSnapshot) -> u32 {
        let tags = item_tags(item);
        let has = |tag: &str| tags.iter().any(|t| t.eq_ignore_ascii_case(tag));

        let base = if has("flask") {
            self.limits.flask
        } else if has("jewel") || has("abyssjewel") || has("clusterjewel") {
            self.limits.jewel
        } else {
            self.limits.other
        };
        let base = u32::from(base);

        match rarity_of(mods) {
            Some(rarity) => rarity.clamp(base),
            None => base,
        }
    }
}

/// Base tags plus tags implied by the metadata path.
fn item_tags(item: &ItemRecord) -> Vec<String> {
    let handle = item.handle();
    let Some(path) = handle.path().filter(|p| !p.is_empty()) else {
        return Vec::new();
    };

    let mut tags = handle.base_tags().absent_on_error("base tags").unwrap_or_default();
    let lower = path.to_ascii_lowercase();
    for (needle, tag) in [
        ("flask", "flask"),
        ("jewel", "jewel"),
        ("abyss", "abyssjewel"),
        ("cluster", "clusterjewel"),
    ] {
        if lower.contains(needle) {
            tags.push(tag.to_string());
        }
    }
    tags
}
