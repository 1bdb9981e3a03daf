//! Plugin settings and persisted rule descriptors.

use serde::{Deserialize, Serialize};

use crate::Color;

/// One user rule as persisted in settings.
///
/// `location` is relative to the rule folder. The position of the
/// descriptor in [`PluginSettings::rules`] is its precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub color: Color,
}

impl RuleDescriptor {
    pub fn new(name: impl Into<String>, location: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            enabled,
            color: Color::default(),
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Key used to cache per-rule UI state (hex input buffers and the like).
    pub fn key(&self) -> String {
        format!("{}|{}", self.name, self.location)
    }
}

/// Base number of affix slots per kind, before the rarity clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffixLimits {
    pub flask: u8,
    pub jewel: u8,
    pub other: u8,
}

impl Default for AffixLimits {
    fn default() -> Self {
        Self {
            flask: 1,
            jewel: 2,
            other: 3,
        }
    }
}

/// Full plugin configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    pub enable: bool,

    // ─── Drawing ────────────────────────────────────────────────────────────
    /// Outline vendor tab headers when a hidden tab holds a wanted item
    pub draw_on_tab_labels: bool,
    pub default_frame_color: Color,
    pub frame_thickness: u8,

    // ─── Auto purchase ──────────────────────────────────────────────────────
    pub auto_purchase: bool,
    /// Delay between two auto purchases (50..=1000 ms)
    pub purchase_delay_ms: u32,
    /// Purchases per tab before stopping (0 = unlimited, max 50)
    pub max_purchases_per_tab: u32,
    pub auto_purchase_toggle_key: String,
    pub auto_purchase_color: Color,

    // ─── Rules ──────────────────────────────────────────────────────────────
    /// Folder next to the default config folder holding `*.ifl` files
    pub custom_config_dir: String,
    pub rules: Vec<RuleDescriptor>,
    pub affix_limits: AffixLimits,

    // ─── Timing ─────────────────────────────────────────────────────────────
    /// Minimum interval between two full tab reconciliations
    pub tab_refresh_ms: u64,
    /// Time a newly selected tab must stay selected before its items are drawn
    pub selection_settle_ms: u64,
    /// Refresh interval of the quest/ritual reward snapshots
    pub reward_refresh_ms: u64,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enable: false,
            draw_on_tab_labels: true,
            default_frame_color: Color::RED,
            frame_thickness: 1,
            auto_purchase: false,
            purchase_delay_ms: 100,
            max_purchases_per_tab: 5,
            auto_purchase_toggle_key: "F5".to_string(),
            auto_purchase_color: Color::LIME,
            custom_config_dir: String::new(),
            rules: Vec::new(),
            affix_limits: AffixLimits::default(),
            tab_refresh_ms: 50,
            selection_settle_ms: 120,
            reward_refresh_ms: 1000,
        }
    }
}

impl PluginSettings {
    /// Clamp range-limited values into the ranges the settings menu allows.
    pub fn normalized(mut self) -> Self {
        self.purchase_delay_ms = self.purchase_delay_ms.clamp(50, 1000);
        self.max_purchases_per_tab = self.max_purchases_per_tab.min(50);
        self.frame_thickness = self.frame_thickness.clamp(1, 20);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings_toml() {
        let toml = r#"
auto_purchase = true
purchase_delay_ms = 250
default_frame_color = [255, 128, 0, 255]

[affix_limits]
other = 4

[[rules]]
name = "Currency"
location = "currency.ifl"
enabled = true
color = [0, 0, 255, 255]

[[rules]]
name = "Bases"
location = "sub/bases.ifl"
"#;

        let settings: PluginSettings = toml::from_str(toml).unwrap();
        assert!(settings.auto_purchase);
        assert_eq!(settings.purchase_delay_ms, 250);
        assert_eq!(settings.default_frame_color, Color::rgba(255, 128, 0, 255));
        assert_eq!(settings.affix_limits.other, 4);
        assert_eq!(settings.affix_limits.flask, 1);
        assert_eq!(settings.rules.len(), 2);
        assert!(settings.rules[0].enabled);
        assert!(!settings.rules[1].enabled);
        assert_eq!(settings.rules[1].color, Color::RED);
        assert_eq!(settings.tab_refresh_ms, 50);
    }

    #[test]
    fn test_normalized_clamps_ranges() {
        let settings = PluginSettings {
            purchase_delay_ms: 5,
            max_purchases_per_tab: 500,
            frame_thickness: 0,
            ..Default::default()
        }
        .normalized();

        assert_eq!(settings.purchase_delay_ms, 50);
        assert_eq!(settings.max_purchases_per_tab, 50);
        assert_eq!(settings.frame_thickness, 1);
    }

    #[test]
    fn test_rule_key() {
        let rule = RuleDescriptor::new("Maps", "maps.ifl", true);
        assert_eq!(rule.key(), "Maps|maps.ifl");
    }
}
