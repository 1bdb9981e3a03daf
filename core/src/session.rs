//! Engine facade owned by the host plugin.
//!
//! A [`Session`] owns every piece of mutable engine state: the active rule
//! set, the tab cache, reward snapshots and purchase counters. The host
//! calls it once per frame from a single thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use npcinv_types::{Color, PluginSettings};

use crate::affix::AffixCounter;
use crate::filter::{EvalContext, ExprCompiler, FilterCompiler, FilterError};
use crate::host::{ElementRef, Hover, InputDriver, Rect, RewardWindow, TabContainer, VendorWindow};
use crate::item::ItemRecord;
use crate::purchase::{AutoPurchaseToggle, PurchaseOutcome, PurchasePlanner, TabKey};
use crate::rewards::RewardCache;
use crate::rules::{self, RuleError, RuleSet, RuleSource, RuleSourceProvider, compile_rules};
use crate::tabs::{TabCache, TabRecord};
use crate::vendor;

/// Alpha applied to frames under the hovered item's tooltip.
pub const HOVER_DIM_ALPHA: u8 = 45;

/// One item frame to draw.
#[derive(Debug, Clone)]
pub struct Highlight {
    pub item: ItemRecord,
    pub rect: Rect,
    pub color: Color,
    pub next_to_purchase: bool,
}

/// Highlights for one window plus the item auto purchase would take next.
#[derive(Debug, Clone, Default)]
pub struct HighlightPass {
    pub key: Option<TabKey>,
    pub highlights: Vec<Highlight>,
}

impl HighlightPass {
    pub fn next_to_purchase(&self) -> Option<&ItemRecord> {
        self.highlights
            .iter()
            .find(|h| h.next_to_purchase)
            .map(|h| &h.item)
    }
}

/// A non-selected tab holding matching items.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenTabMatch {
    pub index: usize,
    pub title: String,
    pub header: Option<ElementRef>,
    /// Header outline color, `None` when tab labels are not drawn
    pub header_color: Option<Color>,
    pub item_names: Vec<String>,
}

/// Lines of the "items on other tabs" box.
pub fn summary_lines(matches: &[HiddenTabMatch]) -> Vec<String> {
    let mut lines = Vec::new();
    for tab in matches {
        lines.push(format!("Tab [{}]", tab.title));
        lines.extend(tab.item_names.iter().map(|name| format!("\t{name}")));
        lines.push(String::new());
    }
    lines
}

fn dim_under(hover: Option<&Hover>, rect: &Rect, address: u64, color: Color) -> Color {
    match hover {
        Some(hover) if hover.covers(rect, address) => color.with_alpha(HOVER_DIM_ALPHA),
        _ => color,
    }
}

pub struct Session {
    settings: PluginSettings,
    compiler: Box<dyn FilterCompiler>,
    rules: Arc<RuleSet>,
    affixes: AffixCounter,
    tabs: TabCache,
    rewards: RewardCache,
    purchases: PurchasePlanner,
    toggle: AutoPurchaseToggle,
}

impl Session {
    pub fn new(settings: PluginSettings) -> Self {
        Self::with_compiler(settings, Box::new(ExprCompiler))
    }

    pub fn with_compiler(settings: PluginSettings, compiler: Box<dyn FilterCompiler>) -> Self {
        let settings = settings.normalized();
        Self {
            compiler,
            rules: Arc::new(RuleSet::default()),
            affixes: AffixCounter::new(settings.affix_limits),
            tabs: TabCache::new(
                Duration::from_millis(settings.tab_refresh_ms),
                Duration::from_millis(settings.selection_settle_ms),
            ),
            rewards: RewardCache::new(Duration::from_millis(settings.reward_refresh_ms)),
            purchases: PurchasePlanner::new(&settings),
            toggle: AutoPurchaseToggle::default(),
            settings,
        }
    }

    // --- Settings ---

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    /// Apply edited settings. Rule descriptors take effect on the next reload.
    pub fn apply_settings(&mut self, settings: PluginSettings) {
        let settings = settings.normalized();
        self.affixes = AffixCounter::new(settings.affix_limits);
        self.tabs = TabCache::new(
            Duration::from_millis(settings.tab_refresh_ms),
            Duration::from_millis(settings.selection_settle_ms),
        );
        self.rewards = RewardCache::new(Duration::from_millis(settings.reward_refresh_ms));
        self.purchases.configure(&settings);
        self.settings = settings;
    }

    /// Feed the auto purchase toggle key state. Returns the new enabled
    /// state when the key flipped it.
    pub fn on_toggle_key(&mut self, key_down: bool, now: Instant) -> Option<bool> {
        if !self.toggle.update(key_down, now) {
            return None;
        }
        let enabled = !self.settings.auto_purchase;
        self.settings.auto_purchase = enabled;
        self.purchases.set_enabled(enabled);
        tracing::info!(enabled, "Auto-purchase toggled");
        Some(enabled)
    }

    // --- Rules ---

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    /// Rediscover and recompile rules.
    ///
    /// The discovered descriptor order is written back into the settings.
    /// If rules cannot be enumerated at all the previous set stays active.
    pub fn reload(&mut self, provider: &dyn RuleSourceProvider) -> Result<Vec<RuleError>, RuleError> {
        let loaded = match provider.load(&self.settings.rules) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load rule files");
                return Err(e);
            }
        };
        self.settings.rules = loaded.descriptors;

        let mut diagnostics = loaded.errors;
        diagnostics.extend(self.install(&loaded.sources));
        Ok(diagnostics)
    }

    /// Compile `sources` directly, bypassing discovery.
    pub fn load_sources(&mut self, sources: &[RuleSource]) -> Vec<RuleError> {
        self.install(sources)
    }

    fn install(&mut self, sources: &[RuleSource]) -> Vec<RuleError> {
        let compiled = compile_rules(sources, self.compiler.as_ref());
        tracing::info!(
            rules = compiled.set.len(),
            active = compiled.set.active_count(),
            errors = compiled.errors.len(),
            "Rules loaded"
        );
        self.rules = compiled.set;
        self.purchases.reset();
        compiled.errors
    }

    // --- Matching ---

    fn ctx(&self) -> EvalContext<'_> {
        EvalContext {
            affixes: &self.affixes,
        }
    }

    pub fn matches(&self, item: &ItemRecord) -> bool {
        rules::matches(item, &self.rules, &self.ctx())
    }

    pub fn color_for(&self, item: &ItemRecord) -> Color {
        rules::color_for(item, &self.rules, &self.ctx(), self.settings.default_frame_color)
    }

    pub fn color_for_tab(&self, items: &[ItemRecord]) -> Color {
        rules::color_for_any(items, &self.rules, &self.ctx(), self.settings.default_frame_color)
    }

    /// Evaluate an ad-hoc expression against one item (filter test box).
    pub fn test_expression(&self, expression: &str, item: &ItemRecord) -> Result<bool, FilterError> {
        let pre = crate::filter::preprocess(expression);
        let predicate = self.compiler.compile(&pre.expression)?;
        predicate.evaluate(item, &self.ctx())
    }

    // --- Trade window ---

    pub fn reconcile(&mut self, container: &dyn TabContainer, now: Instant) -> &[TabRecord] {
        self.tabs.reconcile(container, now)
    }

    pub fn tabs(&self) -> &TabCache {
        &self.tabs
    }

    fn build_pass(&self, key: TabKey, items: &[ItemRecord], hover: Option<&Hover>) -> HighlightPass {
        let matched: Vec<ItemRecord> = items
            .iter()
            .filter(|item| !item.rect().is_degenerate(1.0) && self.matches(item))
            .cloned()
            .collect();
        let next = self
            .purchases
            .next_to_purchase(&key, &matched)
            .map(ItemRecord::address);

        let highlights = matched
            .into_iter()
            .map(|item| {
                let next_to_purchase = next == Some(item.address());
                let base = if next_to_purchase {
                    self.settings.auto_purchase_color
                } else {
                    self.color_for(&item)
                };
                let rect = item.rect();
                let color = dim_under(hover, &rect, item.address(), base);
                Highlight {
                    item,
                    rect,
                    color,
                    next_to_purchase,
                }
            })
            .collect();

        HighlightPass {
            key: Some(key),
            highlights,
        }
    }

    /// Frames for matching items on the selected tab.
    pub fn selected_tab_highlights(&mut self, hover: Option<&Hover>) -> HighlightPass {
        if !self.settings.enable {
            return HighlightPass::default();
        }
        let Some(tab) = self.tabs.selected() else {
            return HighlightPass::default();
        };
        let title = tab.title.clone();
        let items: Vec<ItemRecord> = tab
            .displayed_items
            .iter()
            .filter(|item| self.tabs.is_current(item))
            .cloned()
            .collect();

        self.purchases.note_tab_shown(&title);
        self.build_pass(TabKey::Tab(title), &items, hover)
    }

    /// Non-selected tabs whose server items match, in tab order.
    pub fn hidden_tab_matches(&self, hover: Option<&Hover>) -> Vec<HiddenTabMatch> {
        if !self.settings.enable {
            return Vec::new();
        }
        let selected = self.tabs.selection().index;

        self.tabs
            .records()
            .iter()
            .filter(|tab| Some(tab.index) != selected)
            .filter_map(|tab| {
                let item_names: Vec<String> = tab
                    .server_items
                    .iter()
                    .filter(|item| self.matches(item))
                    .map(ItemRecord::name)
                    .collect();
                if item_names.is_empty() {
                    return None;
                }

                let header_color = self
                    .settings
                    .draw_on_tab_labels
                    .then(|| self.color_for_tab(&tab.server_items))
                    .map(|color| match (hover, tab.header) {
                        (Some(hover), Some(header)) if hover.tooltip.intersects(&header.rect) => {
                            color.with_alpha(HOVER_DIM_ALPHA)
                        }
                        _ => color,
                    });

                Some(HiddenTabMatch {
                    index: tab.index,
                    title: tab.title.clone(),
                    header: tab.header.filter(|h| !h.rect.is_degenerate(1.0)),
                    header_color,
                    item_names,
                })
            })
            .collect()
    }

    // --- Other windows ---

    pub fn vendor_highlights(&self, window: &dyn VendorWindow, hover: Option<&Hover>) -> HighlightPass {
        if !self.settings.enable {
            return HighlightPass::default();
        }
        let Some(snapshot) = vendor::collect(window, self.tabs.frame()) else {
            return HighlightPass::default();
        };
        let key = if snapshot.buyback {
            TabKey::VendorBuyback
        } else {
            TabKey::VendorPrimary
        };
        self.build_pass(key, &snapshot.items, hover)
    }

    pub fn quest_reward_highlights(
        &mut self,
        window: &dyn RewardWindow,
        now: Instant,
        hover: Option<&Hover>,
    ) -> Vec<Highlight> {
        if !self.settings.enable {
            return Vec::new();
        }
        let items = self.rewards.quest_rewards(window, now).to_vec();
        self.reward_frames(&items, hover)
    }

    pub fn ritual_reward_highlights(
        &mut self,
        window: &dyn RewardWindow,
        now: Instant,
        hover: Option<&Hover>,
    ) -> Vec<Highlight> {
        if !self.settings.enable {
            return Vec::new();
        }
        let items = self.rewards.ritual_rewards(window, now).to_vec();
        self.reward_frames(&items, hover)
    }

    fn reward_frames(&self, items: &[ItemRecord], hover: Option<&Hover>) -> Vec<Highlight> {
        items
            .iter()
            .filter_map(|item| {
                let binding = rules::first_match(item, &self.rules, &self.ctx())?;
                let rect = item.rect();
                Some(Highlight {
                    item: item.clone(),
                    rect,
                    color: dim_under(hover, &rect, item.address(), binding.color),
                    next_to_purchase: false,
                })
            })
            .collect()
    }

    // --- Auto purchase ---

    /// Buy the pass's next-to-purchase item.
    ///
    /// Trade tab items are re-checked against the tab cache first; an item
    /// from before a tab switch or refresh is never clicked.
    pub fn purchase_next(
        &mut self,
        pass: &HighlightPass,
        window: Rect,
        now: Instant,
        input: &mut dyn InputDriver,
    ) -> Option<PurchaseOutcome> {
        let key = pass.key.as_ref()?;
        let item = pass.next_to_purchase()?;
        if matches!(key, TabKey::Tab(_)) && !self.tabs.is_current(item) {
            tracing::debug!(item = item.address(), "Skipping purchase of stale item");
            return None;
        }
        Some(self.purchases.try_purchase(key, item, window, now, input))
    }

    pub fn purchases(&self) -> &PurchasePlanner {
        &self.purchases
    }
}
