//! Auto purchase: which matched item to buy next, and the ctrl+click that buys it.

use std::time::{Duration, Instant};

use hashbrown::HashMap;
use npcinv_types::PluginSettings;

use crate::error::InputError;
use crate::host::{InputDriver, Modifier, Rect};
use crate::item::ItemRecord;

/// Clicks closer than this to the game window edge are refused.
pub const WINDOW_EDGE_MARGIN: f32 = 36.0;

const HOVER_SETTLE: Duration = Duration::from_millis(35);
const MODIFIER_SETTLE: Duration = Duration::from_millis(25);
const CLICK_SETTLE: Duration = Duration::from_millis(15);

const TOGGLE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Purchase counter key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TabKey {
    Tab(String),
    VendorPrimary,
    VendorBuyback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    Disabled,
    LimitReached,
    /// Purchase delay has not elapsed
    Cooldown,
    /// Item rectangle is degenerate or its center is too close to the window edge
    OutOfReach,
    Purchased,
    Failed(InputError),
}

#[derive(Debug)]
pub struct PurchasePlanner {
    enabled: bool,
    delay: Duration,
    max_per_tab: u32,
    counts: HashMap<TabKey, u32>,
    last_tab: Option<String>,
    last_purchase: Option<Instant>,
}

impl PurchasePlanner {
    pub fn new(settings: &PluginSettings) -> Self {
        let mut planner = Self {
            enabled: false,
            delay: Duration::ZERO,
            max_per_tab: 0,
            counts: HashMap::new(),
            last_tab: None,
            last_purchase: None,
        };
        planner.configure(settings);
        planner
    }

    /// Apply changed settings; counters are kept.
    pub fn configure(&mut self, settings: &PluginSettings) {
        self.enabled = settings.auto_purchase;
        self.delay = Duration::from_millis(u64::from(settings.purchase_delay_ms));
        self.max_per_tab = settings.max_purchases_per_tab;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Forget all counters.
    pub fn reset(&mut self) {
        self.counts.clear();
        self.last_tab = None;
    }

    pub fn purchases(&self, key: &TabKey) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Note which trade tab is showing. Switching to a tab restarts its count.
    pub fn note_tab_shown(&mut self, title: &str) {
        if self.last_tab.as_deref() == Some(title) {
            return;
        }
        self.last_tab = Some(title.to_string());
        if let Some(count) = self.counts.get_mut(&TabKey::Tab(title.to_string())) {
            *count = 0;
        }
    }

    fn under_limit(&self, key: &TabKey) -> bool {
        self.max_per_tab == 0 || self.purchases(key) < self.max_per_tab
    }

    /// The item auto purchase would buy next from `matched`, if any.
    pub fn next_to_purchase<'a>(&self, key: &TabKey, matched: &'a [ItemRecord]) -> Option<&'a ItemRecord> {
        if !self.enabled || !self.under_limit(key) {
            return None;
        }
        matched.first()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.last_purchase
            .is_none_or(|at| now.saturating_duration_since(at) >= self.delay)
    }

    /// Buy `item` with a ctrl+click if enabled, under the limit and off cooldown.
    ///
    /// `window` is the game window in screen coordinates; item rectangles
    /// are relative to it.
    pub fn try_purchase(
        &mut self,
        key: &TabKey,
        item: &ItemRecord,
        window: Rect,
        now: Instant,
        input: &mut dyn InputDriver,
    ) -> PurchaseOutcome {
        if !self.enabled {
            return PurchaseOutcome::Disabled;
        }
        if !self.under_limit(key) {
            return PurchaseOutcome::LimitReached;
        }
        if !self.is_due(now) {
            return PurchaseOutcome::Cooldown;
        }
        let Some((x, y)) = click_target(item.rect(), window) else {
            return PurchaseOutcome::OutOfReach;
        };

        self.last_purchase = Some(now);
        match ctrl_click(input, x, y) {
            Ok(()) => {
                *self.counts.entry(key.clone()).or_insert(0) += 1;
                tracing::info!(item = %item.name(), tab = ?key, "Auto-purchased item");
                PurchaseOutcome::Purchased
            }
            Err(e) => {
                tracing::error!(error = %e, item = %item.name(), "Auto-purchase failed");
                PurchaseOutcome::Failed(e)
            }
        }
    }
}

/// Screen position to click for an item, or `None` when the item is not
/// safely clickable.
pub fn click_target(item: Rect, window: Rect) -> Option<(f32, f32)> {
    if item.is_degenerate(1.0) {
        return None;
    }
    let (cx, cy) = item.center();
    let reachable = Rect::new(0.0, 0.0, window.width, window.height).inflate(-WINDOW_EDGE_MARGIN);
    reachable
        .contains_point(cx, cy)
        .then_some((cx + window.x, cy + window.y))
}

/// Move, hold ctrl, click. Both ctrl keys are released whatever happens.
fn ctrl_click(input: &mut dyn InputDriver, x: f32, y: f32) -> Result<(), InputError> {
    let mut press = || -> Result<(), InputError> {
        input.move_cursor(x, y)?;
        input.settle(HOVER_SETTLE);
        input.key_down(Modifier::LeftControl)?;
        input.settle(MODIFIER_SETTLE);
        input.left_click()?;
        input.settle(CLICK_SETTLE);
        Ok(())
    };
    let result = press();

    let released = input
        .key_up(Modifier::LeftControl)
        .and(input.key_up(Modifier::RightControl));
    result.and(released)
}

/// Edge-triggered, debounced toggle key.
#[derive(Debug, Default)]
pub struct AutoPurchaseToggle {
    held: bool,
    last_toggle: Option<Instant>,
}

impl AutoPurchaseToggle {
    /// Feed the current key state. Returns true when the toggle fires.
    pub fn update(&mut self, key_down: bool, now: Instant) -> bool {
        if !key_down {
            self.held = false;
            return false;
        }
        let was_held = std::mem::replace(&mut self.held, true);
        let debounced = self
            .last_toggle
            .is_none_or(|at| now.saturating_duration_since(at) >= TOGGLE_DEBOUNCE);
        if was_held || !debounced {
            return false;
        }
        self.last_toggle = Some(now);
        true
    }
}
