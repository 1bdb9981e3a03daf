//! Selected-tab resolution.
//!
//! No single host signal reliably says which tab is active: headers lag
//! behind clicks, inventories of hidden tabs sometimes report visible, and
//! some windows have a buyback panel in a tab slot. The resolver tries
//! signals from most to least specific and takes the first conclusive one.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::ReadResultExt;
use crate::host::TabContainer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionReason {
    /// Buyback panel is open; no trade tab is selected
    BuybackVisible,
    VisibleStashIndex,
    VisibleStashIdentity,
    HeaderSelected,
    InventoryVisible,
    SelectedIndex,
    /// No signal was conclusive
    Exhausted,
    /// No purchase window
    #[default]
    NoWindow,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::BuybackVisible => "buyback panel visible",
            Self::VisibleStashIndex => "container visible stash index",
            Self::VisibleStashIdentity => "container visible stash identity",
            Self::HeaderSelected => "single selected tab header",
            Self::InventoryVisible => "single visible tab inventory",
            Self::SelectedIndex => "container selected index",
            Self::Exhausted => "no conclusive signal",
            Self::NoWindow => "no purchase window",
        };
        f.write_str(text)
    }
}

/// Outcome of one cascade step: `None` = inconclusive, try the next.
type Probe = fn(&dyn TabContainer) -> Option<Option<usize>>;

const CASCADE: &[(SelectionReason, Probe)] = &[
    (SelectionReason::BuybackVisible, buyback_visible),
    (SelectionReason::VisibleStashIndex, visible_stash_index),
    (SelectionReason::VisibleStashIdentity, visible_stash_identity),
    (SelectionReason::HeaderSelected, single_selected_header),
    (SelectionReason::InventoryVisible, single_visible_inventory),
    (SelectionReason::SelectedIndex, selected_index),
];

/// Resolve the selected trade tab.
pub fn resolve(container: &dyn TabContainer) -> (Option<usize>, SelectionReason) {
    if !container.is_visible() {
        return (None, SelectionReason::NoWindow);
    }
    CASCADE
        .iter()
        .find_map(|(reason, probe)| probe(container).map(|index| (index, *reason)))
        .unwrap_or((None, SelectionReason::Exhausted))
}

/// `index` if it names a real trade tab.
fn trade_tab(container: &dyn TabContainer, index: i64) -> Option<usize> {
    let index = usize::try_from(index).ok()?;
    (index < container.tab_count() && Some(index) != container.buyback_index()).then_some(index)
}

/// Indices of trade tabs satisfying `pred`, if exactly one does.
fn single_tab(
    container: &dyn TabContainer,
    pred: impl Fn(usize) -> bool,
) -> Option<usize> {
    let buyback = container.buyback_index();
    let mut hits = (0..container.tab_count())
        .filter(|&i| Some(i) != buyback)
        .filter(|&i| pred(i));
    let first = hits.next()?;
    hits.next().is_none().then_some(first)
}

fn buyback_visible(container: &dyn TabContainer) -> Option<Option<usize>> {
    (container.buyback_visible() == Some(true)).then_some(None)
}

fn visible_stash_index(container: &dyn TabContainer) -> Option<Option<usize>> {
    let index = container.visible_stash_index()?;
    trade_tab(container, index).map(Some)
}

fn visible_stash_identity(container: &dyn TabContainer) -> Option<Option<usize>> {
    let address = container.visible_stash_address().filter(|&a| a != 0)?;
    single_tab(container, |i| {
        container
            .tab(i)
            .and_then(|tab| tab.inventory().absent_on_error("tab inventory"))
            .is_some_and(|inventory| inventory.address == address)
    })
    .map(Some)
}

fn single_selected_header(container: &dyn TabContainer) -> Option<Option<usize>> {
    single_tab(container, |i| {
        container
            .tab(i)
            .and_then(|tab| tab.header_selected())
            .unwrap_or(false)
    })
    .map(Some)
}

fn single_visible_inventory(container: &dyn TabContainer) -> Option<Option<usize>> {
    single_tab(container, |i| {
        container
            .tab(i)
            .and_then(|tab| tab.is_visible().absent_on_error("tab visibility"))
            .unwrap_or(false)
    })
    .map(Some)
}

fn selected_index(container: &dyn TabContainer) -> Option<Option<usize>> {
    let index = container.selected_index()?;
    trade_tab(container, index).map(Some)
}

/// Last resolved selection plus the timestamps used for settling.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionState {
    pub index: Option<usize>,
    pub reason: SelectionReason,
    /// When `index` last changed
    pub changed_at: Option<Instant>,
    pub resolved_at: Option<Instant>,
}

impl SelectionState {
    /// Record a resolution. Returns whether the selected index changed.
    pub fn update(&mut self, index: Option<usize>, reason: SelectionReason, now: Instant) -> bool {
        let changed = index != self.index;
        if changed {
            self.index = index;
            self.changed_at = Some(now);
        }
        self.reason = reason;
        self.resolved_at = Some(now);
        changed
    }

    /// Whether the selection has been stable for at least `settle`.
    pub fn is_settled(&self, now: Instant, settle: Duration) -> bool {
        self.changed_at
            .is_none_or(|at| now.saturating_duration_since(at) >= settle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{FakeContainer, FakeTab};

    fn three_tabs() -> FakeContainer {
        tabs_visible([false; 3])
    }

    fn tabs_visible(visible: [bool; 3]) -> FakeContainer {
        FakeContainer::new(vec![
            FakeTab::new(0x100, 1).visible(visible[0]),
            FakeTab::new(0x200, 1).visible(visible[1]),
            FakeTab::new(0x300, 1).visible(visible[2]),
        ])
    }

    #[test]
    fn test_no_window() {
        let mut container = three_tabs();
        container.visible = false;
        container.selected_index = Some(1);
        assert_eq!(resolve(&container), (None, SelectionReason::NoWindow));
    }

    #[test]
    fn test_buyback_visible_wins() {
        let mut container = three_tabs();
        container.buyback_visible = Some(true);
        container.visible_stash_index = Some(0);
        assert_eq!(resolve(&container), (None, SelectionReason::BuybackVisible));
    }

    #[test]
    fn test_visible_stash_index() {
        let mut container = three_tabs();
        container.visible_stash_index = Some(2);
        container.selected_index = Some(0);
        assert_eq!(resolve(&container), (Some(2), SelectionReason::VisibleStashIndex));
    }

    #[test]
    fn test_out_of_range_or_buyback_index_falls_through() {
        let mut container = three_tabs();
        container.visible_stash_index = Some(7);
        container.selected_index = Some(1);
        assert_eq!(resolve(&container), (Some(1), SelectionReason::SelectedIndex));

        container.visible_stash_index = Some(2);
        container.buyback_index = Some(2);
        container.selected_index = Some(-1);
        assert_eq!(resolve(&container), (None, SelectionReason::Exhausted));
    }

    #[test]
    fn test_visible_stash_identity() {
        let mut container = three_tabs();
        container.visible_stash_address = Some(0x200);
        assert_eq!(resolve(&container), (Some(1), SelectionReason::VisibleStashIdentity));
    }

    #[test]
    fn test_single_header_selected() {
        let mut container = three_tabs();
        container.tab_mut(0).header_selected = Some(false);
        container.tab_mut(1).header_selected = Some(true);
        assert_eq!(resolve(&container), (Some(1), SelectionReason::HeaderSelected));
    }

    #[test]
    fn test_ambiguous_headers_fall_through_to_inventory() {
        let mut container = tabs_visible([false, false, true]);
        container.tab_mut(0).header_selected = Some(true);
        container.tab_mut(1).header_selected = Some(true);
        assert_eq!(resolve(&container), (Some(2), SelectionReason::InventoryVisible));

        container.tab_mut(2).visibility_unreadable = true;
        assert_eq!(resolve(&container), (None, SelectionReason::Exhausted));
    }

    #[test]
    fn test_buyback_slot_is_ignored_by_counting_probes() {
        let mut container = tabs_visible([true, false, true]);
        container.buyback_index = Some(0);
        assert_eq!(resolve(&container), (Some(2), SelectionReason::InventoryVisible));
    }

    #[test]
    fn test_exhausted() {
        let container = tabs_visible([true, true, false]);
        assert_eq!(resolve(&container), (None, SelectionReason::Exhausted));
    }

    #[test]
    fn test_selection_state_settles() {
        let start = Instant::now();
        let settle = Duration::from_millis(120);
        let mut state = SelectionState::default();
        assert!(state.is_settled(start, settle));

        assert!(state.update(Some(1), SelectionReason::HeaderSelected, start));
        assert!(!state.is_settled(start + Duration::from_millis(50), settle));
        assert!(state.is_settled(start + settle, settle));

        let later = start + Duration::from_millis(500);
        assert!(!state.update(Some(1), SelectionReason::InventoryVisible, later));
        assert_eq!(state.changed_at, Some(start));
        assert_eq!(state.resolved_at, Some(later));
        assert_eq!(state.reason, SelectionReason::InventoryVisible);
    }
}
