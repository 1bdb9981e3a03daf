use std::time::{Duration, Instant};

use crate::error::ReadResultExt;
use crate::host::{ElementRef, HostTab, InventoryIdentity, ItemHandle, TabContainer};
use crate::item::{FrameStamp, ItemKind, ItemRecord};

use super::selection::{SelectionState, resolve};

/// Display title of the tab at `index`.
pub fn tab_title(index: usize) -> String {
    format!("-{}-", index + 1)
}

/// Identity of a tab record across passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub index: usize,
    pub title: String,
    pub inventory: InventoryIdentity,
}

/// Stable engine-side view of one trade window tab.
#[derive(Debug, Clone)]
pub struct TabRecord {
    /// Assigned when the record is built, kept while it is reused
    pub record_id: u64,
    pub index: usize,
    pub title: String,
    pub is_visible: bool,
    pub header: Option<ElementRef>,
    pub inventory: InventoryIdentity,
    /// Everything the server says the tab holds
    pub server_items: Vec<ItemRecord>,
    /// Laid-out items; only filled for the settled selected tab
    pub displayed_items: Vec<ItemRecord>,
}

impl TabRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            index: self.index,
            title: self.title.clone(),
            inventory: self.inventory,
        }
    }
}

/// Reconciles host tabs into [`TabRecord`]s at a bounded rate.
///
/// Each refresh is a new frame. Items produced by a frame are stamped with
/// it and with the selection at the time; [`TabCache::is_current`] rejects
/// anything stamped under a different frame or selection, so callers never
/// act on items left over from a tab switch.
#[derive(Debug)]
pub struct TabCache {
    records: Vec<TabRecord>,
    selection: SelectionState,
    frame: u64,
    next_record_id: u64,
    last_refresh: Option<Instant>,
    refresh_interval: Duration,
    settle: Duration,
}

impl TabCache {
    pub fn new(refresh_interval: Duration, settle: Duration) -> Self {
        Self {
            records: Vec::new(),
            selection: SelectionState::default(),
            frame: 0,
            next_record_id: 1,
            last_refresh: None,
            refresh_interval,
            settle,
        }
    }

    pub fn records(&self) -> &[TabRecord] {
        &self.records
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selected(&self) -> Option<&TabRecord> {
        let index = self.selection.index?;
        self.records.iter().find(|r| r.index == index)
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn current_stamp(&self) -> FrameStamp {
        FrameStamp {
            frame: self.frame,
            selection: self.selection.index,
        }
    }

    /// Whether `item` was produced under the current frame and selection.
    pub fn is_current(&self, item: &ItemRecord) -> bool {
        item.stamp() == self.current_stamp()
    }

    /// Force a rebuild on the next [`reconcile`](Self::reconcile).
    pub fn invalidate(&mut self) {
        self.last_refresh = None;
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.last_refresh = None;
    }

    /// Resolve the selection and, when the refresh interval has elapsed,
    /// rebuild the tab records.
    pub fn reconcile(&mut self, container: &dyn TabContainer, now: Instant) -> &[TabRecord] {
        let (index, reason) = resolve(container);
        if self.selection.update(index, reason, now) {
            tracing::debug!(index = ?index, %reason, "Selected tab changed");
        }

        if !container.is_visible() {
            self.clear();
            return &self.records;
        }

        let due = self
            .last_refresh
            .is_none_or(|at| now.saturating_duration_since(at) >= self.refresh_interval);
        if due {
            self.refresh(container, now);
        }
        &self.records
    }

    fn refresh(&mut self, container: &dyn TabContainer, now: Instant) {
        self.frame += 1;
        self.last_refresh = Some(now);

        let stamp = self.current_stamp();
        let settled = self.selection.is_settled(now, self.settle);
        let mut previous = std::mem::take(&mut self.records);

        for index in 0..container.tab_count() {
            let Some(tab) = container.tab(index) else {
                continue;
            };
            let Some(inventory) = tab.inventory().absent_on_error("tab inventory") else {
                continue;
            };
            let is_visible = tab
                .is_visible()
                .absent_on_error("tab visibility")
                .unwrap_or(false);

            let key = RecordKey {
                index,
                title: tab_title(index),
                inventory,
            };
            let tab_index = index as i32;
            let server_items = server_records(tab, tab_index, stamp);
            let displayed_items = if settled && Some(index) == stamp.selection {
                displayed_records(tab, tab_index, stamp)
            } else {
                Vec::new()
            };

            let reused = previous
                .iter()
                .position(|r| r.key() == key)
                .map(|pos| previous.swap_remove(pos));
            let record_id = match reused {
                Some(old) => old.record_id,
                None => {
                    let id = self.next_record_id;
                    self.next_record_id += 1;
                    id
                }
            };

            self.records.push(TabRecord {
                record_id,
                index,
                title: key.title,
                is_visible,
                header: tab.header(),
                inventory,
                server_items,
                displayed_items,
            });
        }

        tracing::trace!(frame = self.frame, tabs = self.records.len(), "Tab records refreshed");
    }
}

fn resolvable(item: &ItemHandle) -> bool {
    item.address() != 0 && item.is_valid() && item.path().is_some()
}

fn server_records(tab: &dyn HostTab, tab_index: i32, stamp: FrameStamp) -> Vec<ItemRecord> {
    tab.server_items()
        .absent_on_error("server items")
        .unwrap_or_default()
        .into_iter()
        .filter(resolvable)
        .map(|item| ItemRecord::server_only(item, ItemKind::ShopItem, tab_index, stamp))
        .collect()
}

fn displayed_records(tab: &dyn HostTab, tab_index: i32, stamp: FrameStamp) -> Vec<ItemRecord> {
    tab.displayed_items()
        .absent_on_error("displayed items")
        .unwrap_or_default()
        .into_iter()
        .filter(|slot| slot.visible)
        .filter_map(|slot| {
            let item = slot.valid_item().filter(|item| item.path().is_some())?.clone();
            Some(ItemRecord::displayed(item, ItemKind::ShopItem, slot.rect, tab_index, stamp))
        })
        .collect()
}
