//! Vendor (haggle) window: a primary offer list and a buyback list, shown
//! one at a time and addressed as pseudo-tabs.

use crate::error::ReadResultExt;
use crate::host::{InventorySlot, Rect, VendorWindow};
use crate::item::{FrameStamp, ItemKind, ItemRecord, VENDOR_BUYBACK_TAB, VENDOR_PRIMARY_TAB};

/// Items visible in the vendor window this frame.
#[derive(Debug, Clone)]
pub struct VendorSnapshot {
    pub buyback: bool,
    pub tab_index: i32,
    pub items: Vec<ItemRecord>,
}

/// Collect the list the vendor window is currently showing.
///
/// Items outside the list's bounds are dropped when the bounds are known.
pub fn collect(window: &dyn VendorWindow, frame: u64) -> Option<VendorSnapshot> {
    if !window.is_visible() {
        return None;
    }

    let buyback = window.buyback_visible() == Some(true);
    let (tab_index, slots, bounds) = if buyback {
        (VENDOR_BUYBACK_TAB, window.buyback_items(), window.buyback_bounds())
    } else {
        (VENDOR_PRIMARY_TAB, window.primary_items(), window.primary_bounds())
    };
    let slots = slots.absent_on_error("vendor items").unwrap_or_default();
    let stamp = FrameStamp {
        frame,
        selection: None,
    };

    let items = slots
        .into_iter()
        .filter(|slot| slot.visible && within(slot, bounds))
        .filter_map(|slot| {
            let item = slot.valid_item()?.clone();
            Some(ItemRecord::displayed(item, ItemKind::ShopItem, slot.rect, tab_index, stamp))
        })
        .collect();

    Some(VendorSnapshot {
        buyback,
        tab_index,
        items,
    })
}

fn within(slot: &InventorySlot, bounds: Option<Rect>) -> bool {
    match bounds {
        Some(bounds) if bounds.width > 0.0 && bounds.height > 0.0 => bounds.contains_rect(&slot.rect),
        _ => true,
    }
}
