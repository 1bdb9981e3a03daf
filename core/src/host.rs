//! Interfaces to the host process.
//!
//! Everything the engine knows about the game comes through these traits:
//! item handles, the trade window tab container, vendor and reward windows,
//! and the input primitive used by auto purchase. Implementations read
//! live, volatile memory, so every read may fail; see [`ReadError`].
//!
//! Hosts expose loosely-typed records (mods, affixes) as [`FieldMap`]s.
//! The engine looks fields up by a short list of candidate names, which
//! keeps it working across host versions that rename properties.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;

use crate::error::{InputError, ReadResult};
use crate::filter::Value;

// ═══════════════════════════════════════════════════════════════════════════
// Geometry
// ═══════════════════════════════════════════════════════════════════════════

/// Client-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// True when either side is at most `min_side` pixels.
    pub fn is_degenerate(&self, min_side: f32) -> bool {
        self.width <= min_side || self.height <= min_side
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Grow (positive) or shrink (negative) on every side.
    pub fn inflate(&self, amount: f32) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + amount * 2.0,
            self.height + amount * 2.0,
        )
    }
}

/// Item under the cursor and its tooltip, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hover {
    pub address: u64,
    pub tooltip: Rect,
}

impl Hover {
    /// Whether a frame at `rect` for the item at `address` sits under the
    /// tooltip of a different item.
    pub fn covers(&self, rect: &Rect, address: u64) -> bool {
        self.address != address && self.tooltip.intersects(rect)
    }
}

/// A UI element the overlay may outline (tab headers).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementRef {
    pub address: u64,
    pub rect: Rect,
}

// ═══════════════════════════════════════════════════════════════════════════
// Loosely typed host records
// ═══════════════════════════════════════════════════════════════════════════

/// Case-insensitive name → value map for host records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    fields: HashMap<String, Value>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(&name.to_ascii_lowercase())
    }

    /// First candidate that is present and holds an integer.
    pub fn first_int(&self, names: &[&str]) -> Option<i64> {
        names.iter().find_map(|name| self.get(name)?.as_int())
    }

    /// First candidate that is present and holds a bool.
    pub fn first_bool(&self, names: &[&str]) -> Option<bool> {
        names.iter().find_map(|name| self.get(name)?.as_bool())
    }

    /// First candidate that is present and holds text.
    pub fn first_str(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name)?.as_str())
    }
}

/// One explicit modifier on an item.
///
/// `fields` are properties of the modifier instance (e.g. `IsPrefix`),
/// `mod_record` the static modifier definition (e.g. `AffixType`,
/// `GenerationType`) when the host can resolve it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AffixSnapshot {
    pub fields: FieldMap,
    pub mod_record: Option<FieldMap>,
}

/// Point-in-time copy of an item's mods component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModsSnapshot {
    /// Component-level fields (`ItemRarity`, `PrefixesCount`, ...)
    pub fields: FieldMap,
    pub explicit_mods: Vec<AffixSnapshot>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Items
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque item entity owned by the host.
pub trait HostItem: fmt::Debug + Send + Sync {
    /// Stable identity of the underlying entity, 0 when unresolved
    fn address(&self) -> u64;

    fn is_valid(&self) -> bool;

    /// Metadata path; `None` for items the host could not resolve
    fn path(&self) -> Option<String>;

    /// Display name (unique name or base name)
    fn name(&self) -> String;

    /// Filter-visible property lookup (`Rarity`, `BaseName`, `ItemLevel`, ...)
    fn field(&self, name: &str) -> Option<Value>;

    /// Base item tags (`flask`, `jewel`, ...)
    fn base_tags(&self) -> ReadResult<Vec<String>>;

    fn mods(&self) -> ReadResult<ModsSnapshot>;
}

pub type ItemHandle = Arc<dyn HostItem>;

/// An item as laid out in some UI grid.
#[derive(Debug, Clone)]
pub struct InventorySlot {
    pub item: Option<ItemHandle>,
    pub rect: Rect,
    pub visible: bool,
}

impl InventorySlot {
    /// Item handle if the slot holds a resolved, valid entity.
    pub fn valid_item(&self) -> Option<&ItemHandle> {
        self.item
            .as_ref()
            .filter(|item| item.address() != 0 && item.is_valid())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Trade window
// ═══════════════════════════════════════════════════════════════════════════

/// Identity of a tab's server inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InventoryIdentity {
    pub address: u64,
    /// Increases every time the server refreshes the inventory contents
    pub server_request_counter: i64,
}

/// One tab of the trade window's tab container.
pub trait HostTab {
    /// Identity of the server inventory behind the tab's live UI inventory.
    /// Unavailable while either of the two is missing.
    fn inventory(&self) -> ReadResult<InventoryIdentity>;

    /// Whether the live UI inventory reports itself visible
    fn is_visible(&self) -> ReadResult<bool>;

    fn header(&self) -> Option<ElementRef>;

    /// Whether the tab header reports itself selected/active
    fn header_selected(&self) -> Option<bool>;

    /// Items currently laid out in the live UI inventory
    fn displayed_items(&self) -> ReadResult<Vec<InventorySlot>>;

    /// Everything the server says the tab holds
    fn server_items(&self) -> ReadResult<Vec<ItemHandle>>;
}

/// The trade window's tab container plus its selection hints.
///
/// Every hint is optional; hosts return `None` for what they cannot read.
pub trait TabContainer {
    /// Whether a purchase window is open at all
    fn is_visible(&self) -> bool;

    fn rect(&self) -> Option<Rect>;

    fn tab_count(&self) -> usize;

    /// `None` for empty/unreadable slots
    fn tab(&self, index: usize) -> Option<&dyn HostTab>;

    /// Visibility of the buyback sub-panel, if the window has one
    fn buyback_visible(&self) -> Option<bool>;

    /// Tab slot occupied by the buyback panel
    fn buyback_index(&self) -> Option<usize>;

    /// Container-reported index of the visible stash
    fn visible_stash_index(&self) -> Option<i64>;

    /// Container-reported inventory address of the visible stash
    fn visible_stash_address(&self) -> Option<u64>;

    /// Generic selected-index property of the container or window
    fn selected_index(&self) -> Option<i64>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Vendor and reward windows
// ═══════════════════════════════════════════════════════════════════════════

/// Expedition-style vendor window with a primary offer list and a buyback list.
pub trait VendorWindow {
    fn is_visible(&self) -> bool;

    fn buyback_visible(&self) -> Option<bool>;

    fn primary_items(&self) -> ReadResult<Vec<InventorySlot>>;

    fn buyback_items(&self) -> ReadResult<Vec<InventorySlot>>;

    /// Bounds of the primary offer grid (whole window if unknown)
    fn primary_bounds(&self) -> Option<Rect>;

    fn buyback_bounds(&self) -> Option<Rect>;
}

/// Quest reward or ritual window.
pub trait RewardWindow {
    fn is_visible(&self) -> bool;

    fn reward_slots(&self) -> ReadResult<Vec<InventorySlot>>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Input
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    LeftControl,
    RightControl,
}

/// Cursor and key injection.
pub trait InputDriver {
    /// Move the cursor to a screen position
    fn move_cursor(&mut self, x: f32, y: f32) -> Result<(), InputError>;

    fn key_down(&mut self, key: Modifier) -> Result<(), InputError>;

    fn key_up(&mut self, key: Modifier) -> Result<(), InputError>;

    fn left_click(&mut self) -> Result<(), InputError>;

    /// Let the game observe the previous input. Hosts that drive input from
    /// a separate thread may sleep here; the default does nothing.
    fn settle(&mut self, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_geometry() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        let c = Rect::new(10.0, 0.0, 5.0, 5.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c)); // touching edges do not overlap
        assert_eq!(a.center(), (5.0, 5.0));
        assert!(a.contains_rect(&Rect::new(1.0, 1.0, 9.0, 9.0)));
        assert!(!a.contains_rect(&b));
        assert_eq!(a.inflate(-2.0), Rect::new(2.0, 2.0, 6.0, 6.0));
        assert!(Rect::new(0.0, 0.0, 1.0, 40.0).is_degenerate(1.0));
    }

    #[test]
    fn test_field_map_is_case_insensitive() {
        let fields = FieldMap::new()
            .with("PrefixCount", 2i64)
            .with("IsPrefix", true)
            .with("AffixType", "Prefix");

        assert_eq!(fields.first_int(&["PrefixesCount", "prefixcount"]), Some(2));
        assert_eq!(fields.first_bool(&["ISPREFIX"]), Some(true));
        assert_eq!(fields.first_str(&["affixtype"]), Some("Prefix"));
        assert_eq!(fields.first_int(&["AffixType"]), None);
    }
}
