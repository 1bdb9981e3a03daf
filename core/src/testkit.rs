//! In-memory host fakes for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{InputError, ReadError, ReadResult};
use crate::filter::Value;
use crate::host::{
    AffixSnapshot, ElementRef, FieldMap, HostItem, HostTab, InputDriver, InventoryIdentity,
    InventorySlot, ItemHandle, Modifier, ModsSnapshot, Rect, RewardWindow, TabContainer,
    VendorWindow,
};
use crate::item::{FrameStamp, ItemKind, ItemRecord};

// ─────────────────────────────────────────────────────────────────────────────
// Items
// ─────────────────────────────────────────────────────────────────────────────

/// Counts calls to [`HostItem::mods`] on a fake.
#[derive(Debug, Clone, Default)]
pub struct ReadCounter(Arc<AtomicUsize>);

impl ReadCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct FakeItem {
    address: u64,
    path: Option<String>,
    name: String,
    valid: bool,
    fields: FieldMap,
    tags: Vec<String>,
    mods: Option<ModsSnapshot>,
    mods_reads: ReadCounter,
}

impl FakeItem {
    pub fn new(address: u64, path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Self {
            address,
            path: Some(path.to_string()),
            name,
            valid: true,
            fields: FieldMap::new(),
            tags: Vec::new(),
            mods: Some(ModsSnapshot::default()),
            mods_reads: ReadCounter::default(),
        }
    }

    pub fn rarity(self, rarity: &str) -> Self {
        self.with_mods(|mods| mods.fields.insert("Rarity", rarity))
    }

    pub fn rarity_code(self, code: i64) -> Self {
        self.with_mods(|mods| mods.fields.insert("ItemRarity", code))
    }

    pub fn mods_field(self, name: &str, value: i64) -> Self {
        self.with_mods(|mods| mods.fields.insert(name, value))
    }

    pub fn explicit(self, affixes: Vec<AffixSnapshot>) -> Self {
        self.with_mods(|mods| mods.explicit_mods = affixes)
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name, value);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn without_path(mut self) -> Self {
        self.path = None;
        self
    }

    pub fn without_mods(mut self) -> Self {
        self.mods = None;
        self
    }

    pub fn mods_reads(&self) -> ReadCounter {
        self.mods_reads.clone()
    }

    pub fn into_handle(self) -> ItemHandle {
        Arc::new(self)
    }

    pub fn into_record(self, tab_index: i32) -> ItemRecord {
        ItemRecord::displayed(
            self.into_handle(),
            ItemKind::ShopItem,
            Rect::new(100.0, 100.0, 50.0, 50.0),
            tab_index,
            FrameStamp::default(),
        )
    }

    pub fn into_server_record(self, tab_index: i32) -> ItemRecord {
        ItemRecord::server_only(self.into_handle(), ItemKind::ShopItem, tab_index, FrameStamp::default())
    }

    fn with_mods(mut self, edit: impl FnOnce(&mut ModsSnapshot)) -> Self {
        if let Some(mods) = self.mods.as_mut() {
            edit(mods);
        }
        self
    }
}

impl HostItem for FakeItem {
    fn address(&self) -> u64 {
        self.address
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn path(&self) -> Option<String> {
        self.path.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn base_tags(&self) -> ReadResult<Vec<String>> {
        Ok(self.tags.clone())
    }

    fn mods(&self) -> ReadResult<ModsSnapshot> {
        self.mods_reads.bump();
        self.mods.clone().ok_or(ReadError::Unavailable("mods"))
    }
}

/// A rare ring whose filter-visible `Rarity` is "Rare".
pub fn shop_item(address: u64, tab_index: i32) -> ItemRecord {
    ring(address).into_record(tab_index)
}

pub fn ring(address: u64) -> FakeItem {
    FakeItem::new(address, "Metadata/Items/Rings/Ring1")
        .rarity("Rare")
        .field("Rarity", "Rare")
}

/// Slots laid out in a row, 50px apart.
pub fn slots(items: &[ItemHandle]) -> Vec<InventorySlot> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| InventorySlot {
            item: Some(item.clone()),
            rect: Rect::new(100.0 + 50.0 * i as f32, 100.0, 48.0, 48.0),
            visible: true,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Trade window
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FakeTab {
    pub inventory: Option<InventoryIdentity>,
    pub visible: bool,
    /// `is_visible` fails with `Unavailable`
    pub visibility_unreadable: bool,
    pub header: Option<ElementRef>,
    pub header_selected: Option<bool>,
    pub displayed: Vec<InventorySlot>,
    pub server: Vec<ItemHandle>,
}

impl FakeTab {
    pub fn new(address: u64, counter: i64) -> Self {
        Self {
            inventory: Some(InventoryIdentity {
                address,
                server_request_counter: counter,
            }),
            header: Some(ElementRef {
                address: address + 1,
                rect: Rect::new(10.0, 10.0, 40.0, 20.0),
            }),
            ..Self::default()
        }
    }

    /// Same items rendered and known to the server.
    pub fn items(mut self, items: Vec<ItemHandle>) -> Self {
        self.displayed = slots(&items);
        self.server = items;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.header_selected = Some(selected);
        self
    }
}

impl HostTab for FakeTab {
    fn inventory(&self) -> ReadResult<InventoryIdentity> {
        self.inventory.ok_or(ReadError::Unavailable("inventory"))
    }

    fn is_visible(&self) -> ReadResult<bool> {
        if self.visibility_unreadable {
            return Err(ReadError::Unavailable("tab visibility"));
        }
        Ok(self.visible)
    }

    fn header(&self) -> Option<ElementRef> {
        self.header
    }

    fn header_selected(&self) -> Option<bool> {
        self.header_selected
    }

    fn displayed_items(&self) -> ReadResult<Vec<InventorySlot>> {
        Ok(self.displayed.clone())
    }

    fn server_items(&self) -> ReadResult<Vec<ItemHandle>> {
        Ok(self.server.clone())
    }
}

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub visible: bool,
    pub rect: Option<Rect>,
    pub tabs: Vec<Option<FakeTab>>,
    pub buyback_visible: Option<bool>,
    pub buyback_index: Option<usize>,
    pub visible_stash_index: Option<i64>,
    pub visible_stash_address: Option<u64>,
    pub selected_index: Option<i64>,
}

impl FakeContainer {
    pub fn new(tabs: Vec<FakeTab>) -> Self {
        Self {
            visible: true,
            rect: Some(Rect::new(0.0, 0.0, 800.0, 600.0)),
            tabs: tabs.into_iter().map(Some).collect(),
            buyback_visible: None,
            buyback_index: None,
            visible_stash_index: None,
            visible_stash_address: None,
            selected_index: None,
        }
    }

    pub fn tab_mut(&mut self, index: usize) -> &mut FakeTab {
        self.tabs[index].as_mut().expect("tab present")
    }
}

impl TabContainer for FakeContainer {
    fn is_visible(&self) -> bool {
        self.visible
    }

    fn rect(&self) -> Option<Rect> {
        self.rect
    }

    fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    fn tab(&self, index: usize) -> Option<&dyn HostTab> {
        self.tabs
            .get(index)?
            .as_ref()
            .map(|tab| tab as &dyn HostTab)
    }

    fn buyback_visible(&self) -> Option<bool> {
        self.buyback_visible
    }

    fn buyback_index(&self) -> Option<usize> {
        self.buyback_index
    }

    fn visible_stash_index(&self) -> Option<i64> {
        self.visible_stash_index
    }

    fn visible_stash_address(&self) -> Option<u64> {
        self.visible_stash_address
    }

    fn selected_index(&self) -> Option<i64> {
        self.selected_index
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vendor, rewards, input
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FakeVendor {
    pub visible: bool,
    pub buyback_visible: Option<bool>,
    pub primary: Vec<InventorySlot>,
    pub buyback: Vec<InventorySlot>,
    pub primary_bounds: Option<Rect>,
    pub buyback_bounds: Option<Rect>,
}

impl VendorWindow for FakeVendor {
    fn is_visible(&self) -> bool {
        self.visible
    }

    fn buyback_visible(&self) -> Option<bool> {
        self.buyback_visible
    }

    fn primary_items(&self) -> ReadResult<Vec<InventorySlot>> {
        Ok(self.primary.clone())
    }

    fn buyback_items(&self) -> ReadResult<Vec<InventorySlot>> {
        Ok(self.buyback.clone())
    }

    fn primary_bounds(&self) -> Option<Rect> {
        self.primary_bounds
    }

    fn buyback_bounds(&self) -> Option<Rect> {
        self.buyback_bounds
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeRewards {
    pub visible: bool,
    pub slots: Vec<InventorySlot>,
    pub reads: ReadCounter,
}

impl RewardWindow for FakeRewards {
    fn is_visible(&self) -> bool {
        self.visible
    }

    fn reward_slots(&self) -> ReadResult<Vec<InventorySlot>> {
        self.reads.bump();
        Ok(self.slots.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Move(f32, f32),
    Down(Modifier),
    Up(Modifier),
    Click,
    Settle(Duration),
}

/// Records every input call; optionally fails the click.
#[derive(Debug, Default)]
pub struct RecordingInput {
    pub events: Vec<InputEvent>,
    pub fail_click: bool,
}

impl RecordingInput {
    /// Events without the settle pauses.
    pub fn actions(&self) -> Vec<InputEvent> {
        self.events
            .iter()
            .copied()
            .filter(|e| !matches!(e, InputEvent::Settle(_)))
            .collect()
    }
}

impl InputDriver for RecordingInput {
    fn move_cursor(&mut self, x: f32, y: f32) -> Result<(), InputError> {
        self.events.push(InputEvent::Move(x, y));
        Ok(())
    }

    fn key_down(&mut self, key: Modifier) -> Result<(), InputError> {
        self.events.push(InputEvent::Down(key));
        Ok(())
    }

    fn key_up(&mut self, key: Modifier) -> Result<(), InputError> {
        self.events.push(InputEvent::Up(key));
        Ok(())
    }

    fn left_click(&mut self) -> Result<(), InputError> {
        if self.fail_click {
            return Err(InputError("click rejected".into()));
        }
        self.events.push(InputEvent::Click);
        Ok(())
    }

    fn settle(&mut self, duration: Duration) {
        self.events.push(InputEvent::Settle(duration));
    }
}
