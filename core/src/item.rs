//! Item records: one host item as seen by the engine during one pass.

use std::fmt;

use crate::filter::Value;
use crate::host::{ItemHandle, Rect};

/// Tab index of the vendor window's primary offer list.
pub const VENDOR_PRIMARY_TAB: i32 = -1;

/// Tab index of the vendor window's buyback list.
pub const VENDOR_BUYBACK_TAB: i32 = -2;

/// Tab index used for quest/ritual reward windows, which are a single live grid.
pub const REWARD_WINDOW_TAB: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    ShopItem,
    QuestReward,
    RitualReward,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShopItem => "ShopItem",
            Self::QuestReward => "QuestReward",
            Self::RitualReward => "RitualReward",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame counter and selected tab at the time an item was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStamp {
    pub frame: u64,
    pub selection: Option<usize>,
}

/// An item snapshot. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    handle: ItemHandle,
    kind: ItemKind,
    rect: Rect,
    tab_index: i32,
    displayed: bool,
    stamp: FrameStamp,
}

impl ItemRecord {
    /// An item laid out on screen at `rect`.
    pub fn displayed(
        handle: ItemHandle,
        kind: ItemKind,
        rect: Rect,
        tab_index: i32,
        stamp: FrameStamp,
    ) -> Self {
        Self {
            handle,
            kind,
            rect,
            tab_index,
            displayed: true,
            stamp,
        }
    }

    /// An item the server reports but that is not rendered right now.
    pub fn server_only(handle: ItemHandle, kind: ItemKind, tab_index: i32, stamp: FrameStamp) -> Self {
        Self {
            handle,
            kind,
            rect: Rect::default(),
            tab_index,
            displayed: false,
            stamp,
        }
    }

    pub fn handle(&self) -> &ItemHandle {
        &self.handle
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn tab_index(&self) -> i32 {
        self.tab_index
    }

    pub fn is_displayed(&self) -> bool {
        self.displayed
    }

    pub fn stamp(&self) -> FrameStamp {
        self.stamp
    }

    /// Identity used for equality between records of the same entity.
    pub fn address(&self) -> u64 {
        self.handle.address()
    }

    /// Whether the handle still refers to a live entity.
    pub fn is_valid(&self) -> bool {
        self.handle.address() != 0 && self.handle.is_valid()
    }

    pub fn name(&self) -> String {
        self.handle.name()
    }

    /// Property lookup for filter expressions.
    ///
    /// Record-level properties shadow host fields of the same name.
    pub fn field(&self, name: &str) -> Value {
        match name {
            "Kind" => Value::from(self.kind.as_str()),
            "TabIndex" => Value::from(self.tab_index),
            "IsDisplayed" => Value::Bool(self.displayed),
            "Path" => self.handle.path().map(Value::Str).unwrap_or_default(),
            "Name" => Value::Str(self.handle.name()),
            _ => self.handle.field(name).unwrap_or_default(),
        }
    }
}

impl PartialEq for ItemRecord {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
            && self.tab_index == other.tab_index
            && self.stamp == other.stamp
    }
}
