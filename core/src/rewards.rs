//! Quest reward and ritual windows.
//!
//! Both are single live grids whose contents rarely change while open, so
//! their items are re-read at most once per refresh interval.

use std::time::{Duration, Instant};

use crate::error::ReadResultExt;
use crate::host::RewardWindow;
use crate::item::{FrameStamp, ItemKind, ItemRecord, REWARD_WINDOW_TAB};

#[derive(Debug, Default)]
struct Timed {
    taken_at: Option<Instant>,
    items: Vec<ItemRecord>,
}

impl Timed {
    fn get(
        &mut self,
        window: &dyn RewardWindow,
        kind: ItemKind,
        interval: Duration,
        now: Instant,
    ) -> &[ItemRecord] {
        if !window.is_visible() {
            self.taken_at = None;
            self.items.clear();
            return &self.items;
        }

        let stale = self
            .taken_at
            .is_none_or(|at| now.saturating_duration_since(at) >= interval);
        if stale {
            self.items = read_rewards(window, kind);
            self.taken_at = Some(now);
        }
        &self.items
    }
}

fn read_rewards(window: &dyn RewardWindow, kind: ItemKind) -> Vec<ItemRecord> {
    window
        .reward_slots()
        .absent_on_error("reward slots")
        .unwrap_or_default()
        .into_iter()
        .filter_map(|slot| {
            let item = slot.valid_item()?.clone();
            Some(ItemRecord::displayed(
                item,
                kind,
                slot.rect,
                REWARD_WINDOW_TAB,
                FrameStamp::default(),
            ))
        })
        .collect()
}

#[derive(Debug)]
pub struct RewardCache {
    interval: Duration,
    quest: Timed,
    ritual: Timed,
}

impl RewardCache {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            quest: Timed::default(),
            ritual: Timed::default(),
        }
    }

    pub fn quest_rewards(&mut self, window: &dyn RewardWindow, now: Instant) -> &[ItemRecord] {
        self.quest.get(window, ItemKind::QuestReward, self.interval, now)
    }

    pub fn ritual_rewards(&mut self, window: &dyn RewardWindow, now: Instant) -> &[ItemRecord] {
        self.ritual.get(window, ItemKind::RitualReward, self.interval, now)
    }
}
