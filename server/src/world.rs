//! Item placement and per-slot progress
//!
//! Every slot gets its own copy of the game: a seeded shuffle places the
//! slot's items onto the locations of its enabled episodes. Each level exit
//! always holds that level's completion item, and the first map of every
//! enabled episode is granted up front so the slot has somewhere to start.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared::profile::{EffectKind, GameProfile, LevelId, COMPLETE_INDEX, LEVEL_COMPLETE_CODE, LEVEL_UNLOCK_CODE};
use shared::{NetworkItem, SlotData, ITEM_FLAG_PROGRESSION};
use std::collections::{BTreeMap, BTreeSet};

/// Location id used for items granted at the start.
pub const START_LOCATION: i64 = -2;

#[derive(Debug)]
pub struct SlotWorld {
    pub name: String,
    pub id: u32,
    placements: BTreeMap<i64, NetworkItem>,
    checked: BTreeSet<i64>,
    received: Vec<NetworkItem>,
    pub goal: bool,
}

impl SlotWorld {
    pub fn checked(&self) -> Vec<i64> {
        self.checked.iter().copied().collect()
    }

    pub fn received(&self) -> &[NetworkItem] {
        &self.received
    }

    pub fn placement(&self, location: i64) -> Option<&NetworkItem> {
        self.placements.get(&location)
    }

    pub fn location_count(&self) -> usize {
        self.placements.len()
    }
}

pub struct World {
    profile: GameProfile,
    slot_data: SlotData,
    slots: Vec<SlotWorld>,
}

fn item_flags(profile: &GameProfile, doom_type: i32) -> u32 {
    match profile.effect(doom_type) {
        EffectKind::Inventory | EffectKind::MapReveal => 0,
        _ => ITEM_FLAG_PROGRESSION,
    }
}

/// Episodes included by `slot_data`, falling back to the first one.
pub fn enabled_episodes(profile: &GameProfile, slot_data: &SlotData) -> Vec<u32> {
    let enabled: Vec<u32> = (1..=profile.episode_count as u32)
        .filter(|&ep| slot_data.episode_flag(ep).map_or(false, |v| v != 0))
        .collect();
    if enabled.is_empty() {
        vec![1]
    } else {
        enabled
    }
}

impl World {
    pub fn generate(profile: GameProfile, slot_names: &[String], slot_data: SlotData, seed: u64) -> Self {
        let episodes = enabled_episodes(&profile, &slot_data);
        let slots = slot_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                Self::place(&profile, &episodes, name.clone(), i as u32 + 1, &mut rng)
            })
            .collect();

        Self {
            profile,
            slot_data,
            slots,
        }
    }

    fn place(profile: &GameProfile, episodes: &[u32], name: String, id: u32, rng: &mut StdRng) -> SlotWorld {
        let levels: Vec<LevelId> = profile
            .level_ids()
            .filter(|level| episodes.contains(&level.episode))
            .collect();
        let network_item = |item: i64, location: i64, doom_type: i32| NetworkItem {
            item,
            location,
            player: id,
            flags: item_flags(profile, doom_type),
        };

        let mut placements = BTreeMap::new();
        let mut received = Vec::new();
        let mut required = Vec::new();
        let mut fillers = Vec::new();
        let mut open = Vec::new();

        let mut items: Vec<_> = profile.items().collect();
        items.sort_by_key(|item| item.id);

        for level in &levels {
            for (index, location) in profile.level_locations(*level) {
                if index == COMPLETE_INDEX {
                    let complete = items
                        .iter()
                        .find(|item| item.level == Some(*level) && item.doom_type == LEVEL_COMPLETE_CODE);
                    if let Some(item) = complete {
                        placements.insert(location, network_item(item.id, location, item.doom_type));
                        continue;
                    }
                }
                open.push(location);
            }
        }

        for item in &items {
            match item.level {
                Some(level) if !levels.contains(&level) => continue,
                Some(_) if item.doom_type == LEVEL_COMPLETE_CODE => continue,
                Some(level) if item.doom_type == LEVEL_UNLOCK_CODE && level.map == 1 => {
                    received.push(network_item(item.id, START_LOCATION, item.doom_type));
                }
                // Level maps are not progression but still get a guaranteed spot.
                Some(_) => required.push(item),
                None if item_flags(profile, item.doom_type) != 0 => required.push(item),
                None => fillers.push(item),
            }
        }

        open.shuffle(rng);
        if required.len() > open.len() {
            warn!(
                "{}: {} items do not fit into {} locations",
                name,
                required.len(),
                open.len()
            );
        }
        let mut open = open.into_iter();
        for item in required {
            let Some(location) = open.next() else { break };
            placements.insert(location, network_item(item.id, location, item.doom_type));
        }
        for (location, item) in open.zip(fillers.iter().cycle()) {
            placements.insert(location, network_item(item.id, location, item.doom_type));
        }

        info!(
            "Placed {} items for slot {} across {} levels",
            placements.len(),
            name,
            levels.len()
        );

        SlotWorld {
            name,
            id,
            placements,
            checked: BTreeSet::new(),
            received,
            goal: false,
        }
    }

    pub fn profile(&self) -> &GameProfile {
        &self.profile
    }

    pub fn slot_data(&self) -> &SlotData {
        &self.slot_data
    }

    pub fn slot(&self, name: &str) -> Option<&SlotWorld> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut SlotWorld> {
        self.slots.iter_mut().find(|slot| slot.name == name)
    }

    /// Marks `locations` checked for `slot`. Returns the items of the locations
    /// that were not checked before; unknown and repeated locations yield nothing.
    pub fn check(&mut self, slot: &str, locations: &[i64]) -> Vec<NetworkItem> {
        let Some(world) = self.slot_mut(slot) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for &location in locations {
            let Some(item) = world.placements.get(&location).copied() else {
                continue;
            };
            if world.checked.insert(location) {
                world.received.push(item);
                found.push(item);
            }
        }
        found
    }

    /// Items placed at `locations`, in request order. Unknown locations are skipped.
    pub fn scout(&self, slot: &str, locations: &[i64]) -> Vec<NetworkItem> {
        self.slot(slot)
            .map(|world| {
                locations
                    .iter()
                    .filter_map(|location| world.placements.get(location).copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn complete_goal(&mut self, slot: &str) -> bool {
        match self.slot_mut(slot) {
            Some(world) if !world.goal => {
                world.goal = true;
                true
            }
            _ => false,
        }
    }

    pub fn item_name(&self, id: i64) -> String {
        self.profile
            .item(id)
            .map_or_else(|| format!("Item {}", id), |item| item.name.clone())
    }

    pub fn location_name(&self, id: i64) -> String {
        self.profile
            .location_name(id)
            .map_or_else(|| format!("Location {}", id), str::to_string)
    }
}
