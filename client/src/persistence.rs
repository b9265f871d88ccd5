//! JSON snapshot of a session, stored as `apstate.json` in the seed's save directory.
//!
//! Saving writes the whole document. Loading is lenient: any field may be
//! missing or of the wrong shape and is then skipped. Flag-like fields are
//! OR-merged into the current state, numeric fields overwrite it.

use crate::error::SnapshotError;
use crate::state::{InventorySlot, SessionState};
use serde::Serialize;
use serde_json::Value;
use shared::profile::{GameProfile, LevelId, COMPLETE_INDEX};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const SNAPSHOT_FILE: &str = "apstate.json";

#[derive(Serialize)]
struct SnapshotDoc<'a> {
    player: PlayerDoc<'a>,
    episodes: Vec<Vec<LevelDoc<'a>>>,
    item_queue: Vec<i64>,
    ep: u32,
    map: u32,
    enabled_episodes: &'a [bool],
    progressive_locations: Vec<i64>,
    victory: i32,
    item_index: u32,
    received_ahead: Vec<u32>,
}

#[derive(Serialize)]
struct PlayerDoc<'a> {
    health: i32,
    armor_points: i32,
    armor_type: i32,
    backpack: i32,
    ready_weapon: i32,
    kill_count: i32,
    item_count: i32,
    secret_count: i32,
    powers: &'a [i32],
    weapon_owned: Vec<i32>,
    ammo: &'a [i32],
    inventory: Vec<InventoryDoc>,
}

#[derive(Serialize)]
struct InventoryDoc {
    #[serde(rename = "type")]
    item_type: i32,
    count: i32,
}

#[derive(Serialize)]
struct LevelDoc<'a> {
    completed: i32,
    keys0: i32,
    keys1: i32,
    keys2: i32,
    check_count: usize,
    has_map: i32,
    unlocked: i32,
    special: i32,
    checks: &'a [i32],
}

fn flag(b: bool) -> i32 {
    i32::from(b)
}

/// Renders the snapshot document for `state`.
pub fn to_json(state: &SessionState, profile: &GameProfile) -> Result<String, SnapshotError> {
    let player = &state.player;
    let inventory = player
        .inventory
        .iter()
        .filter(|slot| Some(slot.item_type) != profile.transient_inventory_type)
        .map(|slot| InventoryDoc {
            item_type: slot.item_type,
            count: slot.count,
        })
        .collect();

    let mut episodes: Vec<Vec<LevelDoc>> = (0..profile.episode_count)
        .map(|_| Vec::with_capacity(profile.map_count))
        .collect();
    for (id, level) in state.levels() {
        if let Some(maps) = episodes.get_mut(id.episode as usize - 1) {
            maps.push(LevelDoc {
                completed: flag(level.completed),
                keys0: flag(level.keys[0]),
                keys1: flag(level.keys[1]),
                keys2: flag(level.keys[2]),
                check_count: level.check_count(),
                has_map: flag(level.has_map),
                unlocked: flag(level.unlocked),
                special: flag(level.special),
                checks: level.checks(),
            });
        }
    }

    let (ep, map) = state.cursor.map_or((0, 0), |l| (l.episode, l.map));
    let doc = SnapshotDoc {
        player: PlayerDoc {
            health: player.health,
            armor_points: player.armor_points,
            armor_type: player.armor_type,
            backpack: flag(player.backpack),
            ready_weapon: player.ready_weapon,
            kill_count: player.kill_count,
            item_count: player.item_count,
            secret_count: player.secret_count,
            powers: &player.powers,
            weapon_owned: player.weapon_owned.iter().map(|&w| flag(w)).collect(),
            ammo: &player.ammo,
            inventory,
        },
        episodes,
        item_queue: state.pending_items.iter().copied().collect(),
        ep,
        map,
        enabled_episodes: &state.episodes,
        progressive_locations: state.progressive_locations.iter().copied().collect(),
        victory: flag(state.victory),
        item_index: state.item_index,
        received_ahead: state.received_ahead.iter().copied().collect(),
    };

    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Writes the snapshot next to the old one first, then renames it into place,
/// so an interrupted save leaves the previous snapshot intact.
pub fn save(state: &SessionState, profile: &GameProfile, dir: &Path) -> Result<(), SnapshotError> {
    let json = to_json(state, profile)?;
    let tmp_path = dir.join(format!(".{}.tmp-{}", SNAPSHOT_FILE, std::process::id()));
    if let Err(e) = fs::write(&tmp_path, json).and_then(|()| fs::rename(&tmp_path, dir.join(SNAPSHOT_FILE))) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Merges the snapshot in `dir` into `state`. Returns `Ok(false)` when there is none.
pub fn load(state: &mut SessionState, profile: &GameProfile, dir: &Path) -> Result<bool, SnapshotError> {
    let text = match fs::read_to_string(dir.join(SNAPSHOT_FILE)) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let doc: Value = serde_json::from_str(&text)?;
    merge(state, profile, &doc);
    Ok(true)
}

/// Values outside the `i32` range are skipped like any other malformed field.
fn read_int(value: &Value, out: &mut i32) {
    if let Some(n) = value.as_i64().and_then(|n| i32::try_from(n).ok()) {
        *out = n;
    }
}

fn read_flag(value: &Value, out: &mut bool) {
    let set = match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map_or(false, |n| n != 0),
        _ => false,
    };
    *out |= set;
}

fn read_ints(value: &Value, out: &mut [i32]) {
    for (i, slot) in out.iter_mut().enumerate() {
        read_int(&value[i], slot);
    }
}

fn read_flags(value: &Value, out: &mut [bool]) {
    for (i, slot) in out.iter_mut().enumerate() {
        read_flag(&value[i], slot);
    }
}

fn array(value: &Value) -> &[Value] {
    match value.as_array() {
        Some(values) => values,
        None => &[],
    }
}

/// Applies a parsed snapshot document to `state`.
pub fn merge(state: &mut SessionState, profile: &GameProfile, doc: &Value) {
    let p = &doc["player"];
    let player = &mut state.player;
    read_int(&p["health"], &mut player.health);
    read_int(&p["armor_points"], &mut player.armor_points);
    read_int(&p["armor_type"], &mut player.armor_type);
    read_flag(&p["backpack"], &mut player.backpack);
    read_int(&p["ready_weapon"], &mut player.ready_weapon);
    read_int(&p["kill_count"], &mut player.kill_count);
    read_int(&p["item_count"], &mut player.item_count);
    read_int(&p["secret_count"], &mut player.secret_count);
    read_ints(&p["powers"], &mut player.powers);
    read_flags(&p["weapon_owned"], &mut player.weapon_owned);
    read_ints(&p["ammo"], &mut player.ammo);
    for (slot, entry) in player.inventory.iter_mut().zip(array(&p["inventory"])) {
        let mut loaded = InventorySlot::default();
        read_int(&entry["type"], &mut loaded.item_type);
        read_int(&entry["count"], &mut loaded.count);
        *slot = loaded;
    }
    player.refresh_ammo_capacity(&profile.max_ammo);

    for id in profile.level_ids() {
        let l = &doc["episodes"][id.episode as usize - 1][id.map as usize - 1];
        if l.is_null() {
            continue;
        }
        let Some(level) = state.level_mut(id) else {
            continue;
        };
        read_flag(&l["completed"], &mut level.completed);
        read_flag(&l["keys0"], &mut level.keys[0]);
        read_flag(&l["keys1"], &mut level.keys[1]);
        read_flag(&l["keys2"], &mut level.keys[2]);
        read_flag(&l["has_map"], &mut level.has_map);
        read_flag(&l["unlocked"], &mut level.unlocked);
        read_flag(&l["special"], &mut level.special);
        let indices = array(&l["checks"])
            .iter()
            .filter_map(Value::as_i64)
            .filter_map(|index| i32::try_from(index).ok())
            .filter(|&index| index != COMPLETE_INDEX && profile.location_id(id, index).is_some());
        for index in indices {
            level.record_check(index);
        }
    }

    state
        .pending_items
        .extend(array(&doc["item_queue"]).iter().filter_map(Value::as_i64));

    let (mut ep, mut map) = (0, 0);
    read_int(&doc["ep"], &mut ep);
    read_int(&doc["map"], &mut map);
    if ep > 0 && map > 0 {
        let level = LevelId::new(ep as u32, map as u32);
        if profile.contains_level(level) {
            state.cursor = Some(level);
        }
    }

    read_flags(&doc["enabled_episodes"], &mut state.episodes);
    state
        .progressive_locations
        .extend(array(&doc["progressive_locations"]).iter().filter_map(Value::as_i64));
    read_flag(&doc["victory"], &mut state.victory);
    if let Some(index) = doc["item_index"].as_u64().and_then(|n| u32::try_from(n).ok()) {
        state.item_index = index;
    }
    let ahead = array(&doc["received_ahead"])
        .iter()
        .filter_map(Value::as_u64)
        .filter_map(|n| u32::try_from(n).ok());
    for index in ahead {
        state.mark_item_received(index);
    }
}
