//! Mutable session state: the player's persistent inventory, per-level
//! progress and the slot options received at connect time.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::profile::{GameProfile, LevelId, KEY_SLOTS, MAX_CHECKS_PER_LEVEL};
use shared::SlotData;
use std::collections::{BTreeSet, VecDeque};

/// How level geometry is mirrored for this seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlipMode {
    #[default]
    None,
    All,
    /// Per-level coin flip seeded from the seed identifier.
    Seeded,
}

impl FlipMode {
    /// Unknown values disable flipping.
    pub fn from_slot_value(value: i32) -> Self {
        match value {
            1 => FlipMode::All,
            2 => FlipMode::Seeded,
            _ => FlipMode::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InventorySlot {
    pub item_type: i32,
    pub count: i32,
}

/// Player attributes that survive level changes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub health: i32,
    pub armor_points: i32,
    pub armor_type: i32,
    pub backpack: bool,
    pub ready_weapon: i32,
    pub kill_count: i32,
    pub item_count: i32,
    pub secret_count: i32,
    pub powers: Vec<i32>,
    pub weapon_owned: Vec<bool>,
    /// Current ammo per ammo type.
    pub ammo: Vec<i32>,
    /// Capacity per ammo type, always derived from the profile base and the backpack flag.
    pub max_ammo: Vec<i32>,
    pub inventory: Vec<InventorySlot>,
}

impl PlayerState {
    /// Starting loadout: fist, pistol and 50 bullets.
    pub fn new(profile: &GameProfile) -> Self {
        let mut weapon_owned = vec![false; profile.weapon_count];
        for owned in weapon_owned.iter_mut().take(2) {
            *owned = true;
        }
        let mut ammo = vec![0; profile.ammo_count];
        if let Some(first) = ammo.first_mut() {
            *first = 50;
        }

        Self {
            health: 100,
            armor_points: 0,
            armor_type: 0,
            backpack: false,
            ready_weapon: 1,
            kill_count: 0,
            item_count: 0,
            secret_count: 0,
            powers: vec![0; profile.powerup_count],
            weapon_owned,
            ammo,
            max_ammo: profile.max_ammo.clone(),
            inventory: vec![InventorySlot::default(); profile.inventory_count],
        }
    }

    /// Recomputes every capacity from `base`. Idempotent.
    pub fn refresh_ammo_capacity(&mut self, base: &[i32]) {
        let factor = if self.backpack { 2 } else { 1 };
        self.max_ammo = base.iter().map(|&cap| cap * factor).collect();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LevelState {
    pub completed: bool,
    pub keys: [bool; KEY_SLOTS],
    checks: Vec<i32>,
    pub has_map: bool,
    pub unlocked: bool,
    pub flipped: bool,
    pub special: bool,
}

impl LevelState {
    /// Distinct check indices recorded so far, in the order they arrived.
    pub fn checks(&self) -> &[i32] {
        &self.checks
    }

    /// Number of distinct checks, the exit excluded.
    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    pub fn is_checked(&self, index: i32) -> bool {
        self.checks.contains(&index)
    }

    /// Returns false when the index was already present or the level is full.
    pub fn record_check(&mut self, index: i32) -> bool {
        if self.is_checked(index) || self.checks.len() >= MAX_CHECKS_PER_LEVEL {
            return false;
        }
        self.checks.push(index);
        true
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub player: PlayerState,
    levels: Vec<Vec<LevelState>>,
    /// One flag per episode, `true` when the seed includes it.
    pub episodes: Vec<bool>,
    /// Level currently being played, if any.
    pub cursor: Option<LevelId>,
    pub difficulty: i32,
    pub random_monsters: i32,
    pub random_items: i32,
    pub flip_levels: FlipMode,
    pub two_ways_keydoors: bool,
    pub victory: bool,
    pub progressive_locations: BTreeSet<i64>,
    /// Item ids received while out of game, oldest first.
    pub pending_items: VecDeque<i64>,
    /// Every item index below this one has been received.
    pub item_index: u32,
    /// Indices above `item_index` that arrived ahead of a gap.
    pub received_ahead: BTreeSet<u32>,
}

impl SessionState {
    pub fn new(profile: &GameProfile) -> Self {
        Self {
            player: PlayerState::new(profile),
            levels: vec![vec![LevelState::default(); profile.map_count]; profile.episode_count],
            episodes: vec![false; profile.episode_count],
            cursor: None,
            difficulty: 2,
            random_monsters: 0,
            random_items: 0,
            flip_levels: FlipMode::None,
            two_ways_keydoors: false,
            victory: false,
            progressive_locations: BTreeSet::new(),
            pending_items: VecDeque::new(),
            item_index: 0,
            received_ahead: BTreeSet::new(),
        }
    }

    /// Records the server index of a received item. Returns false when that
    /// index was already received, in this run or an earlier one.
    pub fn mark_item_received(&mut self, index: u32) -> bool {
        if index < self.item_index || !self.received_ahead.insert(index) {
            return false;
        }
        while self.received_ahead.remove(&self.item_index) {
            self.item_index += 1;
        }
        true
    }

    /// `None` for levels outside the game's grid.
    pub fn level(&self, level: LevelId) -> Option<&LevelState> {
        let episode = (level.episode as usize).checked_sub(1)?;
        let map = (level.map as usize).checked_sub(1)?;
        self.levels.get(episode)?.get(map)
    }

    pub fn level_mut(&mut self, level: LevelId) -> Option<&mut LevelState> {
        let episode = (level.episode as usize).checked_sub(1)?;
        let map = (level.map as usize).checked_sub(1)?;
        self.levels.get_mut(episode)?.get_mut(map)
    }

    /// Every level in episode-major order.
    pub fn levels(&self) -> impl Iterator<Item = (LevelId, &LevelState)> {
        self.levels.iter().enumerate().flat_map(|(e, maps)| {
            maps.iter()
                .enumerate()
                .map(move |(m, level)| (LevelId::new(e as u32 + 1, m as u32 + 1), level))
        })
    }

    /// Episodes are numbered from 1.
    pub fn episode_enabled(&self, episode: u32) -> bool {
        (episode as usize)
            .checked_sub(1)
            .and_then(|e| self.episodes.get(e))
            .copied()
            .unwrap_or(false)
    }

    /// Copies every option present in `data`. Absent options keep their defaults.
    pub fn apply_slot_data(&mut self, data: &SlotData) {
        if let Some(v) = data.difficulty {
            self.difficulty = v;
        }
        if let Some(v) = data.random_monsters {
            self.random_monsters = v;
        }
        if let Some(v) = data.random_pickups {
            self.random_items = v;
        }
        if let Some(v) = data.flip_levels {
            self.flip_levels = FlipMode::from_slot_value(v);
        }
        if let Some(v) = data.two_ways_keydoors {
            self.two_ways_keydoors = v != 0;
        }
        for (e, enabled) in self.episodes.iter_mut().enumerate() {
            if let Some(v) = data.episode_flag(e as u32 + 1) {
                *enabled = v != 0;
            }
        }
    }

    /// A seed always includes at least one episode.
    pub fn ensure_episode_enabled(&mut self) {
        if !self.episodes.iter().any(|&e| e) {
            if let Some(first) = self.episodes.first_mut() {
                *first = true;
            }
        }
    }

    /// Sets every level's `flipped` flag from the flip mode. Deterministic for a
    /// given `seed_id`, and identical across restarts.
    pub fn resolve_layout(&mut self, seed_id: &str) {
        match self.flip_levels {
            FlipMode::None | FlipMode::All => {
                let flipped = self.flip_levels == FlipMode::All;
                for level in self.levels.iter_mut().flatten() {
                    level.flipped = flipped;
                }
            }
            FlipMode::Seeded => {
                let mut rng = StdRng::seed_from_u64(hash_seed(seed_id));
                for level in self.levels.iter_mut().flatten() {
                    level.flipped = rng.gen_range(0..2) == 1;
                }
            }
        }
    }
}

/// djb2 over the bytes of `s`.
pub fn hash_seed(s: &str) -> u64 {
    s.bytes()
        .fold(5381u64, |hash, b| hash.wrapping_mul(33).wrapping_add(b as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::profile::GameId;

    #[test]
    fn test_new_player_defaults() {
        let profile = GameProfile::builtin(GameId::Doom2);
        let player = PlayerState::new(&profile);

        assert_eq!(player.health, 100);
        assert_eq!(player.ready_weapon, 1);
        assert_eq!(&player.weapon_owned[..3], &[true, true, false]);
        assert_eq!(player.ammo, vec![50, 0, 0, 0]);
        assert_eq!(player.max_ammo, vec![200, 50, 300, 50]);
        assert!(player.inventory.is_empty());
    }

    #[test]
    fn test_ammo_capacity_never_compounds() {
        let profile = GameProfile::builtin(GameId::Doom);
        let mut player = PlayerState::new(&profile);

        player.backpack = true;
        player.refresh_ammo_capacity(&profile.max_ammo);
        player.refresh_ammo_capacity(&profile.max_ammo);
        assert_eq!(player.max_ammo, vec![400, 100, 600, 100]);

        player.backpack = false;
        player.refresh_ammo_capacity(&profile.max_ammo);
        assert_eq!(player.max_ammo, profile.max_ammo);
    }

    #[test]
    fn test_record_check_dedupes_and_bounds() {
        let mut level = LevelState::default();
        assert!(level.record_check(3));
        assert!(!level.record_check(3));
        assert_eq!(level.check_count(), 1);

        for index in 100..200 {
            level.record_check(index);
        }
        assert_eq!(level.check_count(), MAX_CHECKS_PER_LEVEL);
    }

    #[test]
    fn test_level_lookup_is_one_based() {
        let profile = GameProfile::builtin(GameId::Doom);
        let mut state = SessionState::new(&profile);

        state.level_mut(LevelId::new(2, 3)).unwrap().has_map = true;
        assert!(state.level(LevelId::new(2, 3)).unwrap().has_map);
        assert!(state.level(LevelId::new(0, 1)).is_none());
        assert!(state.level(LevelId::new(5, 1)).is_none());
        assert!(state.level(LevelId::new(1, 10)).is_none());
        assert_eq!(state.levels().count(), 36);
    }

    #[test]
    fn test_apply_slot_data() {
        let profile = GameProfile::builtin(GameId::Doom);
        let mut state = SessionState::new(&profile);
        state.apply_slot_data(&SlotData {
            difficulty: Some(4),
            flip_levels: Some(1),
            episode2: Some(1),
            episode3: Some(0),
            ..SlotData::default()
        });

        assert_eq!(state.difficulty, 4);
        assert_eq!(state.random_monsters, 0);
        assert_eq!(state.flip_levels, FlipMode::All);
        assert_eq!(state.episodes, vec![false, true, false, false]);
    }

    #[test]
    fn test_first_episode_enabled_when_none_are() {
        let profile = GameProfile::builtin(GameId::Heretic);
        let mut state = SessionState::new(&profile);
        state.ensure_episode_enabled();
        assert!(state.episode_enabled(1));
        assert!(!state.episode_enabled(2));

        state.episodes = vec![false, false, true, false, false];
        state.ensure_episode_enabled();
        assert!(!state.episode_enabled(1));
    }

    #[test]
    fn test_flip_all() {
        let profile = GameProfile::builtin(GameId::Doom2);
        let mut state = SessionState::new(&profile);
        state.flip_levels = FlipMode::All;
        state.resolve_layout("AP_1_50");
        assert!(state.levels().all(|(_, l)| l.flipped));
    }

    #[test]
    fn test_seeded_flip_is_deterministic() {
        let profile = GameProfile::builtin(GameId::Doom);
        let flips = |seed: &str| {
            let mut state = SessionState::new(&profile);
            state.flip_levels = FlipMode::Seeded;
            state.resolve_layout(seed);
            state.levels().map(|(_, l)| l.flipped).collect::<Vec<_>>()
        };

        let first = flips("AP_123_41");
        assert_eq!(first, flips("AP_123_41"));
        assert!(first.iter().any(|&f| f));
        assert!(first.iter().any(|&f| !f));
    }

    #[test]
    fn test_seeded_flip_differs_per_slot() {
        let profile = GameProfile::builtin(GameId::Doom);
        let flips = |seed: &str| {
            let mut state = SessionState::new(&profile);
            state.flip_levels = FlipMode::Seeded;
            state.resolve_layout(seed);
            state.levels().map(|(_, l)| l.flipped).collect::<Vec<_>>()
        };

        // Same seed, slots "A" and "B".
        assert_ne!(flips("AP_123_41"), flips("AP_123_42"));
    }

    #[test]
    fn test_item_indices_received_out_of_order() {
        let profile = GameProfile::builtin(GameId::Doom2);
        let mut state = SessionState::new(&profile);

        assert!(state.mark_item_received(2));
        assert!(state.mark_item_received(0));
        assert_eq!(state.item_index, 1);
        assert!(!state.mark_item_received(2));
        assert!(!state.mark_item_received(0));

        assert!(state.mark_item_received(1));
        assert_eq!(state.item_index, 3);
        assert!(state.received_ahead.is_empty());
        assert!(!state.mark_item_received(1));
    }

    #[test]
    fn test_hash_seed() {
        assert_eq!(hash_seed(""), 5381);
        assert_eq!(hash_seed("a"), 5381 * 33 + 97);
    }
}
