//! Per-game reference tables, resolved once from the game identity string.
//!
//! A [`GameProfile`] bundles everything that differs between the supported
//! games: level grid dimensions, ammo caps, the effect codes that mean "key",
//! "weapon" or "map", sprite names for notifications, and the item/location
//! id tables with a reverse index from location id to `(episode, map, index)`.
//!
//! Item effects are expressed as engine thing codes. Two negative codes are
//! reserved for effects that have no in-game object: [`LEVEL_UNLOCK_CODE`] and
//! [`LEVEL_COMPLETE_CODE`]. Every real code in a profile must be positive so the
//! two spaces never overlap; [`GameProfile::from_tables`] rejects tables that
//! break this.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Effect code of an item that unlocks a level.
pub const LEVEL_UNLOCK_CODE: i32 = -1;
/// Effect code of an item that marks a level as completed.
pub const LEVEL_COMPLETE_CODE: i32 = -2;
/// Effect code of the backpack (Bag of Holding in Heretic).
pub const BACKPACK_CODE: i32 = 8;
/// Location index reserved for a level's exit.
pub const COMPLETE_INDEX: i32 = -1;
/// Upper bound on regular check locations in one level.
pub const MAX_CHECKS_PER_LEVEL: usize = 64;
/// Number of key colours tracked per level.
pub const KEY_SLOTS: usize = 3;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unknown game: {0}")]
    UnknownGame(String),
    #[error("failed to read profile tables: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed profile tables: {0}")]
    Json(#[from] serde_json::Error),
    #[error("effect code {0} collides with a reserved sentinel")]
    SentinelCollision(i32),
    #[error("level E{episode}M{map} is outside the profile grid")]
    BadLevel { episode: u32, map: u32 },
    #[error("location id {0} appears more than once")]
    DuplicateLocation(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameId {
    Doom,
    Doom2,
    Heretic,
}

impl GameId {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DOOM 1993" => Some(GameId::Doom),
            "DOOM II" => Some(GameId::Doom2),
            "Heretic" => Some(GameId::Heretic),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GameId::Doom => "DOOM 1993",
            GameId::Doom2 => "DOOM II",
            GameId::Heretic => "Heretic",
        }
    }

    /// DOOM II has a single flat list of maps; the others are split into episodes.
    pub fn is_episodic(self) -> bool {
        !matches!(self, GameId::Doom2)
    }

    fn id_base(self) -> i64 {
        match self {
            GameId::Doom => 350_000,
            GameId::Doom2 => 360_000,
            GameId::Heretic => 370_000,
        }
    }
}

/// 1-based level coordinates, as used on every public boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LevelId {
    pub episode: u32,
    pub map: u32,
}

impl LevelId {
    pub const fn new(episode: u32, map: u32) -> Self {
        Self { episode, map }
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}M{}", self.episode, self.map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRef {
    pub level: LevelId,
    pub index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub name: String,
    pub keys: [bool; KEY_SLOTS],
    #[serde(default)]
    pub use_skull: [bool; KEY_SLOTS],
    /// Number of regular check locations, excluding the exit.
    pub check_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: i64,
    pub name: String,
    pub doom_type: i32,
    /// Level the effect applies to. Player-wide items have none.
    #[serde(default)]
    pub level: Option<LevelId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDef {
    pub id: i64,
    pub episode: u32,
    pub map: u32,
    pub index: i32,
    #[serde(default)]
    pub name: String,
}

/// Raw tables in the shape of a table file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileTables {
    pub levels: Vec<Vec<LevelInfo>>,
    pub items: Vec<ItemDef>,
    pub locations: Vec<LocationDef>,
}

/// What receiving an item does to session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Key(usize),
    MapReveal,
    Backpack,
    Weapon(usize),
    LevelUnlock,
    LevelComplete,
    /// Consumables and power-ups: granted by the game, not tracked here.
    Inventory,
}

struct GameConstants {
    episode_count: usize,
    map_count: usize,
    weapon_count: usize,
    powerup_count: usize,
    inventory_count: usize,
    max_ammo: &'static [i32],
    map_reveal_code: i32,
    transient_inventory_type: Option<i32>,
    keys: &'static [(i32, usize)],
    weapons: &'static [(i32, &'static str, usize)],
    sprites: &'static [(i32, &'static str)],
    fillers: &'static [(i32, &'static str)],
}

const DOOM_KEYS: &[(i32, usize)] = &[(5, 0), (40, 0), (6, 1), (39, 1), (13, 2), (38, 2)];
const HERETIC_KEYS: &[(i32, usize)] = &[(80, 0), (73, 1), (79, 2)];

const DOOM_WEAPONS: &[(i32, &str, usize)] = &[
    (2001, "Shotgun", 2),
    (2002, "Chaingun", 3),
    (2003, "Rocket launcher", 4),
    (2004, "Plasma gun", 5),
    (2006, "BFG9000", 6),
    (2005, "Chainsaw", 7),
];
const DOOM2_WEAPONS: &[(i32, &str, usize)] = &[
    (2001, "Shotgun", 2),
    (2002, "Chaingun", 3),
    (2003, "Rocket launcher", 4),
    (2004, "Plasma gun", 5),
    (2006, "BFG9000", 6),
    (2005, "Chainsaw", 7),
    (82, "Super Shotgun", 1),
];
const HERETIC_WEAPONS: &[(i32, &str, usize)] = &[
    (2005, "Gauntlets of the Necromancer", 7),
    (2001, "Ethereal Crossbow", 2),
    (53, "Dragon Claw", 3),
    (2003, "Phoenix Rod", 5),
    (2002, "Firemace", 6),
    (2004, "Hellstaff", 4),
];

const DOOM_SPRITES: &[(i32, &str)] = &[
    (5, "BKEYA0"),
    (6, "YKEYA0"),
    (13, "RKEYA0"),
    (40, "BSKUA0"),
    (39, "YSKUA0"),
    (38, "RSKUA0"),
    (2026, "PMAPA0"),
    (8, "BPAKA0"),
    (2001, "SHOTA0"),
    (2002, "MGUNA0"),
    (2003, "LAUNA0"),
    (2004, "PLASA0"),
    (2006, "BFUGA0"),
    (2005, "CSAWA0"),
    (82, "SGN2A0"),
    (2012, "MEDIA0"),
    (2018, "ARM1A0"),
    (2019, "ARM2A0"),
    (2013, "SOULA0"),
    (2023, "PSTRA0"),
    (2022, "PINVA0"),
    (2025, "SUITA0"),
    (2048, "AMMOA0"),
    (2049, "SBOXA0"),
];
const HERETIC_SPRITES: &[(i32, &str)] = &[
    (80, "CKYYA0"),
    (73, "AKYYA0"),
    (79, "BKYYA0"),
    (35, "SPMPA0"),
    (8, "BAGHA0"),
    (2005, "WGNTA0"),
    (2001, "WBOWA0"),
    (53, "WBLSA0"),
    (2003, "WPHXA0"),
    (2002, "WMCEA0"),
    (2004, "WSKLA0"),
    (82, "PTN2A0"),
    (32, "SPHLA0"),
    (75, "INVSA0"),
    (84, "INVUA0"),
    (86, "PWBKA0"),
    (30, "EGGCA0"),
    (34, "FBMBA0"),
    (36, "ATLPA0"),
    (33, "TRCHA0"),
    (83, "SOARA0"),
    (85, "SHLDA0"),
    (31, "SHD2A0"),
];

const DOOM_FILLERS: &[(i32, &str)] = &[
    (2012, "Medikit"),
    (2018, "Armor"),
    (2019, "Mega Armor"),
    (2013, "Supercharge"),
    (2023, "Berserk"),
    (2022, "Invulnerability"),
    (2025, "Radiation suit"),
    (2048, "Box of bullets"),
    (2049, "Box of shotgun shells"),
];
const HERETIC_FILLERS: &[(i32, &str)] = &[
    (82, "Quartz Flask"),
    (32, "Mystic Urn"),
    (75, "Shadowsphere"),
    (84, "Ring of Invincibility"),
    (86, "Tome of Power"),
    (30, "Morph Ovum"),
    (34, "Timebomb of the Ancients"),
    (36, "Chaos Device"),
    (33, "Torch"),
    (83, "Wings of Wrath"),
    (85, "Silver Shield"),
    (31, "Enchanted Shield"),
];

fn constants(game: GameId) -> GameConstants {
    match game {
        GameId::Doom => GameConstants {
            episode_count: 4,
            map_count: 9,
            weapon_count: 9,
            powerup_count: 6,
            inventory_count: 0,
            max_ammo: &[200, 50, 300, 50],
            map_reveal_code: 2026,
            transient_inventory_type: None,
            keys: DOOM_KEYS,
            weapons: DOOM_WEAPONS,
            sprites: DOOM_SPRITES,
            fillers: DOOM_FILLERS,
        },
        GameId::Doom2 => GameConstants {
            episode_count: 1,
            map_count: 32,
            weapon_count: 9,
            powerup_count: 6,
            inventory_count: 0,
            max_ammo: &[200, 50, 300, 50],
            map_reveal_code: 2026,
            transient_inventory_type: None,
            keys: DOOM_KEYS,
            weapons: DOOM2_WEAPONS,
            sprites: DOOM_SPRITES,
            fillers: DOOM_FILLERS,
        },
        GameId::Heretic => GameConstants {
            episode_count: 5,
            map_count: 9,
            weapon_count: 9,
            powerup_count: 9,
            inventory_count: 14,
            max_ammo: &[100, 50, 200, 200, 20, 150],
            map_reveal_code: 35,
            // Wings of Wrath only last for the level they were picked up in.
            transient_inventory_type: Some(9),
            keys: HERETIC_KEYS,
            weapons: HERETIC_WEAPONS,
            sprites: HERETIC_SPRITES,
            fillers: HERETIC_FILLERS,
        },
    }
}

/// Immutable per-game tables. Built once at session start.
#[derive(Debug, Clone)]
pub struct GameProfile {
    pub game: GameId,
    pub episode_count: usize,
    pub map_count: usize,
    pub weapon_count: usize,
    pub ammo_count: usize,
    pub powerup_count: usize,
    pub inventory_count: usize,
    pub max_ammo: Vec<i32>,
    pub map_reveal_code: i32,
    pub transient_inventory_type: Option<i32>,
    keys: HashMap<i32, usize>,
    weapons: HashMap<i32, usize>,
    sprites: HashMap<i32, String>,
    levels: Vec<Vec<LevelInfo>>,
    items: HashMap<i64, ItemDef>,
    locations: BTreeMap<LevelId, BTreeMap<i32, i64>>,
    location_names: HashMap<i64, String>,
    reverse: HashMap<i64, LocationRef>,
}

impl GameProfile {
    /// Profile with the built-in tables for the game named `name`.
    pub fn for_name(name: &str) -> Result<Self, ProfileError> {
        let game = GameId::from_name(name).ok_or_else(|| ProfileError::UnknownGame(name.into()))?;
        Ok(Self::builtin(game))
    }

    /// Profile with the built-in tables. Their consistency is checked by the
    /// unit tests, not at runtime.
    pub fn builtin(game: GameId) -> Self {
        Self::assemble(game, generated_tables(game))
    }

    /// Reads item/location/level tables from a JSON table file.
    pub fn load(name: &str, path: &Path) -> Result<Self, ProfileError> {
        let game = GameId::from_name(name).ok_or_else(|| ProfileError::UnknownGame(name.into()))?;
        let text = std::fs::read_to_string(path)?;
        let tables: ProfileTables = serde_json::from_str(&text)?;
        Self::from_tables(game, tables)
    }

    /// Validates `tables` against the game's fixed constants and indexes them.
    pub fn from_tables(game: GameId, tables: ProfileTables) -> Result<Self, ProfileError> {
        validate(game, &tables)?;
        Ok(Self::assemble(game, tables))
    }

    fn assemble(game: GameId, tables: ProfileTables) -> Self {
        let c = constants(game);

        let mut locations: BTreeMap<LevelId, BTreeMap<i32, i64>> = BTreeMap::new();
        let mut reverse = HashMap::with_capacity(tables.locations.len());
        let mut location_names = HashMap::with_capacity(tables.locations.len());
        for loc in tables.locations {
            let level = LevelId::new(loc.episode, loc.map);
            reverse.insert(loc.id, LocationRef { level, index: loc.index });
            locations.entry(level).or_default().insert(loc.index, loc.id);
            location_names.insert(loc.id, loc.name);
        }

        Self {
            game,
            episode_count: c.episode_count,
            map_count: c.map_count,
            weapon_count: c.weapon_count,
            ammo_count: c.max_ammo.len(),
            powerup_count: c.powerup_count,
            inventory_count: c.inventory_count,
            max_ammo: c.max_ammo.to_vec(),
            map_reveal_code: c.map_reveal_code,
            transient_inventory_type: c.transient_inventory_type,
            keys: c.keys.iter().copied().collect(),
            weapons: c.weapons.iter().map(|&(code, _, slot)| (code, slot)).collect(),
            sprites: c.sprites.iter().map(|&(code, s)| (code, s.to_string())).collect(),
            levels: tables.levels,
            items: tables.items.into_iter().map(|item| (item.id, item)).collect(),
            locations,
            location_names,
            reverse,
        }
    }

    pub fn contains_level(&self, level: LevelId) -> bool {
        (1..=self.episode_count as u32).contains(&level.episode)
            && (1..=self.map_count as u32).contains(&level.map)
    }

    /// All levels in episode-major order.
    pub fn level_ids(&self) -> impl Iterator<Item = LevelId> + '_ {
        (1..=self.episode_count as u32)
            .flat_map(move |ep| (1..=self.map_count as u32).map(move |map| LevelId::new(ep, map)))
    }

    pub fn level_info(&self, level: LevelId) -> Option<&LevelInfo> {
        if !self.contains_level(level) {
            return None;
        }
        self.levels
            .get(level.episode as usize - 1)?
            .get(level.map as usize - 1)
    }

    pub fn item(&self, id: i64) -> Option<&ItemDef> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemDef> {
        self.items.values()
    }

    pub fn effect(&self, code: i32) -> EffectKind {
        if let Some(&slot) = self.keys.get(&code) {
            EffectKind::Key(slot)
        } else if code == self.map_reveal_code {
            EffectKind::MapReveal
        } else if code == BACKPACK_CODE {
            EffectKind::Backpack
        } else if let Some(&slot) = self.weapons.get(&code) {
            EffectKind::Weapon(slot)
        } else if code == LEVEL_UNLOCK_CODE {
            EffectKind::LevelUnlock
        } else if code == LEVEL_COMPLETE_CODE {
            EffectKind::LevelComplete
        } else {
            EffectKind::Inventory
        }
    }

    pub fn sprite(&self, code: i32) -> Option<&str> {
        self.sprites.get(&code).map(String::as_str)
    }

    pub fn location_id(&self, level: LevelId, index: i32) -> Option<i64> {
        self.locations.get(&level)?.get(&index).copied()
    }

    pub fn location_name(&self, id: i64) -> Option<&str> {
        self.location_names.get(&id).map(String::as_str)
    }

    /// Reverse lookup of a location id.
    pub fn resolve_location(&self, id: i64) -> Option<LocationRef> {
        self.reverse.get(&id).copied()
    }

    /// `(index, id)` pairs of one level, exit included, in index order.
    pub fn level_locations(&self, level: LevelId) -> impl Iterator<Item = (i32, i64)> + '_ {
        self.locations
            .get(&level)
            .into_iter()
            .flat_map(|m| m.iter().map(|(&index, &id)| (index, id)))
    }
}

/// Rejects tables that would break the effect codes or the level grid.
fn validate(game: GameId, tables: &ProfileTables) -> Result<(), ProfileError> {
    let c = constants(game);

    let real_codes = c
        .keys
        .iter()
        .map(|&(code, _)| code)
        .chain(c.weapons.iter().map(|&(code, _, _)| code))
        .chain(c.sprites.iter().map(|&(code, _)| code))
        .chain([c.map_reveal_code, BACKPACK_CODE]);
    for code in real_codes {
        if code <= 0 {
            return Err(ProfileError::SentinelCollision(code));
        }
    }

    if tables.levels.len() != c.episode_count
        || tables.levels.iter().any(|eps| eps.len() != c.map_count)
    {
        return Err(ProfileError::BadLevel {
            episode: tables.levels.len() as u32,
            map: tables.levels.first().map_or(0, |m| m.len() as u32),
        });
    }

    let in_grid = |level: LevelId| {
        (1..=c.episode_count as u32).contains(&level.episode)
            && (1..=c.map_count as u32).contains(&level.map)
    };

    for item in &tables.items {
        if item.doom_type < 0
            && item.doom_type != LEVEL_UNLOCK_CODE
            && item.doom_type != LEVEL_COMPLETE_CODE
        {
            return Err(ProfileError::SentinelCollision(item.doom_type));
        }
        if let Some(level) = item.level {
            if !in_grid(level) {
                return Err(ProfileError::BadLevel {
                    episode: level.episode,
                    map: level.map,
                });
            }
        }
    }

    let mut seen = HashSet::with_capacity(tables.locations.len());
    for loc in &tables.locations {
        if !in_grid(LevelId::new(loc.episode, loc.map)) {
            return Err(ProfileError::BadLevel {
                episode: loc.episode,
                map: loc.map,
            });
        }
        if !seen.insert(loc.id) {
            return Err(ProfileError::DuplicateLocation(loc.id));
        }
    }
    Ok(())
}

/// Built-in tables. Ids follow a fixed layout per game: locations at
/// `base + ordinal * 100 + index` (exit at `+ 99`), per-level items at
/// `base + 50_000 + ordinal * 10 + slot`, player-wide items at `base + 90_000 + n`.
pub fn generated_tables(game: GameId) -> ProfileTables {
    let c = constants(game);
    let base = game.id_base();
    let mut tables = ProfileTables::default();

    let key_codes: [(i32, i32, &str, &str); KEY_SLOTS] = match game {
        GameId::Heretic => [(80, 80, "Yellow key", ""), (73, 73, "Green key", ""), (79, 79, "Blue key", "")],
        _ => [
            (5, 40, "Blue keycard", "Blue skull key"),
            (6, 39, "Yellow keycard", "Yellow skull key"),
            (13, 38, "Red keycard", "Red skull key"),
        ],
    };
    let map_name = match game {
        GameId::Heretic => "Map Scroll",
        _ => "Computer area map",
    };

    for ep in 1..=c.episode_count as u32 {
        let mut maps = Vec::with_capacity(c.map_count);
        for map in 1..=c.map_count as u32 {
            let ordinal = ((ep - 1) as i64) * c.map_count as i64 + (map - 1) as i64;
            let name = if game.is_episodic() {
                format!("E{}M{}", ep, map)
            } else {
                format!("MAP{:02}", map)
            };
            let keys = [map >= 2, map % 2 == 0, map % 3 == 0];
            let use_skull = [
                game != GameId::Heretic && map % 4 == 0,
                game != GameId::Heretic && map % 4 == 0,
                game != GameId::Heretic && map % 5 == 0,
            ];
            let check_count = 6 + ((ep as usize * 3 + map as usize * 5) % 9);
            let level = Some(LevelId::new(ep, map));

            let item_base = base + 50_000 + ordinal * 10;
            tables.items.push(ItemDef {
                id: item_base,
                name: name.clone(),
                doom_type: LEVEL_UNLOCK_CODE,
                level,
            });
            tables.items.push(ItemDef {
                id: item_base + 1,
                name: format!("{} - Complete", name),
                doom_type: LEVEL_COMPLETE_CODE,
                level,
            });
            tables.items.push(ItemDef {
                id: item_base + 2,
                name: format!("{} - {}", name, map_name),
                doom_type: c.map_reveal_code,
                level,
            });
            for (k, &(card, skull, card_name, skull_name)) in key_codes.iter().enumerate() {
                if !keys[k] {
                    continue;
                }
                let (code, key_name) = if use_skull[k] { (skull, skull_name) } else { (card, card_name) };
                tables.items.push(ItemDef {
                    id: item_base + 3 + k as i64,
                    name: format!("{} - {}", name, key_name),
                    doom_type: code,
                    level,
                });
            }

            let loc_base = base + ordinal * 100;
            for index in 0..check_count as i32 {
                tables.locations.push(LocationDef {
                    id: loc_base + index as i64,
                    episode: ep,
                    map,
                    index,
                    name: format!("{} - Check {}", name, index + 1),
                });
            }
            tables.locations.push(LocationDef {
                id: loc_base + 99,
                episode: ep,
                map,
                index: COMPLETE_INDEX,
                name: format!("{} - Exit", name),
            });

            maps.push(LevelInfo {
                name,
                keys,
                use_skull,
                check_count,
            });
        }
        tables.levels.push(maps);
    }

    let global_base = base + 90_000;
    let backpack_name = match game {
        GameId::Heretic => "Bag of Holding",
        _ => "Backpack",
    };
    let globals = c
        .weapons
        .iter()
        .map(|&(code, name, _)| (code, name))
        .chain(std::iter::once((BACKPACK_CODE, backpack_name)))
        .chain(c.fillers.iter().copied());
    for (n, (code, name)) in globals.enumerate() {
        tables.items.push(ItemDef {
            id: global_base + n as i64,
            name: name.to_string(),
            doom_type: code,
            level: None,
        });
    }

    tables
}
