use serde::{Deserialize, Serialize};

pub mod profile;

pub use profile::{GameId, GameProfile, LevelId, LocationRef, ProfileError};

/// Datagram buffer size used by both ends of the UDP transport.
/// Scout replies for a full DOOM II slot are a few kilobytes.
pub const MAX_DATAGRAM: usize = 65_507;

/// Flag bit set on a scouted item that unlocks progression.
pub const ITEM_FLAG_PROGRESSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ClientVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
}

impl ClientVersion {
    pub const fn new(major: u32, minor: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            build,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub seed_name: String,
    pub server_version: ClientVersion,
}

/// Per-slot options chosen when the seed was generated.
/// Every field is optional; absent values leave the session defaults alone.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SlotData {
    pub difficulty: Option<i32>,
    pub random_monsters: Option<i32>,
    pub random_pickups: Option<i32>,
    pub flip_levels: Option<i32>,
    pub episode1: Option<i32>,
    pub episode2: Option<i32>,
    pub episode3: Option<i32>,
    pub episode4: Option<i32>,
    pub two_ways_keydoors: Option<i32>,
}

impl SlotData {
    /// Raw enable flag for a 1-based episode. Only the first four episodes have one.
    pub fn episode_flag(&self, episode: u32) -> Option<i32> {
        match episode {
            1 => self.episode1,
            2 => self.episode2,
            3 => self.episode3,
            4 => self.episode4,
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct NetworkItem {
    pub item: i64,
    pub location: i64,
    pub player: u32,
    pub flags: u32,
}

impl NetworkItem {
    pub fn is_progression(&self) -> bool {
        self.flags & ITEM_FLAG_PROGRESSION != 0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum PrintKind {
    ItemSend {
        item: String,
        recv_player: String,
    },
    ItemRecv {
        item: String,
        send_player: String,
    },
    Hint {
        item: String,
        send_player: String,
        recv_player: String,
        location: String,
        checked: bool,
    },
    Chat,
    Generic,
}

/// A log/chat line pushed by the server. `text` is always the plain rendering.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PrintMessage {
    pub kind: PrintKind,
    pub text: String,
}

impl PrintMessage {
    pub fn generic(text: impl Into<String>) -> Self {
        Self {
            kind: PrintKind::Generic,
            text: text.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: ClientVersion,
        game: String,
        slot: String,
        password: String,
        death_link: bool,
    },
    LocationChecks {
        locations: Vec<i64>,
    },
    LocationScouts {
        locations: Vec<i64>,
        create_as_hint: bool,
    },
    Say {
        text: String,
    },
    GoalComplete,
    Ping,
    Disconnect,

    Connected {
        slot_id: u32,
        room: RoomInfo,
        slot_data: SlotData,
        checked_locations: Vec<i64>,
    },
    ConnectionRefused {
        reason: String,
    },
    ReceivedItems {
        index: u32,
        items: Vec<NetworkItem>,
    },
    LocationsChecked {
        locations: Vec<i64>,
    },
    LocationInfo {
        items: Vec<NetworkItem>,
    },
    Print {
        message: PrintMessage,
    },
    Disconnected {
        reason: String,
    },

    /// Sent by a client when its player dies, relayed by the server to the others.
    DeathLink {
        source: String,
        cause: String,
    },
}

/// Uppercase hex rendering of every byte of `s`, used to build filesystem-safe slot names.
pub fn to_hex(s: &str) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len() * 2);
    for b in s.bytes() {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 15) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex("Ab"), "4162");
        assert_eq!(to_hex(""), "");
        assert_eq!(to_hex("é"), "C3A9");
    }

    #[test]
    fn test_progression_flag() {
        let item = NetworkItem {
            item: 1,
            location: 2,
            player: 1,
            flags: 0b101,
        };
        assert!(item.is_progression());

        let filler = NetworkItem { flags: 0b100, ..item };
        assert!(!filler.is_progression());
    }

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect {
            client_version: ClientVersion::new(0, 4, 1),
            game: "DOOM II".to_string(),
            slot: "Player1".to_string(),
            password: String::new(),
            death_link: true,
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect {
                client_version,
                game,
                slot,
                death_link,
                ..
            } => {
                assert_eq!(client_version, ClientVersion::new(0, 4, 1));
                assert_eq!(game, "DOOM II");
                assert_eq!(slot, "Player1");
                assert!(death_link);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_connected() {
        let packet = Packet::Connected {
            slot_id: 3,
            room: RoomInfo {
                seed_name: "12345".to_string(),
                server_version: ClientVersion::new(0, 4, 1),
            },
            slot_data: SlotData {
                flip_levels: Some(2),
                episode1: Some(1),
                ..SlotData::default()
            },
            checked_locations: vec![10, 11],
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connected {
                slot_id,
                room,
                slot_data,
                checked_locations,
            } => {
                assert_eq!(slot_id, 3);
                assert_eq!(room.seed_name, "12345");
                assert_eq!(slot_data.flip_levels, Some(2));
                assert_eq!(slot_data.difficulty, None);
                assert_eq!(checked_locations, vec![10, 11]);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_large_scout_reply_fits_datagram() {
        let items: Vec<NetworkItem> = (0..1200)
            .map(|i| NetworkItem {
                item: 360_000 + i,
                location: 360_000 + i,
                player: 1,
                flags: 1,
            })
            .collect();
        let serialized = bincode::serialize(&Packet::LocationInfo { items }).unwrap();
        assert!(serialized.len() < MAX_DATAGRAM);
    }
}
