use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lodestone id of a character. Stable for the lifetime of the character.
pub type CharacterId = String;
/// The lodestone id of a free company.
pub type GuildId = String;

/// The color group used for the local player's own free company.
pub const DEFAULT_GROUP: &str = "Default";
/// The color group used for tracked free companies without an assignment.
pub const OTHER_GROUP: &str = "Other FC";

/// A character as identified in game, by name and home world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub name: String,
    pub world: String,
}

/// Cache key of a [PlayerIdentity], formatted as `name@world`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerKey(String);

impl PlayerIdentity {
    pub fn new<N, W>(name: N, world: W) -> Self
    where
        N: Into<String>,
        W: Into<String>,
    {
        Self {
            name: name.into(),
            world: world.into(),
        }
    }

    pub fn key(&self) -> PlayerKey {
        PlayerKey(format!("{}@{}", self.name, self.world))
    }
}

impl PlayerKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PlayerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Display for PlayerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.world)
    }
}

/// A single member of a free company roster.
///
/// Members are matched by name only, the id is kept for the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: CharacterId,
    pub name: String,
}

/// A fetched free company roster. Always replaced as a whole, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildRecord {
    pub id: GuildId,
    pub name: String,
    pub world: String,
    pub last_updated: DateTime<Utc>,
    pub members: Vec<MemberRecord>,
}

impl GuildRecord {
    /// A record for a guild whose roster has not been fetched yet.
    /// Its timestamp is the epoch, so it is always considered stale.
    pub fn placeholder(id: GuildId, name: String, world: String) -> Self {
        Self {
            id,
            name,
            world,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            members: vec![],
        }
    }

    /// Returns true if the roster was last fetched longer than `max_age` before `now`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_updated) >= max_age
    }
}

/// An RGBA color, as used for the nameplate color override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Converts normalized `[r, g, b, a]` floats, as stored by older documents.
    pub fn from_floats([r, g, b, a]: [f32; 4]) -> Self {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u8;

        Self {
            r: channel(r),
            g: channel(g),
            b: channel(b),
            a: channel(a),
        }
    }
}

/// A named color style that one or more guilds can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorGroup {
    pub name: String,
    /// Row of the game's UI color sheet
    pub ui_color: u16,
    pub rgba: Rgba,
}

impl ColorGroup {
    pub fn new<S>(name: S, ui_color: u16, rgba: Rgba) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            ui_color,
            rgba,
        }
    }

    /// The built-in group for the local player's own free company
    pub fn builtin_default() -> Self {
        Self::new(DEFAULT_GROUP, 45, Rgba::new(0x3f, 0xd6, 0x8c, 0xff))
    }

    /// The built-in group for tracked free companies without an assignment
    pub fn builtin_other() -> Self {
        Self::new(OTHER_GROUP, 43, Rgba::new(0xf2, 0xb1, 0x3c, 0xff))
    }

    pub fn is_builtin(name: &str) -> bool {
        name == DEFAULT_GROUP || name == OTHER_GROUP
    }
}
