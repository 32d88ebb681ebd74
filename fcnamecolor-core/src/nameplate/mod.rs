mod classifier;
mod payload;

pub use classifier::*;
pub use payload::*;

use crate::Rgba;

/// The game's identifier of a spawned object
pub type ObjectId = u32;

/// What kind of object a nameplate belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateKind {
    Player,
    Npc,
    Other,
}

/// A nameplate about to be drawn. The text fields are written back to the game.
#[derive(Debug, Clone)]
pub struct NamePlateUpdate {
    pub object_id: ObjectId,
    pub kind: PlateKind,
    pub name: SeString,
    pub title: SeString,
    pub title_visible: bool,
    pub free_company: SeString,
    /// Overrides the nameplate color when set
    pub colour: Option<Rgba>,
}

impl NamePlateUpdate {
    pub fn player(object_id: ObjectId, name: &str, free_company: &str) -> Self {
        Self {
            object_id,
            kind: PlateKind::Player,
            name: name.into(),
            title: Default::default(),
            title_visible: false,
            free_company: free_company.into(),
            colour: None,
        }
    }
}

/// A player character as seen through the object table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCharacter {
    pub object_id: ObjectId,
    pub name: String,
    pub world: String,
    pub current_hp: u32,
    pub is_friend: bool,
    pub is_party_member: bool,
    pub is_alliance_member: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPlayer {
    pub object_id: ObjectId,
    pub world: String,
}

/// Game state sampled once per frame by the host
#[derive(Debug, Clone, Default)]
pub struct FrameState {
    pub local_player: Option<LocalPlayer>,
    pub in_duty: bool,
    /// True in PvP content, where nameplates are never styled
    pub in_pvp: bool,
}

/// Resolves objects by id, backed by the game's object table
pub trait ObjectTable {
    fn player(&self, object_id: ObjectId) -> Option<PlayerCharacter>;
}
