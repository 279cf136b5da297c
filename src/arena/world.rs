//! World Collaborators
//!
//! Contracts for the systems the arena consumes but does not own: occupant
//! identity, overlap delivery from the collision layer, and the entity
//! directory used to teleport relocated occupants.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::vec3::Vec3;
use crate::arena::tile::TileId;

/// Opaque occupant identifier supplied by the identity/session provider.
///
/// Implements Ord so occupant sets iterate deterministically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct OccupantId(pub u64);

impl OccupantId {
    /// Create from a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OccupantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "occupant#{}", self.0)
    }
}

/// Direction of an overlap change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapKind {
    /// Occupant entered the tile's trigger volume.
    Enter,
    /// Occupant left the tile's trigger volume.
    Exit,
}

/// One overlap notification from the collision layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapEvent {
    /// Tile whose trigger volume changed.
    pub tile: TileId,
    /// Occupant involved.
    pub occupant: OccupantId,
    /// Enter or exit.
    pub kind: OverlapKind,
}

impl OverlapEvent {
    /// Occupant entered `tile`.
    pub const fn enter(tile: TileId, occupant: OccupantId) -> Self {
        Self { tile, occupant, kind: OverlapKind::Enter }
    }

    /// Occupant left `tile`.
    pub const fn exit(tile: TileId, occupant: OccupantId) -> Self {
        Self { tile, occupant, kind: OverlapKind::Exit }
    }
}

/// Resolves occupants to movable world entities.
///
/// Resolution is allowed to fail (the occupant disconnected, was
/// eliminated, ...); relocation then skips that occupant only.
pub trait WorldDirectory {
    /// Current position of the occupant's entity, if it still exists.
    fn position_of(&self, occupant: OccupantId) -> Option<Vec3>;

    /// Move the occupant's entity to `target`. Returns false if the
    /// occupant no longer resolves.
    fn teleport(&mut self, occupant: OccupantId, target: Vec3) -> bool;
}

/// In-memory entity directory.
#[derive(Debug, Clone, Default)]
pub struct EntityDirectory {
    entities: BTreeMap<OccupantId, Vec3>,
}

impl EntityDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or move an entity.
    pub fn insert(&mut self, occupant: OccupantId, position: Vec3) {
        self.entities.insert(occupant, position);
    }

    /// Remove an entity (it will no longer resolve).
    pub fn remove(&mut self, occupant: OccupantId) -> Option<Vec3> {
        self.entities.remove(&occupant)
    }

    /// Iterate entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = (OccupantId, Vec3)> + '_ {
        self.entities.iter().map(|(id, pos)| (*id, *pos))
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if there are no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl WorldDirectory for EntityDirectory {
    fn position_of(&self, occupant: OccupantId) -> Option<Vec3> {
        self.entities.get(&occupant).copied()
    }

    fn teleport(&mut self, occupant: OccupantId, target: Vec3) -> bool {
        match self.entities.get_mut(&occupant) {
            Some(position) => {
                *position = target;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupant_ordering() {
        let a = OccupantId::new(1);
        let b = OccupantId::new(2);
        assert!(a < b);
        assert_eq!(a.to_string(), "occupant#1");
    }

    #[test]
    fn test_directory_teleport() {
        let mut dir = EntityDirectory::new();
        let id = OccupantId::new(5);
        dir.insert(id, Vec3::ZERO);

        assert!(dir.teleport(id, Vec3::new(2.0, 1.0, 2.0)));
        assert_eq!(dir.position_of(id), Some(Vec3::new(2.0, 1.0, 2.0)));

        dir.remove(id);
        assert!(!dir.teleport(id, Vec3::ZERO));
        assert_eq!(dir.position_of(id), None);
    }

    #[test]
    fn test_overlap_constructors() {
        let e = OverlapEvent::enter(TileId(3), OccupantId(9));
        assert_eq!(e.kind, OverlapKind::Enter);
        let x = OverlapEvent::exit(TileId(3), OccupantId(9));
        assert_eq!(x.kind, OverlapKind::Exit);
        assert_eq!(e.tile, x.tile);
    }
}
