//! Game entities as seen by the sound system
//!
//! The sound system never owns entities. It keeps their [`EntityId`] and asks
//! an [`EntityDirectory`] whether they are still alive.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::geometry::{Point, Rect};
use super::output::PlaybackHandle;
use super::system::SoundSystem;
use crate::error::SoundResult;

/// Generational entity identity; a reused slot gets a new generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// A map entity that can make sounds
pub trait SoundEntity: Send + Sync {
    fn id(&self) -> EntityId;

    /// Current map position
    fn position(&self) -> Point;

    /// Area this entity hears sounds in; only meaningful for players
    fn hearing_area(&self) -> Option<Rect> {
        None
    }

    /// Area in which this entity's sounds can be heard; `None` means everywhere
    fn audibility_area(&self) -> Option<Rect> {
        None
    }

    /// Perform a library sound from this entity's position
    fn play_sound(
        &self,
        sounds: &SoundSystem,
        name: &str,
        vol_bot: i32,
        vol_top: i32,
        chance: i32,
    ) -> SoundResult<Option<PlaybackHandle>> {
        sounds.play_map_sound(
            self.position(),
            self.audibility_area(),
            name,
            vol_bot,
            vol_top,
            chance,
        )
    }
}

/// Lookup of live entities, provided by the game's entity system
pub trait EntityDirectory: Send + Sync {
    /// The entity with this id, or `None` once it has left the game
    fn resolve(&self, id: EntityId) -> Option<Arc<dyn SoundEntity>>;

    fn is_entity_alive(&self, id: EntityId) -> bool {
        self.resolve(id).is_some()
    }

    /// The locally controlled player
    fn local_player(&self) -> Option<Arc<dyn SoundEntity>>;
}

/// Directory for clients without a world; positional sounds stay silent
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEntities;

impl EntityDirectory for NoEntities {
    fn resolve(&self, _id: EntityId) -> Option<Arc<dyn SoundEntity>> {
        None
    }

    fn local_player(&self) -> Option<Arc<dyn SoundEntity>> {
        None
    }
}

#[derive(Default)]
struct RegistryInner {
    entities: HashMap<u32, Arc<dyn SoundEntity>>,
    generations: Vec<u32>,
    free: Vec<u32>,
    player: Option<EntityId>,
}

/// In-memory entity directory with generational id allocation
#[derive(Default)]
pub struct EntityRegistry {
    inner: RwLock<RegistryInner>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh id for an entity about to be created
    pub fn allocate(&self) -> EntityId {
        let mut inner = self.inner.write();
        match inner.free.pop() {
            Some(index) => {
                let slot = &mut inner.generations[index as usize];
                *slot = slot.wrapping_add(1);
                EntityId::new(index, *slot)
            }
            None => {
                let index = inner.generations.len() as u32;
                inner.generations.push(0);
                EntityId::new(index, 0)
            }
        }
    }

    /// Make an entity visible under its id
    pub fn insert(&self, entity: Arc<dyn SoundEntity>) {
        let id = entity.id();
        self.inner.write().entities.insert(id.index(), entity);
    }

    /// Remove an entity; its id resolves to nothing from now on
    pub fn remove(&self, id: EntityId) -> Option<Arc<dyn SoundEntity>> {
        let mut inner = self.inner.write();
        let current = inner.entities.get(&id.index())?.id();
        if current != id {
            return None;
        }
        let removed = inner.entities.remove(&id.index());
        if (id.index() as usize) < inner.generations.len() {
            inner.free.push(id.index());
        }
        if inner.player == Some(id) {
            inner.player = None;
        }
        removed
    }

    pub fn set_local_player(&self, id: Option<EntityId>) {
        self.inner.write().player = id;
    }

    pub fn len(&self) -> usize {
        self.inner.read().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EntityDirectory for EntityRegistry {
    fn resolve(&self, id: EntityId) -> Option<Arc<dyn SoundEntity>> {
        let inner = self.inner.read();
        inner
            .entities
            .get(&id.index())
            .filter(|entity| entity.id() == id)
            .cloned()
    }

    fn local_player(&self) -> Option<Arc<dyn SoundEntity>> {
        let player = self.inner.read().player?;
        self.resolve(player)
    }
}
