//! Client sound engine for the Stendhal game
//!
//! Loads the sound library from a properties manifest and a jar archive,
//! plays library sounds with volume, equalization and distance falloff,
//! and runs background sound cycles for map entities.

pub mod config;
pub mod error;
pub mod sound_system;

pub use config::SoundConfig;
pub use error::{AppResult, ConfigError, SoundError, SoundResult};
pub use sound_system::{
    EntityDirectory, EntityId, EntityRegistry, HeadlessMixer, LoadReport, Mixer, NoEntities,
    PlaybackHandle, Point, Rect, RodioMixer, SoundEntity, SoundSystem,
};
