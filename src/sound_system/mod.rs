pub mod cycle;
pub mod entity;
pub mod geometry;
pub mod library;
pub mod manifest;
pub mod output;
pub mod sample;
pub mod store;
pub mod system;
/// Sound system module
///
/// Plays the game's short sound effects:
/// - Library sounds loaded from a manifest and a jar archive
/// - Volume ranges, equalization and distance falloff in decibels
/// - Map sounds gated by the local player's hearing area
/// - Per-entity background sound cycles
///
/// ## Architecture
///
/// ```text
/// SoundSystem
///   ├── SoundLibrary
///   │     └── AssetStore (manifest + SampleArchive)
///   ├── Mixer (RodioMixer / HeadlessMixer)
///   │     └── Line per performance
///   ├── AudioSettings (volume, mute)
///   └── CycleTable
///         └── SoundCycle per entity ── EntityDirectory
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// use stendhal_sound::{NoEntities, SoundConfig, SoundSystem};
///
/// let config = SoundConfig::with_resource_dir("/opt/stendhal");
/// let sounds = SoundSystem::initialize_default(&config, Arc::new(NoEntities));
///
/// // Fixed volume
/// sounds.play_sound("chirp", 80)?;
///
/// // Random volume, 30 percent of the time
/// sounds.probable_play_sound(30, "bark", 40, 60)?;
///
/// sounds.shutdown();
/// ```
pub mod volume;

#[cfg(test)]
pub(crate) mod test_util;

// Re-export commonly used types
pub use cycle::MIN_CYCLE_PERIOD;
pub use entity::{EntityDirectory, EntityId, EntityRegistry, NoEntities, SoundEntity};
pub use geometry::{Point, Rect};
pub use library::LoadReport;
pub use output::{HeadlessLine, HeadlessMixer, Line, Mixer, PlaybackHandle, RodioMixer};
pub use sample::{LibrarySound, Sample};
pub use store::AssetStore;
pub use system::SoundSystem;
