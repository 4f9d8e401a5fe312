//! The sound system handle
//!
//! [`SoundSystem`] is cheap to clone and shared by everything that makes
//! noise. An engine that failed to initialize stays non-operative: every
//! playback call quietly returns `None`.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;

use super::cycle::{CyclePlan, CycleTable, MIN_CYCLE_PERIOD};
use super::entity::{EntityDirectory, EntityId, SoundEntity};
use super::geometry::{audible_falloff, Point, Rect};
use super::library::{LoadReport, SoundLibrary};
use super::output::{Mixer, PlaybackHandle, RodioMixer};
use super::store::AssetStore;
use super::volume::{check_volume_range, volume_to_db, AudioSettings};
use crate::config::SoundConfig;
use crate::error::{SoundError, SoundResult};

/// Everything that only exists while the engine is operative
struct Engine {
    library: SoundLibrary,
    mixer: Arc<dyn Mixer>,
    report: LoadReport,
}

pub(crate) struct Shared {
    engine: RwLock<Option<Arc<Engine>>>,
    settings: AudioSettings,
    cycles: CycleTable,
    entities: Arc<dyn EntityDirectory>,
}

/// Handle to the client sound engine
#[derive(Clone)]
pub struct SoundSystem {
    shared: Arc<Shared>,
}

impl SoundSystem {
    /// Open the default output device and load the library named by `config`
    pub fn initialize_default(config: &SoundConfig, entities: Arc<dyn EntityDirectory>) -> Self {
        match RodioMixer::open_default() {
            Ok(mixer) => Self::initialize(config, Arc::new(mixer), entities),
            Err(e) => {
                tracing::error!("Sound system disabled: {}", e);
                let system = Self::inoperative(entities);
                system.apply_config(config);
                system
            }
        }
    }

    /// Load the library named by `config` and play through `mixer`
    ///
    /// A missing manifest or unreadable archive leaves the engine
    /// non-operative; the failure is logged here and nowhere else.
    pub fn initialize(
        config: &SoundConfig,
        mixer: Arc<dyn Mixer>,
        entities: Arc<dyn EntityDirectory>,
    ) -> Self {
        let system = match AssetStore::open(config) {
            Ok(store) => Self::from_store(store, mixer, entities),
            Err(e) => {
                tracing::error!("Sound system disabled: {}", e);
                mixer.close();
                Self::inoperative(entities)
            }
        };
        system.apply_config(config);
        system
    }

    /// Build the engine from an already opened asset store
    pub fn from_store(
        store: AssetStore,
        mixer: Arc<dyn Mixer>,
        entities: Arc<dyn EntityDirectory>,
    ) -> Self {
        let location = store.archive().location().to_string();
        let (library, report) = SoundLibrary::build(store);

        tracing::info!(
            "Sound library from {}: {} samples approved, {} loaded, {} failed, {} library sounds",
            location,
            report.approved,
            report.loaded,
            report.failed,
            report.library_sounds
        );

        let engine = Engine {
            library,
            mixer,
            report,
        };
        Self::with_engine(Some(Arc::new(engine)), entities)
    }

    /// A system that never makes a sound
    pub fn inoperative(entities: Arc<dyn EntityDirectory>) -> Self {
        Self::with_engine(None, entities)
    }

    fn with_engine(engine: Option<Arc<Engine>>, entities: Arc<dyn EntityDirectory>) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine: RwLock::new(engine),
                settings: AudioSettings::new(),
                cycles: CycleTable::new(),
                entities,
            }),
        }
    }

    fn apply_config(&self, config: &SoundConfig) {
        self.set_volume(config.volume as i32);
        if config.mute {
            self.set_mute(true);
        }
    }

    pub(crate) fn upgrade(shared: &Weak<Shared>) -> Option<Self> {
        shared.upgrade().map(|shared| Self { shared })
    }

    pub(crate) fn entities(&self) -> &dyn EntityDirectory {
        self.shared.entities.as_ref()
    }

    pub(crate) fn cycles(&self) -> &CycleTable {
        &self.shared.cycles
    }

    fn engine(&self) -> Option<Arc<Engine>> {
        self.shared.engine.read().clone()
    }

    /// Play a library sound at a volume picked from `[vol_bot, vol_top]`
    ///
    /// `correction_db` is added to the line gain, e.g. for distance falloff.
    fn play_sound_intern(
        &self,
        name: &str,
        vol_bot: i32,
        vol_top: i32,
        correction_db: f32,
    ) -> SoundResult<Option<PlaybackHandle>> {
        if name.is_empty() || vol_bot == 0 {
            return Ok(None);
        }
        let Some(engine) = self.engine() else {
            return Ok(None);
        };
        if self.shared.settings.is_muted() {
            return Ok(None);
        }
        check_volume_range(vol_bot, vol_top).map_err(SoundError::InvalidArgument)?;

        let Some(sound) = engine.library.resolve(name) else {
            tracing::debug!("Unresolved sound: {}", name);
            return Ok(None);
        };
        let sample = sound.pick();
        let volume = rand::thread_rng().gen_range(vol_bot..=vol_top) as u8;

        let Some(line) = engine.mixer.open_line(sample) else {
            tracing::debug!("No audio line available for {}", sample.path());
            return Ok(None);
        };

        let gain = volume_to_db(volume)
            + volume_to_db(sample.equalization())
            + correction_db
            + self.shared.settings.line_delta_db();
        if !line.set_gain(gain) {
            tracing::debug!("Line for {} has no gain control", sample.path());
        }
        line.start();

        Ok(Some(PlaybackHandle::new(line)))
    }

    /// Play a library sound at a fixed volume (0-100)
    pub fn play_sound(&self, name: &str, volume: i32) -> SoundResult<Option<PlaybackHandle>> {
        self.play_sound_intern(name, volume, volume, 0.0)
    }

    /// Play a library sound at a random volume within `[vol_bot, vol_top]`
    pub fn play_sound_range(
        &self,
        name: &str,
        vol_bot: i32,
        vol_top: i32,
    ) -> SoundResult<Option<PlaybackHandle>> {
        self.play_sound_intern(name, vol_bot, vol_top, 0.0)
    }

    /// Play a library sound with a `chance` percent probability
    pub fn probable_play_sound(
        &self,
        chance: i32,
        name: &str,
        vol_bot: i32,
        vol_top: i32,
    ) -> SoundResult<Option<PlaybackHandle>> {
        if rand::thread_rng().gen_range(0..100) < chance {
            self.play_sound_intern(name, vol_bot, vol_top, 0.0)
        } else {
            Ok(None)
        }
    }

    /// Play a library sound located on the map
    ///
    /// The sound is heard only when `location` lies within the local player's
    /// hearing area and, if `audibility` is given, the player stands inside
    /// it. The volume falls off with the distance to the player.
    pub fn play_map_sound(
        &self,
        location: Point,
        audibility: Option<Rect>,
        name: &str,
        vol_bot: i32,
        vol_top: i32,
        chance: i32,
    ) -> SoundResult<Option<PlaybackHandle>> {
        if chance < 0 {
            return Err(SoundError::InvalidArgument(format!("chance < 0: {chance}")));
        }
        if chance < 100 && rand::thread_rng().gen_range(0..100) >= chance {
            return Ok(None);
        }

        let Some(player) = self.shared.entities.local_player() else {
            return Ok(None);
        };
        let Some(hearing) = player.hearing_area() else {
            return Ok(None);
        };
        let Some(falloff) = audible_falloff(location, player.position(), hearing, audibility)
        else {
            return Ok(None);
        };

        self.play_sound_intern(name, vol_bot, vol_top, volume_to_db(falloff))
    }

    /// Let `entity` perform a library sound, through its own playback rules
    pub fn play_entity_sound(
        &self,
        entity: &dyn SoundEntity,
        name: &str,
        vol_bot: i32,
        vol_top: i32,
        chance: i32,
    ) -> SoundResult<Option<PlaybackHandle>> {
        entity.play_sound(self, name, vol_bot, vol_top, chance)
    }

    /// Start a repeating performance of `token` bound to `entity`
    ///
    /// Replaces any cycle already running for the entity. The wait between
    /// performances is random below `period` but never shorter than the
    /// sound itself.
    pub fn start_sound_cycle(
        &self,
        entity: &dyn SoundEntity,
        token: &str,
        period: Duration,
        vol_bot: i32,
        vol_top: i32,
        chance: i32,
    ) -> SoundResult<()> {
        if token.is_empty() {
            return Err(SoundError::InvalidArgument("empty sound cycle token".to_string()));
        }
        if period < MIN_CYCLE_PERIOD {
            return Err(SoundError::InvalidArgument(format!(
                "sound cycle period < {}ms: {}ms",
                MIN_CYCLE_PERIOD.as_millis(),
                period.as_millis()
            )));
        }
        check_volume_range(vol_bot, vol_top).map_err(SoundError::InvalidArgument)?;
        if chance < 0 {
            return Err(SoundError::InvalidArgument(format!("chance < 0: {chance}")));
        }

        let Some(engine) = self.engine() else {
            return Ok(());
        };
        let sound = engine
            .library
            .resolve(token)
            .ok_or_else(|| SoundError::NotFound(token.to_string()))?;

        let plan = CyclePlan {
            entity: entity.id(),
            token: token.to_string(),
            period,
            vol_bot,
            vol_top,
            chance,
            min_wait: sound.max_length(),
        };
        self.shared.cycles.start(plan, Arc::downgrade(&self.shared))?;

        tracing::debug!("Started sound cycle {} for entity {}", token, entity.id());
        Ok(())
    }

    /// Stop the sound cycle of an entity; does nothing if there is none
    pub fn stop_sound_cycle(&self, entity: EntityId) {
        if self.shared.cycles.stop(entity) {
            tracing::debug!("Stopped sound cycle for entity {}", entity);
        }
    }

    /// Whether `name` is a library sound
    pub fn contains(&self, name: &str) -> bool {
        self.engine()
            .is_some_and(|engine| engine.library.contains(name))
    }

    pub fn set_mute(&self, mute: bool) {
        tracing::info!("Sound {}", if mute { "muted" } else { "unmuted" });
        self.shared.settings.set_mute(mute);
    }

    pub fn mute(&self) -> bool {
        self.shared.settings.is_muted()
    }

    /// Set the system volume; values outside 0-100 are clamped
    ///
    /// Goes to the mixer's master gain when the device has one, otherwise it
    /// is added to the gain of every line opened afterwards.
    pub fn set_volume(&self, volume: i32) {
        let volume = self.shared.settings.set_volume(volume);
        let db = volume_to_db(volume);

        let on_master = self
            .engine()
            .is_some_and(|engine| engine.mixer.set_master_gain(db));
        if on_master {
            self.shared.settings.set_line_delta_db(0.0);
        } else {
            self.shared.settings.set_line_delta_db(db);
        }
        tracing::debug!("System volume set to {} ({:.2} dB)", volume, db);
    }

    pub fn volume(&self) -> u8 {
        self.shared.settings.volume()
    }

    /// Whether initialization succeeded and `shutdown` has not been called
    pub fn is_operative(&self) -> bool {
        self.shared.engine.read().is_some()
    }

    pub fn load_report(&self) -> Option<LoadReport> {
        self.engine().map(|engine| engine.report)
    }

    /// Number of library sounds, loaded or deferred
    pub fn library_size(&self) -> usize {
        self.engine().map_or(0, |engine| engine.library.len())
    }

    pub fn cycle_count(&self) -> usize {
        self.shared.cycles.len()
    }

    pub fn has_cycle(&self, entity: EntityId) -> bool {
        self.shared.cycles.contains(entity)
    }

    /// Stop every cycle, close the archive and release the output device
    pub fn shutdown(&self) {
        self.shared.cycles.shutdown();

        let engine = self.shared.engine.write().take();
        if let Some(engine) = engine {
            engine.library.close();
            engine.mixer.close();
            tracing::info!("Sound system shut down");
        }
    }
}
