//! Sound library: library sound names to playable sounds
//!
//! Eager manifest entries are decoded while the library is built. Suppressed
//! entries keep only their archive path and are decoded on first use.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::sample::{LibrarySound, Sample};
use super::store::AssetStore;

#[derive(Debug, Clone)]
enum LibraryEntry {
    Loaded(Arc<LibrarySound>),
    Deferred {
        path: String,
        equalization: i32,
        /// a load was attempted and failed
        failed: bool,
    },
}

/// Outcome of building the library
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Samples that were decoded and validated
    pub approved: usize,
    /// Samples kept in memory
    pub loaded: usize,
    /// Samples missing from the archive or corrupt
    pub failed: usize,
    /// Distinct library sounds, loaded or deferred
    pub library_sounds: usize,
}

pub struct SoundLibrary {
    entries: RwLock<HashMap<String, LibraryEntry>>,
    store: AssetStore,
}

impl SoundLibrary {
    /// Build the library from every `sfx.` entry of the store's manifest
    pub fn build(store: AssetStore) -> (Self, LoadReport) {
        let mut entries: HashMap<String, LibraryEntry> = HashMap::with_capacity(256);
        // raw bytes by archive path, fetched once
        let mut raw_data: HashMap<String, Arc<[u8]>> = HashMap::new();
        let mut report = LoadReport::default();

        for entry in store.manifest().entries() {
            let name = entry.library_name().to_string();

            let joins_loaded = matches!(entries.get(&name), Some(LibraryEntry::Loaded(_)));
            if !entry.eager && !joins_loaded {
                entries.insert(
                    name,
                    LibraryEntry::Deferred {
                        path: entry.path,
                        equalization: entry.equalization,
                        failed: false,
                    },
                );
                continue;
            }

            let data = match raw_data.get(&entry.path) {
                Some(data) => Arc::clone(data),
                None => match store.fetch_raw(&entry.path) {
                    Ok(data) => data,
                    Err(e) => {
                        tracing::warn!("Missing sound: {}={} ({})", entry.name, entry.path, e);
                        report.failed += 1;
                        continue;
                    }
                },
            };

            let sample = match Sample::decode(&entry.path, Arc::clone(&data), entry.equalization) {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::warn!("Corrupted sound: {}={} ({})", entry.name, entry.path, e);
                    report.failed += 1;
                    continue;
                }
            };
            report.approved += 1;

            match entries.remove(&name) {
                Some(LibraryEntry::Loaded(mut sound)) => {
                    Arc::make_mut(&mut sound).add_variant(sample);
                    entries.insert(name, LibraryEntry::Loaded(sound));
                }
                Some(LibraryEntry::Deferred {
                    path, equalization, ..
                }) => {
                    // the eager variant pulls its deferred sibling in with it
                    let merged = match Self::load_deferred(&store, &name, &path, equalization, false) {
                        Some(mut loaded) => {
                            loaded.add_variant(sample);
                            loaded
                        }
                        None => LibrarySound::new(name.clone(), sample),
                    };
                    entries.insert(name, LibraryEntry::Loaded(Arc::new(merged)));
                }
                None => {
                    let sound = LibrarySound::new(name.clone(), sample);
                    entries.insert(name, LibraryEntry::Loaded(Arc::new(sound)));
                }
            }

            raw_data.insert(entry.path, data);
            report.loaded += 1;
        }

        report.library_sounds = entries.len();

        let library = Self {
            entries: RwLock::new(entries),
            store,
        };
        (library, report)
    }

    /// Look up a sound, decoding and caching a deferred entry on first use
    pub fn resolve(&self, name: &str) -> Option<Arc<LibrarySound>> {
        let (path, equalization, failed) = match self.entries.read().get(name)? {
            LibraryEntry::Loaded(sound) => return Some(Arc::clone(sound)),
            LibraryEntry::Deferred {
                path,
                equalization,
                failed,
            } => (path.clone(), *equalization, *failed),
        };

        tracing::debug!("Loading deferred sound from archive: {}", name);
        let Some(sound) = Self::load_deferred(&self.store, name, &path, equalization, failed) else {
            if let Some(LibraryEntry::Deferred { failed, .. }) = self.entries.write().get_mut(name) {
                *failed = true;
            }
            return None;
        };
        let sound = Arc::new(sound);

        let mut entries = self.entries.write();
        match entries.get(name) {
            // another caller finished loading first
            Some(LibraryEntry::Loaded(existing)) => Some(Arc::clone(existing)),
            _ => {
                entries.insert(name.to_string(), LibraryEntry::Loaded(Arc::clone(&sound)));
                Some(sound)
            }
        }
    }

    /// Fetch and decode a deferred entry; `quiet` after an earlier failure
    fn load_deferred(
        store: &AssetStore,
        name: &str,
        path: &str,
        equalization: i32,
        quiet: bool,
    ) -> Option<LibrarySound> {
        let result = store
            .fetch_raw(path)
            .map_err(|e| ("Missing", e.to_string()))
            .and_then(|data| {
                Sample::decode(path, data, equalization).map_err(|e| ("Corrupted", e.to_string()))
            });

        match result {
            Ok(sample) => Some(LibrarySound::new(name, sample)),
            Err((kind, reason)) if quiet => {
                tracing::debug!("{} sound again: {}={} ({})", kind, name, path, reason);
                None
            }
            Err((kind, reason)) => {
                tracing::warn!("{} sound: {}={} ({})", kind, name, path, reason);
                None
            }
        }
    }

    /// Whether `name` is a library sound; never triggers loading
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Whether `name` is decoded and held in memory
    pub fn is_loaded(&self, name: &str) -> bool {
        matches!(self.entries.read().get(name), Some(LibraryEntry::Loaded(_)))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the underlying archive
    pub fn close(&self) {
        self.store.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound_system::output::playback_decoder;
    use crate::sound_system::test_util::{memory_store, wav_clip};
    use std::collections::HashSet;

    #[test]
    fn test_eager_entries_load_at_startup() {
        let store = memory_store(
            "sfx.chirp=bird.wav,,80\nsfx.door=door.wav\n",
            &[("bird.wav", wav_clip(800, 8000)), ("door.wav", wav_clip(400, 8000))],
        );
        let (library, report) = SoundLibrary::build(store);

        assert_eq!(
            report,
            LoadReport {
                approved: 2,
                loaded: 2,
                failed: 0,
                library_sounds: 2
            }
        );
        assert!(library.is_loaded("chirp"));
        let chirp = library.resolve("chirp").unwrap();
        assert_eq!(chirp.variants()[0].equalization(), 80);
    }

    #[test]
    fn test_missing_and_corrupt_samples_are_skipped() {
        let store = memory_store(
            "sfx.chirp=bird.wav\nsfx.gone=gone.wav\nsfx.noise=noise.wav\n",
            &[("bird.wav", wav_clip(800, 8000)), ("noise.wav", b"garbage".to_vec())],
        );
        let (library, report) = SoundLibrary::build(store);

        assert_eq!(report.failed, 2);
        assert_eq!(report.loaded, 1);
        assert!(library.contains("chirp"));
        assert!(!library.contains("gone"));
        assert!(!library.contains("noise"));
    }

    #[test]
    fn test_deferred_entry_loads_on_first_resolve() {
        let store = memory_store("sfx.storm=storm.wav,x,60\n", &[("storm.wav", wav_clip(800, 8000))]);
        let (library, report) = SoundLibrary::build(store);

        assert_eq!(report.loaded, 0);
        assert_eq!(report.library_sounds, 1);
        assert!(library.contains("storm"));
        assert!(!library.is_loaded("storm"));

        let storm = library.resolve("storm").unwrap();
        assert_eq!(storm.variants()[0].equalization(), 60);
        assert!(library.is_loaded("storm"));
    }

    #[test]
    fn test_broken_deferred_entry_stays_unresolved() {
        let store = memory_store("sfx.storm=storm.wav,x\n", &[("other.wav", wav_clip(80, 8000))]);
        let (library, _) = SoundLibrary::build(store);

        assert!(library.contains("storm"));
        assert!(library.resolve("storm").is_none());
        assert!(!library.is_loaded("storm"));
        assert!(library.resolve("unknown").is_none());
    }

    #[test]
    fn test_failed_deferred_entry_is_remembered() {
        let store = memory_store("sfx.storm=storm.wav,x\n", &[("storm.wav", b"noise".to_vec())]);
        let (library, _) = SoundLibrary::build(store);

        let failed = |library: &SoundLibrary| {
            matches!(
                library.entries.read().get("storm"),
                Some(LibraryEntry::Deferred { failed: true, .. })
            )
        };
        assert!(!failed(&library));

        assert!(library.resolve("storm").is_none());
        assert!(failed(&library));
        // still retried, and still a library sound
        assert!(library.resolve("storm").is_none());
        assert!(library.contains("storm"));
    }

    #[test]
    fn test_unplayable_sample_not_approved() {
        let mut odd = wav_clip(800, 8000);
        odd[20..22].copy_from_slice(&0x7fffu16.to_le_bytes());
        let store = memory_store(
            "sfx.chirp=bird.wav\nsfx.odd=odd.wav\n",
            &[("bird.wav", wav_clip(800, 8000)), ("odd.wav", odd)],
        );
        let (library, report) = SoundLibrary::build(store);

        assert_eq!(report.approved, 1);
        assert_eq!(report.failed, 1);
        assert!(!library.contains("odd"));
        for sample in library.resolve("chirp").unwrap().variants() {
            assert!(playback_decoder(sample.data()).is_ok());
        }
    }

    #[test]
    fn test_sub_extension_entries_become_variants() {
        let store = memory_store(
            "sfx.chirp=bird.wav\nsfx.chirp.2=bird2.wav\n",
            &[("bird.wav", wav_clip(800, 8000)), ("bird2.wav", wav_clip(1600, 8000))],
        );
        let (library, report) = SoundLibrary::build(store);
        assert_eq!(report.library_sounds, 1);

        let chirp = library.resolve("chirp").unwrap();
        assert_eq!(chirp.variants().len(), 2);

        let paths: HashSet<_> = (0..200).map(|_| chirp.pick().path().to_string()).collect();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_shared_path_fetched_once() {
        let store = memory_store(
            "sfx.chirp=bird.wav\nsfx.tweet=bird.wav,,50\n",
            &[("bird.wav", wav_clip(800, 8000))],
        );
        let (library, _) = SoundLibrary::build(store);

        let chirp = library.resolve("chirp").unwrap();
        let tweet = library.resolve("tweet").unwrap();
        assert!(Arc::ptr_eq(chirp.variants()[0].data(), tweet.variants()[0].data()));
        assert_eq!(tweet.variants()[0].equalization(), 50);
    }

    #[test]
    fn test_eager_variant_joins_deferred_sound() {
        let store = memory_store(
            "sfx.chirp=bird.wav,x\nsfx.chirp.2=bird2.wav\n",
            &[("bird.wav", wav_clip(800, 8000)), ("bird2.wav", wav_clip(800, 8000))],
        );
        let (library, _) = SoundLibrary::build(store);

        assert!(library.is_loaded("chirp"));
        assert_eq!(library.resolve("chirp").unwrap().variants().len(), 2);
    }
}
