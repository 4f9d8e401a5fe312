//! Sound manifest
//!
//! A properties-style text file. `sfx.NAME` keys declare library sounds as
//! `archivePath[,loadFlag][,equalization]`; `soundbase` names the archive.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{SoundError, SoundResult};

/// Archive location used when the manifest has no `soundbase` key
pub const DEFAULT_SOUNDBASE: &str = "sounds/stensounds0.jar";

const SFX_PREFIX: &str = "sfx.";
const DEFAULT_EQUALIZATION: i32 = 100;

/// One `sfx.` declaration of the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Declared name, including any sub-extension (`chirp.2`)
    pub name: String,
    /// Path of the sample inside the archive
    pub path: String,
    /// Decode at startup instead of on first use
    pub eager: bool,
    /// Relative loudness of the sample, nominally 0-100
    pub equalization: i32,
}

impl ManifestEntry {
    /// Parses the value of an `sfx.NAME` key
    pub fn parse(name: &str, value: &str) -> Self {
        let (path, eager) = match value.split_once(',') {
            Some((path, rest)) => (path, !rest.starts_with('x')),
            None => (value, true),
        };

        let equalization = value
            .rsplit_once(',')
            .and_then(|(_, tail)| tail.parse::<i32>().ok())
            .unwrap_or(DEFAULT_EQUALIZATION);

        Self {
            name: name.to_string(),
            path: path.trim().to_string(),
            // variants (names with a sub-extension) are always loaded
            eager: eager || name.contains('.'),
            equalization,
        }
    }

    /// Library sound this entry belongs to; `chirp.2` joins `chirp`
    pub fn library_name(&self) -> &str {
        match self.name.split_once('.') {
            Some((base, _)) => base,
            None => &self.name,
        }
    }
}

/// Parsed manifest, keys kept in file order
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    properties: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl Manifest {
    /// Load a manifest file
    pub fn load(path: &Path) -> SoundResult<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SoundError::ManifestNotFound {
                path: path.display().to_string(),
            }),
            Err(e) => Err(SoundError::ManifestRead {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    /// Parse manifest text. Later duplicates of a key replace earlier ones.
    pub fn parse(text: &str) -> Self {
        let mut manifest = Manifest::default();

        for line in logical_lines(text) {
            let (key, value) = split_property(&line);
            if key.is_empty() {
                continue;
            }
            match manifest.index.get(key) {
                Some(&pos) => manifest.properties[pos].1 = value.to_string(),
                None => {
                    manifest.index.insert(key.to_string(), manifest.properties.len());
                    manifest.properties.push((key.to_string(), value.to_string()));
                }
            }
        }

        manifest
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&pos| self.properties[pos].1.as_str())
    }

    /// Archive location relative to the resource directory
    pub fn soundbase(&self) -> &str {
        self.property("soundbase").unwrap_or(DEFAULT_SOUNDBASE)
    }

    /// All sound declarations in file order
    pub fn entries(&self) -> impl Iterator<Item = ManifestEntry> + '_ {
        self.properties.iter().filter_map(|(key, value)| {
            let name = key.strip_prefix(SFX_PREFIX)?;
            if name.is_empty() {
                tracing::warn!("Ignoring nameless sound declaration: {}={}", key, value);
                return None;
            }
            Some(ManifestEntry::parse(name, value))
        })
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Joins backslash-continued lines and drops blanks and comments
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();

    for raw in text.lines() {
        let line = if pending.is_empty() {
            raw.trim_start()
        } else {
            raw.trim()
        };
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }

        let continued = line.ends_with('\\') && !line.ends_with("\\\\");
        if continued {
            pending.push_str(&line[..line.len() - 1]);
        } else {
            pending.push_str(line);
            lines.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        lines.push(pending);
    }

    lines
}

/// Splits at the first `=`, `:` or whitespace separator
fn split_property(line: &str) -> (&str, &str) {
    match line.find(|c: char| c == '=' || c == ':' || c.is_whitespace()) {
        Some(pos) => {
            let key = line[..pos].trim_end();
            let mut value = line[pos..].trim_start();
            if let Some(rest) = value.strip_prefix(['=', ':']) {
                value = rest.trim_start();
            }
            (key, value.trim_end())
        }
        None => (line, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_defaults() {
        let entry = ManifestEntry::parse("chirp", "bird.wav");
        assert_eq!(entry.path, "bird.wav");
        assert!(entry.eager);
        assert_eq!(entry.equalization, 100);
        assert_eq!(entry.library_name(), "chirp");
    }

    #[test]
    fn test_entry_with_empty_flag_and_equalization() {
        let entry = ManifestEntry::parse("chirp", "bird.wav,,80");
        assert_eq!(entry.path, "bird.wav");
        assert!(entry.eager);
        assert_eq!(entry.equalization, 80);
    }

    #[test]
    fn test_padded_equalization_falls_back_to_default() {
        let entry = ManifestEntry::parse("chirp", "bird.wav,, 80");
        assert_eq!(entry.equalization, 100);

        let entry = ManifestEntry::parse("chirp", "bird.wav,,80a");
        assert_eq!(entry.equalization, 100);
    }

    #[test]
    fn test_entry_suppressed() {
        let entry = ManifestEntry::parse("thunder", "storm/thunder.ogg,x,60");
        assert_eq!(entry.path, "storm/thunder.ogg");
        assert!(!entry.eager);
        assert_eq!(entry.equalization, 60);

        // a bare flag is not an equalization value
        let entry = ManifestEntry::parse("thunder", "storm/thunder.ogg,x");
        assert!(!entry.eager);
        assert_eq!(entry.equalization, 100);
    }

    #[test]
    fn test_sub_extension_forces_load() {
        let entry = ManifestEntry::parse("chirp.2", "bird2.wav,x");
        assert!(entry.eager);
        assert_eq!(entry.library_name(), "chirp");
    }

    #[test]
    fn test_parse_manifest() {
        let text = "\
# sound definitions
soundbase = sounds/test.jar

sfx.chirp=bird.wav,,80
sfx.chirp.2 : bird2.wav
! another comment
sfx.door=door.wav,x
sfx.long=a\\
    long.wav
unrelated=value
";
        let manifest = Manifest::parse(text);
        assert_eq!(manifest.soundbase(), "sounds/test.jar");
        assert_eq!(manifest.property("unrelated"), Some("value"));

        let entries: Vec<_> = manifest.entries().collect();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["chirp", "chirp.2", "door", "long"]);
        assert_eq!(entries[1].path, "bird2.wav");
        assert_eq!(entries[3].path, "along.wav");
    }

    #[test]
    fn test_default_soundbase_and_duplicates() {
        let manifest = Manifest::parse("sfx.a=one.wav\nsfx.a=two.wav\n");
        assert_eq!(manifest.soundbase(), DEFAULT_SOUNDBASE);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.entries().next().unwrap().path, "two.wav");
    }

    #[test]
    fn test_missing_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Manifest::load(&dir.path().join("absent.properties"));
        assert!(matches!(result, Err(SoundError::ManifestNotFound { .. })));
    }
}
