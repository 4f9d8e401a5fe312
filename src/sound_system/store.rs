//! Asset store: the manifest plus the sample archive it points to

use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use zip::result::ZipError;
use zip::ZipArchive;

use super::manifest::Manifest;
use crate::config::SoundConfig;
use crate::error::{SoundError, SoundResult};

/// Reader an archive can be opened over
pub trait ArchiveReader: Read + Seek + Send {}

impl<T: Read + Seek + Send> ArchiveReader for T {}

/// Random-access package of named, independently retrievable samples
///
/// Backed by a zip (jar) file. Entries are read fully into memory on demand.
pub struct SampleArchive {
    location: String,
    zip: Mutex<Option<ZipArchive<Box<dyn ArchiveReader>>>>,
}

impl SampleArchive {
    /// Open an archive file
    pub fn open(path: &Path) -> SoundResult<Self> {
        let file = File::open(path).map_err(|e| SoundError::ArchiveOpen {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        Self::from_reader(path.display().to_string(), BufReader::new(file))
    }

    /// Open an archive from any seekable reader, e.g. an in-memory buffer
    pub fn from_reader(
        location: impl Into<String>,
        reader: impl ArchiveReader + 'static,
    ) -> SoundResult<Self> {
        let location = location.into();
        let reader: Box<dyn ArchiveReader> = Box::new(reader);
        let zip = ZipArchive::new(reader).map_err(|e| SoundError::ArchiveOpen {
            path: location.clone(),
            source: Box::new(e),
        })?;

        tracing::debug!("Opened sound archive {} ({} entries)", location, zip.len());

        Ok(Self {
            location,
            zip: Mutex::new(Some(zip)),
        })
    }

    /// Read the named entry fully into memory
    pub fn fetch_raw(&self, entry: &str) -> io::Result<Arc<[u8]>> {
        let mut guard = self.zip.lock();
        let zip = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "sound archive is closed"))?;

        let mut file = match zip.by_name(entry) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("missing archive entry: {entry}"),
                ))
            }
            Err(ZipError::Io(e)) => return Err(e),
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        };

        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(data.into())
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.zip
            .lock()
            .as_ref()
            .is_some_and(|zip| zip.index_for_name(entry).is_some())
    }

    pub fn len(&self) -> usize {
        self.zip.lock().as_ref().map_or(0, |zip| zip.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Release the archive; later fetches fail
    pub fn close(&self) {
        if self.zip.lock().take().is_some() {
            tracing::debug!("Closed sound archive {}", self.location);
        }
    }
}

/// Manifest plus sample archive
pub struct AssetStore {
    manifest: Manifest,
    archive: SampleArchive,
}

impl AssetStore {
    /// Open the manifest named by `config` and the archive its `soundbase` names
    pub fn open(config: &SoundConfig) -> SoundResult<Self> {
        let manifest = Manifest::load(&config.manifest_file())?;
        let archive_path = config.resource_dir.join(manifest.soundbase());
        let archive = SampleArchive::open(&archive_path)?;
        Ok(Self::from_parts(manifest, archive))
    }

    pub fn from_parts(manifest: Manifest, archive: SampleArchive) -> Self {
        Self { manifest, archive }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn fetch_raw(&self, path: &str) -> io::Result<Arc<[u8]>> {
        self.archive.fetch_raw(path)
    }

    pub fn archive(&self) -> &SampleArchive {
        &self.archive
    }

    pub fn close(&self) {
        self.archive.close();
    }
}
