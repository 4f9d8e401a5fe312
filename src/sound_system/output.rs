//! Audio output: mixers hand out playback lines
//!
//! [`RodioMixer`] drives the system output device. [`HeadlessMixer`] accepts
//! every line without producing sound, for headless clients and tests.

use std::fmt;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use rodio::decoder::DecoderError;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use super::sample::Sample;
use super::volume::db_to_amplitude;
use crate::error::{SoundError, SoundResult};

/// A hardware playback line carrying one performance
pub trait Line: Send + Sync {
    /// Apply a gain in decibels. Returns false when the line has no gain control.
    fn set_gain(&self, db: f32) -> bool;

    /// Begin playback without waiting for it to finish
    fn start(&self);

    /// Stop playback and release the line
    fn stop(&self);

    /// Whether the line is still playing
    fn is_active(&self) -> bool;
}

/// Host audio mixer
pub trait Mixer: Send + Sync {
    /// Open a line able to play `sample`, or `None` when the device cannot
    fn open_line(&self, sample: &Sample) -> Option<Arc<dyn Line>>;

    /// Set the device master gain. Returns false when there is no master gain control.
    fn set_master_gain(&self, _db: f32) -> bool {
        false
    }

    /// Release the device
    fn close(&self) {}
}

/// Decoder that plays encoded sample bytes on a [`RodioMixer`]
///
/// Samples are validated through this same decoder when the library is built.
pub fn playback_decoder(data: &Arc<[u8]>) -> Result<Decoder<Cursor<Arc<[u8]>>>, DecoderError> {
    Decoder::new(Cursor::new(Arc::clone(data)))
}

/// Handle to a live performance
#[derive(Clone)]
pub struct PlaybackHandle {
    line: Arc<dyn Line>,
}

impl PlaybackHandle {
    pub fn new(line: Arc<dyn Line>) -> Self {
        Self { line }
    }

    pub fn stop(&self) {
        self.line.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.line.is_active()
    }
}

impl fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("playing", &self.is_playing())
            .finish()
    }
}

/// Line backed by a rodio sink
struct RodioLine {
    sink: Sink,
}

impl Line for RodioLine {
    fn set_gain(&self, db: f32) -> bool {
        self.sink.set_volume(db_to_amplitude(db));
        true
    }

    fn start(&self) {
        self.sink.play();
    }

    fn stop(&self) {
        self.sink.stop();
    }

    fn is_active(&self) -> bool {
        !self.sink.empty()
    }
}

/// Mixer on the system's default output device
///
/// The rodio output stream lives on a dedicated thread for the lifetime of
/// the mixer; lines only need the stream handle.
pub struct RodioMixer {
    stream_handle: OutputStreamHandle,
    lines: Mutex<Vec<Arc<RodioLine>>>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    device_thread: Mutex<Option<JoinHandle<()>>>,
}

impl RodioMixer {
    /// Open the default output device
    pub fn open_default() -> SoundResult<Self> {
        let (ready_tx, ready_rx) = bounded::<Result<OutputStreamHandle, String>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let device_thread = thread::Builder::new()
            .name("sound-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    if ready_tx.send(Ok(handle)).is_err() {
                        return;
                    }
                    // Keep the stream open until close() or drop
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    tracing::debug!("Audio output stream released");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })?;

        let stream_handle = match ready_rx.recv() {
            Ok(Ok(handle)) => handle,
            Ok(Err(message)) => {
                let _ = device_thread.join();
                return Err(SoundError::NoOutputDevice(message));
            }
            Err(_) => {
                let _ = device_thread.join();
                return Err(SoundError::NoOutputDevice("audio output thread exited".to_string()));
            }
        };

        tracing::info!("Audio output device opened");

        Ok(Self {
            stream_handle,
            lines: Mutex::new(Vec::new()),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            device_thread: Mutex::new(Some(device_thread)),
        })
    }

    /// Number of lines still playing
    pub fn active_lines(&self) -> usize {
        let mut lines = self.lines.lock();
        lines.retain(|line| line.is_active());
        lines.len()
    }
}

impl Mixer for RodioMixer {
    fn open_line(&self, sample: &Sample) -> Option<Arc<dyn Line>> {
        let source = match playback_decoder(sample.data()) {
            Ok(source) => source,
            Err(e) => {
                tracing::debug!("No line format for {}: {}", sample.path(), e);
                return None;
            }
        };

        let sink = match Sink::try_new(&self.stream_handle) {
            Ok(sink) => sink,
            Err(e) => {
                tracing::debug!("Clip line unavailable for {}: {}", sample.path(), e);
                return None;
            }
        };
        sink.pause();
        sink.append(source);

        let line = Arc::new(RodioLine { sink });

        // Finished lines are released here; a dropped sink stops playing
        let mut lines = self.lines.lock();
        lines.retain(|line| line.is_active());
        lines.push(Arc::clone(&line));

        Some(line)
    }

    fn close(&self) {
        for line in self.lines.lock().drain(..) {
            line.stop();
        }
        drop(self.shutdown_tx.lock().take());
        if let Some(thread) = self.device_thread.lock().take() {
            let _ = thread.join();
        }
    }
}

impl Drop for RodioMixer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Line of the [`HeadlessMixer`]; plays until stopped
#[derive(Debug)]
pub struct HeadlessLine {
    sample_path: String,
    gain_control: bool,
    gain_db: Mutex<Option<f32>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl HeadlessLine {
    pub fn sample_path(&self) -> &str {
        &self.sample_path
    }

    /// Gain applied through the line's gain control, if any
    pub fn gain_db(&self) -> Option<f32> {
        *self.gain_db.lock()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Line for HeadlessLine {
    fn set_gain(&self, db: f32) -> bool {
        if self.gain_control {
            *self.gain_db.lock() = Some(db);
        }
        self.gain_control
    }

    fn start(&self) {
        self.started.store(true, Ordering::Release);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.is_started() && !self.is_stopped()
    }
}

/// Mixer without a device; records every line it opens
#[derive(Debug)]
pub struct HeadlessMixer {
    lines: Mutex<Vec<Arc<HeadlessLine>>>,
    master_gain: Option<Mutex<f32>>,
    line_gain_control: bool,
    refuse_lines: AtomicBool,
}

impl HeadlessMixer {
    /// Mixer whose lines have gain controls but which has no master gain
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            master_gain: None,
            line_gain_control: true,
            refuse_lines: AtomicBool::new(false),
        }
    }

    pub fn with_master_gain(mut self) -> Self {
        self.master_gain = Some(Mutex::new(0.0));
        self
    }

    pub fn without_line_gain(mut self) -> Self {
        self.line_gain_control = false;
        self
    }

    /// Simulate a device that has no matching line free
    pub fn set_refuse_lines(&self, refuse: bool) {
        self.refuse_lines.store(refuse, Ordering::Release);
    }

    /// Every line opened so far, oldest first
    pub fn lines(&self) -> Vec<Arc<HeadlessLine>> {
        self.lines.lock().clone()
    }

    pub fn master_gain_db(&self) -> Option<f32> {
        self.master_gain.as_ref().map(|gain| *gain.lock())
    }
}

impl Default for HeadlessMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer for HeadlessMixer {
    fn open_line(&self, sample: &Sample) -> Option<Arc<dyn Line>> {
        if self.refuse_lines.load(Ordering::Acquire) {
            return None;
        }

        let line = Arc::new(HeadlessLine {
            sample_path: sample.path().to_string(),
            gain_control: self.line_gain_control,
            gain_db: Mutex::new(None),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        });
        self.lines.lock().push(Arc::clone(&line));
        Some(line)
    }

    fn set_master_gain(&self, db: f32) -> bool {
        match &self.master_gain {
            Some(gain) => {
                *gain.lock() = db;
                true
            }
            None => false,
        }
    }

    fn close(&self) {
        for line in self.lines.lock().iter() {
            line.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound_system::test_util::wav_clip;

    fn sample() -> Sample {
        Sample::decode("bird.wav", wav_clip(800, 8000).into(), 100).unwrap()
    }

    #[test]
    fn test_headless_line_lifecycle() {
        let mixer = HeadlessMixer::new();
        let line = mixer.open_line(&sample()).unwrap();
        let handle = PlaybackHandle::new(line);

        assert!(!handle.is_playing());
        mixer.lines()[0].start();
        assert!(handle.is_playing());
        handle.stop();
        assert!(!handle.is_playing());
        assert!(mixer.lines()[0].is_stopped());
    }

    #[test]
    fn test_headless_gain_controls() {
        let mixer = HeadlessMixer::new().without_line_gain();
        let line = mixer.open_line(&sample()).unwrap();
        assert!(!line.set_gain(-3.0));
        assert_eq!(mixer.lines()[0].gain_db(), None);
        assert!(!mixer.set_master_gain(-1.0));

        let mixer = HeadlessMixer::new().with_master_gain();
        assert!(mixer.set_master_gain(-1.5));
        assert_eq!(mixer.master_gain_db(), Some(-1.5));
    }

    #[test]
    fn test_refused_lines() {
        let mixer = HeadlessMixer::new();
        mixer.set_refuse_lines(true);
        assert!(mixer.open_line(&sample()).is_none());
        assert!(mixer.lines().is_empty());
    }

    #[test]
    fn test_close_stops_lines() {
        let mixer = HeadlessMixer::new();
        let line = mixer.open_line(&sample()).unwrap();
        line.start();
        mixer.close();
        assert!(!line.is_active());
    }
}
