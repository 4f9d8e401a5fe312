//! Decibel-domain volume handling
//!
//! Volumes are relative percentages (0-100). They are mixed by adding their
//! decibel values, looked up from a table built once per process.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::OnceLock;

/// Decibel value of volume 0
pub const SILENCE_DB: f32 = f32::NEG_INFINITY;

/// Highest relative volume
pub const MAX_VOLUME: u8 = 100;

static DB_TABLE: OnceLock<[f32; 101]> = OnceLock::new();

/// Volume -> decibel lookup table, `table[v] = 20·log10(v/100)`
pub fn db_table() -> &'static [f32; 101] {
    DB_TABLE.get_or_init(|| {
        let mut table = [SILENCE_DB; 101];
        for (volume, slot) in table.iter_mut().enumerate().skip(1) {
            *slot = (20.0 * (volume as f64 / 100.0).log10()) as f32;
        }
        table
    })
}

/// Decibel value of a relative volume; values above 100 are treated as 100
pub fn volume_to_db(volume: u8) -> f32 {
    db_table()[volume.min(MAX_VOLUME) as usize]
}

/// Linear amplitude factor for a decibel gain
pub fn db_to_amplitude(db: f32) -> f32 {
    if db == SILENCE_DB {
        return 0.0;
    }
    10f32.powf(db / 20.0)
}

/// Validates a requested `[vol_bot, vol_top]` volume range
pub fn check_volume_range(vol_bot: i32, vol_top: i32) -> Result<(), String> {
    let max = MAX_VOLUME as i32;
    if vol_bot < 0 || vol_bot > max || vol_top < 0 || vol_top > max || vol_top < vol_bot {
        return Err(format!("bad volume setting: {vol_bot}..{vol_top}"));
    }
    Ok(())
}

/// Engine-wide volume and mute settings
///
/// Written from the UI thread and read by every playback call, including
/// the sound cycle workers, so all fields are atomics.
#[derive(Debug)]
pub struct AudioSettings {
    volume: AtomicU8,
    mute: AtomicBool,
    /// System volume in dB applied to each line when the mixer has no master gain
    line_delta_bits: AtomicU32,
}

impl AudioSettings {
    pub fn new() -> Self {
        Self {
            volume: AtomicU8::new(MAX_VOLUME),
            mute: AtomicBool::new(false),
            line_delta_bits: AtomicU32::new(0f32.to_bits()),
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Acquire)
    }

    /// Store a clamped volume and return the value actually stored
    pub fn set_volume(&self, volume: i32) -> u8 {
        let clamped = volume.clamp(0, MAX_VOLUME as i32) as u8;
        self.volume.store(clamped, Ordering::Release);
        clamped
    }

    pub fn is_muted(&self) -> bool {
        self.mute.load(Ordering::Acquire)
    }

    pub fn set_mute(&self, mute: bool) {
        self.mute.store(mute, Ordering::Release);
    }

    pub fn line_delta_db(&self) -> f32 {
        f32::from_bits(self.line_delta_bits.load(Ordering::Acquire))
    }

    pub fn set_line_delta_db(&self, db: f32) {
        self.line_delta_bits.store(db.to_bits(), Ordering::Release);
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self::new()
    }
}
