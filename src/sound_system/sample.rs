//! Sound samples and library sounds
//!
//! A [`Sample`] is one encoded waveform plus what probing it revealed. A
//! [`LibrarySound`] groups the alternative samples performed under one name.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as ProbeError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::output::playback_decoder;
use super::volume::MAX_VOLUME;
use crate::error::{SoundError, SoundResult};

/// Format details detected from sample content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFormat {
    pub codec: &'static str,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub frames: Option<u64>,
    pub bits_per_sample: Option<u32>,
}

impl SampleFormat {
    /// Probe encoded bytes. The container is detected from content only.
    pub fn probe(data: Arc<[u8]>) -> Result<Self, ProbeError> {
        let source = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
        let probed = symphonia::default::get_probe().format(
            &Hint::new(),
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;

        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(ProbeError::Unsupported("no supported audio track"))?;
        let params = &track.codec_params;

        // Make sure a decoder exists for the codec
        let codecs = symphonia::default::get_codecs();
        codecs.make(params, &DecoderOptions::default())?;

        Ok(Self {
            codec: codecs
                .get_codec(params.codec)
                .map_or("unknown", |descriptor| descriptor.short_name),
            sample_rate: params.sample_rate,
            channels: params.channels.map(|c| c.count() as u16),
            frames: params.n_frames,
            bits_per_sample: params.bits_per_sample,
        })
    }

    /// Play length, zero when frame count or rate is unknown
    pub fn duration(&self) -> Duration {
        match (self.frames, self.sample_rate) {
            (Some(frames), Some(rate)) if rate > 0 => {
                Duration::from_millis((frames as f64 / rate as f64 * 1000.0) as u64)
            }
            _ => Duration::ZERO,
        }
    }
}

/// One playable waveform
#[derive(Debug, Clone)]
pub struct Sample {
    path: String,
    data: Arc<[u8]>,
    format: SampleFormat,
    equalization: u8,
}

impl Sample {
    /// Validate and probe raw archive bytes
    pub fn decode(path: &str, data: Arc<[u8]>, equalization: i32) -> SoundResult<Self> {
        if !(0..=MAX_VOLUME as i32).contains(&equalization) {
            return Err(SoundError::InvalidArgument(format!(
                "illegal loudness value {equalization} for {path}"
            )));
        }

        let format = SampleFormat::probe(Arc::clone(&data)).map_err(|e| SoundError::DecodeFailed {
            path: path.to_string(),
            source: Box::new(e),
        })?;

        // Approve only what the output can play
        playback_decoder(&data).map_err(|e| SoundError::DecodeFailed {
            path: path.to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            path: path.to_string(),
            data,
            format,
            equalization: equalization as u8,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Encoded bytes, shared with every other sample built from the same archive entry
    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    pub fn format(&self) -> &SampleFormat {
        &self.format
    }

    pub fn equalization(&self) -> u8 {
        self.equalization
    }

    pub fn max_length(&self) -> Duration {
        self.format.duration()
    }
}

/// A named sound performed by picking one of its samples at random
#[derive(Debug, Clone)]
pub struct LibrarySound {
    name: String,
    variants: Vec<Sample>,
    max_length: Duration,
}

impl LibrarySound {
    pub fn new(name: impl Into<String>, sample: Sample) -> Self {
        let max_length = sample.max_length();
        Self {
            name: name.into(),
            variants: vec![sample],
            max_length,
        }
    }

    /// Add an alternative sample, chosen with equal chance
    pub fn add_variant(&mut self, sample: Sample) {
        self.max_length = self.max_length.max(sample.max_length());
        self.variants.push(sample);
    }

    /// Pick the sample for one performance
    pub fn pick(&self) -> &Sample {
        if self.variants.len() == 1 {
            return &self.variants[0];
        }
        let index = rand::thread_rng().gen_range(0..self.variants.len());
        &self.variants[index]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[Sample] {
        &self.variants
    }

    /// Longest play length across all variants
    pub fn max_length(&self) -> Duration {
        self.max_length
    }
}
