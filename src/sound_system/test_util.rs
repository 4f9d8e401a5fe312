//! Builders for in-memory test clips, archives and stores

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::manifest::Manifest;
use super::store::{AssetStore, SampleArchive};

/// Mono 16-bit PCM WAV clip of `frames` frames
pub fn wav_clip(frames: u32, sample_rate: u32) -> Vec<u8> {
    let wav_spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, wav_spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = (t * 440.0 * std::f32::consts::TAU).sin() * 8000.0;
            writer.write_sample(sample as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Mono IMA-ADPCM WAV clip of `blocks` silent 256-byte blocks
pub fn adpcm_clip(blocks: u32) -> Vec<u8> {
    const BLOCK_ALIGN: u32 = 256;
    const FRAMES_PER_BLOCK: u32 = 505;
    let sample_rate = 8000u32;
    let data_len = blocks * BLOCK_ALIGN;

    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(4 + 28 + 12 + 8 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&20u32.to_le_bytes());
    out.extend_from_slice(&0x0011u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * BLOCK_ALIGN / FRAMES_PER_BLOCK).to_le_bytes());
    out.extend_from_slice(&(BLOCK_ALIGN as u16).to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&(FRAMES_PER_BLOCK as u16).to_le_bytes());

    out.extend_from_slice(b"fact");
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&(blocks * FRAMES_PER_BLOCK).to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    out
}

/// Zip archive holding the given entries
pub fn zip_bytes(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Asset store over an in-memory archive
pub fn memory_store(manifest: &str, entries: &[(&str, Vec<u8>)]) -> AssetStore {
    let archive = SampleArchive::from_reader("memory", Cursor::new(zip_bytes(entries))).unwrap();
    AssetStore::from_parts(Manifest::parse(manifest), archive)
}
