//! Recursive box-tree reading and track metadata decoding.
//!
//! The tree pass walks raw bytes into atoms: a 4-byte big-endian size
//! and 4-byte tag per box, with the extended 64-bit size and
//! to-end-of-span forms handled. Container tags recurse, leaves retain
//! their payload verbatim. A second pass decodes each trak subtree
//! into a [`Track`] and installs the back-references the box writer
//! uses to regenerate table payloads.

use super::atoms::{Atom, BoxKind, BoxTag};
use super::sample_table::SampleTables;
use super::track::{Codec, HandlerType, Track};
use crate::source::DataSource;
use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom};

/// Movie-level header fields, kept for mvhd regeneration on output.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Movie {
    pub time_scale: u32,
    pub duration: u64,
}

impl Default for Movie {
    fn default() -> Self {
        Self {
            time_scale: 1000,
            duration: 0,
        }
    }
}

/// Everything the parse pass produces besides the tree itself.
pub(crate) struct ParsedMovie {
    pub tracks: Vec<Track>,
    pub movie: Movie,
    pub video: Option<usize>,
    pub audio: Option<usize>,
}

/// Read the full atom tree from the source.
pub(crate) fn read_tree(source: &mut DataSource) -> Result<Atom> {
    let len = source.len()?;
    let mut root = Atom::root();
    read_span(source, 0, len, &mut root.children)?;
    Ok(root)
}

fn read_span(source: &mut DataSource, start: u64, end: u64, out: &mut Vec<Atom>) -> Result<()> {
    let mut pos = start;
    while pos < end {
        if end - pos < 8 {
            return Err(Error::invalid_mp4(format!(
                "truncated box header at offset {pos}"
            )));
        }
        source.seek(SeekFrom::Start(pos))?;
        let mut header = [0u8; 8];
        source.read_exact(&mut header)?;
        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let tag = BoxTag::from_bytes([header[4], header[5], header[6], header[7]]);

        let (box_size, header_size) = match size32 {
            1 => {
                // 64-bit extended size follows the tag
                let mut ext = [0u8; 8];
                source.read_exact(&mut ext)?;
                (u64::from_be_bytes(ext), 16u64)
            }
            0 => (end - pos, 8u64), // box extends to the end of the span
            s => (u64::from(s), 8u64),
        };

        if box_size < header_size {
            return Err(Error::invalid_mp4(format!(
                "box {tag} declares size {box_size} smaller than its own header"
            )));
        }
        let box_end = pos
            .checked_add(box_size)
            .filter(|&e| e <= end)
            .ok_or_else(|| {
                Error::invalid_mp4(format!(
                    "box {tag} at offset {pos} (size {box_size}) overruns its parent"
                ))
            })?;

        let data_start = pos + header_size;
        let atom = if tag.is_container() {
            let mut children = Vec::new();
            read_span(source, data_start, box_end, &mut children)?;
            Atom::container(tag, children)
        } else {
            let mut payload = vec![0u8; (box_end - data_start) as usize];
            source.seek(SeekFrom::Start(data_start))?;
            source.read_exact(&mut payload)?;
            Atom::leaf(tag, payload)
        };
        out.push(atom);
        pos = box_end;
    }
    Ok(())
}

/// Decode every trak subtree into a track, pick up the movie header,
/// and install track back-references on the leaves the writer
/// regenerates. Children are visited in file order, so the first video
/// and audio tracks win their slots.
pub(crate) fn parse_tracks(root: &mut Atom) -> Result<ParsedMovie> {
    let mut parsed = ParsedMovie {
        tracks: Vec::new(),
        movie: Movie::default(),
        video: None,
        audio: None,
    };

    let Some(moov) = root.child_mut(BoxTag::MOOV) else {
        return Ok(parsed);
    };

    for child in &mut moov.children {
        match child.tag {
            BoxTag::MVHD => {
                let (time_scale, duration) = decode_mvhd(&child.payload)?;
                parsed.movie = Movie {
                    time_scale,
                    duration,
                };
            }
            BoxTag::TRAK => {
                let track_index = parsed.tracks.len();
                let track = parse_trak(child, track_index)?;
                match track.handler {
                    HandlerType::Video if parsed.video.is_none() => {
                        parsed.video = Some(track_index);
                    }
                    HandlerType::Audio if parsed.audio.is_none() => {
                        parsed.audio = Some(track_index);
                    }
                    _ => {}
                }
                parsed.tracks.push(track);
            }
            _ => {}
        }
    }

    Ok(parsed)
}

fn parse_trak(trak: &mut Atom, track_index: usize) -> Result<Track> {
    let mut track = Track::new();

    if let Some(tkhd) = trak.child(BoxTag::TKHD) {
        let (width, height) = decode_tkhd(&tkhd.payload);
        track.width = width;
        track.height = height;
    }

    if let Some(mdia) = trak.child(BoxTag::MDIA) {
        if let Some(mdhd) = mdia.child(BoxTag::MDHD) {
            let (time_scale, duration) = decode_mdhd(&mdhd.payload)?;
            if time_scale == 0 {
                return Err(Error::invalid_mp4("media timescale is zero"));
            }
            track.time_scale = time_scale;
            track.duration = duration;
        }
        if let Some(hdlr) = mdia.child(BoxTag::HDLR) {
            track.handler = decode_hdlr(&hdlr.payload);
        }
        if let Some(stbl) = mdia
            .child(BoxTag::MINF)
            .and_then(|minf| minf.child(BoxTag::STBL))
        {
            let mut tables = SampleTables::default();
            for child in &stbl.children {
                match child.tag {
                    BoxTag::STSD => decode_stsd(&child.payload, &mut track)?,
                    BoxTag::STTS => tables.time_to_sample = decode_stts(&child.payload)?,
                    BoxTag::STSS => tables.sync_samples = decode_stss(&child.payload)?,
                    BoxTag::STSC => tables.sample_to_chunk = decode_stsc(&child.payload)?,
                    BoxTag::STSZ => {
                        let (uniform, sizes) = decode_stsz(&child.payload)?;
                        tables.uniform_size = uniform;
                        tables.sample_sizes = sizes;
                    }
                    BoxTag::STCO => tables.chunk_offsets = decode_stco(&child.payload)?,
                    BoxTag::CO64 => tables.chunk_offsets = decode_co64(&child.payload)?,
                    _ => {}
                }
            }
            track.tables = tables;
        }
    }

    track.index = track.tables.build_index(track.time_scale);
    validate_sync_samples(&track.tables.sync_samples, track.index.len())?;
    track.key_frames = track.tables.sync_samples.clone();

    link_table_leaves(trak, track_index);
    Ok(track)
}

/// Point the regenerated-on-write leaves of a trak subtree at their
/// owning track.
fn link_table_leaves(atom: &mut Atom, track_index: usize) {
    for child in &mut atom.children {
        match child.kind {
            BoxKind::TimeToSample
            | BoxKind::SampleToChunk
            | BoxKind::ChunkOffset
            | BoxKind::SampleSize
            | BoxKind::SyncSample
            | BoxKind::MediaHeader => child.track = Some(track_index),
            BoxKind::Container => link_table_leaves(child, track_index),
            _ => {}
        }
    }
}

fn validate_sync_samples(sync: &[u32], sample_count: usize) -> Result<()> {
    let mut prev = 0u32;
    for &ordinal in sync {
        if ordinal == 0 || ordinal as usize > sample_count {
            return Err(Error::invalid_mp4(format!(
                "sync sample {ordinal} out of range, track has {sample_count} samples"
            )));
        }
        if ordinal <= prev {
            return Err(Error::invalid_mp4(
                "sync sample table is not strictly increasing",
            ));
        }
        prev = ordinal;
    }
    Ok(())
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let b = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be_u64(data: &[u8], at: usize) -> Option<u64> {
    let b = data.get(at..at + 8)?;
    Some(u64::from_be_bytes([
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
    ]))
}

/// mvhd: movie timescale and duration, version 0 or 1 layouts.
fn decode_mvhd(data: &[u8]) -> Result<(u32, u64)> {
    let truncated = || Error::invalid_mp4("truncated mvhd box");
    let version = *data.first().ok_or_else(truncated)?;
    if version == 0 {
        Ok((
            be_u32(data, 12).ok_or_else(truncated)?,
            u64::from(be_u32(data, 16).ok_or_else(truncated)?),
        ))
    } else {
        Ok((
            be_u32(data, 20).ok_or_else(truncated)?,
            be_u64(data, 24).ok_or_else(truncated)?,
        ))
    }
}

/// mdhd: media timescale and duration, version 0 or 1 layouts.
fn decode_mdhd(data: &[u8]) -> Result<(u32, u64)> {
    let truncated = || Error::invalid_mp4("truncated mdhd box");
    let version = *data.first().ok_or_else(truncated)?;
    if version == 0 {
        Ok((
            be_u32(data, 12).ok_or_else(truncated)?,
            u64::from(be_u32(data, 16).ok_or_else(truncated)?),
        ))
    } else {
        Ok((
            be_u32(data, 20).ok_or_else(truncated)?,
            be_u64(data, 24).ok_or_else(truncated)?,
        ))
    }
}

/// tkhd: frame dimensions, stored as 16.16 fixed point.
fn decode_tkhd(data: &[u8]) -> (Option<u32>, Option<u32>) {
    let Some(&version) = data.first() else {
        return (None, None);
    };
    let (w_at, h_at) = if version == 0 { (76, 80) } else { (84, 88) };
    (
        be_u32(data, w_at).map(|w| w >> 16),
        be_u32(data, h_at).map(|h| h >> 16),
    )
}

/// hdlr: the handler code at payload offset 8.
fn decode_hdlr(data: &[u8]) -> HandlerType {
    match data.get(8..12) {
        Some(b) => HandlerType::from_bytes([b[0], b[1], b[2], b[3]]),
        None => HandlerType::Unknown([0; 4]),
    }
}

/// stsd: codec identity from the first sample entry, plus the codec
/// configuration child box (avcC/hvcC for video, esds for audio).
fn decode_stsd(data: &[u8], track: &mut Track) -> Result<()> {
    let entry_count = be_u32(data, 4).unwrap_or(0);
    if entry_count == 0 {
        return Ok(());
    }
    let Some(entry_tag) = data.get(12..16) else {
        return Err(Error::invalid_mp4("truncated stsd sample entry"));
    };

    track.codec = match entry_tag {
        b"avc1" => Codec::H264,
        b"mp4a" => Codec::Aac,
        other => Codec::Other([other[0], other[1], other[2], other[3]]),
    };

    if track.handler.is_video() {
        // Child boxes follow the 78-byte visual sample entry fields
        track.codec_data = find_child_box(data, 94, &[b"avcC", b"hvcC"]);
    } else if track.handler.is_audio() {
        // Child boxes follow the 28-byte audio sample entry fields;
        // the esds payload keeps its FullBox version/flags prefix
        track.codec_data = find_child_box(data, 44, &[b"esds"]);
    }

    Ok(())
}

/// Scan the length-prefixed child boxes of a sample entry starting at
/// `start`, returning the payload of the first box matching a tag.
fn find_child_box(data: &[u8], start: usize, tags: &[&[u8; 4]]) -> Option<Vec<u8>> {
    let mut pos = start;
    while pos + 8 <= data.len() {
        let size = be_u32(data, pos)? as usize;
        let tag = &data[pos + 4..pos + 8];
        if size < 8 || pos + size > data.len() {
            return None;
        }
        if tags.iter().any(|t| &t[..] == tag) {
            return Some(data[pos + 8..pos + size].to_vec());
        }
        pos += size;
    }
    None
}

/// Full-box entry count, validated against the payload length.
fn table_len(data: &[u8], tag: &str, entry_size: usize) -> Result<usize> {
    let count = be_u32(data, 4)
        .ok_or_else(|| Error::invalid_mp4(format!("truncated {tag} box")))? as usize;
    let need = count
        .checked_mul(entry_size)
        .and_then(|n| n.checked_add(8))
        .ok_or_else(|| Error::invalid_mp4(format!("{tag} entry count overflows")))?;
    if data.len() < need {
        return Err(Error::invalid_mp4(format!(
            "{tag} table truncated: {count} entries declared, {} bytes present",
            data.len()
        )));
    }
    Ok(count)
}

fn decode_stts(data: &[u8]) -> Result<Vec<(u32, u32)>> {
    let count = table_len(data, "stts", 8)?;
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let at = 8 + i * 8;
        entries.push((
            be_u32(data, at).unwrap_or(0),
            be_u32(data, at + 4).unwrap_or(0),
        ));
    }
    Ok(entries)
}

fn decode_stss(data: &[u8]) -> Result<Vec<u32>> {
    let count = table_len(data, "stss", 4)?;
    let mut samples = Vec::with_capacity(count);
    for i in 0..count {
        samples.push(be_u32(data, 8 + i * 4).unwrap_or(0));
    }
    Ok(samples)
}

fn decode_stsc(data: &[u8]) -> Result<Vec<(u32, u32, u32)>> {
    let count = table_len(data, "stsc", 12)?;
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let at = 8 + i * 12;
        entries.push((
            be_u32(data, at).unwrap_or(0),
            be_u32(data, at + 4).unwrap_or(0),
            be_u32(data, at + 8).unwrap_or(0),
        ));
    }
    Ok(entries)
}

fn decode_stsz(data: &[u8]) -> Result<(u32, Vec<u32>)> {
    let truncated = || Error::invalid_mp4("truncated stsz box");
    let uniform = be_u32(data, 4).ok_or_else(truncated)?;
    let count = be_u32(data, 8).ok_or_else(truncated)? as usize;
    if uniform != 0 {
        return Ok((uniform, Vec::new()));
    }
    let need = count
        .checked_mul(4)
        .and_then(|n| n.checked_add(12))
        .ok_or_else(|| Error::invalid_mp4("stsz entry count overflows"))?;
    if data.len() < need {
        return Err(Error::invalid_mp4(format!(
            "stsz table truncated: {count} entries declared, {} bytes present",
            data.len()
        )));
    }
    let mut sizes = Vec::with_capacity(count);
    for i in 0..count {
        sizes.push(be_u32(data, 12 + i * 4).unwrap_or(0));
    }
    Ok((0, sizes))
}

fn decode_stco(data: &[u8]) -> Result<Vec<u64>> {
    let count = table_len(data, "stco", 4)?;
    let mut offsets = Vec::with_capacity(count);
    for i in 0..count {
        offsets.push(u64::from(be_u32(data, 8 + i * 4).unwrap_or(0)));
    }
    Ok(offsets)
}

fn decode_co64(data: &[u8]) -> Result<Vec<u64>> {
    let count = table_len(data, "co64", 8)?;
    let mut offsets = Vec::with_capacity(count);
    for i in 0..count {
        offsets.push(be_u64(data, 8 + i * 8).unwrap_or(0));
    }
    Ok(offsets)
}
