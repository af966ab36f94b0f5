//! Box-tree serialization with regenerated sample tables.
//!
//! The writer mirrors the parsed tree exactly: containers wrap the
//! recursively written output of their children behind a patched size
//! prefix, and leaves dispatch on their resolved [`BoxKind`]. Sample
//! table and header boxes are rebuilt from the owning track (pending
//! tables if an edit installed them, the parsed originals otherwise),
//! so a track edit propagates into valid output without hand-patching
//! offsets. Every other leaf is copied back verbatim.

use bytes::{BufMut, BytesMut};

use super::atoms::{Atom, BoxKind, BoxTag};
use super::reader::Movie;
use super::sample_table::SampleTables;
use super::track::Track;
use crate::{Error, Result};

pub(crate) struct TreeWriter<'a> {
    tracks: &'a [Track],
    movie: Movie,
}

impl<'a> TreeWriter<'a> {
    pub fn new(tracks: &'a [Track], movie: Movie) -> Self {
        Self { tracks, movie }
    }

    /// Serialize the synthetic root: its children concatenated with no
    /// wrapper of their own.
    pub fn write_tree(&self, buf: &mut BytesMut, root: &Atom) -> Result<()> {
        for child in &root.children {
            self.write_atom(buf, child)?;
        }
        Ok(())
    }

    fn write_atom(&self, buf: &mut BytesMut, atom: &Atom) -> Result<()> {
        if atom.kind == BoxKind::Container {
            let start = buf.len();
            buf.put_u32(0); // patched once the children are in
            buf.put_slice(&atom.tag.0);
            for child in &atom.children {
                self.write_atom(buf, child)?;
            }
            return patch_size(buf, start, atom.tag);
        }

        let track = atom.track.and_then(|i| self.tracks.get(i));
        match (atom.kind, track) {
            (BoxKind::TimeToSample, Some(t)) => {
                write_stts(buf, &t.output_tables().time_to_sample);
            }
            (BoxKind::SampleToChunk, Some(t)) => {
                write_stsc(buf, &t.output_tables().sample_to_chunk);
            }
            (BoxKind::ChunkOffset, Some(t)) => {
                write_chunk_offsets(buf, &t.output_tables().chunk_offsets);
            }
            (BoxKind::SampleSize, Some(t)) => {
                write_stsz(buf, t.output_tables());
            }
            (BoxKind::SyncSample, Some(t)) => {
                // An all-key-frame track carries no sync table at all
                let sync = &t.output_tables().sync_samples;
                if !sync.is_empty() {
                    write_stss(buf, sync);
                }
            }
            (BoxKind::MediaHeader, Some(t)) => {
                write_mdhd(buf, t.time_scale, t.duration);
            }
            (BoxKind::MovieHeader, _) => {
                write_mvhd(buf, self.movie, self.tracks.len() as u32 + 1);
            }
            // A table leaf outside any trak keeps its original bytes
            _ => write_verbatim(buf, atom),
        }
        Ok(())
    }
}

/// Back-patch a container's size prefix after its children are
/// written. A size field that cannot represent the content is fatal.
fn patch_size(buf: &mut BytesMut, start: usize, tag: BoxTag) -> Result<()> {
    let size = buf.len() - start;
    let size32 = u32::try_from(size)
        .map_err(|_| Error::invalid_mp4(format!("box {tag} too large to serialize")))?;
    buf[start..start + 4].copy_from_slice(&size32.to_be_bytes());
    Ok(())
}

fn write_verbatim(buf: &mut BytesMut, atom: &Atom) {
    let total = 8 + atom.payload.len() as u64;
    if total > u64::from(u32::MAX) {
        // Extended size form: size field 1, 64-bit size after the tag
        buf.put_u32(1);
        buf.put_slice(&atom.tag.0);
        buf.put_u64(total + 8);
    } else {
        buf.put_u32(total as u32);
        buf.put_slice(&atom.tag.0);
    }
    buf.put_slice(&atom.payload);
}

fn write_stts(buf: &mut BytesMut, entries: &[(u32, u32)]) {
    buf.put_u32((16 + entries.len() * 8) as u32);
    buf.put_slice(b"stts");
    buf.put_u32(0); // version/flags
    buf.put_u32(entries.len() as u32);
    for &(count, delta) in entries {
        buf.put_u32(count);
        buf.put_u32(delta);
    }
}

fn write_stsc(buf: &mut BytesMut, entries: &[(u32, u32, u32)]) {
    buf.put_u32((16 + entries.len() * 12) as u32);
    buf.put_slice(b"stsc");
    buf.put_u32(0); // version/flags
    buf.put_u32(entries.len() as u32);
    for &(first_chunk, samples_per_chunk, desc_index) in entries {
        buf.put_u32(first_chunk);
        buf.put_u32(samples_per_chunk);
        buf.put_u32(desc_index);
    }
}

/// stco when every offset fits 32 bits, co64 otherwise.
fn write_chunk_offsets(buf: &mut BytesMut, offsets: &[u64]) {
    if offsets.iter().all(|&o| o <= u64::from(u32::MAX)) {
        buf.put_u32((16 + offsets.len() * 4) as u32);
        buf.put_slice(b"stco");
        buf.put_u32(0); // version/flags
        buf.put_u32(offsets.len() as u32);
        for &offset in offsets {
            buf.put_u32(offset as u32);
        }
    } else {
        buf.put_u32((16 + offsets.len() * 8) as u32);
        buf.put_slice(b"co64");
        buf.put_u32(0); // version/flags
        buf.put_u32(offsets.len() as u32);
        for &offset in offsets {
            buf.put_u64(offset);
        }
    }
}

fn write_stsz(buf: &mut BytesMut, tables: &SampleTables) {
    if tables.uniform_size > 0 {
        buf.put_u32(20);
        buf.put_slice(b"stsz");
        buf.put_u32(0); // version/flags
        buf.put_u32(tables.uniform_size);
        buf.put_u32(tables.sample_count());
    } else {
        buf.put_u32((20 + tables.sample_sizes.len() * 4) as u32);
        buf.put_slice(b"stsz");
        buf.put_u32(0); // version/flags
        buf.put_u32(0); // per-sample sizes follow
        buf.put_u32(tables.sample_sizes.len() as u32);
        for &size in &tables.sample_sizes {
            buf.put_u32(size);
        }
    }
}

fn write_stss(buf: &mut BytesMut, sync_samples: &[u32]) {
    buf.put_u32((16 + sync_samples.len() * 4) as u32);
    buf.put_slice(b"stss");
    buf.put_u32(0); // version/flags
    buf.put_u32(sync_samples.len() as u32);
    for &sample in sync_samples {
        buf.put_u32(sample);
    }
}

fn write_mdhd(buf: &mut BytesMut, time_scale: u32, duration: u64) {
    if let Ok(dur32) = u32::try_from(duration) {
        buf.put_u32(32); // version 0
        buf.put_slice(b"mdhd");
        buf.put_u32(0); // version/flags
        buf.put_u32(0); // creation time
        buf.put_u32(0); // modification time
        buf.put_u32(time_scale);
        buf.put_u32(dur32);
        buf.put_u16(0x55C4); // language: und
        buf.put_u16(0); // pre_defined
    } else {
        buf.put_u32(44); // version 1
        buf.put_slice(b"mdhd");
        buf.put_u32(0x0100_0000); // version 1, flags
        buf.put_u64(0); // creation time
        buf.put_u64(0); // modification time
        buf.put_u32(time_scale);
        buf.put_u64(duration);
        buf.put_u16(0x55C4); // language: und
        buf.put_u16(0); // pre_defined
    }
}

fn write_mvhd(buf: &mut BytesMut, movie: Movie, next_track_id: u32) {
    let v1 = u32::try_from(movie.duration).is_err();
    buf.put_u32(if v1 { 120 } else { 108 });
    buf.put_slice(b"mvhd");
    if v1 {
        buf.put_u32(0x0100_0000); // version 1, flags
        buf.put_u64(0); // creation time
        buf.put_u64(0); // modification time
        buf.put_u32(movie.time_scale);
        buf.put_u64(movie.duration);
    } else {
        buf.put_u32(0); // version/flags
        buf.put_u32(0); // creation time
        buf.put_u32(0); // modification time
        buf.put_u32(movie.time_scale);
        buf.put_u32(movie.duration as u32);
    }
    buf.put_u32(0x0001_0000); // rate = 1.0
    buf.put_u16(0x0100); // volume = 1.0
    buf.put_u16(0); // reserved
    buf.put_u64(0); // reserved
    // Matrix (identity)
    buf.put_u32(0x0001_0000);
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_u32(0x0001_0000);
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_u32(0x4000_0000);
    // Pre-defined (6 * 4 bytes)
    for _ in 0..6 {
        buf.put_u32(0);
    }
    buf.put_u32(next_track_id);
}
