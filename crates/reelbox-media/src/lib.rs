//! Reelbox-Media: MP4 container parsing, seeking, packet demux and remux
//!
//! This crate implements a box-structured container engine for MPEG-4
//! style files: it parses the hierarchical atom tree, builds per-track
//! sample indexes, answers time-based seeks, interleaves packets from
//! multiple tracks in timeline order, and can re-serialize a possibly
//! edited atom tree with regenerated sample tables.
//!
//! # Modules
//!
//! - `mp4` - atom tree, sample indexes, seek engine, demuxer, box writer
//! - `source` - file-backed and in-memory data sources
//! - `error` - error types
//!
//! # Architecture
//!
//! Opening a file parses the full atom tree eagerly, then decodes each
//! `trak` subtree into a [`mp4::Track`] whose sample index is resolved
//! from the raw stts/stsc/stco/stsz/stss tables. Playback-style access
//! goes through two paths:
//!
//! 1. [`Mp4::seek_key`] snaps the video cursor to the preceding key
//!    frame and the audio cursor to the preceding sample.
//! 2. [`Mp4::read_dur`] advances the timeline, merging packets from all
//!    tracks in ascending position order.
//!
//! Re-serialization mirrors the parsed tree and regenerates the sample
//! table and header boxes from the owning track, so edits to a track's
//! tables propagate into valid output without hand-patching offsets.

pub mod error;
pub mod mp4;
pub mod source;

pub use error::{Error, Result};
pub use mp4::{Mp4, Packet};
pub use source::DataSource;
