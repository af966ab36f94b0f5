//! MP4 container engine.
//!
//! [`Mp4`] owns the parsed atom tree, the track set and the data
//! source. Opening is eager: the whole tree and every track parse up
//! front, and construction fails if no video track is present. Timed
//! reads and key-frame seeks go through the per-track sample indexes;
//! serialization walks the tree and regenerates the table boxes.

mod atoms;
mod demux;
mod reader;
mod sample_table;
mod seek;
mod track;
mod writer;

pub use atoms::{Atom, BoxKind, BoxTag};
pub use demux::Packet;
pub use sample_table::{IndexEntry, SampleTables};
pub use seek::seek;
pub use track::{Codec, HandlerType, Track};

use crate::source::DataSource;
use crate::{Error, Result};
use bytes::BytesMut;
use reader::Movie;
use std::io::Write;
use std::path::Path;

/// A parsed MP4 container.
///
/// Not safe for concurrent mutation: seeks and timed reads advance
/// per-track cursors with no internal locking, so a shared instance
/// must be externally serialized.
#[derive(Debug)]
pub struct Mp4 {
    root: Atom,
    tracks: Vec<Track>,
    video: usize,
    audio: Option<usize>,
    source: DataSource,
    /// Current playback position in seconds.
    position: f64,
    /// Total duration in seconds, from the video track.
    duration: f64,
    movie: Movie,
}

impl Mp4 {
    /// Open a container from a file path.
    ///
    /// The file handle is owned by the container and released by
    /// [`Mp4::close`] (or drop).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_source(DataSource::open(path)?)
    }

    /// Open a container from an in-memory buffer.
    pub fn from_buffer(buf: Vec<u8>) -> Result<Self> {
        Self::from_source(DataSource::from_buffer(buf))
    }

    fn from_source(mut source: DataSource) -> Result<Self> {
        let mut root = reader::read_tree(&mut source)?;
        let parsed = reader::parse_tracks(&mut root)?;

        let video = parsed.video.ok_or(Error::NoVideoTrack)?;
        let vtrk = &parsed.tracks[video];
        let duration = vtrk.duration as f64 / f64::from(vtrk.time_scale);

        tracing::debug!(
            tracks = parsed.tracks.len(),
            has_audio = parsed.audio.is_some(),
            duration,
            "parsed container"
        );

        Ok(Self {
            root,
            tracks: parsed.tracks,
            video,
            audio: parsed.audio,
            source,
            position: 0.0,
            duration,
            movie: parsed.movie,
        })
    }

    /// Total duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Current playback position in seconds.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Video frame dimensions, when the track header carried them.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let video = self.video_track();
        Some((video.width?, video.height?))
    }

    /// Video codec configuration payload (avcC/hvcC contents).
    pub fn video_config(&self) -> Option<&[u8]> {
        self.video_track().codec_data.as_deref()
    }

    /// Audio codec configuration payload (esds contents).
    pub fn audio_config(&self) -> Option<&[u8]> {
        self.audio_track()?.codec_data.as_deref()
    }

    /// All parsed tracks, in file order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Mutable track access, for installing pending tables before a
    /// rewrite.
    pub fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    /// The distinguished video track.
    pub fn video_track(&self) -> &Track {
        &self.tracks[self.video]
    }

    /// The audio track, if one was parsed.
    pub fn audio_track(&self) -> Option<&Track> {
        self.audio.map(|i| &self.tracks[i])
    }

    /// Diagnostic pre-order dump of the box tree.
    pub fn dump(&self) -> String {
        self.root.dump()
    }

    /// Snap the playback position to `pos` seconds.
    ///
    /// The video cursor lands on the nearest preceding key frame and
    /// the audio cursor on the nearest preceding sample; the position
    /// becomes the snapped video key-frame time so the next timed read
    /// starts at a decodable point.
    pub fn seek_key(&mut self, pos: f64) {
        let i = seek::seek(&mut self.tracks[self.video], pos, true);
        let snapped = self.tracks[self.video]
            .index
            .get(i)
            .map(|e| e.position)
            .unwrap_or(pos);
        tracing::debug!(requested = pos, snapped, "seek video");

        if let Some(ai) = self.audio {
            let j = seek::seek(&mut self.tracks[ai], pos, false);
            tracing::debug!(
                requested = pos,
                landed = self.tracks[ai].index.get(j).map(|e| e.position),
                "seek audio"
            );
        }

        self.position = snapped;
    }

    /// Read packets for the next `dur` seconds of timeline.
    ///
    /// Packets from the video and audio tracks interleave in ascending
    /// position order; the playback position advances to the last
    /// consumed packet (or the window bound when the window held
    /// nothing), so repeated calls walk the timeline without overlap.
    pub fn read_dur(&mut self, dur: f64) -> Result<Vec<Packet>> {
        let end = self.position + dur;
        let mut order = vec![self.video];
        if let Some(ai) = self.audio {
            order.push(ai);
        }

        let (packets, reached) =
            demux::read_until(&mut self.source, &mut self.tracks, &order, end)?;
        tracing::debug!(count = packets.len(), end, reached, "timed read");

        self.position = reached;
        Ok(packets)
    }

    /// Serialize the current tree, regenerating table and header boxes
    /// from the tracks (pending tables included, once installed).
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<()> {
        let mut buf = BytesMut::with_capacity(4096);
        writer::TreeWriter::new(&self.tracks, self.movie).write_tree(&mut buf, &self.root)?;
        sink.write_all(&buf)?;
        Ok(())
    }

    /// Release the data source.
    ///
    /// Consuming the container guarantees a file-backed source closes
    /// exactly once; buffer-backed sources have nothing to release.
    pub fn close(self) -> Result<()> {
        self.source.close()
    }
}
