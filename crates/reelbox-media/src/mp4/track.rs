//! Per-track state: codec identity, timing, sample index and cursor.

use super::sample_table::{IndexEntry, SampleTables};

/// Codec identity of a track's elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    H264,
    Aac,
    /// Sample entry type this engine does not decode further.
    Other([u8; 4]),
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::H264 => write!(f, "h264"),
            Self::Aac => write!(f, "aac"),
            Self::Other(tag) => write!(f, "{}", std::str::from_utf8(tag).unwrap_or("????")),
        }
    }
}

/// Handler type for a track, from the hdlr box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerType {
    Video,
    Audio,
    Unknown([u8; 4]),
}

impl HandlerType {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        match &bytes {
            b"vide" => Self::Video,
            b"soun" => Self::Audio,
            _ => Self::Unknown(bytes),
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

/// One timed stream within the container.
///
/// Created once at parse time and owned by the container. The cursor is
/// the current read position into `index`, in `[0, index.len()]`; equal
/// to the length means the track is exhausted. `key_frames` holds
/// strictly increasing 1-based ordinals into `index`. `pending`
/// overrides the parsed tables at write time and is populated only by
/// an edit path, never during playback reads.
#[derive(Debug, Clone)]
pub struct Track {
    pub codec: Codec,
    pub handler: HandlerType,
    /// Media timescale in ticks per second.
    pub time_scale: u32,
    /// Track duration in native ticks.
    pub duration: u64,
    /// Sample index, ordered by position.
    pub index: Vec<IndexEntry>,
    /// Key-frame ordinals, 1-based into `index`.
    pub key_frames: Vec<u32>,
    /// Current read position into `index`.
    pub cursor: usize,
    /// Raw tables as parsed from the file.
    pub tables: SampleTables,
    /// Rebuilt tables for re-serialization, if edited.
    pub pending: Option<SampleTables>,
    /// Frame width from tkhd, video tracks only.
    pub width: Option<u32>,
    /// Frame height from tkhd, video tracks only.
    pub height: Option<u32>,
    /// Codec configuration payload (avcC or esds contents).
    pub codec_data: Option<Vec<u8>>,
}

impl Track {
    /// Empty track awaiting parse.
    pub fn new() -> Self {
        Self {
            codec: Codec::Other([0; 4]),
            handler: HandlerType::Unknown([0; 4]),
            time_scale: 1,
            duration: 0,
            index: Vec::new(),
            key_frames: Vec::new(),
            cursor: 0,
            tables: SampleTables::default(),
            pending: None,
            width: None,
            height: None,
            codec_data: None,
        }
    }

    /// Track duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.time_scale == 0 {
            0.0
        } else {
            self.duration as f64 / f64::from(self.time_scale)
        }
    }

    /// Entry at the cursor, or `None` when the track is exhausted.
    pub fn current_entry(&self) -> Option<&IndexEntry> {
        self.index.get(self.cursor)
    }

    /// Whether the cursor has consumed the whole index.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.index.len()
    }

    /// Install rebuilt tables for the next serialization.
    pub fn set_pending_tables(&mut self, tables: SampleTables) {
        self.pending = Some(tables);
    }

    /// Tables the writer should emit: pending if installed, else the
    /// parsed originals.
    pub fn output_tables(&self) -> &SampleTables {
        self.pending.as_ref().unwrap_or(&self.tables)
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}
