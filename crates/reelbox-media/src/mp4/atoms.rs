//! MP4 atom tree definitions.

/// Four-character box type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxTag(pub [u8; 4]);

impl BoxTag {
    /// Synthetic root tag; never appears in a file.
    pub const ROOT: Self = Self([0; 4]);

    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const TRAK: Self = Self(*b"trak");
    pub const TKHD: Self = Self(*b"tkhd");
    pub const EDTS: Self = Self(*b"edts");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MDHD: Self = Self(*b"mdhd");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const MINF: Self = Self(*b"minf");
    pub const DINF: Self = Self(*b"dinf");
    pub const STBL: Self = Self(*b"stbl");
    pub const STSD: Self = Self(*b"stsd");
    pub const STTS: Self = Self(*b"stts");
    pub const STSS: Self = Self(*b"stss");
    pub const STSC: Self = Self(*b"stsc");
    pub const STSZ: Self = Self(*b"stsz");
    pub const STCO: Self = Self(*b"stco");
    pub const CO64: Self = Self(*b"co64");
    pub const CTTS: Self = Self(*b"ctts");
    pub const UDTA: Self = Self(*b"udta");
    pub const FREE: Self = Self(*b"free");
    pub const SKIP: Self = Self(*b"skip");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Whether this tag encloses child boxes rather than a payload.
    pub fn is_container(&self) -> bool {
        matches!(
            *self,
            Self::MOOV
                | Self::TRAK
                | Self::EDTS
                | Self::MDIA
                | Self::MINF
                | Self::DINF
                | Self::STBL
                | Self::UDTA
        )
    }
}

impl std::fmt::Display for BoxTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Writer dispatch for a box, resolved once when the tree is built.
///
/// The tag set is closed: table and header boxes are regenerated from
/// the owning track on output, everything else is either a container or
/// copied back verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    /// Encloses child boxes; emitted as a wrapper around them.
    Container,
    /// stts, regenerated from the track's duration runs.
    TimeToSample,
    /// stsc, regenerated from the track's chunk-run layout.
    SampleToChunk,
    /// stco/co64, regenerated from the track's chunk offsets.
    ChunkOffset,
    /// stsz, regenerated from the track's sample sizes.
    SampleSize,
    /// stss, regenerated from the track's key-frame list; omitted when
    /// the list is empty.
    SyncSample,
    /// mdhd, regenerated from the track's timescale and duration.
    MediaHeader,
    /// mvhd, regenerated from the movie timescale and duration.
    MovieHeader,
    /// Any other leaf; payload copied back unchanged.
    Verbatim,
}

impl BoxKind {
    /// Resolve the dispatch for a tag.
    pub fn resolve(tag: BoxTag) -> Self {
        if tag.is_container() {
            return Self::Container;
        }
        match tag {
            BoxTag::STTS => Self::TimeToSample,
            BoxTag::STSC => Self::SampleToChunk,
            BoxTag::STCO | BoxTag::CO64 => Self::ChunkOffset,
            BoxTag::STSZ => Self::SampleSize,
            BoxTag::STSS => Self::SyncSample,
            BoxTag::MDHD => Self::MediaHeader,
            BoxTag::MVHD => Self::MovieHeader,
            _ => Self::Verbatim,
        }
    }
}

/// One node of the atom tree.
///
/// Exactly one of `payload` or `children` is populated: leaves retain
/// their raw bytes, containers hold their children in file order. The
/// synthetic root is a container with the null tag. `track` is a
/// back-reference into the container's track list for the leaves whose
/// payload is regenerated at write time; it is an index, never an
/// owning edge.
#[derive(Debug, Clone)]
pub struct Atom {
    pub tag: BoxTag,
    pub kind: BoxKind,
    pub payload: Vec<u8>,
    pub children: Vec<Atom>,
    pub track: Option<usize>,
}

impl Atom {
    /// The synthetic root enclosing the file's top-level boxes.
    pub fn root() -> Self {
        Self {
            tag: BoxTag::ROOT,
            kind: BoxKind::Container,
            payload: Vec::new(),
            children: Vec::new(),
            track: None,
        }
    }

    /// A leaf box retaining its raw payload.
    pub fn leaf(tag: BoxTag, payload: Vec<u8>) -> Self {
        Self {
            tag,
            kind: BoxKind::resolve(tag),
            payload,
            children: Vec::new(),
            track: None,
        }
    }

    /// A container box wrapping already-parsed children.
    pub fn container(tag: BoxTag, children: Vec<Atom>) -> Self {
        Self {
            tag,
            kind: BoxKind::Container,
            payload: Vec::new(),
            children,
            track: None,
        }
    }

    /// Whether this is the synthetic root.
    pub fn is_root(&self) -> bool {
        self.tag == BoxTag::ROOT
    }

    /// Find the first direct child with the given tag.
    pub fn child(&self, tag: BoxTag) -> Option<&Atom> {
        self.children.iter().find(|a| a.tag == tag)
    }

    /// Find the first direct child with the given tag, mutably.
    pub fn child_mut(&mut self, tag: BoxTag) -> Option<&mut Atom> {
        self.children.iter_mut().find(|a| a.tag == tag)
    }

    /// Render the tree pre-order, one tag per line, two-space indent
    /// per depth. Depth 0 starts at the synthetic root's children.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if self.is_root() {
            for child in &self.children {
                child.dump_at(0, &mut out);
            }
        } else {
            self.dump_at(0, &mut out);
        }
        out
    }

    fn dump_at(&self, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(self.tag.as_str());
        out.push('\n');
        for child in &self.children {
            child.dump_at(depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_display() {
        assert_eq!(BoxTag::MOOV.to_string(), "moov");
        assert_eq!(BoxTag([0xff, 0xfe, 0x00, 0x01]).as_str(), "????");
    }

    #[test]
    fn kind_resolution() {
        assert_eq!(BoxKind::resolve(BoxTag::MOOV), BoxKind::Container);
        assert_eq!(BoxKind::resolve(BoxTag::STTS), BoxKind::TimeToSample);
        assert_eq!(BoxKind::resolve(BoxTag::STCO), BoxKind::ChunkOffset);
        assert_eq!(BoxKind::resolve(BoxTag::CO64), BoxKind::ChunkOffset);
        assert_eq!(BoxKind::resolve(BoxTag::MVHD), BoxKind::MovieHeader);
        assert_eq!(BoxKind::resolve(BoxTag::FTYP), BoxKind::Verbatim);
        assert_eq!(BoxKind::resolve(BoxTag::CTTS), BoxKind::Verbatim);
    }

    #[test]
    fn dump_indents_by_depth() {
        let mut root = Atom::root();
        root.children.push(Atom::leaf(BoxTag::FTYP, vec![]));
        root.children.push(Atom::container(
            BoxTag::MOOV,
            vec![
                Atom::leaf(BoxTag::MVHD, vec![]),
                Atom::container(BoxTag::TRAK, vec![Atom::leaf(BoxTag::TKHD, vec![])]),
            ],
        ));
        assert_eq!(root.dump(), "ftyp\nmoov\n  mvhd\n  trak\n    tkhd\n");
    }
}
