//! Time-ordered multi-track packet extraction.

use bytes::Bytes;

use super::sample_table::IndexEntry;
use super::track::{Codec, Track};
use crate::source::DataSource;
use crate::Result;

/// One demuxed sample with its timing and codec identity.
#[derive(Debug, Clone)]
pub struct Packet {
    pub codec: Codec,
    pub is_key: bool,
    /// Timeline position in seconds.
    pub position: f64,
    /// Raw sample bytes.
    pub data: Bytes,
}

/// Merge packets from `tracks` in ascending position order until every
/// remaining entry sits at or past `end`.
///
/// Each round selects, among the tracks in `order` whose cursor has
/// not exhausted their index, the one with the smallest current
/// position; a tie goes to the earlier track in `order`, a stable but
/// caller-order-dependent rule. The selected entry's bytes are fetched
/// from the source at its recorded offset, its track's cursor
/// advances, and the loop repeats. An entry at or past `end` is left
/// unconsumed.
///
/// Returns the packets and the position of the last consumed entry, or
/// `end` unchanged when nothing was consumed. Source read failures
/// (including a corrupt size/offset pair running past the end of the
/// data) propagate to the caller.
pub(crate) fn read_until(
    source: &mut DataSource,
    tracks: &mut [Track],
    order: &[usize],
    end: f64,
) -> Result<(Vec<Packet>, f64)> {
    let mut packets = Vec::new();
    let mut reached = end;

    loop {
        let mut next: Option<(usize, IndexEntry)> = None;
        for &ti in order {
            let Some(entry) = tracks[ti].current_entry() else {
                continue;
            };
            if next.map_or(true, |(_, best)| entry.position < best.position) {
                next = Some((ti, *entry));
            }
        }

        let Some((ti, entry)) = next else {
            break;
        };
        if entry.position >= end {
            break;
        }

        let mut data = vec![0u8; entry.size as usize];
        source.read_exact_at(entry.offset, &mut data)?;

        packets.push(Packet {
            codec: tracks[ti].codec,
            is_key: entry.is_key,
            position: entry.position,
            data: Bytes::from(data),
        });
        tracks[ti].cursor += 1;
        reached = entry.position;
    }

    Ok((packets, reached))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Track whose sample `i` is the single byte `base + i` at source
    /// offset `base + i`.
    fn byte_track(codec: Codec, base: u64, positions: &[f64]) -> Track {
        let mut track = Track::new();
        track.codec = codec;
        track.index = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| IndexEntry {
                position,
                offset: base + i as u64,
                size: 1,
                is_key: true,
            })
            .collect();
        track
    }

    fn source_256() -> DataSource {
        DataSource::from_buffer((0u8..=255).collect())
    }

    #[test]
    fn merges_two_tracks_by_position() {
        let mut src = source_256();
        let mut tracks = vec![
            byte_track(Codec::H264, 0, &[0.0, 1.0, 2.0, 3.0]),
            byte_track(Codec::Aac, 100, &[0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0]),
        ];

        let (packets, reached) = read_until(&mut src, &mut tracks, &[0, 1], 3.0).unwrap();

        let positions: Vec<f64> = packets.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0.0, 0.0, 0.5, 1.0, 1.0, 1.5, 2.0, 2.0, 2.5]);
        // Ties go to the first track in caller order
        assert_eq!(packets[0].codec, Codec::H264);
        assert_eq!(packets[1].codec, Codec::Aac);
        assert_eq!(reached, 2.5);

        // Both cursors sit at their first entry at or past the bound
        assert_eq!(tracks[0].cursor, 3);
        assert_eq!(tracks[1].cursor, 6);

        // Payload bytes come from each entry's recorded offset
        assert_eq!(packets[0].data.as_ref(), &[0]);
        assert_eq!(packets[1].data.as_ref(), &[100]);
    }

    #[test]
    fn denser_track_dominates_merge() {
        let mut src = source_256();
        let mut tracks = vec![
            byte_track(Codec::H264, 0, &[0.0, 5.0]),
            byte_track(Codec::Aac, 50, &[1.0, 2.0, 3.0, 4.0]),
        ];

        let (packets, reached) = read_until(&mut src, &mut tracks, &[0, 1], 10.0).unwrap();
        let positions: Vec<f64> = packets.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(reached, 5.0);
        assert!(tracks[0].is_exhausted());
        assert!(tracks[1].is_exhausted());
    }

    #[test]
    fn exhausted_track_is_skipped() {
        let mut src = source_256();
        let mut tracks = vec![
            byte_track(Codec::H264, 0, &[0.0, 1.0]),
            byte_track(Codec::Aac, 100, &[0.5]),
        ];
        tracks[1].cursor = 1; // already exhausted

        let (packets, _) = read_until(&mut src, &mut tracks, &[0, 1], 5.0).unwrap();
        assert!(packets.iter().all(|p| p.codec == Codec::H264));
        assert_eq!(packets.len(), 2);
    }

    #[test]
    fn nothing_consumed_returns_bound_unchanged() {
        let mut src = source_256();

        // Empty track list
        let (packets, reached) = read_until(&mut src, &mut [], &[], 3.0).unwrap();
        assert!(packets.is_empty());
        assert_eq!(reached, 3.0);

        // All entries past the bound
        let mut tracks = vec![byte_track(Codec::H264, 0, &[5.0, 6.0])];
        let (packets, reached) = read_until(&mut src, &mut tracks, &[0], 3.0).unwrap();
        assert!(packets.is_empty());
        assert_eq!(reached, 3.0);
        assert_eq!(tracks[0].cursor, 0);
    }

    #[test]
    fn corrupt_offset_propagates_read_error() {
        let mut src = DataSource::from_buffer(vec![0; 16]);
        let mut tracks = vec![byte_track(Codec::H264, 1000, &[0.0])];
        assert!(read_until(&mut src, &mut tracks, &[0], 1.0).is_err());
    }
}
