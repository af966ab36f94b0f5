//! Time-position search over a track's sample index.
//!
//! Two strategies: the video track seeks through its key-frame ordinal
//! list so decoding can restart at a sync sample; a secondary track
//! (audio) has no independent key-frame concept and uses a dense lower
//! bound over the full index. Both are approximate to sample
//! granularity, and both clamp at the ends of the table instead of
//! leaving the cursor unspecified.

use super::sample_table::IndexEntry;
use super::track::Track;

/// Largest index whose position is `<=` `pos`, clamped to the first
/// entry when `pos` precedes the table. Ties resolve to the leftmost
/// matching entry's run, keeping results reproducible.
pub(crate) fn bin_search(index: &[IndexEntry], pos: f64) -> usize {
    let upper = index.partition_point(|e| e.position <= pos);
    upper.saturating_sub(1)
}

/// Latest key frame whose position is `<=` `pos`.
///
/// Clamps to the first key frame before the bracketed range and to the
/// last one after it; a query exactly on a key-frame position lands on
/// that key frame. Falls back to the dense search when the track has
/// no key-frame list (every sample is a sync point).
pub(crate) fn key_search(track: &Track, pos: f64) -> usize {
    if track.key_frames.is_empty() {
        return bin_search(&track.index, pos);
    }

    let mut ret = track.key_frames[0].saturating_sub(1) as usize;
    for &ordinal in &track.key_frames {
        let i = ordinal.saturating_sub(1) as usize;
        match track.index.get(i) {
            Some(entry) if entry.position <= pos => ret = i,
            _ => break,
        }
    }
    ret
}

/// Position `track.cursor` at the index entry for `pos` and return the
/// new cursor value.
pub fn seek(track: &mut Track, pos: f64, use_key_frames: bool) -> usize {
    let i = if use_key_frames {
        key_search(track, pos)
    } else {
        bin_search(&track.index, pos)
    };
    track.cursor = i;
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(positions: &[f64]) -> Vec<IndexEntry> {
        positions
            .iter()
            .map(|&position| IndexEntry {
                position,
                offset: 0,
                size: 1,
                is_key: false,
            })
            .collect()
    }

    fn linear_search(index: &[IndexEntry], pos: f64) -> usize {
        let mut ret = 0;
        for (i, e) in index.iter().enumerate() {
            if e.position <= pos {
                ret = i;
            } else {
                break;
            }
        }
        ret
    }

    #[test]
    fn bin_search_matches_linear_scan() {
        let index = entries(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        // Sweep probes around and beyond the table's range
        for i in -4..14 {
            let pos = f64::from(i) + 0.1;
            assert_eq!(
                bin_search(&index, pos),
                linear_search(&index, pos),
                "probe {pos}"
            );
        }
        // Exact hits
        for i in 0..10 {
            assert_eq!(bin_search(&index, f64::from(i)), i as usize);
        }
    }

    #[test]
    fn bin_search_clamps_both_ends() {
        let index = entries(&[1.0, 2.0, 3.0]);
        assert_eq!(bin_search(&index, 0.0), 0);
        assert_eq!(bin_search(&index, 99.0), 2);
    }

    fn keyed_track() -> Track {
        let mut track = Track::new();
        track.index = entries(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        for &ordinal in &[1u32, 4, 7] {
            track.index[(ordinal - 1) as usize].is_key = true;
        }
        track.key_frames = vec![1, 4, 7];
        track
    }

    #[test]
    fn key_search_rounds_down_to_preceding_key_frame() {
        let track = keyed_track();
        // Key frames sit at positions 0.0, 3.0, 6.0
        assert_eq!(key_search(&track, 0.5), 0);
        assert_eq!(key_search(&track, 2.9), 0);
        assert_eq!(key_search(&track, 3.5), 3);
        assert_eq!(key_search(&track, 5.5), 3);
        assert_eq!(key_search(&track, 6.5), 6);
    }

    #[test]
    fn key_search_clamps_outside_bracketed_range() {
        let track = keyed_track();
        assert_eq!(key_search(&track, -1.0), 0);
        assert_eq!(key_search(&track, 100.0), 6);
    }

    #[test]
    fn key_search_lands_on_exact_key_position() {
        let track = keyed_track();
        assert_eq!(key_search(&track, 3.0), 3);
        assert_eq!(key_search(&track, 6.0), 6);
    }

    #[test]
    fn key_search_without_key_frames_uses_dense_search() {
        let mut track = keyed_track();
        track.key_frames.clear();
        assert_eq!(key_search(&track, 5.5), 5);
    }

    #[test]
    fn seek_mutates_cursor() {
        let mut track = keyed_track();
        assert_eq!(seek(&mut track, 5.5, true), 3);
        assert_eq!(track.cursor, 3);
        assert_eq!(seek(&mut track, 5.5, false), 5);
        assert_eq!(track.cursor, 5);
    }

    #[test]
    fn seek_on_empty_index_leaves_cursor_at_zero() {
        let mut track = Track::new();
        assert_eq!(seek(&mut track, 3.0, false), 0);
        assert!(track.is_exhausted());
    }
}
