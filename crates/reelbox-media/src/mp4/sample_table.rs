//! Raw sample tables and the per-track sample index built from them.
//!
//! The raw tables mirror the on-disk boxes:
//! - stts: sample duration runs (decoding time)
//! - stsc: sample-to-chunk runs
//! - stco/co64: chunk offsets
//! - stsz: sample sizes (uniform or per-sample)
//! - stss: sync sample numbers (key frames, 1-based)
//!
//! Resolving them yields one [`IndexEntry`] per sample with its
//! timeline position in seconds, absolute byte location and key flag.

use std::collections::HashSet;

/// One sample in a track's index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexEntry {
    /// Timeline position in seconds.
    pub position: f64,
    /// Absolute byte offset into the source.
    pub offset: u64,
    /// Sample size in bytes.
    pub size: u32,
    /// Whether this sample is a sync sample (key frame).
    pub is_key: bool,
}

/// Raw per-track sample tables, as decoded from the file.
///
/// The parsed bundle is kept on the track so an unedited tree can be
/// re-serialized with byte-equivalent tables; an edit path installs a
/// rebuilt bundle as the track's pending tables instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTables {
    /// stts entries: (sample count, tick delta).
    pub time_to_sample: Vec<(u32, u32)>,
    /// stsc entries: (first chunk, samples per chunk, description index).
    pub sample_to_chunk: Vec<(u32, u32, u32)>,
    /// stco/co64 chunk offsets.
    pub chunk_offsets: Vec<u64>,
    /// stsz uniform size; zero means per-sample sizes apply.
    pub uniform_size: u32,
    /// Per-sample sizes when `uniform_size` is zero.
    pub sample_sizes: Vec<u32>,
    /// stss sync sample numbers, 1-based. Empty means every sample is
    /// a sync sample and no stss box is written.
    pub sync_samples: Vec<u32>,
}

impl SampleTables {
    /// Number of samples the tables describe.
    pub fn sample_count(&self) -> u32 {
        if self.uniform_size > 0 {
            self.sample_sizes.len().max(self.total_duration_runs()) as u32
        } else {
            self.sample_sizes.len() as u32
        }
    }

    /// Size of sample `i`.
    pub fn size_of(&self, i: usize) -> u32 {
        if self.uniform_size > 0 {
            self.uniform_size
        } else {
            self.sample_sizes.get(i).copied().unwrap_or(0)
        }
    }

    /// Resolve the tables into a sample index ordered by position.
    ///
    /// Positions are decoding timestamps accumulated from the duration
    /// runs, divided by `time_scale`. The index is non-decreasing in
    /// position by construction.
    pub fn build_index(&self, time_scale: u32) -> Vec<IndexEntry> {
        let sample_count = self.sample_count();
        if sample_count == 0 {
            return Vec::new();
        }

        let sample_chunks = self.resolve_sample_chunks(sample_count);
        let offsets = self.resolve_offsets(&sample_chunks, sample_count);
        let ticks = self.resolve_timestamps(sample_count);

        let sync_set: HashSet<u32> = self.sync_samples.iter().copied().collect();
        let scale = f64::from(time_scale.max(1));

        let mut index = Vec::with_capacity(sample_count as usize);
        for i in 0..sample_count {
            let is_key = if self.sync_samples.is_empty() {
                // No stss means all samples are sync samples
                true
            } else {
                sync_set.contains(&(i + 1)) // stss uses 1-based indexing
            };
            index.push(IndexEntry {
                position: ticks.get(i as usize).copied().unwrap_or(0) as f64 / scale,
                offset: offsets.get(i as usize).copied().unwrap_or(0),
                size: self.size_of(i as usize),
                is_key,
            });
        }
        index
    }

    fn total_duration_runs(&self) -> usize {
        self.time_to_sample
            .iter()
            .map(|(count, _)| *count as usize)
            .sum()
    }

    /// Map each sample to its 0-based chunk via the stsc runs.
    fn resolve_sample_chunks(&self, sample_count: u32) -> Vec<u32> {
        if self.sample_to_chunk.is_empty() {
            return vec![0; sample_count as usize];
        }

        let mut result = Vec::with_capacity(sample_count as usize);
        let num_chunks = self.chunk_offsets.len() as u32;

        for i in 0..self.sample_to_chunk.len() {
            let (first_chunk, samples_per_chunk, _) = self.sample_to_chunk[i];
            let next_first = if i + 1 < self.sample_to_chunk.len() {
                self.sample_to_chunk[i + 1].0
            } else {
                num_chunks + 1
            };

            for chunk in first_chunk..next_first {
                if chunk > num_chunks {
                    break;
                }
                for _ in 0..samples_per_chunk {
                    if result.len() as u32 >= sample_count {
                        break;
                    }
                    result.push(chunk - 1); // 1-based on disk
                }
            }
        }

        while (result.len() as u32) < sample_count {
            result.push(result.last().copied().unwrap_or(0));
        }

        result
    }

    /// Absolute byte offset per sample: chunk base plus the sizes of
    /// the preceding samples in the same chunk.
    fn resolve_offsets(&self, sample_chunks: &[u32], sample_count: u32) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(sample_count as usize);
        let mut within_chunk = vec![0u64; self.chunk_offsets.len()];

        for i in 0..sample_count as usize {
            let chunk_idx = sample_chunks.get(i).copied().unwrap_or(0) as usize;
            let chunk_base = self.chunk_offsets.get(chunk_idx).copied().unwrap_or(0);
            let offset = chunk_base + within_chunk.get(chunk_idx).copied().unwrap_or(0);
            offsets.push(offset);

            if chunk_idx < within_chunk.len() {
                within_chunk[chunk_idx] += u64::from(self.size_of(i));
            }
        }

        offsets
    }

    /// Decoding timestamp in native ticks per sample.
    fn resolve_timestamps(&self, sample_count: u32) -> Vec<u64> {
        let mut ticks = Vec::with_capacity(sample_count as usize);
        let mut current = 0u64;
        let mut last_delta = 1u32;

        for (count, delta) in &self.time_to_sample {
            for _ in 0..*count {
                if ticks.len() as u32 >= sample_count {
                    break;
                }
                ticks.push(current);
                current += u64::from(*delta);
                last_delta = *delta;
            }
        }

        // Pad with the last run's delta if stsz describes more samples
        while (ticks.len() as u32) < sample_count {
            ticks.push(current);
            current += u64::from(last_delta.max(1));
        }

        ticks
    }
}
