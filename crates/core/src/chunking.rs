use crate::error::IngestError;
use crate::models::{Chunk, ContentUnit};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Range, RangeInclusive};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl SplitterConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|sep| sep.to_string()).collect(),
        }
    }

    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidSplitConfiguration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidSplitConfiguration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separators.is_empty() {
            return Err(IngestError::InvalidSplitConfiguration(
                "at least one separator is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    config: SplitterConfig,
    character_level: bool,
}

impl RecursiveSplitter {
    pub fn new(config: SplitterConfig) -> Result<Self, IngestError> {
        config.validate()?;
        let character_level = config.separators.iter().any(String::is_empty);
        Ok(Self {
            config,
            character_level,
        })
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    pub fn split(&self, units: &[ContentUnit]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for (unit_index, unit) in units.iter().enumerate() {
            if unit.text().trim().is_empty() {
                continue;
            }
            let source = unit.source().unwrap_or_default();

            for span in self.split_text(unit.text()) {
                chunks.push(Chunk {
                    id: make_chunk_id(source, unit_index, span.start, &span.text),
                    text: span.text,
                    metadata: unit.metadata().clone(),
                    start_char: span.start,
                });
            }
        }

        chunks
    }

    // Character spans of one text. Adjacent spans share exactly
    // `chunk_overlap` characters.
    pub fn split_text(&self, text: &str) -> Vec<TextSpan> {
        let chars: Vec<char> = text.chars().collect();
        self.char_ranges(text, chars.len())
            .into_iter()
            .map(|range| TextSpan {
                start: range.start,
                text: chars[range].iter().collect(),
            })
            .collect()
    }

    fn char_ranges(&self, text: &str, total: usize) -> Vec<Range<usize>> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        if total == 0 {
            return Vec::new();
        }
        if total <= size {
            return vec![0..total];
        }

        let mut boundaries = BTreeSet::new();
        boundaries.insert(total);
        self.collect_boundaries(text, 0, &self.config.separators, &mut boundaries);

        let mut separator_ends = None;
        let mut ranges = Vec::new();
        let mut start = 0;
        loop {
            // The chunk must end past `start + overlap` so the next chunk,
            // which starts `overlap` characters before this end, advances.
            let lower = start + overlap;
            let limit = start + size;

            let end = match boundaries.range(lower + 1..=limit).next_back() {
                Some(&boundary) => boundary,
                None => {
                    let ends = separator_ends.get_or_insert_with(|| self.separator_ends(text));
                    match coarsest_in(ends, lower + 1..=limit) {
                        Some(boundary) => boundary,
                        None if self.character_level => limit.min(total),
                        None => boundaries.range(lower + 1..).next().copied().unwrap_or(total),
                    }
                }
            };

            ranges.push(start..end);
            if end >= total {
                break;
            }
            start = end - overlap;
        }

        ranges
    }

    fn collect_boundaries(
        &self,
        segment: &str,
        offset: usize,
        separators: &[String],
        boundaries: &mut BTreeSet<usize>,
    ) {
        let length = segment.chars().count();
        if length <= self.config.chunk_size {
            return;
        }

        let Some(position) = separators
            .iter()
            .position(|separator| separator.is_empty() || segment.contains(separator.as_str()))
        else {
            return;
        };

        let separator = separators[position].as_str();
        if separator.is_empty() {
            boundaries.extend(offset + 1..offset + length);
            return;
        }

        let finer = &separators[position + 1..];
        let mut cursor = offset;
        for piece in segment.split_inclusive(separator) {
            let piece_length = piece.chars().count();
            if piece_length > self.config.chunk_size {
                self.collect_boundaries(piece, cursor, finer, boundaries);
            }
            cursor += piece_length;
            boundaries.insert(cursor);
        }
    }

    fn separator_ends(&self, text: &str) -> BTreeMap<usize, usize> {
        let mut char_offsets = vec![0; text.len() + 1];
        let mut count = 0;
        for (byte, ch) in text.char_indices() {
            char_offsets[byte] = count;
            count += 1;
            char_offsets[byte + ch.len_utf8()] = count;
        }

        let mut ends = BTreeMap::new();
        for (level, separator) in self.config.separators.iter().enumerate() {
            if separator.is_empty() {
                continue;
            }
            for (byte, found) in text.match_indices(separator.as_str()) {
                ends.entry(char_offsets[byte + found.len()]).or_insert(level);
            }
        }
        ends
    }
}

fn coarsest_in(ends: &BTreeMap<usize, usize>, window: RangeInclusive<usize>) -> Option<usize> {
    let level = ends.range(window.clone()).map(|(_, level)| *level).min()?;
    ends.range(window)
        .filter(|(_, found)| **found == level)
        .map(|(offset, _)| *offset)
        .next_back()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub text: String,
}

pub fn split(units: &[ContentUnit], chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>, IngestError> {
    let splitter = RecursiveSplitter::new(SplitterConfig::new(chunk_size, chunk_overlap))?;
    Ok(splitter.split(units))
}

fn make_chunk_id(source: &str, unit_index: usize, start: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update((unit_index as u64).to_le_bytes());
    hasher.update((start as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
