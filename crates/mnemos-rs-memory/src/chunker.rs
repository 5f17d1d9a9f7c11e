//! Boundary-aware overlapping chunker.
//!
//! Sizes and offsets are counted in `char`s. Chunk texts are exact slices of
//! the input, so dropping each chunk's overlap with its predecessor and
//! concatenating reconstructs the source.

use crate::error::MemoryError;
use crate::model::Chunk;

/// Tuning for [`Chunker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    pub max_size: usize,
    /// Characters shared by consecutive chunks.
    pub overlap: usize,
    /// Shortest final chunk worth embedding on its own.
    pub min_chunk_size: usize,
    /// Fraction of `max_size` scanned backward for a natural boundary.
    pub lookback_ratio: f32,
    /// Snap cuts to paragraph, sentence or word boundaries.
    pub boundary_aware: bool,
    /// Keep an unbroken token whole even if it exceeds `max_size`.
    pub preserve_long_tokens: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            overlap: 200,
            min_chunk_size: 50,
            lookback_ratio: 0.2,
            boundary_aware: true,
            preserve_long_tokens: true,
        }
    }
}

impl ChunkerConfig {
    /// Default tuning with explicit size and overlap.
    pub fn new(max_size: usize, overlap: usize) -> Self {
        Self {
            max_size,
            overlap,
            min_chunk_size: ChunkerConfig::default().min_chunk_size.min(max_size),
            ..Self::default()
        }
    }
}

/// Splits text into overlapping chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
    lookback: usize,
}

impl Chunker {
    /// Validate the configuration and build a chunker.
    pub fn new(config: ChunkerConfig) -> Result<Self, MemoryError> {
        if config.max_size == 0 {
            return Err(MemoryError::configuration(
                "chunk_size",
                "must be greater than zero",
            ));
        }
        if config.overlap >= config.max_size {
            return Err(MemoryError::configuration(
                "chunk_overlap",
                format!(
                    "must be less than chunk_size (overlap={}, chunk_size={})",
                    config.overlap, config.max_size
                ),
            ));
        }
        if config.min_chunk_size > config.max_size {
            return Err(MemoryError::configuration(
                "min_chunk_size",
                "must not exceed chunk_size",
            ));
        }
        if !(0.0..=1.0).contains(&config.lookback_ratio) {
            return Err(MemoryError::configuration(
                "lookback_ratio",
                "must be within [0, 1]",
            ));
        }
        let lookback = ((config.max_size as f64 * f64::from(config.lookback_ratio)).round()
            as usize)
            .max(1);
        Ok(Self { config, lookback })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk `text`. Character offsets are indexed up front and chunks are
    /// cut on demand as the iterator advances. Each call starts a fresh sequence.
    pub fn chunk<'a>(&self, text: &'a str) -> Chunks<'a> {
        let mut offsets: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
        offsets.push(text.len());
        Chunks {
            text,
            chars: text.chars().collect(),
            offsets,
            config: self.config,
            lookback: self.lookback,
            cursor: 0,
            index: 0,
            done: text.is_empty(),
        }
    }
}

/// Chunk `text` with default tuning and the given size and overlap.
pub fn chunk(text: &str, max_size: usize, overlap: usize) -> Result<Chunks<'_>, MemoryError> {
    let chunker = Chunker::new(ChunkerConfig::new(max_size, overlap))?;
    Ok(chunker.chunk(text))
}

/// Iterator over the chunks of one document.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    chars: Vec<char>,
    /// Byte offset of every char, plus the total byte length.
    offsets: Vec<usize>,
    config: ChunkerConfig,
    lookback: usize,
    cursor: usize,
    index: usize,
    done: bool,
}

/// How a cut was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cut {
    Window,
    Oversize,
}

impl Chunks<'_> {
    fn len_chars(&self) -> usize {
        self.chars.len()
    }

    fn next_cut(&self, cursor: usize) -> (usize, Cut) {
        let len = self.len_chars();
        let ChunkerConfig {
            max_size,
            overlap,
            min_chunk_size,
            boundary_aware,
            preserve_long_tokens,
            ..
        } = self.config;

        let mut end = (cursor + max_size).min(len);
        if end == len {
            return (end, Cut::Window);
        }

        // Leave the final chunk at least `min_chunk_size` long.
        if len - (end - overlap) < min_chunk_size {
            end = end.min(len + overlap - min_chunk_size);
        }

        if !boundary_aware {
            return (end, Cut::Window);
        }
        if let Some(cut) = self.find_boundary(cursor, end) {
            return (cut, Cut::Window);
        }
        if preserve_long_tokens && !self.chars[cursor..end].iter().any(|ch| ch.is_whitespace()) {
            let mut extended = self.chars[end..]
                .iter()
                .position(|ch| ch.is_whitespace())
                .map_or(len, |offset| end + offset + 1);
            if len - extended < min_chunk_size {
                extended = len;
            }
            return (extended, Cut::Oversize);
        }
        (end, Cut::Window)
    }

    /// Best cut in `(cursor, end]`, scanning back at most `lookback` chars.
    fn find_boundary(&self, cursor: usize, end: usize) -> Option<usize> {
        let low = (cursor + 1).max(end.saturating_sub(self.lookback));
        let chars = &self.chars;
        let candidates = || (low..=end).rev();

        let paragraph = |cut: usize| cut >= 2 && chars[cut - 2] == '\n' && chars[cut - 1] == '\n';
        let sentence = |cut: usize| {
            matches!(chars[cut - 1], '.' | '!' | '?')
                && chars.get(cut).is_none_or(|next| next.is_whitespace())
        };
        let whitespace = |cut: usize| chars[cut - 1].is_whitespace();

        candidates()
            .find(|&cut| paragraph(cut))
            .or_else(|| candidates().find(|&cut| sentence(cut)))
            .or_else(|| candidates().find(|&cut| whitespace(cut)))
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.cursor;
        let len = self.len_chars();
        let (end, cut) = self.next_cut(start);

        let text: &'a str = self.text;
        let chunk = Chunk {
            text: &text[self.offsets[start]..self.offsets[end]],
            start,
            end,
            index: self.index,
        };
        self.index += 1;

        if end >= len {
            self.done = true;
        } else {
            let next = match cut {
                Cut::Oversize => end,
                Cut::Window => end.saturating_sub(self.config.overlap),
            };
            self.cursor = if next > start { next } else { end };
        }
        Some(chunk)
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}
