// src/services/chunker.rs

//! Overlapping, bounded text chunking.
//!
//! Paragraphs are packed into chunks of roughly `target_size` characters.
//! When a chunk closes, its last `overlap` characters seed the next one so
//! that context spanning a boundary survives in both. A paragraph too large
//! to pack falls back to sentences, then words, then fixed windows.
//!
//! All lengths are in characters. The output depends only on the input.

use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::models::{Chunk, ChunkingConfig};

const PARAGRAPH_SEP: &str = "\n\n";
const WORD_SEP: &str = " ";

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("static paragraph pattern"));

/// Chunk text with the default minimum chunk length.
pub fn chunk(text: &str, target_size: usize, overlap: usize) -> Vec<Chunk> {
    Chunker::new(&ChunkingConfig::new(target_size, overlap)).split(text)
}

/// Paragraph-packing chunker.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    target_size: usize,
    overlap: usize,
    min_chars: usize,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        let target_size = config.target_size.max(1);
        Self {
            target_size,
            overlap: config.overlap.min(target_size - 1),
            min_chars: config.min_chars,
        }
    }

    /// Split text into chunks, numbered from zero.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let normalized = text.replace("\r\n", "\n");
        let mut acc = Accumulator::new(self.target_size, self.overlap);

        for paragraph in PARAGRAPH_BREAK.split(&normalized) {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if self.oversized(char_len(paragraph)) {
                self.push_sentences(&mut acc, paragraph);
            } else {
                acc.push(paragraph, PARAGRAPH_SEP);
            }
        }

        let pieces = acc.finish();
        self.filter_short(pieces)
            .into_iter()
            .enumerate()
            .map(|(sequence, piece)| Chunk {
                sequence,
                text: piece.text,
                target_size: self.target_size,
                overlap: piece.seeded,
            })
            .collect()
    }

    /// Whether a unit would push a freshly seeded chunk past 1.5x target.
    fn oversized(&self, len: usize) -> bool {
        2 * (self.overlap + PARAGRAPH_SEP.len() + len) > 3 * self.target_size
    }

    fn push_sentences(&self, acc: &mut Accumulator, paragraph: &str) {
        let mut sep = PARAGRAPH_SEP;
        for sentence in paragraph.split_sentence_bounds() {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            if self.oversized(char_len(sentence)) {
                self.push_words(acc, sentence, sep);
            } else {
                acc.push(sentence, sep);
            }
            sep = WORD_SEP;
        }
    }

    fn push_words(&self, acc: &mut Accumulator, sentence: &str, first_sep: &str) {
        // Leaves room for the overlap seed so a window never overflows.
        let window = self.target_size - self.overlap;
        let mut sep = first_sep;
        for word in sentence.split_whitespace() {
            if char_len(word) > window {
                let chars: Vec<char> = word.chars().collect();
                for piece in chars.chunks(window) {
                    let piece: String = piece.iter().collect();
                    acc.push(&piece, sep);
                    sep = "";
                }
            } else {
                acc.push(word, sep);
            }
            sep = WORD_SEP;
        }
    }

    /// Drop short chunks, keeping at least the first.
    ///
    /// A chunk that followed a dropped one is re-seeded from the chunk it
    /// now follows, so every kept chunk still opens with the tail of its
    /// predecessor.
    fn filter_short(&self, pieces: Vec<Piece>) -> Vec<Piece> {
        if pieces.len() <= 1 {
            return pieces;
        }
        let floor = self.min_chars.min(self.target_size / 2);
        if pieces.iter().all(|p| char_len(&p.text) < floor) {
            return pieces.into_iter().take(1).collect();
        }

        let mut kept: Vec<Piece> = Vec::with_capacity(pieces.len());
        let mut after_drop = false;
        for piece in pieces {
            if char_len(&piece.text) < floor {
                after_drop = true;
                continue;
            }
            let piece = if after_drop {
                self.reseed(piece, kept.last())
            } else {
                piece
            };
            after_drop = false;
            kept.push(piece);
        }
        kept
    }

    /// Replace a piece's seed with the tail of `previous`.
    fn reseed(&self, piece: Piece, previous: Option<&Piece>) -> Piece {
        let rest: String = piece.text.chars().skip(piece.seeded).collect();
        match previous {
            Some(previous) => {
                let seed = tail(&previous.text, self.overlap);
                Piece {
                    seeded: char_len(&seed),
                    text: seed + &rest,
                }
            }
            None => Piece {
                text: rest.trim_start().to_string(),
                seeded: 0,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Piece {
    text: String,
    /// Characters inherited from the previous chunk
    seeded: usize,
}

/// Running chunk state.
struct Accumulator {
    target_size: usize,
    overlap: usize,
    current: String,
    current_len: usize,
    seeded: usize,
    has_content: bool,
    closed: Vec<Piece>,
}

impl Accumulator {
    fn new(target_size: usize, overlap: usize) -> Self {
        Self {
            target_size,
            overlap,
            current: String::new(),
            current_len: 0,
            seeded: 0,
            has_content: false,
            closed: Vec::new(),
        }
    }

    fn push(&mut self, unit: &str, sep: &str) {
        let unit_len = char_len(unit);
        if self.has_content && self.current_len + char_len(sep) + unit_len > self.target_size {
            self.close();
        }
        if !self.current.is_empty() {
            self.current.push_str(sep);
            self.current_len += char_len(sep);
        }
        self.current.push_str(unit);
        self.current_len += unit_len;
        self.has_content = true;
    }

    fn close(&mut self) {
        let seed = tail(&self.current, self.overlap);
        let text = std::mem::replace(&mut self.current, seed);
        self.closed.push(Piece {
            text,
            seeded: self.seeded,
        });
        self.current_len = char_len(&self.current);
        self.seeded = self.current_len;
        self.has_content = false;
    }

    fn finish(mut self) -> Vec<Piece> {
        if self.has_content {
            self.closed.push(Piece {
                text: self.current,
                seeded: self.seeded,
            });
        }
        self.closed
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The last `n` characters of `s`.
fn tail(s: &str, n: usize) -> String {
    let skip = char_len(s).saturating_sub(n);
    s.chars().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    fn words(count: usize) -> String {
        let vocab = ["alpha", "bravo", "charlie", "delta", "echo", "fox", "golf", "hotel"];
        (0..count)
            .map(|i| vocab[(i * 7 + i / 3) % vocab.len()])
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_paragraph_chunking_scenario() {
        let text = "Para1.\n\nPara2 is very long and keeps going well past the target size of twenty characters.";
        let chunks = chunk(text, 20, 5);

        assert!(chunks.len() >= 2, "got {:?}", texts(&chunks));
        for c in chunks.iter().skip(1) {
            assert!(c.text.chars().count() <= 30, "chunk too long: {:?}", c.text);
        }
        let first_tail = tail(&chunks[0].text, 5);
        assert!(chunks[1].text.starts_with(&first_tail));
        assert_eq!(chunks[1].overlap, 5);
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn test_chunk_is_deterministic() {
        let text = format!(
            "{}\n\n{}\r\n\r\n{}. {}. {}",
            words(40),
            words(300),
            words(12),
            "x".repeat(700),
            words(90)
        );
        let first = chunk(&text, 120, 30);
        let second = chunk(&text, 120, 30);
        assert_eq!(first, second);

        let bytes = |c: &[Chunk]| c.iter().map(|c| c.text.clone()).collect::<Vec<_>>().join("\u{1}");
        assert_eq!(bytes(&first), bytes(&second));
    }

    #[test]
    fn test_small_paragraphs_are_packed() {
        let text = "One.\n\nTwo.\n\nThree.";
        let chunks = chunk(text, 100, 10);
        assert_eq!(texts(&chunks), vec!["One.\n\nTwo.\n\nThree."]);
        assert_eq!(chunks[0].sequence, 0);
        assert_eq!(chunks[0].target_size, 100);
    }

    #[test]
    fn test_single_short_chunk_is_kept() {
        let chunks = chunk("Hi.", 1000, 200);
        assert_eq!(texts(&chunks), vec!["Hi."]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk("", 100, 10).is_empty());
        assert!(chunk("\n\n   \n\n", 100, 10).is_empty());
    }

    #[test]
    fn test_chunks_bounded_and_overlapping() {
        let text = words(500);
        let (target, overlap) = (60, 10);
        let chunks = chunk(&text, target, overlap);

        assert!(chunks.len() > 5);
        for c in &chunks {
            assert!(c.text.chars().count() * 2 <= target * 3, "too long: {:?}", c.text);
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].text.starts_with(&tail(&pair[0].text, overlap)));
        }
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.sequence, i);
        }
    }

    #[test]
    fn test_oversized_word_falls_back_to_windows() {
        let word = "z".repeat(95);
        let chunks = chunk(&word, 20, 5);

        assert!(chunks.len() >= 6);
        for c in &chunks {
            assert!(c.text.chars().count() <= 20);
        }
        // Everything after the seed is new text, so the word is recoverable.
        let rebuilt: String = chunks
            .iter()
            .map(|c| c.text.chars().skip(c.overlap).collect::<String>())
            .collect();
        assert_eq!(rebuilt, word);
    }

    #[test]
    fn test_lengths_are_counted_in_characters() {
        let sentence = "가나다라마 바사아자차 카타파하 ".repeat(20);
        let chunks = chunk(&sentence, 40, 8);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 60);
        }
    }

    #[test]
    fn test_short_middle_chunks_dropped_and_renumbered() {
        let config = ChunkingConfig {
            target_size: 40,
            overlap: 0,
            min_chars: 15,
        };
        let long = "a".repeat(35);
        let text = format!("{long}\n\nTiny.\n\n{long}");
        let chunks = Chunker::new(&config).split(&text);

        assert_eq!(texts(&chunks), vec![long.as_str(), long.as_str()]);
        assert_eq!(chunks[1].sequence, 1);
    }

    #[test]
    fn test_trailing_short_chunk_dropped() {
        let config = ChunkingConfig {
            target_size: 4,
            overlap: 0,
            min_chars: 50,
        };
        let chunks = Chunker::new(&config).split("a\n\nb\n\nc");
        assert_eq!(texts(&chunks), vec!["a\n\nb"]);
    }

    #[test]
    fn test_dropped_chunk_keeps_overlap_chain() {
        let config = ChunkingConfig {
            target_size: 40,
            overlap: 5,
            min_chars: 15,
        };
        let a = "a".repeat(35);
        let b = "b".repeat(35);
        let chunks = Chunker::new(&config).split(&format!("{a}\n\nTiny.\n\n{b}"));

        let second = format!("aaaaa\n\n{b}");
        assert_eq!(texts(&chunks), vec![a.as_str(), second.as_str()]);
        assert!(chunks[1].text.starts_with(&tail(&chunks[0].text, 5)));
        assert_eq!(chunks[1].overlap, 5);
        assert_eq!(chunks[1].sequence, 1);
    }

    #[test]
    fn test_dropped_first_chunk_leaves_no_seed() {
        let config = ChunkingConfig {
            target_size: 40,
            overlap: 5,
            min_chars: 15,
        };
        let b = "b".repeat(35);
        let chunks = Chunker::new(&config).split(&format!("Tiny.\n\n{b}"));

        assert_eq!(texts(&chunks), vec![b.as_str()]);
        assert_eq!(chunks[0].overlap, 0);
    }
}
