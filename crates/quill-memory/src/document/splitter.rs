use super::types::{Chunk, Document};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Characters of trailing context repeated at the start of the next chunk.
    pub chunk_overlap: usize,
    /// Break on sentence and paragraph boundaries instead of raw character counts.
    pub sentence_aware: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            sentence_aware: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        if document.content.trim().is_empty() {
            return Vec::new();
        }
        let SplitterConfig {
            chunk_size,
            chunk_overlap,
            sentence_aware,
        } = self.config;
        let chunk_size = chunk_size.max(1);

        let pieces = if sentence_aware {
            pack_sentences(&sentences(&document.content), chunk_size, chunk_overlap)
        } else {
            char_windows(&document.content, chunk_size, chunk_overlap)
        };

        pieces
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                content,
                metadata: document.metadata.clone(),
                chunk_index: Some(i),
            })
            .collect()
    }
}

/// Cut after `.`, `?` or `!` followed by a space, and after blank lines.
/// Whitespace-only pieces are dropped; concatenating the rest gives back the input
/// minus those pieces.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        let next = iter.peek().map(|&(_, n)| n);
        let cut = match (c, next) {
            ('\n', Some('\n')) => {
                iter.next();
                Some(i + 2)
            }
            ('.' | '?' | '!', Some(' ')) => Some(i + 1),
            _ => None,
        };
        if let Some(end) = cut {
            let piece = &text[start..end];
            if !piece.trim().is_empty() {
                out.push(piece);
            }
            start = end;
        }
    }

    let rest = &text[start..];
    if !rest.trim().is_empty() {
        out.push(rest);
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn pack_sentences(sentences: &[&str], chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut window_len = 0;

    for &sentence in sentences {
        let len = char_len(sentence);
        if !window.is_empty() && window_len + len > chunk_size {
            chunks.push(window.concat());

            let mut kept = 0;
            let mut carry = 0;
            for s in window.iter().rev() {
                let l = char_len(s);
                if carry + l > overlap {
                    break;
                }
                carry += l;
                kept += 1;
            }
            window.drain(..window.len() - kept);
            window_len = carry;
        }
        window.push(sentence);
        window_len += len;
    }

    if !window.is_empty() {
        chunks.push(window.concat());
    }
    chunks
}

fn char_windows(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
