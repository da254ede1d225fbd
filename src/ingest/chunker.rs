//! Text cleanup and chunking
//!
//! Documents are cleaned of page furniture and decoration runs, then cut
//! into retrieval-sized chunks along paragraph boundaries. Adjacent chunks
//! share a tail of overlapping text so a fact straddling a boundary is
//! still retrievable from both sides.
//!
//! All sizes count Unicode code points, not bytes.

use once_cell::sync::Lazy;
use regex::Regex;

static PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"第\s*\d+\s*页").unwrap());
static PAGE_TOTAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"共\s*\d+\s*页").unwrap());
static DECORATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#=*]{3,}|-{3,}|_{3,}").unwrap());
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{3,}").unwrap());
static MULTI_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static PARAGRAPH_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());
static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new("[。！？]").unwrap());

/// Strip page markers, decoration runs, and whitespace noise.
///
/// Runs of three or more whitespace characters collapse to a single space
/// before the newline rule is applied, so only double newlines survive as
/// paragraph breaks.
pub fn clean_text(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let cleaned = PAGE_NUMBER.replace_all(raw, "");
    let cleaned = PAGE_TOTAL.replace_all(&cleaned, "");
    let cleaned = DECORATION.replace_all(&cleaned, "");
    let cleaned = MULTI_SPACE.replace_all(&cleaned, " ");
    let cleaned = MULTI_NEWLINE.replace_all(&cleaned, "\n\n");

    cleaned.trim().to_string()
}

/// One chunk of a document
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub document_id: u64,
    pub chunk_index: u32,
    pub content: String,
    /// `{document_id}_{chunk_index}`, stable across re-ingest
    pub chunk_id: String,
}

impl TextChunk {
    fn new(document_id: u64, chunk_index: u32, content: String) -> Self {
        let chunk_id = format!("{}_{}", document_id, chunk_index);
        Self {
            document_id,
            chunk_index,
            content,
            chunk_id,
        }
    }
}

/// Splits cleaned text into chunks of `min_size..=max_size` code points.
///
/// Paragraphs are packed greedily; a paragraph that would overflow the
/// buffer closes it once the buffer has reached `min_size`, otherwise the
/// buffer runs past `max_size` rather than emit a fragment. A buffer that
/// grows past 1.5x `max_size` is repacked along sentence boundaries.
#[derive(Debug, Clone)]
pub struct Chunker {
    min_size: usize,
    max_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(min_size: usize, max_size: usize, overlap: usize) -> Self {
        Self {
            min_size,
            max_size,
            overlap,
        }
    }

    pub fn from_config(config: &crate::config::ChunkingConfig) -> Self {
        Self::new(config.min_size, config.max_size, config.overlap)
    }

    /// Split `text` into chunks. Trailing text shorter than `min_size` is
    /// dropped, so a document below the minimum yields no chunks at all.
    pub fn split(&self, text: &str, document_id: u64) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        if text.trim().is_empty() {
            return chunks;
        }

        let mut cur = String::new();
        let mut cur_chars = 0usize;
        let mut index: u32 = 1;

        for paragraph in PARAGRAPH_SPLIT.split(text) {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            let para_chars = paragraph.chars().count();

            if cur_chars + para_chars <= self.max_size {
                append(&mut cur, &mut cur_chars, paragraph, para_chars, '\n');
            } else if cur_chars >= self.min_size {
                let overlap = self.emit(&mut chunks, document_id, &mut index, &cur);
                cur = overlap;
                cur_chars = cur.chars().count();
                append(&mut cur, &mut cur_chars, paragraph, para_chars, '\n');
            } else {
                // Too small to close; run past max_size instead
                append(&mut cur, &mut cur_chars, paragraph, para_chars, '\n');
            }

            // One paragraph outran the limit; repack the buffer by sentence
            if cur_chars > self.max_size * 3 / 2 {
                let (packed, packed_chars) =
                    self.repack_sentences(&cur, document_id, &mut index, &mut chunks);
                cur = packed;
                cur_chars = packed_chars;
            }
        }

        if cur_chars >= self.min_size {
            chunks.push(TextChunk::new(document_id, index, cur));
        }

        chunks
    }

    /// Re-cut an oversized buffer along 。！？ boundaries, using the same
    /// packing and overlap rules as the paragraph pass. The remainder is
    /// returned so it keeps accumulating with the following paragraphs.
    fn repack_sentences(
        &self,
        text: &str,
        document_id: u64,
        index: &mut u32,
        chunks: &mut Vec<TextChunk>,
    ) -> (String, usize) {
        let mut packed = String::new();
        let mut packed_chars = 0usize;

        for sentence in SENTENCE_SPLIT.split(text) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let sentence_chars = sentence.chars().count();

            if packed_chars + sentence_chars <= self.max_size {
                append(&mut packed, &mut packed_chars, sentence, sentence_chars, '。');
            } else if packed_chars >= self.min_size {
                let overlap = self.emit(chunks, document_id, index, &packed);
                packed = overlap;
                packed_chars = packed.chars().count();
                append(&mut packed, &mut packed_chars, sentence, sentence_chars, '。');
            } else {
                append(&mut packed, &mut packed_chars, sentence, sentence_chars, '。');
            }
        }

        (packed, packed_chars)
    }

    /// Push a finished chunk and return the overlap seed for the next one
    fn emit(
        &self,
        chunks: &mut Vec<TextChunk>,
        document_id: u64,
        index: &mut u32,
        content: &str,
    ) -> String {
        chunks.push(TextChunk::new(document_id, *index, content.to_string()));
        *index += 1;
        if self.overlap == 0 {
            return String::new();
        }
        tail_chars(content, self.overlap).to_string()
    }
}

fn append(buffer: &mut String, buffer_chars: &mut usize, text: &str, text_chars: usize, joiner: char) {
    if !buffer.is_empty() {
        buffer.push(joiner);
        *buffer_chars += 1;
    }
    buffer.push_str(text);
    *buffer_chars += text_chars;
}

/// Last `n` code points of `s`, or all of it when shorter
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> Chunker {
        Chunker::new(200, 500, 50)
    }

    fn para(c: char, n: usize) -> String {
        std::iter::repeat(c).take(n).collect()
    }

    #[test]
    fn test_clean_text_removes_page_markers() {
        assert_eq!(clean_text("正文第 3 页继续"), "正文继续");
        assert_eq!(clean_text("结尾共 10 页"), "结尾");
    }

    #[test]
    fn test_clean_text_removes_decoration_runs() {
        assert_eq!(clean_text("a####b"), "ab");
        assert_eq!(clean_text("a----b"), "ab");
        assert_eq!(clean_text("a____b"), "ab");
        assert_eq!(clean_text("a===b"), "ab");
        // Two-character runs stay
        assert_eq!(clean_text("a--b"), "a--b");
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("a   b"), "a b");
        assert_eq!(clean_text("  padded  "), "padded");
        // Double newlines survive as paragraph breaks
        assert_eq!(clean_text("a\n\nb"), "a\n\nb");
        // Triple newlines are whitespace runs and collapse to a space
        assert_eq!(clean_text("a\n\n\nb"), "a b");
    }

    #[test]
    fn test_clean_text_blank_input() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("   \n  "), "");
    }

    #[test]
    fn test_split_empty_text() {
        assert!(chunker().split("", 1).is_empty());
        assert!(chunker().split("  \n ", 1).is_empty());
    }

    #[test]
    fn test_short_document_yields_no_chunks() {
        let text = para('a', 150);
        assert!(chunker().split(&text, 1).is_empty());
    }

    #[test]
    fn test_single_chunk() {
        let text = para('a', 300);
        let chunks = chunker().split(&text, 1);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert_eq!(chunks[0].chunk_index, 1);
        assert_eq!(chunks[0].chunk_id, "1_1");
    }

    #[test]
    fn test_paragraphs_pack_until_max() {
        let text = format!("{}\n\n{}", para('a', 200), para('b', 200));
        let chunks = chunker().split(&text, 1);

        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].content,
            format!("{}\n{}", para('a', 200), para('b', 200))
        );
    }

    #[test]
    fn test_overflow_emits_and_seeds_overlap() {
        let text = format!("{}\n\n{}", para('a', 300), para('b', 300));
        let chunks = chunker().split(&text, 7);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, para('a', 300));
        assert_eq!(chunks[0].chunk_id, "7_1");

        // Second chunk starts with the 50-char tail of the first
        let expected = format!("{}\n{}", para('a', 50), para('b', 300));
        assert_eq!(chunks[1].content, expected);
        assert_eq!(chunks[1].chunk_id, "7_2");
    }

    #[test]
    fn test_small_buffer_runs_past_max() {
        let text = format!("{}\n\n{}", para('a', 100), para('b', 450));
        let chunks = chunker().split(&text, 1);

        // 100 < min when the overflow hits, so the buffer absorbs the
        // paragraph instead of emitting a fragment
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content.chars().count(), 551);
    }

    #[test]
    fn test_oversized_paragraph_repacks_by_sentence() {
        // Ten 80-char sentences in one paragraph: 809 chars > 750
        let sentences: Vec<String> = (0..10).map(|_| para('句', 80)).collect();
        let text = sentences.join("。");
        let chunks = chunker().split(&text, 1);

        assert_eq!(chunks.len(), 2);
        // Six sentences pack to 485 chars before the seventh overflows
        assert_eq!(chunks[0].content.chars().count(), 485);
        // Remainder: 50-char overlap seed plus the last four sentences
        assert_eq!(chunks[1].content.chars().count(), 374);
        assert!(chunks[1].content.starts_with(&para('句', 50)));
    }

    #[test]
    fn test_chunk_indexes_are_sequential() {
        let paras: Vec<String> = (0..6).map(|_| para('x', 400)).collect();
        let text = paras.join("\n\n");
        let chunks = chunker().split(&text, 3);

        assert!(chunks.len() >= 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32 + 1);
            assert_eq!(chunk.chunk_id, format!("3_{}", i + 1));
        }
    }

    #[test]
    fn test_counts_code_points_not_bytes() {
        // 300 CJK chars are 900 bytes; still one chunk by char count
        let text = para('文', 300);
        let chunks = chunker().split(&text, 1);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content.chars().count(), 300);
    }
}
