//! Splitting file content into overlapping, boundary-aligned chunks

use super::language::{self, detect_language, supports_code_chunking};
use super::{Chunk, ChunkOptions};
use std::path::Path;

/// Chunker with text and code-aware strategies.
///
/// Code files are split at definition boundaries; everything else (and
/// code files where no boundary is found) falls back to line-based
/// chunking with a character-budget overlap.
pub struct TextChunker {
    opts: ChunkOptions,
}

impl TextChunker {
    /// Create a chunker. Zero-valued size options fall back to defaults.
    pub fn new(opts: ChunkOptions) -> Self {
        let defaults = ChunkOptions::default();
        let opts = ChunkOptions {
            chunk_size: if opts.chunk_size == 0 {
                defaults.chunk_size
            } else {
                opts.chunk_size
            },
            chunk_overlap: opts.chunk_overlap,
            min_chunk_size: if opts.min_chunk_size == 0 {
                defaults.min_chunk_size
            } else {
                opts.min_chunk_size
            },
        };
        Self { opts }
    }

    /// Split content into chunks, choosing the strategy from the
    /// filename's detected language.
    pub fn chunk(&self, content: &str, filename: impl AsRef<Path>) -> Vec<Chunk> {
        if content.is_empty() {
            return Vec::new();
        }

        let lang = detect_language(filename);
        if supports_code_chunking(lang) {
            self.chunk_code(content, lang)
        } else {
            self.chunk_text(content)
        }
    }

    /// Line-based chunking with trailing-line overlap.
    pub fn chunk_text(&self, content: &str) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::new();
        let lines: Vec<&str> = content.split('\n').collect();

        let mut chunk_start = 0usize;
        let mut chunk_start_char = 0usize;
        let mut current_size = 0usize;
        let mut current_lines: Vec<&str> = Vec::new();

        for (line_num, line) in lines.iter().enumerate() {
            let line_len = char_len(line) + 1; // +1 for the newline

            if current_size + line_len > self.opts.chunk_size && !current_lines.is_empty() {
                chunks.push(Chunk {
                    content: current_lines.join("\n"),
                    start_line: chunk_start + 1,
                    end_line: chunk_start + current_lines.len(),
                    start_char: chunk_start_char,
                    end_char: chunk_start_char + current_size - 1,
                    chunk_index: chunks.len(),
                });

                let (overlap_lines, overlap_size) = self.overlap_tail(&current_lines);

                chunk_start = line_num - overlap_lines.len();
                chunk_start_char = chunk_start_char + current_size - overlap_size;
                current_size = overlap_size;
                current_lines = overlap_lines;
            }

            current_lines.push(line);
            current_size += line_len;
        }

        if !current_lines.is_empty() {
            let content = current_lines.join("\n");
            if chunks.is_empty() || char_len(&content) >= self.opts.min_chunk_size {
                chunks.push(Chunk {
                    content,
                    start_line: chunk_start + 1,
                    end_line: chunk_start + current_lines.len(),
                    start_char: chunk_start_char,
                    end_char: chunk_start_char + current_size - 1,
                    chunk_index: chunks.len(),
                });
            } else if let Some(prev) = chunks.last_mut() {
                // Tail too small: fold it into the previous chunk
                prev.content.push('\n');
                prev.content.push_str(&content);
                prev.end_line = chunk_start + current_lines.len();
                prev.end_char = chunk_start_char + current_size - 1;
            }
        }

        chunks
    }

    /// Walk the tail of the emitted lines backwards until the overlap
    /// character budget is met.
    fn overlap_tail<'a>(&self, lines: &[&'a str]) -> (Vec<&'a str>, usize) {
        if self.opts.chunk_overlap == 0 || lines.is_empty() {
            return (Vec::new(), 0);
        }

        let mut overlap_lines: Vec<&str> = Vec::new();
        let mut overlap_size = 0usize;

        for line in lines.iter().rev() {
            if overlap_size >= self.opts.chunk_overlap {
                break;
            }
            overlap_lines.insert(0, line);
            overlap_size += char_len(line) + 1;
        }

        (overlap_lines, overlap_size)
    }

    /// Code-aware chunking along definition boundaries.
    fn chunk_code(&self, content: &str, lang: &str) -> Vec<Chunk> {
        let lines: Vec<&str> = content.split('\n').collect();
        let boundaries = find_code_boundaries(&lines, lang);

        if boundaries.is_empty() {
            return self.chunk_text(content);
        }

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut char_offset = 0usize;

        for (i, &boundary) in boundaries.iter().enumerate() {
            let end_line = if i + 1 < boundaries.len() {
                boundaries[i + 1]
            } else {
                lines.len()
            };

            let block_lines = &lines[boundary..end_line];
            let block = block_lines.join("\n");
            let block_len = char_len(&block);

            if block_len > self.opts.chunk_size * 2 {
                // Oversized block: split with the text strategy, then
                // bias the offsets back to the block's origin.
                for mut sub in self.chunk_text(&block) {
                    sub.start_line += boundary;
                    sub.end_line += boundary;
                    sub.start_char += char_offset;
                    sub.end_char += char_offset;
                    sub.chunk_index = chunks.len();
                    chunks.push(sub);
                }
            } else if block_len >= self.opts.min_chunk_size {
                chunks.push(Chunk {
                    content: block,
                    start_line: boundary + 1,
                    end_line,
                    start_char: char_offset,
                    end_char: char_offset + block_len,
                    chunk_index: chunks.len(),
                });
            }

            for line in block_lines {
                char_offset += char_len(line) + 1;
            }
        }

        if chunks.is_empty() {
            return self.chunk_text(content);
        }

        chunks
    }
}

/// Codepoint count, not bytes.
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Find line indices where code blocks start.
fn find_code_boundaries(lines: &[&str], lang: &str) -> Vec<usize> {
    let mut boundaries = Vec::new();
    let mut in_block_comment = false;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        if trimmed.contains("/*") {
            in_block_comment = true;
        }
        if trimmed.contains("*/") {
            in_block_comment = false;
            continue;
        }
        if in_block_comment {
            continue;
        }

        if is_definition_start(trimmed, lang) {
            boundaries.push(i);
        }
    }

    if boundaries.is_empty() {
        boundaries.push(0);
    } else if boundaries[0] > 0 {
        // Keep any prelude (imports, package header) in a leading chunk
        boundaries.insert(0, 0);
    }

    boundaries
}

/// Does this trimmed line start a function/class/type definition?
fn is_definition_start(line: &str, lang: &str) -> bool {
    match lang {
        language::LANG_GO => {
            line.starts_with("func ")
                || line.starts_with("type ")
                || line.starts_with("const ")
                || line.starts_with("var ")
        }

        language::LANG_TYPESCRIPT | language::LANG_JAVASCRIPT => {
            line.starts_with("function ")
                || line.starts_with("class ")
                || line.starts_with("interface ")
                || line.starts_with("type ")
                || line.starts_with("const ")
                || line.starts_with("let ")
                || line.starts_with("export function ")
                || line.starts_with("export class ")
                || line.starts_with("export interface ")
                || line.starts_with("export type ")
                || line.starts_with("export const ")
                || line.starts_with("export default ")
        }

        language::LANG_PYTHON => {
            line.starts_with("def ") || line.starts_with("class ") || line.starts_with("async def ")
        }

        language::LANG_RUST => {
            line.starts_with("fn ")
                || line.starts_with("pub fn ")
                || line.starts_with("struct ")
                || line.starts_with("pub struct ")
                || line.starts_with("enum ")
                || line.starts_with("pub enum ")
                || line.starts_with("impl ")
                || line.starts_with("trait ")
                || line.starts_with("pub trait ")
        }

        language::LANG_JAVA => {
            line.contains("class ")
                || line.contains("interface ")
                || line.contains("enum ")
                || (line.contains('(')
                    && line.contains(')')
                    && (line.contains("public ")
                        || line.contains("private ")
                        || line.contains("protected ")
                        || line.contains("static ")))
        }

        language::LANG_C | language::LANG_CPP => {
            // Heuristic: parenthesized line that is not a statement,
            // preprocessor directive, or comment
            (line.contains('(')
                && !line.ends_with(';')
                && !line.starts_with("//")
                && !line.starts_with('#'))
                || line.starts_with("struct ")
                || line.starts_with("class ")
                || line.starts_with("namespace ")
        }

        language::LANG_CSHARP => {
            line.contains("class ")
                || line.contains("interface ")
                || line.contains("struct ")
                || line.contains("enum ")
                || line.contains("namespace ")
        }

        language::LANG_RUBY => {
            line.starts_with("def ") || line.starts_with("class ") || line.starts_with("module ")
        }

        language::LANG_PHP => {
            line.starts_with("function ")
                || line.contains("class ")
                || line.contains("interface ")
                || line.contains("trait ")
        }

        language::LANG_SWIFT => {
            line.starts_with("func ")
                || line.starts_with("class ")
                || line.starts_with("struct ")
                || line.starts_with("enum ")
                || line.starts_with("protocol ")
                || line.starts_with("extension ")
        }

        language::LANG_KOTLIN => {
            line.starts_with("fun ")
                || line.starts_with("class ")
                || line.starts_with("interface ")
                || line.starts_with("object ")
                || line.starts_with("data class ")
        }

        language::LANG_SCALA => {
            line.starts_with("def ")
                || line.starts_with("class ")
                || line.starts_with("object ")
                || line.starts_with("trait ")
                || line.starts_with("case class ")
        }

        _ => false,
    }
}
