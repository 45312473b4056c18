use crate::config::IngestConfig;
use crate::error::{CodescribeError, Result};

/// Separators of the splitter profile applied to every file, tried in order.
/// The trailing empty separator splits between characters.
pub const CODE_SEPARATORS: &[&str] = &["\nclass ", "\ndef ", "\n\tdef ", "\n\n", "\n", " ", ""];

/// Recursive character splitter producing fixed-size overlapping windows.
///
/// Text is cut at the first separator (in priority order) that occurs in it,
/// keeping the separator at the start of the following piece. Pieces are then
/// merged greedily into windows of at most `chunk_size` characters, carrying
/// up to `chunk_overlap` characters of trailing context into the next window.
/// Pieces that are still too large are split again with the remaining
/// separators.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    separators: Vec<String>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveCharacterSplitter {
    pub fn new(separators: &[&str], chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CodescribeError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(CodescribeError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            separators: separators.iter().map(|s| s.to_string()).collect(),
            chunk_size,
            chunk_overlap,
        })
    }

    /// The single profile used for all files.
    pub fn for_code(config: &IngestConfig) -> Result<Self> {
        Self::new(CODE_SEPARATORS, config.chunk_size, config.chunk_overlap)
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];

        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }

        chunks
    }

    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !current.is_empty() {
                if total > self.chunk_size {
                    log::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        self.chunk_size
                    );
                }
                push_window(&mut windows, &current);

                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        push_window(&mut windows, &current);
        windows
    }
}

fn push_window(windows: &mut Vec<String>, parts: &std::collections::VecDeque<&str>) {
    let joined: String = parts.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        windows.push(trimmed.to_string());
    }
}

/// Split `text` on `separator`, re-attaching the separator to the start of
/// each following piece. An empty separator splits into characters.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }

    let mut parts = text.split(separator);
    let mut pieces = Vec::new();

    if let Some(first) = parts.next() {
        if !first.is_empty() {
            pieces.push(first.to_string());
        }
    }
    for part in parts {
        pieces.push(format!("{}{}", separator, part));
    }

    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(size: usize, overlap: usize) -> RecursiveCharacterSplitter {
        RecursiveCharacterSplitter::new(CODE_SEPARATORS, size, overlap).unwrap()
    }

    #[test]
    fn test_short_text_single_window() {
        let chunks = splitter(2000, 200).split_text("def main():\n    print('hello')\n");
        assert_eq!(chunks, vec!["def main():\n    print('hello')"]);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(splitter(100, 10).split_text("").is_empty());
        assert!(splitter(100, 10).split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn test_windows_respect_size() {
        let text = "word ".repeat(1000);
        let chunks = splitter(200, 20).split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 200, "chunk too long: {}", char_len(chunk));
        }
    }

    #[test]
    fn test_consecutive_windows_overlap() {
        let text: String = (0..300).map(|i| format!("token{} ", i)).collect();
        let chunks = splitter(100, 30).split_text(&text);

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].contains(last_word),
                "expected '{}' to carry over into next window",
                last_word
            );
        }
    }

    #[test]
    fn test_class_separator_preferred() {
        let body = "    x = 1\n".repeat(8);
        let text = format!("import os\nclass A:\n{}class B:\n{}", body, body);
        let chunks = splitter(95, 0).split_text(&text);

        assert!(chunks.iter().any(|c| c.starts_with("class A:")));
        assert!(chunks.iter().any(|c| c.starts_with("class B:")));
    }

    #[test]
    fn test_multibyte_text_is_split_on_chars() {
        let text = "é".repeat(50);
        let chunks = splitter(20, 5).split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 20);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "alpha beta\n\ngamma delta\n".repeat(200);
        let s = splitter(150, 25);
        assert_eq!(s.split_text(&text), s.split_text(&text));
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        assert!(RecursiveCharacterSplitter::new(CODE_SEPARATORS, 10, 10).is_err());
        assert!(RecursiveCharacterSplitter::new(CODE_SEPARATORS, 0, 0).is_err());
    }

    #[test]
    fn test_split_keeping_separator() {
        assert_eq!(
            split_keeping_separator("a\n\nb\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\nc"]
        );
        assert_eq!(split_keeping_separator("\n\nb", "\n\n"), vec!["\n\nb"]);
    }
}
