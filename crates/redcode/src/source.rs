//! Source ingestion and line cleanup.
//!
//! Tabs become spaces and everything outside printable ASCII is dropped. When
//! a `;redcode` marker line is present, lines above it are ignored. Blank
//! lines are skipped but every kept line remembers its original number.

use std::fs;
use std::path::Path;

/// A line of cleaned source with its original location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// The source text (without trailing newline).
    pub text: String,
    /// 1-indexed line number in the original file.
    pub original_line: usize,
}

/// Reads a source file into memory.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be read.
pub fn load_source(path: &Path) -> std::io::Result<String> {
    fs::read_to_string(path)
}

/// Whether `line` is a `;redcode`, `;redcode-94` or `;redcode-x` marker.
#[must_use]
pub fn is_redcode_marker(line: &str) -> bool {
    line.get(..8)
        .is_some_and(|head| head.eq_ignore_ascii_case(";redcode"))
}

/// Cleans one raw line.
#[must_use]
pub fn clean_line(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '\t' { ' ' } else { c })
        .filter(|c| (' '..='~').contains(c))
        .collect()
}

/// Cleans `content` and keeps the lines the assembler should see.
#[must_use]
pub fn preprocess(content: &str) -> Vec<SourceLine> {
    let cleaned: Vec<String> = content.lines().map(clean_line).collect();
    let mut ignoring = cleaned.iter().any(|line| is_redcode_marker(line));

    let mut lines = Vec::new();
    for (idx, text) in cleaned.into_iter().enumerate() {
        if is_redcode_marker(&text) {
            ignoring = false;
        }
        if ignoring || text.trim().is_empty() {
            continue;
        }
        lines.push(SourceLine {
            text,
            original_line: idx + 1,
        });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_become_spaces_and_control_bytes_vanish() {
        assert_eq!(clean_line("\tMOV\u{7}\t0, 1\r"), " MOV 0, 1");
    }

    #[test]
    fn blank_lines_are_dropped_but_numbering_is_kept() {
        let lines = preprocess("MOV 0, 1\n\n   \nJMP -1\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].original_line, 4);
        assert_eq!(lines[1].text, "JMP -1");
    }

    #[test]
    fn marker_hides_preamble() {
        let lines = preprocess("this is mail header\nSubject: imp\n;redcode-94\n;name Imp\nMOV 0, 1\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, ";redcode-94");
        assert_eq!(lines[0].original_line, 3);
    }

    #[test]
    fn marker_variants_are_recognized() {
        assert!(is_redcode_marker(";redcode"));
        assert!(is_redcode_marker(";redcode-x verbose"));
        assert!(is_redcode_marker(";REDCODE-94"));
        assert!(!is_redcode_marker(" ;redcode"));
        assert!(!is_redcode_marker(";name"));
    }
}
