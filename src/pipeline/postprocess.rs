//! Post-processing: deterministic text cleanup.
//!
//! Two entry points serve the two places text gets flattened:
//!
//! * [`join_trimmed_lines`] flattens one page of native text into a single
//!   space-joined line (native extraction, 4 cheap passes).
//! * [`normalize`] produces the final output of a run: one cleaned line per
//!   input line, sorted lexicographically.
//!
//! The sort is deliberate. Output order is alphabetical, not reading order,
//! so that two runs over similar documents can be diffed and deduplicated
//! line by line. Every rule is idempotent and so is their composition:
//! `normalize(normalize(x)) == normalize(x)`.
//!
//! ## Rule Order
//!
//! Line endings are normalised before splitting, and invisible characters
//! are stripped before whitespace is collapsed so that removing a zero-width
//! space cannot leave a double space behind.

use once_cell::sync::Lazy;
use regex::Regex;

/// Final normalisation of a run's aggregated text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Collapse runs of horizontal whitespace to a single space
/// 4. Trim every line and drop blank ones
/// 5. Sort lines lexicographically
/// 6. Join with `\n` (no trailing newline)
pub fn normalize(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = collapse_inline_whitespace(&s);
    let mut lines = trimmed_lines(&s);
    lines.sort_unstable();
    lines.join("\n")
}

/// Trim every line of `input`, drop blank lines, and join the rest with
/// single spaces.
pub fn join_trimmed_lines(input: &str) -> String {
    let s = normalise_line_endings(input);
    trimmed_lines(&s).join(" ")
}

/// Concatenate per-page texts in the given order, newline separated,
/// skipping pages that produced nothing.
pub fn join_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
    pages
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Collapse inline whitespace ──────────────────────────────────────

static RE_INLINE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());

fn collapse_inline_whitespace(input: &str) -> String {
    RE_INLINE_WS.replace_all(input, " ").to_string()
}

// ── Rule 4: Trim lines, drop blanks ─────────────────────────────────────────

fn trimmed_lines(input: &str) -> Vec<&str> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sorts_and_trims() {
        let input = "  zebra crossing \n\n apple\t pie\nMango\n";
        assert_eq!(normalize(input), "Mango\napple pie\nzebra crossing");
    }

    #[test]
    fn test_normalize_single_line_untouched() {
        assert_eq!(normalize("Invoice Number 12345"), "Invoice Number 12345");
    }

    #[test]
    fn test_normalize_empty_and_blank() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t\n \r\n"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "b\na",
            "  x  y  \r\n\r\nz\u{200B}\n\u{FEFF}\n",
            "Bill of Lading\nCMR\n  Invoice  \n",
            "a \u{200B} b\n\ta\tb",
            "ünïcödé\nascii\n日本語",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input {s:?}");
        }
    }

    #[test]
    fn test_zero_width_removal_does_not_leave_double_space() {
        assert_eq!(normalize("a \u{200B} b"), "a b");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_join_trimmed_lines() {
        assert_eq!(
            join_trimmed_lines("  Invoice  \n\n Number 12345 \r\n"),
            "Invoice Number 12345"
        );
        assert_eq!(join_trimmed_lines("\n \n"), "");
    }

    #[test]
    fn test_join_pages_skips_empty() {
        assert_eq!(join_pages(["first", "", "  ", "third"]), "first\nthird");
        assert_eq!(join_pages(Vec::<&str>::new()), "");
    }
}
