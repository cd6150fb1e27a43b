//! Car-radio-safe output file names
//!
//! Head units choke on accents, emoji and long names, so titles are reduced to
//! `[A-Za-z0-9_]` and prefixed with the track's position in the batch.

use unicode_normalization::UnicodeNormalization;

/// Used when nothing printable survives sanitizing
pub const PLACEHOLDER_TITLE: &str = "EPISODE";

/// Title length used with short-title formatting
pub const SHORT_TITLE_LEN: usize = 15;

/// Title length used without short-title formatting
pub const LONG_TITLE_LEN: usize = 60;

/// Reduce a display title to an ASCII, underscore-delimited name of at most `max_len` chars
pub fn sanitize_for_filename(title: &str, max_len: usize) -> String {
    // NFKD splits "é" into "e" + combining accent, which the ASCII filter then drops
    let ascii: String = title.nfkd().filter(char::is_ascii).collect();

    let mut out = String::with_capacity(ascii.len());
    let mut pending_separator = false;
    for c in ascii.chars() {
        if c.is_ascii_whitespace() || c == '-' || c == '_' {
            pending_separator = true;
        } else if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c);
        }
        // Anything else is stripped without breaking the current word
    }

    out.truncate(max_len);
    let trimmed = out.trim_matches('_');

    if trimmed.is_empty() {
        PLACEHOLDER_TITLE.chars().take(max_len).collect()
    } else {
        trimmed.to_string()
    }
}

/// Final file name for the `index`-th (1-based) file of a batch
pub fn output_file_name(index: usize, title: &str, short_titles: bool) -> String {
    let max_len = if short_titles {
        SHORT_TITLE_LEN
    } else {
        LONG_TITLE_LEN
    };
    format!("{:03}_{}.mp3", index, sanitize_for_filename(title, max_len))
}
