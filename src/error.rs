use std::io;

use thiserror::Error;

/// Number of leading input characters quoted in a [`SimfileError`].
pub const EXCERPT_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("about to parse notes but never got bpm")]
    MissingBpms,

    #[error(
        "{title}, {mode}, {difficulty} -- error parsing freezes, found a new starting freeze \
         in lane {lane} before a previous one finished"
    )]
    FreezeReopened {
        title: String,
        mode: String,
        difficulty: String,
        lane: usize,
    },

    #[error("#NOTES header ended before its five fields were read")]
    TruncatedNotesHeader,

    #[error("failed to read simfile: {0}")]
    Io(#[from] io::Error),
}

/// A failed parse of one simfile, quoting the start of the input.
#[derive(Debug, Error)]
#[error("error, {source}, parsing {excerpt}")]
pub struct SimfileError {
    #[source]
    pub source: ParseError,
    pub excerpt: String,
}

impl SimfileError {
    pub fn new(source: ParseError, text: &str) -> Self {
        Self {
            source,
            excerpt: text.chars().take(EXCERPT_CHARS).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_with_excerpt() {
        let text = "#TITLE:x;".repeat(100);
        let err = SimfileError::new(ParseError::MissingBpms, &text);
        assert_eq!(err.excerpt.chars().count(), EXCERPT_CHARS);
        let msg = err.to_string();
        assert!(msg.starts_with("error, about to parse notes but never got bpm, parsing #TITLE:x;"));
    }
}
