use serde::Serialize;
use thiserror::Error;

/// A single candidate entry could not be read. The rest of the page is unaffected.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{reason} (near: {raw_snippet})")]
pub struct ExtractionError {
    pub reason: String,
    pub raw_snippet: String,
}

impl ExtractionError {
    pub fn new(reason: impl Into<String>, raw: &str) -> Self {
        ExtractionError {
            reason: reason.into(),
            raw_snippet: snippet(raw, 160),
        }
    }
}

/// No valid hiragana reading could be produced; the candidate is left out of the output.
#[derive(Debug, Clone, Error, Serialize)]
#[error("cannot resolve reading for {kanji_name}: {reason}")]
pub struct ResolutionError {
    pub kanji_name: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("bad url {url}: {reason}")]
    BadUrl { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no sources configured")]
    NoSources,

    #[error("duplicate source id: {0}")]
    DuplicateSource(String),

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("source {source_id}: invalid selector {selector:?}: {reason}")]
    Selector {
        source_id: String,
        selector: String,
        reason: String,
    },

    #[error("source {source_id}: invalid pattern {pattern:?}: {reason}")]
    Pattern {
        source_id: String,
        pattern: String,
        reason: String,
    },

    #[error("source {0}: schema needs either kanji_name or line_pattern")]
    MissingNameField(String),

    #[error("source {0}: no urls and no discovery rule")]
    NoUrls(String),

    #[error("dictionary {path}: {reason}")]
    Dictionary { path: String, reason: String },

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// Cut `raw` down to at most `max` chars on a char boundary, collapsing whitespace.
pub fn snippet(raw: &str, max: usize) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max {
        collapsed
    } else {
        let cut: String = collapsed.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let s = snippet("<li>山田 太郎</li>\n<li>鈴木</li>", 8);
        assert_eq!(s, "<li>山田 太...");
    }

    #[test]
    fn extraction_error_display() {
        let e = ExtractionError::new("missing kanji_name", "<div class=\"c\"></div>");
        assert_eq!(e.to_string(), "missing kanji_name (near: <div class=\"c\"></div>)");
    }
}
