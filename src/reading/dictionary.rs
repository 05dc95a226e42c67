use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use super::kana::{is_hiragana, katakana_to_hiragana};
use crate::error::ConfigError;

const BUILTIN: &str = include_str!("names.dic");

/// Kanji → hiragana conversion engine.
///
/// Implementations must be deterministic: the same input always yields the same output.
/// Characters the engine cannot read are passed through unchanged so the caller can
/// tell a failed conversion from a successful one.
pub trait KanaConverter: Send + Sync {
    fn to_hiragana(&self, text: &str) -> String;
}

/// General-purpose reading from the kakasi kanji dictionary.
#[derive(Debug, Clone, Copy, Default)]
pub struct KakasiConverter;

impl KanaConverter for KakasiConverter {
    fn to_hiragana(&self, text: &str) -> String {
        kakasi::convert(text).hiragana
    }
}

/// Name table layered over a general engine.
///
/// A whole-name entry wins. Otherwise a known head (surname) is split off and the
/// tail is read from the table when it is a known given name, or by the engine.
/// Single-character heads only count when the tail is known too. Anything else
/// goes to the engine whole.
#[derive(Debug, Clone)]
pub struct DictionaryConverter<F = KakasiConverter> {
    entries: HashMap<String, String>,
    max_key_chars: usize,
    fallback: F,
}

impl DictionaryConverter {
    /// Built-in name table over kakasi.
    pub fn builtin() -> Self {
        Self::with_fallback(KakasiConverter)
    }

    /// Built-in table followed by user files, each overriding the ones before it.
    pub fn with_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        let mut conv = Self::builtin();
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Dictionary {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let added = conv.add_entries(&text).map_err(|reason| ConfigError::Dictionary {
                path: path.display().to_string(),
                reason,
            })?;
            info!("Loaded {} dictionary entries from {}", added, path.display());
        }
        Ok(conv)
    }
}

impl<F: KanaConverter> DictionaryConverter<F> {
    /// Built-in name table over the given engine.
    pub fn with_fallback(fallback: F) -> Self {
        let mut conv = DictionaryConverter {
            entries: HashMap::new(),
            max_key_chars: 0,
            fallback,
        };
        // the embedded file is covered by tests; a bad line there is a build defect
        if let Err(e) = conv.add_entries(BUILTIN) {
            panic!("built-in dictionary: {}", e);
        }
        conv
    }

    /// Parse `kanji<TAB>reading` lines. Within one text the first entry for a key wins;
    /// entries override whatever was loaded before. Returns the number of keys added.
    pub fn add_entries(&mut self, text: &str) -> Result<usize, String> {
        let mut batch: HashMap<String, String> = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, reading) = line
                .split_once('\t')
                .ok_or_else(|| format!("line {}: expected kanji<TAB>reading", lineno + 1))?;
            let key = key.trim();
            let reading = katakana_to_hiragana(reading.trim());
            if key.is_empty() || reading.is_empty() || !reading.chars().all(is_hiragana) {
                return Err(format!("line {}: bad entry {:?}", lineno + 1, line));
            }
            batch.entry(key.to_string()).or_insert(reading);
        }

        let added = batch.len();
        for (key, reading) in batch {
            self.max_key_chars = self.max_key_chars.max(key.chars().count());
            self.entries.insert(key, reading);
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn engine(&self, text: &str) -> String {
        katakana_to_hiragana(&self.fallback.to_hiragana(text))
    }
}

impl<F: KanaConverter> KanaConverter for DictionaryConverter<F> {
    fn to_hiragana(&self, text: &str) -> String {
        let name: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if let Some(r) = self.lookup(&name) {
            return r.to_string();
        }

        let chars: Vec<char> = name.chars().collect();
        let longest = self.max_key_chars.min(chars.len().saturating_sub(1));
        let split = |n: usize| -> (String, String) {
            (chars[..n].iter().collect(), chars[n..].iter().collect())
        };

        for n in (1..=longest).rev() {
            let (head, tail) = split(n);
            if let (Some(h), Some(t)) = (self.lookup(&head), self.lookup(&tail)) {
                return format!("{}{}", h, t);
            }
        }
        for n in (2..=longest).rev() {
            let (head, tail) = split(n);
            if let Some(h) = self.lookup(&head) {
                return format!("{}{}", h, self.engine(&tail));
            }
        }

        self.engine(&name)
    }
}

/// Leaves text as it is, so anything outside the name table stays unread.
#[cfg(test)]
pub struct Untranslated;

#[cfg(test)]
impl KanaConverter for Untranslated {
    fn to_hiragana(&self, text: &str) -> String {
        text.to_string()
    }
}
