use std::collections::BTreeMap;

pub const CONFLICTS_KEY: &str = "conflicts";

/// One scraped candidate entry before its reading is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    pub source_id: String,
    pub kanji_name: String,
    pub party: Option<String>,
    pub status_or_age: String,
    pub raw_reading: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl RawField {
    pub fn new(source_id: &str, kanji_name: &str) -> Self {
        RawField {
            source_id: source_id.to_string(),
            kanji_name: kanji_name.to_string(),
            party: None,
            status_or_age: String::new(),
            raw_reading: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Number of optional fields carrying a value. Used to pick between
    /// duplicate blocks for the same candidate on one page.
    pub fn completeness(&self) -> usize {
        let mut n = self.metadata.values().filter(|v| !v.is_empty()).count();
        if self.party.as_deref().is_some_and(|p| !p.is_empty()) {
            n += 1;
        }
        if !self.status_or_age.is_empty() {
            n += 1;
        }
        if self.raw_reading.as_deref().is_some_and(|r| !r.trim().is_empty()) {
            n += 1;
        }
        n
    }
}

/// Canonical output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub kanji_name: String,
    pub yomi: String,
    pub party: String,
    pub metadata: BTreeMap<String, String>,
}

impl CandidateRecord {
    /// Read a mergeable field by name: `yomi`, `party`, or a metadata key.
    pub fn field(&self, name: &str) -> &str {
        match name {
            "yomi" => &self.yomi,
            "party" => &self.party,
            key => self.metadata.get(key).map(String::as_str).unwrap_or(""),
        }
    }

    pub fn set_field(&mut self, name: &str, value: &str) {
        match name {
            "yomi" => self.yomi = value.to_string(),
            "party" => self.party = value.to_string(),
            key => {
                self.metadata.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Names of all fields that take part in a merge, in a fixed order.
    pub fn mergeable_fields(&self) -> Vec<String> {
        let mut fields = vec!["yomi".to_string(), "party".to_string()];
        fields.extend(
            self.metadata
                .keys()
                .filter(|k| k.as_str() != CONFLICTS_KEY)
                .cloned(),
        );
        fields
    }
}
