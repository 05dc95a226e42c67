pub mod dictionary;
pub mod kana;
pub mod romaji;

use std::sync::LazyLock;

use regex::Regex;

use crate::config::DeclaredReading;
use crate::error::ResolutionError;
use crate::record::{CandidateRecord, RawField};
use dictionary::KanaConverter;

static AGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{2,3})").unwrap());

/// How much a raw reading can be trusted. Decided per field, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingQuality {
    /// Printed on the current election listing.
    Official,
    /// Printed, but possibly from an earlier election.
    Stale,
    /// Nothing usable printed.
    Absent,
}

impl ReadingQuality {
    pub fn classify(raw_reading: Option<&str>, declared: DeclaredReading) -> Self {
        match raw_reading.map(str::trim) {
            None | Some("") => ReadingQuality::Absent,
            Some(_) => match declared {
                DeclaredReading::Official => ReadingQuality::Official,
                DeclaredReading::Stale => ReadingQuality::Stale,
                DeclaredReading::Ignore => ReadingQuality::Absent,
            },
        }
    }
}

/// Turns a `RawField` into a `CandidateRecord` with a validated hiragana reading.
pub struct ReadingResolver<C: KanaConverter> {
    converter: C,
}

impl<C: KanaConverter> ReadingResolver<C> {
    pub fn new(converter: C) -> Self {
        ReadingResolver { converter }
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Choose the reading for one field.
    ///
    /// An official reading is normalized and kept. A stale or missing one is thrown
    /// away and the reading is derived from the kanji name instead.
    pub fn yomi(&self, field: &RawField, quality: ReadingQuality) -> Result<String, ResolutionError> {
        let fail = |reason: String| ResolutionError {
            kanji_name: field.kanji_name.clone(),
            reason,
        };

        match quality {
            ReadingQuality::Official => {
                let supplied = field.raw_reading.as_deref().unwrap_or_default();
                let yomi = kana::normalize_reading(supplied);
                if kana::is_valid_yomi(&yomi) {
                    Ok(yomi)
                } else {
                    Err(fail(format!("supplied reading {:?} is not kana", supplied)))
                }
            }
            ReadingQuality::Stale | ReadingQuality::Absent => {
                let yomi = kana::normalize_reading(&self.converter.to_hiragana(&field.kanji_name));
                if kana::is_valid_yomi(&yomi) {
                    Ok(yomi)
                } else if yomi.is_empty() {
                    Err(fail("conversion produced nothing".to_string()))
                } else {
                    let unread: String = yomi.chars().filter(|c| !kana::is_yomi_char(*c)).collect();
                    Err(fail(format!("no reading for {:?}", unread)))
                }
            }
        }
    }

    pub fn resolve(
        &self,
        field: &RawField,
        declared: DeclaredReading,
    ) -> Result<CandidateRecord, ResolutionError> {
        let quality = ReadingQuality::classify(field.raw_reading.as_deref(), declared);
        let yomi = self.yomi(field, quality)?;

        let mut metadata = field.metadata.clone();
        if !field.status_or_age.is_empty() {
            metadata.insert("status_or_age".to_string(), field.status_or_age.clone());
            if let Some(age) = AGE_RE.captures(&field.status_or_age) {
                metadata.insert("age".to_string(), age[1].to_string());
            }
        }

        Ok(CandidateRecord {
            kanji_name: field.kanji_name.clone(),
            yomi,
            party: field.party.clone().unwrap_or_default(),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dictionary::{DictionaryConverter, Untranslated};

    fn resolver() -> ReadingResolver<DictionaryConverter> {
        ReadingResolver::new(DictionaryConverter::builtin())
    }

    fn raw(name: &str, reading: Option<&str>) -> RawField {
        let mut f = RawField::new("test", name);
        f.raw_reading = reading.map(str::to_string);
        f
    }

    /// Always answers the same thing; proves the branch choice does not depend on the engine.
    struct Fixed(&'static str);

    impl KanaConverter for Fixed {
        fn to_hiragana(&self, _text: &str) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn classify_quality() {
        use DeclaredReading::*;
        assert_eq!(ReadingQuality::classify(None, Official), ReadingQuality::Absent);
        assert_eq!(ReadingQuality::classify(Some("  "), Official), ReadingQuality::Absent);
        assert_eq!(ReadingQuality::classify(Some("やまだ"), Official), ReadingQuality::Official);
        assert_eq!(ReadingQuality::classify(Some("やまだ"), Stale), ReadingQuality::Stale);
        assert_eq!(ReadingQuality::classify(Some("やまだ"), Ignore), ReadingQuality::Absent);
    }

    #[test]
    fn official_reading_is_normalized_not_replaced() {
        let r = ReadingResolver::new(Fixed("ちがう"));
        let f = raw("鈴木一郎", Some(" スズキ　イチロウ "));
        let rec = r.resolve(&f, DeclaredReading::Official).unwrap();
        assert_eq!(rec.yomi, "すずきいちろう");

        let f = raw("鈴木一郎", Some("ｽｽﾞｷ ｲﾁﾛｳ"));
        assert_eq!(r.resolve(&f, DeclaredReading::Official).unwrap().yomi, "すずきいちろう");
    }

    #[test]
    fn stale_reading_is_discarded() {
        let f = raw("山田太郎", Some("やまだはなこ"));
        let rec = resolver().resolve(&f, DeclaredReading::Stale).unwrap();
        assert_eq!(rec.yomi, "やまだたろう");
        assert_ne!(rec.yomi, "やまだはなこ");

        let r = ReadingResolver::new(Fixed("ほかのよみ"));
        assert_eq!(r.resolve(&f, DeclaredReading::Stale).unwrap().yomi, "ほかのよみ");
    }

    #[test]
    fn absent_reading_is_converted() {
        let f = raw("鈴木一郎", None);
        let rec = resolver().resolve(&f, DeclaredReading::Official).unwrap();
        assert_eq!(rec.kanji_name, "鈴木一郎");
        assert_eq!(rec.yomi, "すずきいちろう");
    }

    #[test]
    fn resolution_is_idempotent() {
        let r = resolver();
        let f = raw("渡辺健一", Some("わたなべ"));
        let a = r.resolve(&f, DeclaredReading::Stale).unwrap();
        let b = r.resolve(&f, DeclaredReading::Stale).unwrap();
        assert_eq!(a.yomi, b.yomi);
    }

    #[test]
    fn unreadable_name_fails() {
        let table_only = ReadingResolver::new(DictionaryConverter::with_fallback(Untranslated));
        let err = table_only.resolve(&raw("鈴木彁", None), DeclaredReading::Stale).unwrap_err();
        assert_eq!(err.kanji_name, "鈴木彁");
        assert!(err.reason.contains('彁'));

        let err = ReadingResolver::new(Fixed(""))
            .resolve(&raw("山田", None), DeclaredReading::Stale)
            .unwrap_err();
        assert!(err.reason.contains("nothing"));
    }

    #[test]
    fn invalid_official_reading_fails_instead_of_falling_back() {
        let err = resolver()
            .resolve(&raw("山田太郎", Some("Yamada Taro")), DeclaredReading::Official)
            .unwrap_err();
        assert!(err.reason.contains("not kana"));
    }

    #[test]
    fn metadata_carries_age_and_status() {
        let mut f = raw("山田太郎", None);
        f.status_or_age = "45歳 現職".into();
        f.party = Some("自民".into());
        f.metadata.insert("district".into(), "東京".into());
        let rec = resolver().resolve(&f, DeclaredReading::Stale).unwrap();
        assert_eq!(rec.party, "自民");
        assert_eq!(rec.metadata["age"], "45");
        assert_eq!(rec.metadata["status_or_age"], "45歳 現職");
        assert_eq!(rec.metadata["district"], "東京");
    }
}
