use std::collections::{BTreeMap, HashMap};

use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use super::schema::{collapse_whitespace, element_text, CompiledField, CompiledSchema};
use crate::error::ExtractionError;
use crate::record::RawField;

const MAX_NAME_CHARS: usize = 24;
const BULLETS: &[char] = &['●', '*', '◇', '・', '○', '◆'];

/// Result of extracting one page.
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub fields: Vec<RawField>,
    pub errors: Vec<ExtractionError>,
    /// Duplicate blocks dropped in favour of a more complete one.
    pub duplicates: usize,
}

/// Lazily extract every entry of a parsed document, one `Result` per entry block.
pub fn entries<'a>(
    doc: &'a Html,
    schema: &'a CompiledSchema,
) -> impl Iterator<Item = Result<RawField, ExtractionError>> + 'a {
    let page_meta = schema.page_metadata(doc);
    schema
        .entry_elements(doc)
        .map(move |el| extract_entry(el, schema, &page_meta))
}

/// Extract a whole page, dropping duplicate blocks for the same candidate.
pub fn extract_page(html: &str, schema: &CompiledSchema) -> PageExtraction {
    let doc = Html::parse_document(html);
    let mut out = PageExtraction::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in entries(&doc, schema) {
        let field = match item {
            Ok(f) => f,
            Err(e) => {
                warn!(source = %schema.source_id, "skipping entry: {}", e);
                out.errors.push(e);
                continue;
            }
        };

        match index.get(&field.kanji_name) {
            Some(&i) => {
                out.duplicates += 1;
                if field.completeness() > out.fields[i].completeness() {
                    debug!(name = %field.kanji_name, "duplicate block is more complete, replacing");
                    out.fields[i] = field;
                } else {
                    debug!(name = %field.kanji_name, "dropping less complete duplicate block");
                }
            }
            None => {
                index.insert(field.kanji_name.clone(), out.fields.len());
                out.fields.push(field);
            }
        }
    }

    out
}

fn extract_entry(
    el: ElementRef,
    schema: &CompiledSchema,
    page_meta: &BTreeMap<String, String>,
) -> Result<RawField, ExtractionError> {
    let line = match &schema.line_pattern {
        Some(re) => {
            let text = element_text(el);
            let text = collapse_whitespace(
                text.trim_start_matches(|c: char| BULLETS.contains(&c) || c.is_whitespace()),
            );
            let caps = re
                .captures(&text)
                .ok_or_else(|| ExtractionError::new("entry text does not match line_pattern", &el.html()))?;
            let group = |name: &str| {
                caps.name(name)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty())
            };
            LineValues {
                name: group("name"),
                reading: group("reading"),
                party: group("party"),
                status: group("status"),
            }
        }
        None => LineValues::default(),
    };

    let read = |field: &Option<CompiledField>| field.as_ref().and_then(|f| f.read(el));

    let name = read(&schema.kanji_name)
        .or(line.name)
        .ok_or_else(|| ExtractionError::new("missing kanji_name", &el.html()))?;
    let kanji_name = clean_name(&name).map_err(|reason| ExtractionError::new(reason, &el.html()))?;

    let party = read(&schema.party)
        .or(line.party)
        .map(|p| schema.party_aliases.normalize(&p))
        .filter(|p| !p.is_empty());
    let raw_reading = read(&schema.reading).or(line.reading);
    let status_or_age = read(&schema.status_or_age).or(line.status).unwrap_or_default();

    let mut metadata = schema.constants.clone();
    metadata.extend(page_meta.iter().map(|(k, v)| (k.clone(), v.clone())));
    for (key, field) in &schema.extra {
        if let Some(v) = field.read(el) {
            metadata.insert(key.clone(), v);
        }
    }

    Ok(RawField {
        source_id: schema.source_id.clone(),
        kanji_name,
        party,
        status_or_age,
        raw_reading,
        metadata,
    })
}

#[derive(Default)]
struct LineValues {
    name: Option<String>,
    reading: Option<String>,
    party: Option<String>,
    status: Option<String>,
}

/// Strip inner whitespace (including U+3000) and reject values that cannot be a name.
fn clean_name(raw: &str) -> Result<String, String> {
    let name: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if name.is_empty() {
        return Err("empty kanji_name".to_string());
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(format!("kanji_name longer than {} chars", MAX_NAME_CHARS));
    }
    if name.chars().any(|c| c.is_ascii_digit() || matches!(c, '<' | '>' | '{' | '}' | '=')) {
        return Err(format!("unexpected characters in kanji_name {:?}", name));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeclaredReading, FieldSpec, RunConfig, SchemaConfig, SourceConfig};

    fn spec(sel: &str) -> Option<FieldSpec> {
        Some(FieldSpec {
            selector: Some(sel.to_string()),
            ..Default::default()
        })
    }

    fn card_schema() -> CompiledSchema {
        let source = SourceConfig {
            id: "cards".into(),
            priority: 1,
            urls: vec!["https://example.com".into()],
            discover: None,
            readings: DeclaredReading::Official,
            schema: SchemaConfig {
                entry: "div.cand".into(),
                kanji_name: spec("span.name"),
                reading: spec("span.kana"),
                party: spec("span.party"),
                status_or_age: spec("span.age"),
                line_pattern: None,
                page_fields: [(
                    "district".to_string(),
                    FieldSpec {
                        selector: Some("h1".into()),
                        pattern: Some(r"参院選(.+?)\s*候補者".into()),
                        ..Default::default()
                    },
                )]
                .into_iter()
                .collect(),
                extra: Default::default(),
                scope: None,
            },
            party_aliases: Default::default(),
            default_party_aliases: true,
            metadata: Default::default(),
        };
        CompiledSchema::compile(&source).unwrap()
    }

    fn line_schema() -> CompiledSchema {
        let source = SourceConfig {
            id: "lines".into(),
            priority: 2,
            urls: vec!["https://example.com".into()],
            discover: None,
            readings: DeclaredReading::Ignore,
            schema: SchemaConfig {
                entry: "ul.list li".into(),
                kanji_name: None,
                reading: None,
                party: None,
                status_or_age: None,
                line_pattern: Some(r"^(?P<name>\S+)\s+(?P<status>\d+)\s+(?P<party>[^\d現新前元\s]+)".into()),
                page_fields: Default::default(),
                extra: Default::default(),
                scope: None,
            },
            party_aliases: Default::default(),
            default_party_aliases: true,
            metadata: [("district".to_string(), "比例".to_string())].into_iter().collect(),
        };
        CompiledSchema::compile(&source).unwrap()
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn ten_entries_one_malformed() {
        let page = extract_page(&fixture("ten_entries"), &card_schema());
        assert_eq!(page.fields.len(), 9);
        assert_eq!(page.errors.len(), 1);
        assert!(page.errors[0].reason.contains("kanji_name"));
        assert!(page.fields.iter().all(|f| f.kanji_name != "候補5"));
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let page = extract_page(&fixture("ten_entries"), &card_schema());
        let no_party = page.fields.iter().find(|f| f.kanji_name == "高橋花子").unwrap();
        assert_eq!(no_party.party, None);
        assert_eq!(no_party.raw_reading, None);
        assert_eq!(no_party.status_or_age, "52");
    }

    #[test]
    fn page_fields_and_aliases_apply() {
        let page = extract_page(&fixture("ten_entries"), &card_schema());
        let first = &page.fields[0];
        assert_eq!(first.kanji_name, "山田太郎");
        assert_eq!(first.party.as_deref(), Some("自民"));
        assert_eq!(first.raw_reading.as_deref(), Some("やまだ たろう"));
        assert_eq!(first.metadata.get("district").map(String::as_str), Some("東京"));
    }

    #[test]
    fn duplicate_blocks_keep_most_complete() {
        let page = extract_page(&fixture("duplicate_blocks"), &card_schema());
        assert_eq!(page.fields.len(), 2);
        assert_eq!(page.duplicates, 1);
        let suzuki = &page.fields[0];
        assert_eq!(suzuki.kanji_name, "鈴木一郎");
        assert_eq!(suzuki.party.as_deref(), Some("立憲"));
        assert_eq!(suzuki.raw_reading.as_deref(), Some("すずき いちろう"));
        assert_eq!(page.fields[1].kanji_name, "佐藤花子");
    }

    #[test]
    fn line_pattern_listing() {
        let page = extract_page(&fixture("line_listing"), &line_schema());
        let names: Vec<&str> = page.fields.iter().map(|f| f.kanji_name.as_str()).collect();
        assert_eq!(names, vec!["山田太郎", "田中次郎", "伊藤美咲"]);
        assert_eq!(page.fields[0].party.as_deref(), Some("自"));
        assert_eq!(page.fields[0].status_or_age, "45");
        assert_eq!(page.fields[2].metadata.get("district").map(String::as_str), Some("比例"));
        // the footnote line is the only one that fails
        assert_eq!(page.errors.len(), 1);
    }

    #[test]
    fn entries_are_lazy_per_block() {
        let html = fixture("ten_entries");
        let doc = Html::parse_document(&html);
        let schema = card_schema();
        let mut it = entries(&doc, &schema);
        let first = it.next().unwrap().unwrap();
        assert_eq!(first.kanji_name, "山田太郎");
        assert_eq!(it.count(), 9);
    }

    fn sample_source(id: &str) -> SourceConfig {
        let cfg = RunConfig::load(std::path::Path::new("roster.example.toml")).unwrap();
        cfg.source(id).unwrap().clone()
    }

    #[test]
    fn scope_skips_navigation_and_related_lists() {
        let schema = CompiledSchema::compile(&sample_source("asahi")).unwrap();
        let page = extract_page(&fixture("asahi_page"), &schema);
        let got: Vec<(&str, Option<&str>)> = page
            .fields
            .iter()
            .map(|f| (f.kanji_name.as_str(), f.party.as_deref()))
            .collect();
        assert_eq!(
            got,
            vec![("山田太郎", Some("自民")), ("鈴木一郎", Some("立憲")), ("佐藤花子", Some("公明"))]
        );
        assert!(page.errors.is_empty(), "{:?}", page.errors);
        assert_eq!(page.fields[2].status_or_age, "39");
        assert_eq!(page.fields[0].metadata.get("district").map(String::as_str), Some("東京"));
    }

    #[test]
    fn missing_scope_heading_yields_nothing() {
        let mut source = sample_source("asahi");
        if let Some(scope) = source.schema.scope.as_mut() {
            scope.after = Some("開票結果".into());
        }
        let schema = CompiledSchema::compile(&source).unwrap();
        let page = extract_page(&fixture("asahi_page"), &schema);
        assert!(page.fields.is_empty());
        assert!(page.errors.is_empty());
    }

    #[test]
    fn clean_name_rules() {
        assert_eq!(clean_name("山田　太郎").unwrap(), "山田太郎");
        assert!(clean_name("  ").is_err());
        assert!(clean_name("候補5").is_err());
        assert!(clean_name("<b>山田</b>").is_err());
    }
}
