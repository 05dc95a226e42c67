use std::collections::BTreeMap;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::party::PartyAliases;
use crate::config::{DeclaredReading, FieldSpec, ScopeConfig, SourceConfig};
use crate::error::ConfigError;

/// A source's extraction schema with every selector and regex compiled.
#[derive(Debug)]
pub struct CompiledSchema {
    pub source_id: String,
    pub entry: Selector,
    pub scope: Option<CompiledScope>,
    pub kanji_name: Option<CompiledField>,
    pub reading: Option<CompiledField>,
    pub party: Option<CompiledField>,
    pub status_or_age: Option<CompiledField>,
    pub line_pattern: Option<Regex>,
    pub page_fields: Vec<(String, CompiledField)>,
    pub extra: Vec<(String, CompiledField)>,
    pub party_aliases: PartyAliases,
    pub readings: DeclaredReading,
    pub constants: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct CompiledScope {
    heading: Selector,
    after: Option<String>,
    stop_prefix: Vec<String>,
    stop_contains: Vec<String>,
}

#[derive(Debug)]
pub struct CompiledField {
    selector: Option<Selector>,
    attr: Option<String>,
    own_text: bool,
    pattern: Option<Regex>,
}

impl CompiledSchema {
    pub fn compile(source: &SourceConfig) -> Result<Self, ConfigError> {
        let id = source.id.as_str();
        let schema = &source.schema;

        let line_pattern = schema
            .line_pattern
            .as_deref()
            .map(|p| compile_regex(id, p))
            .transpose()?;
        if let Some(re) = &line_pattern {
            if !re.capture_names().any(|n| n == Some("name")) {
                return Err(ConfigError::Pattern {
                    source_id: id.to_string(),
                    pattern: re.as_str().to_string(),
                    reason: "line_pattern needs a (?P<name>...) group".to_string(),
                });
            }
        }

        let field = |spec: &Option<FieldSpec>| -> Result<Option<CompiledField>, ConfigError> {
            spec.as_ref().map(|s| CompiledField::compile(id, s)).transpose()
        };
        let named = |specs: &BTreeMap<String, FieldSpec>| -> Result<Vec<(String, CompiledField)>, ConfigError> {
            specs
                .iter()
                .map(|(k, s)| Ok((k.clone(), CompiledField::compile(id, s)?)))
                .collect()
        };

        Ok(CompiledSchema {
            source_id: id.to_string(),
            entry: compile_selector(id, &schema.entry)?,
            scope: schema
                .scope
                .as_ref()
                .map(|s| CompiledScope::compile(id, s))
                .transpose()?,
            kanji_name: field(&schema.kanji_name)?,
            reading: field(&schema.reading)?,
            party: field(&schema.party)?,
            status_or_age: field(&schema.status_or_age)?,
            line_pattern,
            page_fields: named(&schema.page_fields)?,
            extra: named(&schema.extra)?,
            party_aliases: PartyAliases::new(source.default_party_aliases, &source.party_aliases),
            readings: source.readings,
            constants: source.metadata.clone(),
        })
    }

    /// Entry blocks in document order, limited to the scope when one is set.
    pub fn entry_elements<'a>(&'a self, doc: &'a Html) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        let scope = self.scope.as_ref();
        doc.tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .skip_while(move |el| scope.is_some_and(|s| !s.opens_at(el)))
            .filter(move |el| self.entry.matches(el))
            .take_while(move |el| scope.map_or(true, |s| !s.closes_at(el)))
    }

    /// Page-level values shared by every entry on the page.
    pub fn page_metadata(&self, doc: &Html) -> BTreeMap<String, String> {
        let root = doc.root_element();
        self.page_fields
            .iter()
            .filter_map(|(key, field)| field.read(root).map(|v| (key.clone(), v)))
            .collect()
    }
}

impl CompiledScope {
    fn compile(source_id: &str, scope: &ScopeConfig) -> Result<Self, ConfigError> {
        Ok(CompiledScope {
            heading: compile_selector(source_id, &scope.heading)?,
            after: scope.after.clone(),
            stop_prefix: scope.stop_prefix.clone(),
            stop_contains: scope.stop_contains.clone(),
        })
    }

    fn opens_at(&self, el: &ElementRef) -> bool {
        match &self.after {
            None => true,
            Some(text) => self.heading.matches(el) && element_text(*el).contains(text.as_str()),
        }
    }

    fn closes_at(&self, el: &ElementRef) -> bool {
        if self.stop_prefix.is_empty() && self.stop_contains.is_empty() {
            return false;
        }
        let text = element_text(*el);
        self.stop_prefix.iter().any(|p| text.starts_with(p.as_str()))
            || self.stop_contains.iter().any(|p| text.contains(p.as_str()))
    }
}

impl CompiledField {
    pub fn compile(source_id: &str, spec: &FieldSpec) -> Result<Self, ConfigError> {
        Ok(CompiledField {
            selector: spec
                .selector
                .as_deref()
                .map(|s| compile_selector(source_id, s))
                .transpose()?,
            attr: spec.attr.clone(),
            own_text: spec.own_text,
            pattern: spec
                .pattern
                .as_deref()
                .map(|p| compile_regex(source_id, p))
                .transpose()?,
        })
    }

    /// Read the value from the first matching element under `scope`.
    /// Returns `None` when nothing matches or the value is blank.
    pub fn read(&self, scope: ElementRef) -> Option<String> {
        let el = match &self.selector {
            Some(sel) => scope.select(sel).next()?,
            None => scope,
        };

        let raw = match &self.attr {
            Some(name) => el.value().attr(name)?.to_string(),
            None if self.own_text => el
                .children()
                .filter_map(|c| c.value().as_text().map(|t| t.trim().to_string()))
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            None => element_text(el),
        };
        let raw = collapse_whitespace(&raw);

        let value = match &self.pattern {
            Some(re) => {
                let caps = re.captures(&raw)?;
                caps.name("value")
                    .or_else(|| caps.get(1))
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().trim().to_string())?
            }
            None => raw,
        };

        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

/// All descendant text of an element, joined by single spaces.
pub fn element_text(el: ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn compile_selector(source_id: &str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::Selector {
        source_id: source_id.to_string(),
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn compile_regex(source_id: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::Pattern {
        source_id: source_id.to_string(),
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
