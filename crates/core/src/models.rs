use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// Metadata attached to content units and chunks. Ordered so that serialized
// output and chunk ids are stable between runs.
pub type Metadata = BTreeMap<String, Value>;

pub const KEY_SOURCE: &str = "source";
pub const KEY_PAGE_NUMBER: &str = "page_number";
pub const KEY_UNIT_TYPE: &str = "unit_type";
pub const KEY_ENGINE: &str = "engine";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Page,
    ImageSummary,
    Table,
    List,
    Link,
    Tag(String),
}

impl UnitType {
    pub fn as_str(&self) -> &str {
        match self {
            UnitType::Page => "page",
            UnitType::ImageSummary => "image_summary",
            UnitType::Table => "table",
            UnitType::List => "list",
            UnitType::Link => "link",
            UnitType::Tag(tag) => tag,
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// One atomic piece of extracted content. Immutable once built; downstream
// enrichment only ever adds metadata keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UnitFields")]
pub struct ContentUnit {
    text: String,
    metadata: Metadata,
}

#[derive(Deserialize)]
struct UnitFields {
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

impl TryFrom<UnitFields> for ContentUnit {
    type Error = String;

    fn try_from(fields: UnitFields) -> Result<Self, Self::Error> {
        if fields.text.trim().is_empty() {
            return Err("content unit text must not be blank".to_string());
        }
        Ok(Self {
            text: fields.text,
            metadata: fields.metadata,
        })
    }
}

impl ContentUnit {
    pub fn new(text: impl Into<String>, source: impl Into<String>, unit_type: UnitType) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }

        let mut metadata = Metadata::new();
        metadata.insert(KEY_SOURCE.to_string(), Value::String(source.into()));
        metadata.insert(
            KEY_UNIT_TYPE.to_string(),
            Value::String(unit_type.as_str().to_string()),
        );

        Some(Self { text, metadata })
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_all_metadata(mut self, extra: Metadata) -> Self {
        self.metadata.extend(extra);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(KEY_SOURCE).and_then(Value::as_str)
    }

    pub fn page_number(&self) -> Option<u64> {
        self.metadata.get(KEY_PAGE_NUMBER).and_then(Value::as_u64)
    }

    pub fn unit_type(&self) -> Option<&str> {
        self.metadata.get(KEY_UNIT_TYPE).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    // Character offset of the chunk inside its unit's text.
    pub start_char: usize,
}

impl Chunk {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(KEY_SOURCE).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSelector {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub max_length: Option<usize>,
}

impl TextSelector {
    pub fn is_empty(&self) -> bool {
        self.include_patterns.is_empty()
            && self.exclude_patterns.is_empty()
            && self.max_length.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSelectors {
    pub filter_text: Option<TextSelector>,
    pub extract_images: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub file_path: PathBuf,
    pub content_selectors: Option<ContentSelectors>,
    pub max_pages: Option<usize>,
}

impl ExtractionRequest {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            content_selectors: None,
            max_pages: None,
        }
    }

    pub fn with_selectors(mut self, selectors: ContentSelectors) -> Self {
        self.content_selectors = Some(selectors);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub(crate) fn extract_images(&self) -> bool {
        self.content_selectors
            .as_ref()
            .is_some_and(|selectors| selectors.extract_images)
    }

    pub(crate) fn text_selector(&self) -> Option<&TextSelector> {
        self.content_selectors
            .as_ref()
            .and_then(|selectors| selectors.filter_text.as_ref())
            .filter(|selector| !selector.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageWarning {
    pub source: String,
    pub page_number: usize,
    pub engine: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub units: Vec<ContentUnit>,
    pub warnings: Vec<PageWarning>,
    pub engine: Option<String>,
    pub pages_processed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PdfInfo {
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub engine: String,
    pub page_count: Option<usize>,
    pub metadata: Metadata,
    pub text_sample: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub preferred_engine: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_yields_no_unit() {
        assert!(ContentUnit::new("  \n\t", "a.pdf", UnitType::Page).is_none());
    }

    #[test]
    fn unit_carries_source_and_type() {
        let unit = ContentUnit::new("body", "a.pdf", UnitType::Tag("h2".to_string()))
            .expect("non-blank text")
            .with_metadata(KEY_PAGE_NUMBER, 3);

        assert_eq!(unit.source(), Some("a.pdf"));
        assert_eq!(unit.unit_type(), Some("h2"));
        assert_eq!(unit.page_number(), Some(3));
    }

    #[test]
    fn deserialized_units_keep_the_non_blank_rule() {
        let blank = serde_json::from_str::<ContentUnit>(r#"{"text": " \n ", "metadata": {"source": "a.pdf"}}"#);
        assert!(blank.is_err());

        let unit: ContentUnit =
            serde_json::from_str(r#"{"text": "Scope", "metadata": {"source": "a.pdf"}}"#).expect("valid unit json");
        assert_eq!(unit.text(), "Scope");
        assert_eq!(unit.source(), Some("a.pdf"));
    }

    #[test]
    fn selectors_deserialize_with_defaults() {
        let selectors: ContentSelectors = serde_json::from_str(
            r#"{"filter_text": {"include_patterns": ["OSHA"], "max_length": 10}}"#,
        )
        .expect("valid selector json");

        assert!(!selectors.extract_images);
        let filter = selectors.filter_text.expect("filter present");
        assert_eq!(filter.include_patterns, vec!["OSHA".to_string()]);
        assert!(filter.exclude_patterns.is_empty());
        assert_eq!(filter.max_length, Some(10));
    }
}
