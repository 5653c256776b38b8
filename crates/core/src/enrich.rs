use crate::models::{Chunk, Metadata};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use uuid::Uuid;

const REGULATION_PARTS: [(&str, &str); 5] = [
    ("1910", "general_industry"),
    ("1926", "construction"),
    ("1915", "maritime"),
    ("1917", "marine_terminals"),
    ("1918", "longshoring"),
];

fn regulation_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        REGULATION_PARTS
            .iter()
            .filter_map(|(part, _)| Regex::new(&format!(r"{part}\.\d+")).ok())
            .collect()
    })
}

fn add_missing(metadata: &mut Metadata, key: &str, value: impl Into<Value>) {
    metadata.entry(key.to_string()).or_insert_with(|| value.into());
}

#[derive(Debug, Clone, Default)]
pub struct RegulationEnricher;

impl RegulationEnricher {
    pub fn regulation_number(&self, source: &str) -> Option<String> {
        regulation_patterns()
            .iter()
            .find_map(|pattern| pattern.find(source))
            .map(|found| found.as_str().to_string())
    }

    pub fn regulation_type(&self, source: &str) -> &'static str {
        REGULATION_PARTS
            .iter()
            .find(|(part, _)| source.contains(*part))
            .map_or("other", |(_, kind)| *kind)
    }

    pub fn enrich(&self, chunks: &mut [Chunk]) {
        for chunk in chunks {
            let Some(source) = chunk.source().map(str::to_string) else {
                continue;
            };
            let Some(number) = self.regulation_number(&source) else {
                continue;
            };

            let metadata = &mut chunk.metadata;
            add_missing(metadata, "regulation_number", number);
            add_missing(metadata, "regulation_type", self.regulation_type(&source));
            add_missing(metadata, "source_type", "osha_regulation");
            add_missing(metadata, "agency", "OSHA");
            add_missing(metadata, "jurisdiction", "federal");
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadEnricher {
    original_filename: String,
    uploaded_at: DateTime<Utc>,
    file_id: Uuid,
}

impl UploadEnricher {
    pub fn new(original_filename: impl Into<String>) -> Self {
        Self {
            original_filename: original_filename.into(),
            uploaded_at: Utc::now(),
            file_id: Uuid::new_v4(),
        }
    }

    pub fn file_id(&self) -> Uuid {
        self.file_id
    }

    pub fn enrich(&self, chunks: &mut [Chunk]) {
        for chunk in chunks {
            let metadata = &mut chunk.metadata;
            add_missing(metadata, "original_filename", self.original_filename.as_str());
            add_missing(metadata, "uploaded_at", self.uploaded_at.to_rfc3339());
            add_missing(metadata, "file_id", self.file_id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KEY_SOURCE;

    fn chunk(source: &str) -> Chunk {
        let mut metadata = Metadata::new();
        metadata.insert(KEY_SOURCE.to_string(), Value::from(source));
        Chunk {
            id: "id".to_string(),
            text: "text".to_string(),
            metadata,
            start_char: 0,
        }
    }

    #[test]
    fn regulation_numbers_are_extracted() {
        let enricher = RegulationEnricher;
        assert_eq!(
            enricher.regulation_number("/laws-regs/regulations/standardnumber/1910/1910.23").as_deref(),
            Some("1910.23")
        );
        assert_eq!(enricher.regulation_number("1926.501 fall protection").as_deref(), Some("1926.501"));
        assert_eq!(enricher.regulation_number("no regulation here"), None);
    }

    #[test]
    fn regulation_types_follow_the_part() {
        let enricher = RegulationEnricher;
        assert_eq!(enricher.regulation_type("1910.95"), "general_industry");
        assert_eq!(enricher.regulation_type("1915.12"), "maritime");
        assert_eq!(enricher.regulation_type("1917.1"), "marine_terminals");
        assert_eq!(enricher.regulation_type("1918.2"), "longshoring");
        assert_eq!(enricher.regulation_type("1904.7"), "other");
    }

    #[test]
    fn enrichment_adds_without_overwriting() {
        let mut chunks = vec![chunk("/docs/1926.1053 - Ladders.pdf"), chunk("/docs/handbook.pdf")];
        chunks[0]
            .metadata
            .insert("agency".to_string(), Value::from("already set"));

        RegulationEnricher.enrich(&mut chunks);

        let first = &chunks[0].metadata;
        assert_eq!(first["regulation_number"], Value::from("1926.1053"));
        assert_eq!(first["regulation_type"], Value::from("construction"));
        assert_eq!(first["agency"], Value::from("already set"));
        assert_eq!(first[KEY_SOURCE], Value::from("/docs/1926.1053 - Ladders.pdf"));
        assert!(!chunks[1].metadata.contains_key("regulation_number"));
    }

    #[test]
    fn upload_stamp_is_shared_by_the_file() {
        let mut chunks = vec![chunk("a.pdf"), chunk("a.pdf")];
        let enricher = UploadEnricher::new("a.pdf");
        enricher.enrich(&mut chunks);

        let expected = Value::from(enricher.file_id().to_string());
        assert!(chunks.iter().all(|chunk| chunk.metadata["file_id"] == expected));
        assert_eq!(chunks[0].metadata["original_filename"], Value::from("a.pdf"));
        assert!(chunks[0].metadata["uploaded_at"].as_str().is_some_and(|stamp| stamp.contains('T')));
    }
}
