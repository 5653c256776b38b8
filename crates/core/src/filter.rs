use crate::error::IngestError;
use crate::models::TextSelector;
use regex::{Regex, RegexBuilder};

pub const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone)]
pub struct TextFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    max_length: Option<usize>,
}

impl TextFilter {
    pub fn new(selector: &TextSelector) -> Result<Self, IngestError> {
        Ok(Self {
            include: compile_all(&selector.include_patterns)?,
            exclude: compile_all(&selector.exclude_patterns)?,
            max_length: selector.max_length,
        })
    }

    pub fn apply(&self, text: &str) -> String {
        let mut filtered = text.to_string();

        // Each include pattern searches the original text; the last one that
        // matched replaces the result.
        for pattern in &self.include {
            let matches = find_all(pattern, text);
            if !matches.is_empty() {
                filtered = matches.join("\n");
            }
        }

        for pattern in &self.exclude {
            filtered = pattern.replace_all(&filtered, "").into_owned();
        }

        if let Some(max_length) = self.max_length {
            if let Some((cut, _)) = filtered.char_indices().nth(max_length) {
                filtered.truncate(cut);
                filtered.push_str(TRUNCATION_MARKER);
            }
        }

        filtered
    }
}

pub fn apply(text: &str, selector: &TextSelector) -> Result<String, IngestError> {
    Ok(TextFilter::new(selector)?.apply(text))
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, IngestError> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| IngestError::InvalidFilterPattern {
                    pattern: pattern.clone(),
                    source,
                })
        })
        .collect()
}

// Whole match for group-less patterns, first capture group otherwise.
fn find_all<'t>(pattern: &Regex, text: &'t str) -> Vec<&'t str> {
    if pattern.captures_len() > 1 {
        pattern
            .captures_iter(text)
            .map(|captures| captures.get(1).map_or("", |group| group.as_str()))
            .collect()
    } else {
        pattern.find_iter(text).map(|found| found.as_str()).collect()
    }
}
