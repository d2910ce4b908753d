// Reshapes raw executor output into records plus status messages
use crate::config::DEFAULT_ERROR_KEYWORDS;
use crate::models::{NormalizedRecord, NormalizedResult, RawResult, CROSS_DATABASE_JOIN_MARKER};
use serde_json::Value;

/// Key used when text cannot be split into named columns
pub const RESULT_KEY: &str = "Result";

#[derive(Debug, Clone)]
pub struct ResultNormalizer {
    error_keywords: Vec<String>,
}

impl Default for ResultNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_KEYWORDS.iter().map(|k| k.to_string()).collect())
    }
}

impl ResultNormalizer {
    pub fn new(error_keywords: Vec<String>) -> Self {
        Self {
            error_keywords: error_keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Normalize a sequence of results, keeping input order in both lists
    pub fn normalize_all<'a, I>(&self, results: I) -> NormalizedResult
    where
        I: IntoIterator<Item = &'a RawResult>,
    {
        let mut normalized = NormalizedResult::default();
        for result in results {
            self.normalize_into(result, &mut normalized);
        }
        normalized
    }

    pub fn normalize(&self, result: &RawResult) -> NormalizedResult {
        let mut normalized = NormalizedResult::default();
        self.normalize_into(result, &mut normalized);
        normalized
    }

    fn normalize_into(&self, result: &RawResult, out: &mut NormalizedResult) {
        match result {
            RawResult::Records(records) => out.records.extend(records.iter().cloned()),
            RawResult::NoResults | RawResult::ExecutionError(_) | RawResult::CrossDatabaseJoin(_) => {
                out.error_messages.push(result.to_string())
            }
            RawResult::Text(text) => self.normalize_text(text, out),
        }
    }

    fn normalize_text(&self, text: &str, out: &mut NormalizedResult) {
        if text.contains(CROSS_DATABASE_JOIN_MARKER) {
            out.error_messages.push(text.to_string());
            return;
        }

        let trimmed = text.trim();
        let lines: Vec<&str> = trimmed.split('\n').collect();

        if text.contains('\t') && lines.len() > 1 {
            out.records.extend(Self::parse_tabular(&lines));
            return;
        }

        if text.contains('\n') && lines.len() > 1 {
            if lines.len() == 2 {
                let header = lines[0].trim();
                let value = lines[1].trim();
                if !header.is_empty() && !value.is_empty() {
                    out.records.push(Self::single(header, value));
                }
            } else {
                out.records.push(Self::single(RESULT_KEY, trimmed));
            }
            return;
        }

        // One line of content, possibly with surrounding whitespace
        let line = if text.contains('\n') || text.contains('\t') { trimmed } else { text };
        if self.is_error_message(line) {
            out.error_messages.push(line.to_string());
        } else {
            out.records.push(Self::single(RESULT_KEY, line));
        }
    }

    /// Header line plus rows. Keys are trimmed headers, cells are kept as-is,
    /// missing trailing cells become empty strings.
    fn parse_tabular(lines: &[&str]) -> Vec<NormalizedRecord> {
        let headers: Vec<&str> = lines[0].split('\t').map(str::trim).collect();
        lines[1..]
            .iter()
            .map(|line| {
                let values: Vec<&str> = line.split('\t').collect();
                let mut record = NormalizedRecord::new();
                for (i, header) in headers.iter().enumerate() {
                    let value = values.get(i).copied().unwrap_or("");
                    record.insert(header.to_string(), Value::String(value.to_string()));
                }
                record
            })
            .collect()
    }

    fn single(key: &str, value: &str) -> NormalizedRecord {
        let mut record = NormalizedRecord::new();
        record.insert(key.to_string(), Value::String(value.to_string()));
        record
    }

    fn is_error_message(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.error_keywords.iter().any(|keyword| lowered.contains(keyword))
    }
}
