use serde::{Deserialize, Serialize};

/// Placeholder recorded in the primary content field when extraction
/// could not produce a real meaning.
pub const NOT_FOUND: &str = "Không tìm thấy";

/// One row of the output dataset: everything we harvest for a single
/// headword. The field names double as the CSV column headers, so the
/// column set is fixed and stable across runs.
///
/// Missing data is an empty string, never an absent field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    pub simplified_chinese: String,
    pub traditional_chinese: String,
    pub pinyin_latin: String,
    pub pinyin_zhuyin: String,
    pub pinyin_vietnamese: String,
    pub level: String,
    pub vietnamese_meaning: String,
    pub chinese_explanation: String,
    pub example_sentence_chinese: String,
    pub example_sentence_pinyin: String,
    pub grammar_pattern: String,
    pub related_compounds: String,
    pub radical_info: String,
    pub stroke_count: String,
    pub stroke_order: String,
    pub popularity: String,
}

impl WordRecord {
    /// A record with every detail field empty.
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            simplified_chinese: key.into(),
            traditional_chinese: String::new(),
            pinyin_latin: String::new(),
            pinyin_zhuyin: String::new(),
            pinyin_vietnamese: String::new(),
            level: String::new(),
            vietnamese_meaning: String::new(),
            chinese_explanation: String::new(),
            example_sentence_chinese: String::new(),
            example_sentence_pinyin: String::new(),
            grammar_pattern: String::new(),
            related_compounds: String::new(),
            radical_info: String::new(),
            stroke_count: String::new(),
            stroke_order: String::new(),
            popularity: String::new(),
        }
    }

    /// The terminal-failure record for a key: sentinel meaning, all
    /// detail fields empty.
    pub fn not_found(key: impl Into<String>) -> Self {
        let mut record = Self::empty(key);
        record.vietnamese_meaning = NOT_FOUND.to_string();
        record
    }

    /// The work key this record belongs to.
    pub fn key(&self) -> &str {
        &self.simplified_chinese
    }

    /// True if this record carries the sentinel instead of a real meaning.
    pub fn is_not_found(&self) -> bool {
        self.vietnamese_meaning == NOT_FOUND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_shape() {
        let record = WordRecord::not_found("你好");
        assert_eq!(record.key(), "你好");
        assert_eq!(record.vietnamese_meaning, NOT_FOUND);
        assert!(record.is_not_found());
        assert!(record.traditional_chinese.is_empty());
        assert!(record.related_compounds.is_empty());
    }

    #[test]
    fn test_real_record_is_not_sentinel() {
        let mut record = WordRecord::empty("你好");
        record.vietnamese_meaning = "xin chào".to_string();
        assert!(!record.is_not_found());
    }
}
