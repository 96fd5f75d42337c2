//! Extraction adapter for hanzii.net word pages.
//!
//! Navigation and rendering live in [`HanziiExtractor::extract`]; field
//! extraction is the pure function [`parse_word_page`] over a rendered
//! DOM snapshot, so the brittle selector logic is testable without a
//! browser. Every field rule is first-match-or-empty: a page that yields
//! nothing still produces a valid record with the sentinel meaning.

use std::time::Duration;

use scraper::{Html, Selector};
use url::Url;

use demeter_core::error::AppError;
use demeter_core::record::{NOT_FOUND, WordRecord};
use demeter_core::traits::Extractor;

use crate::browser::PageHandle;

const SEARCH_URL: &str = "https://hanzii.net/search/word";

/// Any of these means the result pane has rendered.
const CONTENT_SELECTOR: &str = ".txt-mean, .box-mean, .simple-tradition-wrap";

/// Vowels carrying Vietnamese diacritics, used to spot Vietnamese text.
const VIETNAMESE_MARKS: &str =
    "àáạảãâầấậẩẫăằắặẳẵèéẹẻẽêềếệểễìíịỉĩòóọỏõôồốộổỗơờớợởỡùúụủũưừứựửữỳýỵỷỹđ";

/// Renders a word page in a borrowed tab and extracts a [`WordRecord`].
#[derive(Clone)]
pub struct HanziiExtractor {
    /// Whole-attempt budget (navigation + render + snapshot).
    timeout: Duration,
    /// Bounded wait for the content selector to appear.
    content_wait: Duration,
    /// Settle time after the content appears, for late-loading panes.
    settle: Duration,
}

impl HanziiExtractor {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            content_wait: Duration::from_secs(15),
            settle: Duration::from_secs(2),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn search_url(key: &str) -> Result<String, AppError> {
        let mut url = Url::parse(SEARCH_URL)
            .map_err(|e| AppError::Generic(format!("Bad search base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Generic("Search base URL cannot take a path".into()))?
            .push(key);
        url.query_pairs_mut().append_pair("hl", "vi");
        Ok(url.into())
    }

    /// Polls for the content selector until it appears or the wait
    /// budget runs out. Returns whether it appeared.
    async fn wait_for_content(&self, handle: &PageHandle) -> bool {
        let deadline = tokio::time::Instant::now() + self.content_wait;
        loop {
            if handle.page().find_element(CONTENT_SELECTOR).await.is_ok() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

impl Default for HanziiExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for HanziiExtractor {
    type Handle = PageHandle;

    async fn extract(&self, key: &str, handle: &PageHandle) -> Result<WordRecord, AppError> {
        let url = Self::search_url(key)?;
        let timeout = self.timeout;

        let result = tokio::time::timeout(timeout, async {
            let page = handle.page();

            page.goto(url.as_str())
                .await
                .map_err(|e| AppError::HttpError(format!("Failed to navigate to {url}: {e}")))?;

            // A slow pane is not fatal: extract whatever rendered.
            if !self.wait_for_content(handle).await {
                tracing::debug!(%key, "Timed out waiting for content pane");
            }
            if !self.settle.is_zero() {
                tokio::time::sleep(self.settle).await;
            }

            page.content()
                .await
                .map_err(|e| AppError::RenderError(format!("Failed to read page content: {e}")))
        })
        .await;

        match result {
            Ok(html) => Ok(parse_word_page(key, &html?)),
            Err(_) => Err(AppError::Timeout(timeout.as_secs())),
        }
    }
}

/// Extract every field from a rendered word page.
///
/// Pure over the HTML snapshot: the same input always yields the same
/// record, and nothing here touches the browser.
pub fn parse_word_page(key: &str, html: &str) -> WordRecord {
    let doc = Html::parse_document(html);
    let mut record = WordRecord::empty(key);

    // Traditional form: a short CJK variant distinct from the key.
    let key_len = key.chars().count();
    for text in texts(&doc, ".simple-tradition-wrap") {
        if record.traditional_chinese.is_empty()
            && text != key
            && has_cjk(&text)
            && text.chars().count() <= key_len + 2
        {
            record.traditional_chinese = text;
        }
    }

    // Pinyin readings come bracketed: [xué xí] latin, [ㄒㄩㄝˊ] zhuyin.
    for text in texts(&doc, ".txt-pinyin") {
        if text.contains('[') && text.contains(']') {
            let clean = text.replace(['[', ']'], "").trim().to_string();
            if record.pinyin_latin.is_empty() && clean.chars().any(|c| c.is_ascii_alphabetic()) {
                record.pinyin_latin = clean.clone();
            }
            if has_zhuyin(&clean) {
                record.pinyin_zhuyin = clean;
            }
        }
    }

    for text in texts(&doc, ".txt-cn_vi") {
        if text.contains('[') && text.contains(']') {
            record.pinyin_vietnamese = text.replace(['[', ']'], "").trim().to_string();
        }
    }

    for text in texts(&doc, ".txt-slot") {
        if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            record.level = text;
        }
    }

    // Meaning, three fallbacks: the main mean pane, the box mean pane,
    // then any Vietnamese-looking text in the result.
    let mut meaning = texts(&doc, ".txt-mean .simple-tradition-wrap")
        .into_iter()
        .find(|t| !t.is_empty())
        .unwrap_or_default();
    if meaning.is_empty() {
        meaning = texts(&doc, ".box-mean .txt-mean")
            .into_iter()
            .find(|t| !t.is_empty())
            .map(|t| strip_enumeration(&t))
            .unwrap_or_default();
    }
    if meaning.is_empty() {
        meaning = texts(&doc, ".simple-tradition-wrap")
            .into_iter()
            .find(|t| !t.is_empty() && t != key && has_vietnamese(t))
            .unwrap_or_default();
    }
    record.vietnamese_meaning = if meaning.is_empty() {
        NOT_FOUND.to_string()
    } else {
        meaning
    };

    record.chinese_explanation = texts(&doc, ".txt-mean-explain .simple-tradition-wrap")
        .into_iter()
        .find(|t| has_cjk(t))
        .unwrap_or_default();

    record.example_sentence_chinese = texts(&doc, ".simple-tradition-wrap")
        .into_iter()
        .find(|t| t.contains('。') && has_cjk(t))
        .unwrap_or_default();

    record.example_sentence_pinyin = texts(&doc, ".ex-phonetic")
        .into_iter()
        .find(|t| t.chars().any(|c| c.is_ascii_alphabetic()))
        .unwrap_or_default();

    record.grammar_pattern = texts(&doc, ".simple-tradition-wrap")
        .into_iter()
        .find(|t| t.contains('+') && t.contains(key))
        .unwrap_or_default();

    let compounds: Vec<String> = texts(&doc, ".txt-compound")
        .into_iter()
        .filter(|t| has_cjk(t))
        .map(|t| strip_enumeration(&t))
        .filter(|t| !t.is_empty() && t != key)
        .take(5)
        .collect();
    record.related_compounds = compounds.join("; ");

    for text in texts(&doc, ".txt-detail") {
        if let Some(rest) = text.strip_prefix("Bộ:") {
            record.radical_info = rest.trim().to_string();
        }
        if let Some(pos) = text.find("Số nét:") {
            let digits: String = text[pos + "Số nét:".len()..]
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !digits.is_empty() {
                record.stroke_count = digits;
            }
        }
        if let Some(rest) = text.strip_prefix("Nét bút:") {
            record.stroke_order = rest.trim().to_string();
        }
    }

    record.popularity = texts(&doc, "[class*=\"txt-detail\"]")
        .into_iter()
        .find(|t| t.contains("Độ phổ biến"))
        .unwrap_or_default();

    tidy_fields(&mut record);
    record
}

/// Collect trimmed inner text for every element matching `css`.
fn texts(doc: &Html, css: &str) -> Vec<String> {
    match Selector::parse(css) {
        Ok(selector) => doc
            .select(&selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn has_cjk(s: &str) -> bool {
    s.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

fn has_zhuyin(s: &str) -> bool {
    s.chars().any(|c| ('\u{3105}'..='\u{3129}').contains(&c))
}

fn has_vietnamese(s: &str) -> bool {
    s.chars().any(|c| VIETNAMESE_MARKS.contains(c))
}

/// Strip a leading list number ("3. ") from scraped text.
fn strip_enumeration(s: &str) -> String {
    let trimmed = s.trim_start();
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0
        && let Some(rest) = trimmed[digits..].strip_prefix('.')
    {
        return rest.trim_start().to_string();
    }
    trimmed.to_string()
}

/// Normalize every detail field the way the site's markup tends to need:
/// collapse whitespace, drop leading list numbers and bullets, trim.
/// The key field is left untouched — it is the record's identity.
fn tidy_fields(record: &mut WordRecord) {
    let fields = [
        &mut record.traditional_chinese,
        &mut record.pinyin_latin,
        &mut record.pinyin_zhuyin,
        &mut record.pinyin_vietnamese,
        &mut record.level,
        &mut record.vietnamese_meaning,
        &mut record.chinese_explanation,
        &mut record.example_sentence_chinese,
        &mut record.example_sentence_pinyin,
        &mut record.grammar_pattern,
        &mut record.related_compounds,
        &mut record.radical_info,
        &mut record.stroke_count,
        &mut record.stroke_order,
        &mut record.popularity,
    ];
    for field in fields {
        *field = tidy(field);
    }
}

fn tidy(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = strip_enumeration(&collapsed);
    stripped
        .trim_start_matches(['•', '·', '-'])
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_percent_encodes_key() {
        let url = HanziiExtractor::search_url("你好").unwrap();
        assert_eq!(url, "https://hanzii.net/search/word/%E4%BD%A0%E5%A5%BD?hl=vi");
    }

    #[test]
    fn test_parse_full_word_page() {
        let html = r#"
            <div class="result">
                <div class="simple-tradition-wrap">學習</div>
                <span class="txt-pinyin">[xué xí]</span>
                <span class="txt-pinyin">[ㄒㄩㄝˊ ㄒㄧˊ]</span>
                <span class="txt-cn_vi">[học tập]</span>
                <span class="txt-slot">1</span>
                <div class="txt-mean"><span class="simple-tradition-wrap">học tập, học hành</span></div>
                <div class="txt-mean-explain"><span class="simple-tradition-wrap">通过阅读获得知识</span></div>
                <div class="simple-tradition-wrap">我每天学习中文。</div>
                <div class="ex-phonetic">wǒ měitiān xuéxí zhōngwén</div>
                <div class="txt-compound">1. 学习班</div>
                <div class="txt-compound">2. 学习者</div>
                <div class="txt-detail">Bộ: 子</div>
                <div class="txt-detail">Số nét: 8</div>
                <div class="txt-detail">Nét bút: 丶丶一</div>
                <div class="txt-detail">Độ phổ biến: Rất cao</div>
            </div>
        "#;
        let record = parse_word_page("学习", html);

        assert_eq!(record.simplified_chinese, "学习");
        assert_eq!(record.traditional_chinese, "學習");
        assert_eq!(record.pinyin_latin, "xué xí");
        assert_eq!(record.pinyin_zhuyin, "ㄒㄩㄝˊ ㄒㄧˊ");
        assert_eq!(record.pinyin_vietnamese, "học tập");
        assert_eq!(record.level, "1");
        assert_eq!(record.vietnamese_meaning, "học tập, học hành");
        assert_eq!(record.chinese_explanation, "通过阅读获得知识");
        assert_eq!(record.example_sentence_chinese, "我每天学习中文。");
        assert_eq!(record.example_sentence_pinyin, "wǒ měitiān xuéxí zhōngwén");
        assert_eq!(record.related_compounds, "学习班; 学习者");
        assert_eq!(record.radical_info, "子");
        assert_eq!(record.stroke_count, "8");
        assert_eq!(record.stroke_order, "丶丶一");
        assert_eq!(record.popularity, "Độ phổ biến: Rất cao");
        assert!(!record.is_not_found());
    }

    #[test]
    fn test_meaning_falls_back_to_box_mean() {
        let html = r#"<div class="box-mean"><div class="txt-mean">2. con mèo</div></div>"#;
        let record = parse_word_page("猫", html);
        assert_eq!(record.vietnamese_meaning, "con mèo");
    }

    #[test]
    fn test_meaning_falls_back_to_vietnamese_scan() {
        let html = r#"
            <div class="simple-tradition-wrap">貓</div>
            <div class="simple-tradition-wrap">mèo con</div>
        "#;
        let record = parse_word_page("猫", html);
        assert_eq!(record.vietnamese_meaning, "mèo con");
        assert_eq!(record.traditional_chinese, "貓");
    }

    #[test]
    fn test_empty_page_yields_sentinel_record() {
        let record = parse_word_page("猫", "<html><body></body></html>");
        assert!(record.is_not_found());
        assert!(record.pinyin_latin.is_empty());
        assert!(record.related_compounds.is_empty());
    }

    #[test]
    fn test_traditional_rejects_long_phrases() {
        // A whole sentence must not be mistaken for the traditional form.
        let html = r#"<div class="simple-tradition-wrap">我每天都喝茶和咖啡。</div>"#;
        let record = parse_word_page("茶", html);
        assert!(record.traditional_chinese.is_empty());
    }

    #[test]
    fn test_compounds_capped_at_five_and_exclude_key() {
        let html = r#"
            <div class="txt-compound">茶</div>
            <div class="txt-compound">1. 茶杯</div>
            <div class="txt-compound">2. 茶壶</div>
            <div class="txt-compound">3. 茶叶</div>
            <div class="txt-compound">4. 茶馆</div>
            <div class="txt-compound">5. 红茶</div>
            <div class="txt-compound">6. 绿茶</div>
        "#;
        let record = parse_word_page("茶", html);
        assert_eq!(record.related_compounds, "茶杯; 茶壶; 茶叶; 茶馆; 红茶");
    }

    #[test]
    fn test_grammar_pattern_needs_plus_and_key() {
        let html = r#"
            <div class="simple-tradition-wrap">主语 + 在 + 地点</div>
            <div class="simple-tradition-wrap">不 + 得</div>
        "#;
        let record = parse_word_page("在", html);
        assert_eq!(record.grammar_pattern, "主语 + 在 + 地点");
    }

    #[test]
    fn test_stroke_count_takes_leading_digits_only() {
        let html = r#"<div class="txt-detail">Số nét: 12 nét</div>"#;
        let record = parse_word_page("画", html);
        assert_eq!(record.stroke_count, "12");
    }

    #[test]
    fn test_tidy_collapses_whitespace_and_markers() {
        assert_eq!(tidy("  1.   học \n tập  "), "học tập");
        assert_eq!(tidy("• mèo"), "mèo");
        assert_eq!(tidy("xué   xí"), "xué xí");
    }

    #[test]
    fn test_strip_enumeration_keeps_plain_text() {
        assert_eq!(strip_enumeration("学习班"), "学习班");
        assert_eq!(strip_enumeration("12. 学习班"), "学习班");
        assert_eq!(strip_enumeration("8"), "8");
    }
}
