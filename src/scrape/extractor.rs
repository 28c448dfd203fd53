//! Extraction of the upload/download text fields from page markup.

use scraper::{Html, Selector};

use super::ScrapeError;
use crate::config::ConfigError;

/// Raw text captured from the two page elements, trimmed.
///
/// An empty string means the element was not on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub upload: String,
    pub download: String,
}

/// Applies the configured selectors to page markup.
///
/// Selectors are compiled once, at startup.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    upload: Selector,
    download: Selector,
}

impl FieldExtractor {
    /// Compiles both selector expressions.
    pub fn new(upload_selector: &str, download_selector: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            upload: compile(upload_selector)
                .map_err(|reason| ConfigError::Selector {
                    selector: upload_selector.to_string(),
                    reason,
                })?,
            download: compile(download_selector).map_err(|reason| ConfigError::Selector {
                selector: download_selector.to_string(),
                reason,
            })?,
        })
    }

    /// Extracts both fields from `markup`.
    ///
    /// The HTML parser recovers from malformed input, so this only fails if a
    /// document cannot be built at all.
    pub fn extract(&self, markup: &str) -> Result<ExtractedFields, ScrapeError> {
        let document = Html::parse_document(markup);
        Ok(ExtractedFields {
            upload: text_of(&document, &self.upload),
            download: text_of(&document, &self.download),
        })
    }
}

/// One-shot extraction with ad hoc selectors.
///
/// An invalid selector is reported as [`ScrapeError::Parse`].
pub fn extract(
    markup: &str,
    upload_selector: &str,
    download_selector: &str,
) -> Result<ExtractedFields, ScrapeError> {
    let upload = compile(upload_selector).map_err(ScrapeError::Parse)?;
    let download = compile(download_selector).map_err(ScrapeError::Parse)?;
    FieldExtractor { upload, download }.extract(markup)
}

fn compile(selector: &str) -> Result<Selector, String> {
    Selector::parse(selector).map_err(|e| format!("invalid selector '{selector}': {e}"))
}

/// Concatenated text of every node matched by `selector`, trimmed.
fn text_of(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .flat_map(|element| element.text())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <table id="stats"><tbody>
            <tr><th>Uploaded</th><td class="up"> 1.5 GB <span>(1.39 GiB)</span></td></tr>
            <tr><th>Downloaded</th><td class="down">
                750MB
            </td></tr>
            <tr><th>Ratio</th><td class="ratio"></td></tr>
          </tbody></table>
        </body></html>
    "#;

    #[test]
    fn test_extract_both_fields() {
        let extractor = FieldExtractor::new("td.up", "td.down").unwrap();
        let fields = extractor.extract(PAGE).unwrap();
        assert_eq!(fields.upload, "1.5 GB (1.39 GiB)");
        assert_eq!(fields.download, "750MB");
    }

    #[test]
    fn test_extract_structural_selector() {
        let extractor = FieldExtractor::new(
            "#stats > tbody > tr:nth-child(1) > td",
            "#stats > tbody > tr:nth-child(2) > td",
        )
        .unwrap();
        let fields = extractor.extract(PAGE).unwrap();
        assert_eq!(fields.upload, "1.5 GB (1.39 GiB)");
        assert_eq!(fields.download, "750MB");
    }

    #[test]
    fn test_missing_and_empty_elements_are_empty_strings() {
        let extractor = FieldExtractor::new("td.nothing", "td.ratio").unwrap();
        let fields = extractor.extract(PAGE).unwrap();
        assert_eq!(fields, ExtractedFields::default());
    }

    #[test]
    fn test_multiple_matches_are_concatenated() {
        let page = "<div><b class='v'>1,0</b><b class='v'>24 KB</b></div>";
        let fields = extract(page, "b.v", "b.none").unwrap();
        assert_eq!(fields.upload, "1,024 KB");
        assert_eq!(fields.download, "");
    }

    #[test]
    fn test_garbage_markup_is_not_an_error() {
        let fields = extract("<<<not html at all", "td", "span").unwrap();
        assert_eq!(fields, ExtractedFields::default());
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(
            extract(PAGE, "td[", "td.down"),
            Err(ScrapeError::Parse(_))
        ));
        assert!(matches!(
            FieldExtractor::new("td.up", ">>>"),
            Err(ConfigError::Selector { .. })
        ));
    }
}
