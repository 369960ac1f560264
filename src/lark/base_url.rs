//! Base URL parsing
//!
//! Recognised shapes, tried in this order:
//!
//! 1. path segment: `https://x.larksuite.com/base/<token>`
//! 2. query parameter: `...?app_token=<token>`
//! 3. legacy token embedded in the path: `.../bascnXXXXXXXX...`
//! 4. Wiki node: `https://x.larksuite.com/wiki/<node>` (needs a lookup)
//!
//! A `table=<id>` query parameter selects a table within the Base.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static BASE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/base/([A-Za-z0-9]+)").expect("valid regex"));
static EMBEDDED_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(bas[A-Za-z0-9]{10,})").expect("valid regex"));
static WIKI_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/wiki/([A-Za-z0-9]+)").expect("valid regex"));

/// What a Base URL points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseLocator {
    /// Base token found directly in the URL
    pub app_token: Option<String>,
    /// Wiki node token that must be resolved to a Base token
    pub wiki_token: Option<String>,
    /// Table selected in the URL
    pub table_id: Option<String>,
}

impl BaseLocator {
    /// Whether the URL needs a Wiki lookup
    pub fn is_wiki(&self) -> bool {
        self.wiki_token.is_some()
    }
}

/// Parse a Base URL into its tokens
pub fn parse_base_url(input: &str) -> Result<BaseLocator> {
    let url = parse_lenient(input)?;
    let path = url.path();

    let wiki_token = capture(&WIKI_SEGMENT, path);
    let app_token = capture(&BASE_SEGMENT, path)
        .or_else(|| query_value(&url, "app_token"))
        .or_else(|| {
            if wiki_token.is_some() {
                None
            } else {
                capture(&EMBEDDED_TOKEN, path)
            }
        });

    if app_token.is_none() && wiki_token.is_none() {
        return Err(Error::UnrecognizedBaseUrl {
            url: input.to_string(),
        });
    }

    Ok(BaseLocator {
        app_token,
        wiki_token,
        table_id: query_value(&url, "table"),
    })
}

fn parse_lenient(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::UnrecognizedBaseUrl {
            url: input.to_string(),
        });
    }
    if trimmed.contains("://") {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("https://{trimmed}"))?)
    }
}

fn capture(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://x.larksuite.com/base/abc123", "abc123" ; "path segment")]
    #[test_case("https://x.larksuite.com/?app_token=abc123", "abc123" ; "query parameter")]
    #[test_case("https://x.feishu.cn/base/abc123?table=tbl1&view=vew1", "abc123" ; "with table and view")]
    #[test_case("x.larksuite.com/base/abc123", "abc123" ; "missing scheme")]
    #[test_case("https://x.feishu.cn/sheets/bascnAbCdEfGhIjKl", "bascnAbCdEfGhIjKl" ; "embedded legacy token")]
    fn test_direct_tokens(input: &str, expected: &str) {
        let locator = parse_base_url(input).unwrap();
        assert_eq!(locator.app_token.as_deref(), Some(expected));
        assert!(!locator.is_wiki());
    }

    #[test]
    fn test_wiki_url() {
        let locator = parse_base_url("https://x.larksuite.com/wiki/wikcnNode123?table=tblA").unwrap();
        assert!(locator.is_wiki());
        assert_eq!(locator.wiki_token.as_deref(), Some("wikcnNode123"));
        assert_eq!(locator.app_token, None);
        assert_eq!(locator.table_id.as_deref(), Some("tblA"));
    }

    #[test_case("https://x.larksuite.com/docx/doc123" ; "other document type")]
    #[test_case("https://example.com/" ; "bare host")]
    #[test_case("" ; "empty")]
    fn test_unrecognized(input: &str) {
        let err = parse_base_url(input).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedBaseUrl { .. }));
    }

    #[test]
    fn test_table_id_from_query() {
        let table = |input: &str| parse_base_url(input).unwrap().table_id;
        assert_eq!(
            table("https://x.larksuite.com/base/abc?table=tblXYZ&view=vew1"),
            Some("tblXYZ".to_string())
        );
        assert_eq!(table("https://x.larksuite.com/base/abc"), None);
        assert_eq!(table("https://x.larksuite.com/base/abc?table="), None);
    }
}
