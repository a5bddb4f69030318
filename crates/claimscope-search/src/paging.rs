//! Cursor-based pagination links.
//!
//! A page is continued by the identifier of its last item, so a link stays
//! valid while new batches are appended: later records sort after the cursor
//! or fall outside the echoed filters, and nothing already served moves.

use thiserror::Error;
use url::Url;

/// Page size parameter.
pub const PARAM_COUNT: &str = "_count";
/// Continuation parameter.
pub const PARAM_CURSOR: &str = "cursor";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PagingError {
    #[error("Invalid _count: {0}")]
    InvalidCount(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

/// Items that can continue a page.
pub trait CursorKey {
    fn cursor_key(&self) -> &str;
}

impl CursorKey for String {
    fn cursor_key(&self) -> &str {
        self
    }
}

impl CursorKey for &str {
    fn cursor_key(&self) -> &str {
        self
    }
}

/// True when the request carries no cursor. An empty `cursor=` counts as
/// none.
pub fn is_first_page(cursor: Option<&str>) -> bool {
    cursor.is_none_or(|c| c.trim().is_empty())
}

/// The cursor for the page after `items`, present only for a full page.
pub fn next_cursor<T: CursorKey>(items: &[T], page_size: usize) -> Option<String> {
    if page_size == 0 || items.len() != page_size {
        return None;
    }
    items.last().map(|item| item.cursor_key().to_string())
}

/// Derives paging state and links from a request URL.
#[derive(Debug, Clone)]
pub struct CursorLinkBuilder {
    url: Url,
    page_size: Option<usize>,
    cursor: Option<String>,
}

impl CursorLinkBuilder {
    /// Read `_count` and `cursor` from `request_url`.
    ///
    /// `_count` must be an integer in `1..=max_count`.
    pub fn from_url(request_url: &str, max_count: usize) -> Result<Self, PagingError> {
        let url = Url::parse(request_url)
            .map_err(|e| PagingError::InvalidUrl(format!("'{request_url}': {e}")))?;

        let mut page_size = None;
        let mut cursor = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                PARAM_COUNT => page_size = Some(parse_count(&value, max_count)?),
                PARAM_CURSOR if !value.trim().is_empty() => cursor = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(Self {
            url,
            page_size,
            cursor,
        })
    }

    /// Unbounded requests never produce next links.
    pub fn is_paging_requested(&self) -> bool {
        self.page_size.is_some()
    }

    pub fn is_first_page(&self) -> bool {
        is_first_page(self.cursor.as_deref())
    }

    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn next_cursor<T: CursorKey>(&self, items: &[T]) -> Option<String> {
        self.page_size.and_then(|size| next_cursor(items, size))
    }

    /// The request URL with `cursor` moved past the last item of `items`.
    pub fn next_link<T: CursorKey>(&self, items: &[T]) -> Option<String> {
        self.next_cursor(items)
            .map(|cursor| self.link_with_cursor(Some(&cursor)))
    }

    /// The request URL without a cursor.
    pub fn first_link(&self) -> Option<String> {
        self.is_paging_requested()
            .then(|| self.link_with_cursor(None))
    }

    fn link_with_cursor(&self, cursor: Option<&str>) -> String {
        let echoed: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != PARAM_CURSOR)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        let mut link = self.url.clone();
        {
            let mut pairs = link.query_pairs_mut();
            pairs.clear();
            pairs.extend_pairs(echoed);
            if let Some(cursor) = cursor {
                pairs.append_pair(PARAM_CURSOR, cursor);
            }
        }
        link.into()
    }
}

fn parse_count(value: &str, max_count: usize) -> Result<usize, PagingError> {
    let count: i64 = value
        .trim()
        .parse()
        .map_err(|_| PagingError::InvalidCount(format!("'{value}' is not an integer")))?;

    if count <= 0 {
        return Err(PagingError::InvalidCount(format!(
            "{count} must be greater than zero"
        )));
    }
    let count = usize::try_from(count)
        .map_err(|_| PagingError::InvalidCount(format!("{count} is out of range")))?;
    if count > max_count {
        return Err(PagingError::InvalidCount(format!(
            "{count} exceeds the maximum of {max_count}"
        )));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://claims.example.org/v2/fhir/ExplanationOfBenefit";

    fn query_value(link: &str, name: &str) -> Option<String> {
        Url::parse(link)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_full_page_yields_cursor_from_last_item() {
        let mut items: Vec<String> = (0..9).map(|i| format!("X{i:03}")).collect();
        items.push("X123".to_string());

        assert_eq!(next_cursor(&items, 10).as_deref(), Some("X123"));
    }

    #[test]
    fn test_short_page_yields_no_cursor() {
        let items = vec!["A", "B", "C", "D"];
        assert_eq!(next_cursor(&items, 10), None);
        assert_eq!(next_cursor::<&str>(&[], 10), None);
    }

    #[test]
    fn test_is_first_page() {
        assert!(is_first_page(None));
        assert!(is_first_page(Some("")));
        assert!(!is_first_page(Some("X123")));
    }

    #[test]
    fn test_builder_reads_count_and_cursor() {
        let paging = CursorLinkBuilder::from_url(
            &format!("{BASE}?patient=567834&_count=10&cursor=X100"),
            1000,
        )
        .unwrap();
        assert!(paging.is_paging_requested());
        assert!(!paging.is_first_page());
        assert_eq!(paging.page_size(), Some(10));
        assert_eq!(paging.cursor(), Some("X100"));
    }

    #[test]
    fn test_unbounded_request_has_no_links() {
        let paging =
            CursorLinkBuilder::from_url(&format!("{BASE}?patient=567834"), 1000).unwrap();
        assert!(!paging.is_paging_requested());
        assert!(paging.is_first_page());

        let items: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(paging.next_cursor(&items), None);
        assert_eq!(paging.next_link(&items), None);
        assert_eq!(paging.first_link(), None);
    }

    #[test]
    fn test_next_link_echoes_filters_and_replaces_cursor() {
        let paging = CursorLinkBuilder::from_url(
            &format!(
                "{BASE}?patient=567834&_lastUpdated=ge2020-01-15&_lastUpdated=lt2020-02-15&_count=2&cursor=X001"
            ),
            1000,
        )
        .unwrap();

        let link = paging.next_link(&["X002", "X003"]).unwrap();
        assert_eq!(query_value(&link, "cursor").as_deref(), Some("X003"));
        assert_eq!(query_value(&link, "patient").as_deref(), Some("567834"));
        assert_eq!(query_value(&link, "_count").as_deref(), Some("2"));

        let url = Url::parse(&link).unwrap();
        let updated: Vec<_> = url
            .query_pairs()
            .filter(|(k, _)| k == "_lastUpdated")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(updated, vec!["ge2020-01-15", "lt2020-02-15"]);
        assert_eq!(url.query_pairs().filter(|(k, _)| k == "cursor").count(), 1);

        let first = paging.first_link().unwrap();
        assert_eq!(query_value(&first, "cursor"), None);
        assert_eq!(query_value(&first, "patient").as_deref(), Some("567834"));
    }

    #[test]
    fn test_invalid_counts() {
        for bad in ["0", "-5", "ten", "1001"] {
            let err = CursorLinkBuilder::from_url(&format!("{BASE}?_count={bad}"), 1000)
                .unwrap_err();
            assert!(matches!(err, PagingError::InvalidCount(_)), "{bad}");
        }
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            CursorLinkBuilder::from_url("not a url", 1000),
            Err(PagingError::InvalidUrl(_))
        ));
    }
}
