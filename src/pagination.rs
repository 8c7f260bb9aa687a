//! Paginated list results.
//!
//! Some endpoints (dataset items in particular) return the page as the body
//! and describe it through `x-apify-pagination-*` headers. Older API versions
//! used the `x-apifier-pagination-*` names; both are honored.

use http::HeaderMap;
use serde::{Deserialize, Serialize};

const HEADER_PREFIXES: [&str; 2] = ["x-apify-pagination-", "x-apifier-pagination-"];

/// Pagination metadata read from response headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// Total number of items available.
    pub total: u64,
    /// Offset of the first returned item.
    pub offset: u64,
    /// Number of items returned.
    pub count: u64,
    /// Page size limit, absent for unbounded single-page results.
    pub limit: Option<u64>,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationList<T> {
    /// The items on this page, in API order.
    pub items: Vec<T>,
    /// Total number of items available.
    pub total: u64,
    /// Offset of the first returned item.
    pub offset: u64,
    /// Number of items returned.
    pub count: u64,
    /// Page size limit.
    pub limit: Option<u64>,
}

impl<T> PaginationList<T> {
    /// Combines header metadata with the page items.
    pub fn from_parts(meta: PaginationMeta, items: Vec<T>) -> Self {
        Self {
            items,
            total: meta.total,
            offset: meta.offset,
            count: meta.count,
            limit: meta.limit,
        }
    }
}

fn header_u64(headers: &HeaderMap, field: &str) -> Option<u64> {
    HEADER_PREFIXES.iter().find_map(|prefix| {
        headers
            .get(format!("{}{}", prefix, field))?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    })
}

/// Reads pagination metadata from response headers.
///
/// Current header names take precedence over legacy ones. Missing or
/// unparseable `total`, `offset` and `count` headers read as `0`; a missing
/// `limit` reads as `None`.
///
/// # Examples
///
/// ```
/// use apify_client::pagination::pagination_from_headers;
/// use http::{HeaderMap, HeaderValue};
///
/// let mut headers = HeaderMap::new();
/// headers.insert("x-apify-pagination-total", HeaderValue::from_static("10"));
/// headers.insert("x-apify-pagination-count", HeaderValue::from_static("5"));
///
/// let meta = pagination_from_headers(&headers);
/// assert_eq!(meta.total, 10);
/// assert_eq!(meta.limit, None);
/// ```
pub fn pagination_from_headers(headers: &HeaderMap) -> PaginationMeta {
    PaginationMeta {
        total: header_u64(headers, "total").unwrap_or(0),
        offset: header_u64(headers, "offset").unwrap_or(0),
        count: header_u64(headers, "count").unwrap_or(0),
        limit: header_u64(headers, "limit"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn reads_current_headers() {
        let meta = pagination_from_headers(&headers(&[
            ("x-apify-pagination-total", "10"),
            ("x-apify-pagination-offset", "3"),
            ("x-apify-pagination-count", "5"),
            ("x-apify-pagination-limit", "5"),
        ]));
        assert_eq!(
            meta,
            PaginationMeta {
                total: 10,
                offset: 3,
                count: 5,
                limit: Some(5),
            }
        );
    }

    #[test]
    fn falls_back_to_legacy_headers() {
        let meta = pagination_from_headers(&headers(&[
            ("x-apifier-pagination-total", "7"),
            ("x-apifier-pagination-offset", "1"),
            ("x-apifier-pagination-count", "2"),
        ]));
        assert_eq!(meta.total, 7);
        assert_eq!(meta.offset, 1);
        assert_eq!(meta.count, 2);
        assert_eq!(meta.limit, None);
    }

    #[test]
    fn current_headers_win_over_legacy() {
        let meta = pagination_from_headers(&headers(&[
            ("x-apify-pagination-total", "10"),
            ("x-apifier-pagination-total", "99"),
        ]));
        assert_eq!(meta.total, 10);
    }

    #[test]
    fn unparseable_values_read_as_missing() {
        let meta = pagination_from_headers(&headers(&[
            ("x-apify-pagination-total", "many"),
            ("x-apify-pagination-limit", "-1"),
        ]));
        assert_eq!(meta.total, 0);
        assert_eq!(meta.limit, None);
    }

    #[test]
    fn from_parts_keeps_items_in_order() {
        let list = PaginationList::from_parts(
            PaginationMeta {
                total: 3,
                offset: 0,
                count: 3,
                limit: None,
            },
            vec!["a", "b", "c"],
        );
        assert_eq!(list.items, vec!["a", "b", "c"]);
        assert_eq!(list.count, 3);
    }
}
