//! Paged REST listings

use crate::source::{SourceError, SourceResult};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};

/// One page of a REST listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageResponse {
    pub count: u32,
    pub items: Vec<Value>,
}

/// Number of pages needed for `count` items
pub fn page_count(count: u32, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    count.div_ceil(page_size).max(1)
}

/// Fetch every page of a listing
///
/// The first page decides the total; the remaining pages run concurrently,
/// at most `concurrency` at a time. A later page that fails is logged and
/// skipped unless the failure is fatal. Items keep page order.
pub async fn fetch_all_pages<F, Fut>(
    page_size: u32,
    concurrency: usize,
    fetch_page: F,
) -> SourceResult<Vec<Value>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = SourceResult<PageResponse>>,
{
    let first = fetch_page(1).await?;
    let total_pages = page_count(first.count, page_size);
    debug!(count = first.count, total_pages, "Fetched first page");

    let mut items = first.items;
    if total_pages <= 1 {
        return Ok(items);
    }

    let fetch_page = &fetch_page;
    let mut rest: Vec<(u32, SourceResult<PageResponse>)> = stream::iter(2..=total_pages)
        .map(|page| async move { (page, fetch_page(page).await) })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    rest.sort_by_key(|(page, _)| *page);

    for (page, result) in rest {
        match result {
            Ok(response) => items.extend(response.items),
            Err(e) if e.is_fatal() => return Err(e),
            Err(SourceError::Cancelled) => return Err(SourceError::Cancelled),
            Err(e) => warn!(page, error = %e, "Skipping page that failed to load"),
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(count: u32, names: &[&str]) -> PageResponse {
        PageResponse {
            count,
            items: names.iter().map(|n| json!({ "name": n })).collect(),
        }
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 50), 1);
        assert_eq!(page_count(50, 50), 1);
        assert_eq!(page_count(51, 50), 2);
        assert_eq!(page_count(120, 50), 3);
    }

    #[tokio::test]
    async fn later_pages_are_fetched_and_ordered() {
        let items = fetch_all_pages(2, 4, |n| async move {
            Ok(match n {
                1 => page(5, &["a", "b"]),
                2 => page(5, &["c", "d"]),
                _ => page(5, &["e"]),
            })
        })
        .await
        .unwrap();
        let names: Vec<_> = items.iter().map(|i| i["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn failed_later_page_is_skipped() {
        let items = fetch_all_pages(1, 2, |n| async move {
            match n {
                2 => Err(SourceError::Status {
                    status: 500,
                    body: String::new(),
                }),
                _ => Ok(page(3, &["x"])),
            }
        })
        .await
        .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn fatal_later_page_fails_the_listing() {
        let result = fetch_all_pages(1, 2, |n| async move {
            match n {
                3 => Err(SourceError::Unauthorized(401)),
                _ => Ok(page(3, &["x"])),
            }
        })
        .await;
        assert!(matches!(result, Err(SourceError::Unauthorized(401))));
    }

    #[tokio::test]
    async fn first_page_failure_is_returned() {
        let result = fetch_all_pages(1, 2, |_| async move {
            Err::<PageResponse, _>(SourceError::Network("reset".to_string()))
        })
        .await;
        assert!(matches!(result, Err(SourceError::Network(_))));
    }
}
