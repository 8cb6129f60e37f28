//! Cursor-following pagination with cycle detection and a hard page cap
//! (spec §4.1 edge case: a misbehaving upstream must not hang the caller).

use crate::error::{HttpCoreError, Result};
use std::collections::HashSet;

/// Hard ceiling on pages fetched for a single logical request, regardless
/// of what the upstream claims remains.
pub const MAX_PAGES: usize = 100;

/// One page of results plus the cursor to continue from, if any.
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Drives `fetch_page` across cursors until pagination stops, a cycle is
/// detected, or `MAX_PAGES` is reached.
pub async fn fetch_all_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: std::future::Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut seen_cursors: HashSet<String> = HashSet::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let page = fetch_page(cursor.clone()).await?;
        items.extend(page.items);

        match page.next_cursor {
            None => return Ok(items),
            Some(next) => {
                if !seen_cursors.insert(next.clone()) {
                    return Err(HttpCoreError::PaginationStopped(format!(
                        "cursor {next} repeated — possible pagination cycle"
                    )));
                }
                cursor = Some(next);
            }
        }
    }

    Err(HttpCoreError::PaginationStopped(format!(
        "exceeded MAX_PAGES ({MAX_PAGES}) without pagination terminating"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn stops_when_next_cursor_is_none() {
        let calls = AtomicUsize::new(0);
        let result = fetch_all_pages(|_cursor| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(Page { items: vec![1, 2], next_cursor: Some("p2".to_string()) })
                } else {
                    Ok(Page { items: vec![3], next_cursor: None })
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn detects_cursor_cycle() {
        let result: Result<Vec<i32>> = fetch_all_pages(|_cursor| async move {
            Ok(Page { items: vec![1], next_cursor: Some("same".to_string()) })
        })
        .await;
        assert!(matches!(result, Err(HttpCoreError::PaginationStopped(_))));
    }

    #[tokio::test]
    async fn caps_at_max_pages_when_cursors_keep_changing() {
        let calls = AtomicUsize::new(0);
        let result: Result<Vec<i32>> = fetch_all_pages(|_cursor| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(Page { items: vec![1], next_cursor: Some(format!("p{n}")) }) }
        })
        .await;
        assert!(matches!(result, Err(HttpCoreError::PaginationStopped(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_PAGES);
    }
}
