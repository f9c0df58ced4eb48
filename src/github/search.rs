use std::future::Future;
use tracing::debug;

/// Items requested per page from the search, files and reviews endpoints
pub const SEARCH_PAGE_SIZE: u32 = 100;

/// Fetch 1-based pages until one comes back shorter than `page_size`.
///
/// A page of exactly `page_size` items always triggers one more fetch, so a
/// result set that is an exact multiple of the page size ends on an empty page.
pub async fn collect_pages<T, E, F, Fut>(page_size: u32, mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let batch = fetch(page).await?;
        let count = batch.len();
        items.extend(batch);
        debug!(page, count, total = items.len(), "Fetched page");

        if count < page_size as usize {
            return Ok(items);
        }
        page += 1;
    }
}

/// Search query for the open pull requests authored by `login`
pub fn open_pull_requests_query(login: &str) -> String {
    format!("is:pr is:open author:{login}")
}
