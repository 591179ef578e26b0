//! Page-increment pagination for list endpoints.

use std::future::Future;

/// Fetch pages 1, 2, … and concatenate them.
///
/// Stops at the first empty page, at a page shorter than `page_size`, or once
/// `limit` items have been collected (the result is truncated to `limit`).
pub async fn paginate<T, E, F, Fut>(
    mut fetch: F,
    page_size: u32,
    limit: Option<usize>,
) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let batch = fetch(page).await?;
        let batch_len = batch.len();
        items.extend(batch);

        if let Some(limit) = limit
            && items.len() >= limit
        {
            items.truncate(limit);
            break;
        }
        if batch_len == 0 || batch_len < page_size as usize {
            break;
        }
        page += 1;
    }

    Ok(items)
}
