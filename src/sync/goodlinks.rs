use reqwest::Url;

use super::SyncError;
use crate::models::Item;

/// Builds the `goodlinks://add` URL that files `item` in GoodLinks.
///
/// Title and tags are left out when empty.
///
/// # Examples
///
/// ```
/// use tagmark::ItemBuilder;
/// use tagmark::sync::goodlinks_url;
///
/// let item = ItemBuilder::new()
///     .url("https://example.com")
///     .tags(vec!["rust".into(), "cli".into()])
///     .build();
///
/// let url = goodlinks_url(&item).unwrap();
/// assert_eq!(url.as_str(), "goodlinks://add?url=https%3A%2F%2Fexample.com&tags=rust%2Ccli");
/// ```
pub fn goodlinks_url(item: &Item) -> Result<Url, SyncError> {
    let mut url =
        Url::parse("goodlinks://add").map_err(|e| SyncError::InvalidUrl(e.to_string()))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("url", &item.url);
        if !item.title.is_empty() {
            query.append_pair("title", &item.title);
        }
        if !item.tags.is_empty() {
            query.append_pair("tags", &item.tags.join(","));
        }
    }

    Ok(url)
}
