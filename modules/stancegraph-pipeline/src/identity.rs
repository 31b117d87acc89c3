use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use stancegraph_common::DiscussionRecord;

use crate::traits::DiscussionStore;

/// Outcome of resolving a discussion URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub discussion_id: String,
    /// True only when this call minted the id the store now holds.
    pub created: bool,
}

/// Maps a source URL to its one discussion id for the lifetime of the store.
pub struct IdentityResolver {
    store: Arc<dyn DiscussionStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn DiscussionStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, url: &str, title: &str) -> Result<Resolution> {
        let url = canonical_url(url);
        if url.is_empty() {
            bail!("discussion URL is empty");
        }

        if let Some(discussion_id) = self.store.find_discussion_by_url(url).await? {
            self.store
                .touch_discussion(&discussion_id, title, None, Utc::now())
                .await?;
            return Ok(Resolution {
                discussion_id,
                created: false,
            });
        }

        let minted = Uuid::new_v4().to_string();
        let stored = self
            .store
            .create_discussion(&DiscussionRecord {
                discussion_id: minted.clone(),
                url: url.to_string(),
                title: title.trim().to_string(),
                created_at: Utc::now(),
            })
            .await?;

        let created = stored == minted;
        info!(discussion_id = stored.as_str(), url, created, "Resolved discussion");
        Ok(Resolution {
            discussion_id: stored,
            created,
        })
    }
}

/// Trim whitespace, drop the fragment and trailing slashes. Query strings are kept.
pub fn canonical_url(url: &str) -> &str {
    let url = url.trim();
    let url = url.split_once('#').map_or(url, |(before, _)| before);
    url.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_url_normalizes_cosmetic_differences() {
        let base = "https://www.reddit.com/r/x/comments/abc/title";
        assert_eq!(canonical_url(base), base);
        assert_eq!(canonical_url(&format!("  {base}/ ")), base);
        assert_eq!(canonical_url(&format!("{base}/#c1")), base);
        assert_eq!(canonical_url("https://e.com/t?id=1"), "https://e.com/t?id=1");
        assert_eq!(canonical_url("   "), "");
    }
}
