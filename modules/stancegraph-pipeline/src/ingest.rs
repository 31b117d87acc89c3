use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use stancegraph_common::{
    ArgumentRecord, CommentRecord, IngestReport, IngestResponse, NodesCreated, ReplyRecord,
    SourceComment, SourceReply, Stance, ThreadData, UnitKind, UnitStatus,
};

use crate::extractor::ArgumentExtractor;
use crate::grouping::GroupingEngine;
use crate::identity::IdentityResolver;
use crate::traits::{DiscussionStore, TextGenerator};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Text generation service unavailable: {0}")]
    GeneratorUnavailable(String),

    #[error("Could not resolve discussion identity: {0}")]
    Identity(String),

    #[error("Invalid thread: {0}")]
    InvalidThread(String),
}

/// Running totals for one ingestion.
#[derive(Debug, Default)]
struct Tally {
    nodes: NodesCreated,
    content_added: bool,
    units_failed: u32,
}

/// Writes a classified thread into the graph, creating only what is new, and
/// regroups arguments when anything new arrived.
///
/// A unit is marked complete only after its edge and arguments are written, so
/// a unit left half-written by a failed run is resumed by the next one.
pub struct Ingestor {
    store: Arc<dyn DiscussionStore>,
    generator: Arc<dyn TextGenerator>,
    resolver: IdentityResolver,
    extractor: ArgumentExtractor,
    grouping: GroupingEngine,
}

impl Ingestor {
    /// `generator` is only pinged; the extractor and grouping engine carry their own.
    pub fn new(
        store: Arc<dyn DiscussionStore>,
        generator: Arc<dyn TextGenerator>,
        extractor: ArgumentExtractor,
        grouping: GroupingEngine,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(store.clone()),
            store,
            generator,
            extractor,
            grouping,
        }
    }

    /// Ingest and render the outcome in the `{status: ...}` wire shape.
    pub async fn ingest(&self, discussion_url: &str, thread: &ThreadData) -> IngestResponse {
        match self.try_ingest(discussion_url, thread).await {
            Ok(report) => IngestResponse::Success(report),
            Err(e) => {
                error!(url = discussion_url, error = %e, "Ingestion aborted");
                IngestResponse::error(e.to_string())
            }
        }
    }

    pub async fn try_ingest(
        &self,
        discussion_url: &str,
        thread: &ThreadData,
    ) -> Result<IngestReport, IngestError> {
        let classified = thread.classified_comments.as_ref().ok_or_else(|| {
            IngestError::InvalidThread("thread has no classified_comments".to_string())
        })?;

        self.store
            .ping()
            .await
            .map_err(|e| IngestError::StoreUnavailable(format!("{e:#}")))?;
        self.generator
            .ping()
            .await
            .map_err(|e| IngestError::GeneratorUnavailable(format!("{e:#}")))?;

        let title = thread.post.title.trim();
        let topic = thread.topic_or_title();
        let resolution = self
            .resolver
            .resolve(discussion_url, title)
            .await
            .map_err(|e| IngestError::Identity(format!("{e:#}")))?;
        let discussion_id = resolution.discussion_id.as_str();

        let mut tally = Tally::default();
        if resolution.created {
            tally.nodes.topic = 1;
        }

        for (stance, bucket) in classified.buckets() {
            for (position, comment) in bucket.iter().enumerate() {
                let comment_id = comment_id(comment, stance, position);

                if let Err(e) = self
                    .write_comment(discussion_id, topic, stance, &comment_id, comment, &mut tally)
                    .await
                {
                    warn!(
                        discussion_id,
                        comment_id = comment_id.as_str(),
                        error = %format!("{e:#}"),
                        "Comment write failed, skipping it and its replies"
                    );
                    tally.units_failed += 1;
                    continue;
                }

                for (index, reply) in comment.replies.iter().enumerate() {
                    let reply_id = reply_id(&comment_id, reply, index);
                    let reply_stance = reply.stance.unwrap_or(stance);

                    if let Err(e) = self
                        .write_reply(
                            discussion_id,
                            topic,
                            reply_stance,
                            &comment_id,
                            &reply_id,
                            reply,
                            &mut tally,
                        )
                        .await
                    {
                        warn!(
                            discussion_id,
                            reply_id = reply_id.as_str(),
                            error = %format!("{e:#}"),
                            "Reply write failed, skipping it"
                        );
                        tally.units_failed += 1;
                    }
                }
            }
        }

        if let Err(e) = self
            .store
            .touch_discussion(discussion_id, title, Some(topic), Utc::now())
            .await
        {
            warn!(discussion_id, error = %format!("{e:#}"), "Failed to refresh discussion metadata");
        }

        let regrouped = if tally.content_added {
            self.grouping.regroup(discussion_id).await;
            true
        } else {
            info!(discussion_id, "No new content, skipping regroup");
            false
        };

        info!(
            discussion_id,
            topic = tally.nodes.topic,
            comments = tally.nodes.comments,
            replies = tally.nodes.replies,
            arguments = tally.nodes.arguments,
            units_failed = tally.units_failed,
            regrouped,
            "Ingestion complete"
        );

        Ok(IngestReport {
            discussion_id: resolution.discussion_id.clone(),
            nodes_created: tally.nodes,
            new_content_added: tally.content_added,
            units_failed: tally.units_failed,
            regrouped,
        })
    }

    async fn write_comment(
        &self,
        discussion_id: &str,
        topic: &str,
        stance: Stance,
        comment_id: &str,
        comment: &SourceComment,
        tally: &mut Tally,
    ) -> Result<()> {
        let status = self
            .store
            .unit_status(UnitKind::Comment, comment_id, discussion_id)
            .await?;

        let record = CommentRecord {
            id: comment_id.to_string(),
            discussion_id: discussion_id.to_string(),
            body: comment.body.clone(),
            author: comment.author.clone(),
            score: comment.score,
            stance,
        };
        self.store.upsert_comment(&record, Utc::now()).await?;
        match status {
            UnitStatus::Complete => return Ok(()),
            UnitStatus::Absent => tally.nodes.comments += 1,
            UnitStatus::Pending => info!(discussion_id, comment_id, "Resuming partially written comment"),
        }
        tally.content_added = true;

        self.store
            .link_comment_stance(comment_id, discussion_id, stance)
            .await?;
        self.extract_arguments(discussion_id, topic, stance, UnitKind::Comment, comment_id, &comment.body, tally)
            .await?;
        self.store
            .mark_unit_complete(UnitKind::Comment, comment_id, discussion_id, Utc::now())
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn write_reply(
        &self,
        discussion_id: &str,
        topic: &str,
        stance: Stance,
        parent_comment_id: &str,
        reply_id: &str,
        reply: &SourceReply,
        tally: &mut Tally,
    ) -> Result<()> {
        let status = self
            .store
            .unit_status(UnitKind::Reply, reply_id, discussion_id)
            .await?;

        let record = ReplyRecord {
            id: reply_id.to_string(),
            discussion_id: discussion_id.to_string(),
            parent_comment_id: parent_comment_id.to_string(),
            body: reply.body.clone(),
            author: reply.author.clone(),
            score: reply.score,
            stance,
        };
        self.store.upsert_reply(&record, Utc::now()).await?;
        match status {
            UnitStatus::Complete => return Ok(()),
            UnitStatus::Absent => tally.nodes.replies += 1,
            UnitStatus::Pending => info!(discussion_id, reply_id, "Resuming partially written reply"),
        }
        tally.content_added = true;

        self.store
            .link_reply_to(reply_id, parent_comment_id, discussion_id)
            .await?;
        self.extract_arguments(discussion_id, topic, stance, UnitKind::Reply, reply_id, &reply.body, tally)
            .await?;
        self.store
            .mark_unit_complete(UnitKind::Reply, reply_id, discussion_id, Utc::now())
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn extract_arguments(
        &self,
        discussion_id: &str,
        topic: &str,
        stance: Stance,
        source_kind: UnitKind,
        source_id: &str,
        body: &str,
        tally: &mut Tally,
    ) -> Result<()> {
        for text in self.extractor.extract(body, topic).await {
            let record = ArgumentRecord {
                text,
                discussion_id: discussion_id.to_string(),
                stance,
                source_kind,
                source_id: source_id.to_string(),
            };
            if self.store.merge_argument(&record, Utc::now()).await? {
                tally.nodes.arguments += 1;
            }
        }
        Ok(())
    }
}

/// Source id when present, else `comment_<stance>_<position>` within the stance bucket.
pub fn comment_id(comment: &SourceComment, stance: Stance, position: usize) -> String {
    match comment.id.as_deref() {
        Some(id) => id.to_string(),
        None => {
            let id = format!("comment_{}_{}", stance.slug(), position);
            warn!(comment_id = id.as_str(), "Comment has no source id, using positional id (unstable if the thread is reordered)");
            id
        }
    }
}

/// `reply_<len>_<comment_id>_<source id>`, or `reply_<len>_<comment_id>#<index>`
/// when the reply has no source id. `<len>` is the comment id's byte length, so
/// the comment id can always be split back out and the two forms never meet.
pub fn reply_id(comment_id: &str, reply: &SourceReply, index: usize) -> String {
    let prefix = format!("reply_{}_{comment_id}", comment_id.len());
    match reply.id.as_deref() {
        Some(id) => format!("{prefix}_{id}"),
        None => {
            let id = format!("{prefix}#{index}");
            warn!(reply_id = id.as_str(), "Reply has no source id, using positional id (unstable if replies are reordered)");
            id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ids_are_used_verbatim() {
        let comment = SourceComment {
            id: Some("k3x9".into()),
            ..Default::default()
        };
        assert_eq!(comment_id(&comment, Stance::Against, 7), "k3x9");

        let reply = SourceReply {
            id: Some("r55".into()),
            ..Default::default()
        };
        assert_eq!(reply_id("k3x9", &reply, 4), "reply_4_k3x9_r55");
    }

    #[test]
    fn missing_ids_fall_back_to_position() {
        assert_eq!(
            comment_id(&SourceComment::default(), Stance::Against, 2),
            "comment_against_2"
        );
        assert_eq!(
            reply_id("comment_against_2", &SourceReply::default(), 0),
            "reply_17_comment_against_2#0"
        );
    }

    fn reply_with(id: Option<&str>) -> SourceReply {
        SourceReply {
            id: id.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn positional_reply_never_matches_a_numeric_source_id() {
        let positional = reply_id("c1", &reply_with(None), 0);
        let numeric = reply_id("c1", &reply_with(Some("0")), 5);
        assert_ne!(positional, numeric);
    }

    #[test]
    fn underscores_cannot_shift_the_comment_boundary() {
        let left = reply_id("a_b", &reply_with(Some("c")), 0);
        let right = reply_id("a", &reply_with(Some("b_c")), 0);
        assert_ne!(left, right);
        assert_eq!(left, "reply_3_a_b_c");
        assert_eq!(right, "reply_1_a_b_c");
    }
}
