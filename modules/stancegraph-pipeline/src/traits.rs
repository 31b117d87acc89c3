// Trait abstractions for the ingestion pipeline's two collaborators.
//
// DiscussionStore: every graph write and lookup the Ingestor and GroupingEngine
//   issue, implemented by GraphWriter against Neo4j.
// TextGenerator: prompt in, text out. Implemented by the ai-client providers.
//
// Both have in-memory mocks in testing.rs, so the whole pipeline runs under
// `cargo test` with no network, database, or Docker.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ai_client::{ChatAgent, Claude, OpenAi};
use stancegraph_common::{
    ArgumentRecord, CommentRecord, DiscussionRecord, GroupPlan, GroupWrite, ReplyRecord, Stance,
    UnitKind, UnitStatus,
};
use stancegraph_graph::GraphWriter;

// ---------------------------------------------------------------------------
// DiscussionStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DiscussionStore: Send + Sync {
    /// Connectivity check, run before anything is written.
    async fn ping(&self) -> Result<()>;

    async fn find_discussion_by_url(&self, url: &str) -> Result<Option<String>>;

    /// Create-if-absent on the URL. Returns the id the store holds afterwards.
    async fn create_discussion(&self, record: &DiscussionRecord) -> Result<String>;

    async fn touch_discussion(
        &self,
        discussion_id: &str,
        title: &str,
        topic: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()>;

    async fn unit_status(
        &self,
        kind: UnitKind,
        id: &str,
        discussion_id: &str,
    ) -> Result<UnitStatus>;

    /// Called once a unit's edge and arguments are all written.
    async fn mark_unit_complete(
        &self,
        kind: UnitKind,
        id: &str,
        discussion_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    async fn upsert_comment(&self, comment: &CommentRecord, now: DateTime<Utc>) -> Result<()>;

    async fn upsert_reply(&self, reply: &ReplyRecord, now: DateTime<Utc>) -> Result<()>;

    async fn link_comment_stance(
        &self,
        comment_id: &str,
        discussion_id: &str,
        stance: Stance,
    ) -> Result<()>;

    async fn link_reply_to(
        &self,
        reply_id: &str,
        parent_comment_id: &str,
        discussion_id: &str,
    ) -> Result<()>;

    /// Returns true when the Argument node was newly created.
    async fn merge_argument(&self, arg: &ArgumentRecord, now: DateTime<Utc>) -> Result<bool>;

    async fn argument_texts(&self, discussion_id: &str, stance: Stance) -> Result<Vec<String>>;

    /// Atomically swap a stance's groups for `plan`. On error the previous
    /// groups are untouched. An empty plan clears the stance.
    async fn replace_groups(
        &self,
        discussion_id: &str,
        stance: Stance,
        epoch: &str,
        plan: &[GroupPlan],
        now: DateTime<Utc>,
    ) -> Result<GroupWrite>;
}

#[async_trait]
impl DiscussionStore for GraphWriter {
    async fn ping(&self) -> Result<()> {
        Ok(GraphWriter::ping(self).await?)
    }

    async fn find_discussion_by_url(&self, url: &str) -> Result<Option<String>> {
        Ok(GraphWriter::find_discussion_by_url(self, url).await?)
    }

    async fn create_discussion(&self, record: &DiscussionRecord) -> Result<String> {
        Ok(GraphWriter::create_discussion(self, record).await?)
    }

    async fn touch_discussion(
        &self,
        discussion_id: &str,
        title: &str,
        topic: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        Ok(GraphWriter::touch_discussion(self, discussion_id, title, topic, now).await?)
    }

    async fn unit_status(
        &self,
        kind: UnitKind,
        id: &str,
        discussion_id: &str,
    ) -> Result<UnitStatus> {
        Ok(GraphWriter::unit_status(self, kind, id, discussion_id).await?)
    }

    async fn mark_unit_complete(
        &self,
        kind: UnitKind,
        id: &str,
        discussion_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        Ok(GraphWriter::mark_unit_complete(self, kind, id, discussion_id, now).await?)
    }

    async fn upsert_comment(&self, comment: &CommentRecord, now: DateTime<Utc>) -> Result<()> {
        Ok(GraphWriter::upsert_comment(self, comment, now).await?)
    }

    async fn upsert_reply(&self, reply: &ReplyRecord, now: DateTime<Utc>) -> Result<()> {
        Ok(GraphWriter::upsert_reply(self, reply, now).await?)
    }

    async fn link_comment_stance(
        &self,
        comment_id: &str,
        discussion_id: &str,
        stance: Stance,
    ) -> Result<()> {
        Ok(GraphWriter::link_comment_stance(self, comment_id, discussion_id, stance).await?)
    }

    async fn link_reply_to(
        &self,
        reply_id: &str,
        parent_comment_id: &str,
        discussion_id: &str,
    ) -> Result<()> {
        Ok(GraphWriter::link_reply_to(self, reply_id, parent_comment_id, discussion_id).await?)
    }

    async fn merge_argument(&self, arg: &ArgumentRecord, now: DateTime<Utc>) -> Result<bool> {
        Ok(GraphWriter::merge_argument(self, arg, now).await?)
    }

    async fn argument_texts(&self, discussion_id: &str, stance: Stance) -> Result<Vec<String>> {
        Ok(GraphWriter::argument_texts(self, discussion_id, stance).await?)
    }

    async fn replace_groups(
        &self,
        discussion_id: &str,
        stance: Stance,
        epoch: &str,
        plan: &[GroupPlan],
        now: DateTime<Utc>,
    ) -> Result<GroupWrite> {
        Ok(GraphWriter::replace_groups(self, discussion_id, stance, epoch, plan, now).await?)
    }
}

// ---------------------------------------------------------------------------
// TextGenerator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn ping(&self) -> Result<()>;
}

#[async_trait]
impl TextGenerator for OpenAi {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(prompt).await
    }

    async fn ping(&self) -> Result<()> {
        ChatAgent::ping(self).await
    }
}

#[async_trait]
impl TextGenerator for Claude {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(prompt).await
    }

    async fn ping(&self) -> Result<()> {
        ChatAgent::ping(self).await
    }
}

/// Run one generation call under `limit`. A timeout is reported as an error.
pub async fn generate_within(
    generator: &dyn TextGenerator,
    prompt: &str,
    limit: Duration,
) -> Result<String> {
    match tokio::time::timeout(limit, generator.generate(prompt)).await {
        Ok(result) => result,
        Err(_) => bail!("text generation timed out after {}s", limit.as_secs()),
    }
}
