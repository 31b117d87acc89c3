use chrono::{DateTime, Utc};
use neo4rs::query;
use tracing::{debug, info, warn};

use stancegraph_common::{
    ArgumentRecord, CommentRecord, DiscussionRecord, GroupPlan, GroupWrite, ReplyRecord, Stance,
    StanceEdge, StanceSummary, UnitKind, UnitStatus,
};

use crate::GraphClient;

/// Write-side wrapper for the graph. Used by the ingestion pipeline only.
///
/// Every method but `replace_groups` is a single auto-commit statement that
/// MERGEs on a natural key scoped by `discussion_id`, so a crashed ingestion
/// can simply be re-run.
#[derive(Clone)]
pub struct GraphWriter {
    client: GraphClient,
}

impl GraphWriter {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    pub async fn ping(&self) -> Result<(), neo4rs::Error> {
        self.client.ping().await
    }

    // --- Discussion ---

    pub async fn find_discussion_by_url(&self, url: &str) -> Result<Option<String>, neo4rs::Error> {
        let q = query(
            "MATCH (d:Discussion {url: $url})
             RETURN d.discussion_id AS discussion_id
             LIMIT 1",
        )
        .param("url", url);

        let mut stream = self.client.graph.execute(q).await?;
        if let Some(row) = stream.next().await? {
            return Ok(row.get::<String>("discussion_id").ok());
        }
        Ok(None)
    }

    /// Create-if-absent on the URL. Returns the id the store holds afterwards,
    /// which differs from `record.discussion_id` when another writer got there first.
    pub async fn create_discussion(
        &self,
        record: &DiscussionRecord,
    ) -> Result<String, neo4rs::Error> {
        let q = query(
            "MERGE (d:Discussion:Topic {url: $url})
             ON CREATE SET
                d.discussion_id = $discussion_id,
                d.title = $title,
                d.created_at = datetime($created_at),
                d.updated_at = datetime($created_at)
             RETURN d.discussion_id AS discussion_id",
        )
        .param("url", record.url.as_str())
        .param("discussion_id", record.discussion_id.as_str())
        .param("title", record.title.as_str())
        .param("created_at", format_datetime(&record.created_at));

        let mut stream = self.client.graph.execute(q).await?;
        let stored = match stream.next().await? {
            Some(row) => row.get::<String>("discussion_id").ok(),
            None => None,
        };
        let stored = stored.unwrap_or_else(|| record.discussion_id.clone());

        if stored == record.discussion_id {
            info!(discussion_id = stored.as_str(), url = record.url.as_str(), "Discussion created");
        } else {
            debug!(
                discussion_id = stored.as_str(),
                url = record.url.as_str(),
                "Discussion already existed, minted id discarded"
            );
        }
        Ok(stored)
    }

    /// Bump `updated_at` and refresh title/topic. Empty values leave the stored ones alone.
    pub async fn touch_discussion(
        &self,
        discussion_id: &str,
        title: &str,
        topic: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), neo4rs::Error> {
        let q = query(
            "MATCH (d:Discussion {discussion_id: $discussion_id})
             SET d.updated_at = datetime($now),
                 d.title = CASE WHEN $title <> '' THEN $title ELSE d.title END,
                 d.topic = CASE WHEN $topic <> '' THEN $topic ELSE d.topic END",
        )
        .param("discussion_id", discussion_id)
        .param("title", title)
        .param("topic", topic.unwrap_or_default())
        .param("now", format_datetime(&now));

        self.client.graph.run(q).await?;
        Ok(())
    }

    // --- Comments and replies ---

    /// `Pending` means the node exists but `mark_unit_complete` never ran for it.
    pub async fn unit_status(
        &self,
        kind: UnitKind,
        id: &str,
        discussion_id: &str,
    ) -> Result<UnitStatus, neo4rs::Error> {
        let cypher = match kind {
            UnitKind::Comment => {
                "OPTIONAL MATCH (n:Comment {id: $id, discussion_id: $discussion_id})
                 RETURN n IS NOT NULL AS found, n.completed_at IS NOT NULL AS complete"
            }
            UnitKind::Reply => {
                "OPTIONAL MATCH (n:Reply {id: $id, discussion_id: $discussion_id})
                 RETURN n IS NOT NULL AS found, n.completed_at IS NOT NULL AS complete"
            }
        };
        let q = query(cypher)
            .param("id", id)
            .param("discussion_id", discussion_id);

        let mut stream = self.client.graph.execute(q).await?;
        let Some(row) = stream.next().await? else {
            return Ok(UnitStatus::Absent);
        };
        Ok(
            match (
                row.get::<bool>("found").unwrap_or(false),
                row.get::<bool>("complete").unwrap_or(false),
            ) {
                (false, _) => UnitStatus::Absent,
                (true, false) => UnitStatus::Pending,
                (true, true) => UnitStatus::Complete,
            },
        )
    }

    /// Record that a unit's edge and arguments are written.
    pub async fn mark_unit_complete(
        &self,
        kind: UnitKind,
        id: &str,
        discussion_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), neo4rs::Error> {
        let cypher = match kind {
            UnitKind::Comment => {
                "MATCH (n:Comment {id: $id, discussion_id: $discussion_id})
                 SET n.completed_at = datetime($now)"
            }
            UnitKind::Reply => {
                "MATCH (n:Reply {id: $id, discussion_id: $discussion_id})
                 SET n.completed_at = datetime($now)"
            }
        };
        let q = query(cypher)
            .param("id", id)
            .param("discussion_id", discussion_id)
            .param("now", format_datetime(&now));

        self.client.graph.run(q).await?;
        Ok(())
    }

    /// Stance is recorded once at creation. Body, author, and score follow the source.
    pub async fn upsert_comment(
        &self,
        comment: &CommentRecord,
        now: DateTime<Utc>,
    ) -> Result<(), neo4rs::Error> {
        let q = query(
            "MERGE (c:Comment {id: $id, discussion_id: $discussion_id})
             ON CREATE SET
                c.stance = $stance,
                c.created_at = datetime($now)
             SET c.body = $body,
                 c.author = $author,
                 c.score = $score,
                 c.updated_at = datetime($now)",
        )
        .param("id", comment.id.as_str())
        .param("discussion_id", comment.discussion_id.as_str())
        .param("stance", comment.stance.as_str())
        .param("body", comment.body.as_str())
        .param("author", comment.author.as_str())
        .param("score", comment.score)
        .param("now", format_datetime(&now));

        self.client.graph.run(q).await?;
        Ok(())
    }

    pub async fn upsert_reply(
        &self,
        reply: &ReplyRecord,
        now: DateTime<Utc>,
    ) -> Result<(), neo4rs::Error> {
        let q = query(
            "MERGE (r:Reply {id: $id, discussion_id: $discussion_id})
             ON CREATE SET
                r.stance = $stance,
                r.parent_comment_id = $parent_comment_id,
                r.created_at = datetime($now)
             SET r.body = $body,
                 r.author = $author,
                 r.score = $score,
                 r.updated_at = datetime($now)",
        )
        .param("id", reply.id.as_str())
        .param("discussion_id", reply.discussion_id.as_str())
        .param("parent_comment_id", reply.parent_comment_id.as_str())
        .param("stance", reply.stance.as_str())
        .param("body", reply.body.as_str())
        .param("author", reply.author.as_str())
        .param("score", reply.score)
        .param("now", format_datetime(&now));

        self.client.graph.run(q).await?;
        Ok(())
    }

    /// Link a comment to its discussion with the edge type for `stance`.
    /// A comment that already carries any stance edge is left untouched.
    pub async fn link_comment_stance(
        &self,
        comment_id: &str,
        discussion_id: &str,
        stance: Stance,
    ) -> Result<(), neo4rs::Error> {
        let q = query(stance_edge_cypher(stance.edge()))
            .param("id", comment_id)
            .param("discussion_id", discussion_id);

        self.client.graph.run(q).await?;
        Ok(())
    }

    pub async fn link_reply_to(
        &self,
        reply_id: &str,
        parent_comment_id: &str,
        discussion_id: &str,
    ) -> Result<(), neo4rs::Error> {
        let q = query(
            "MATCH (r:Reply {id: $reply_id, discussion_id: $discussion_id})
             MATCH (c:Comment {id: $parent_comment_id, discussion_id: $discussion_id})
             WHERE NOT (r)-[:REPLY_TO]->(:Comment)
             MERGE (r)-[:REPLY_TO]->(c)",
        )
        .param("reply_id", reply_id)
        .param("parent_comment_id", parent_comment_id)
        .param("discussion_id", discussion_id);

        self.client.graph.run(q).await?;
        Ok(())
    }

    // --- Arguments ---

    /// MERGE an argument by (text, discussion_id) and link it to its source unit.
    /// Returns true only when the Argument node itself was created.
    pub async fn merge_argument(
        &self,
        arg: &ArgumentRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, neo4rs::Error> {
        let q = query(argument_cypher(arg.source_kind))
            .param("text", arg.text.as_str())
            .param("discussion_id", arg.discussion_id.as_str())
            .param("stance", arg.stance.as_str())
            .param("source_id", arg.source_id.as_str())
            .param("now", format_datetime(&now));

        let mut stream = self.client.graph.execute(q).await?;
        if let Some(row) = stream.next().await? {
            return Ok(row.get::<bool>("created").unwrap_or(false));
        }
        Ok(false)
    }

    /// All argument texts of one stance, oldest first.
    pub async fn argument_texts(
        &self,
        discussion_id: &str,
        stance: Stance,
    ) -> Result<Vec<String>, neo4rs::Error> {
        let q = query(
            "MATCH (a:Argument {discussion_id: $discussion_id, stance: $stance})
             RETURN a.text AS text
             ORDER BY a.created_at, a.text",
        )
        .param("discussion_id", discussion_id)
        .param("stance", stance.as_str());

        let mut texts = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            if let Ok(text) = row.get::<String>("text") {
                texts.push(text);
            }
        }
        Ok(texts)
    }

    // --- Groups ---

    /// Swap a stance's groups for `plan` in one transaction: drop the old
    /// HAS_GROUP edges and emptied groups, then write the new ones. On any
    /// failure the transaction rolls back and the previous groups stay.
    pub async fn replace_groups(
        &self,
        discussion_id: &str,
        stance: Stance,
        epoch: &str,
        plan: &[GroupPlan],
        now: DateTime<Utc>,
    ) -> Result<GroupWrite, neo4rs::Error> {
        let mut queries = vec![
            query(
                "MATCH (:Argument {discussion_id: $discussion_id, stance: $stance})-[r:HAS_GROUP]->(:ArgumentGroup)
                 DELETE r",
            )
            .param("discussion_id", discussion_id)
            .param("stance", stance.as_str()),
            query(
                "MATCH (g:ArgumentGroup {discussion_id: $discussion_id, stance: $stance})
                 WHERE NOT ()-[:HAS_GROUP]->(g)
                 DETACH DELETE g",
            )
            .param("discussion_id", discussion_id)
            .param("stance", stance.as_str()),
        ];

        let mut write = GroupWrite::default();
        for group in plan {
            queries.push(
                query(
                    "MERGE (g:ArgumentGroup {summary: $summary, stance: $stance, discussion_id: $discussion_id})
                     ON CREATE SET g.created_at = datetime($now)
                     SET g.epoch = $epoch",
                )
                .param("summary", group.summary.as_str())
                .param("stance", stance.as_str())
                .param("discussion_id", discussion_id)
                .param("epoch", epoch)
                .param("now", format_datetime(&now)),
            );
            queries.push(
                query(
                    "MATCH (g:ArgumentGroup {summary: $summary, stance: $stance, discussion_id: $discussion_id})
                     UNWIND $members AS text
                     MATCH (a:Argument {text: text, discussion_id: $discussion_id, stance: $stance})
                     WHERE NOT (a)-[:HAS_GROUP]->(:ArgumentGroup)
                     MERGE (a)-[:HAS_GROUP]->(g)",
                )
                .param("summary", group.summary.as_str())
                .param("stance", stance.as_str())
                .param("discussion_id", discussion_id)
                .param("members", group.members.clone()),
            );
            write.groups += 1;
            write.linked += group.members.len() as u32;
        }

        let mut txn = self.client.graph.start_txn().await?;
        if let Err(e) = txn.run_queries(queries).await {
            if let Err(rollback) = txn.rollback().await {
                warn!(discussion_id, error = %rollback, "Group replacement rollback failed");
            }
            return Err(e);
        }
        txn.commit().await?;

        debug!(
            discussion_id,
            stance = stance.as_str(),
            epoch,
            groups = write.groups,
            linked = write.linked,
            "Replaced argument groups"
        );
        Ok(write)
    }

    // --- Summaries ---

    /// Store per-stance summaries on the discussion node, one property per stance.
    pub async fn save_stance_summaries(
        &self,
        discussion_id: &str,
        summaries: &[StanceSummary],
        now: DateTime<Utc>,
    ) -> Result<(), neo4rs::Error> {
        for summary in summaries {
            let q = query(summary_cypher(summary.stance))
                .param("discussion_id", discussion_id)
                .param("summary", summary.summary.as_str())
                .param("now", format_datetime(&now));
            self.client.graph.run(q).await?;
        }
        Ok(())
    }
}

fn summary_cypher(stance: Stance) -> &'static str {
    match stance {
        Stance::For => {
            "MATCH (d:Discussion {discussion_id: $discussion_id})
             SET d.summary_for = $summary, d.summarized_at = datetime($now)"
        }
        Stance::Against => {
            "MATCH (d:Discussion {discussion_id: $discussion_id})
             SET d.summary_against = $summary, d.summarized_at = datetime($now)"
        }
        Stance::Neutral => {
            "MATCH (d:Discussion {discussion_id: $discussion_id})
             SET d.summary_neutral = $summary, d.summarized_at = datetime($now)"
        }
    }
}

/// One statement per edge type; relationship types are never interpolated.
fn stance_edge_cypher(edge: StanceEdge) -> &'static str {
    match edge {
        StanceEdge::Supports => {
            "MATCH (c:Comment {id: $id, discussion_id: $discussion_id})
             MATCH (d:Discussion {discussion_id: $discussion_id})
             WHERE NOT (c)-[:SUPPORTS|OPPOSES|NEUTRAL]->(d)
             MERGE (c)-[:SUPPORTS]->(d)"
        }
        StanceEdge::Opposes => {
            "MATCH (c:Comment {id: $id, discussion_id: $discussion_id})
             MATCH (d:Discussion {discussion_id: $discussion_id})
             WHERE NOT (c)-[:SUPPORTS|OPPOSES|NEUTRAL]->(d)
             MERGE (c)-[:OPPOSES]->(d)"
        }
        StanceEdge::Neutral => {
            "MATCH (c:Comment {id: $id, discussion_id: $discussion_id})
             MATCH (d:Discussion {discussion_id: $discussion_id})
             WHERE NOT (c)-[:SUPPORTS|OPPOSES|NEUTRAL]->(d)
             MERGE (c)-[:NEUTRAL]->(d)"
        }
    }
}

fn argument_cypher(source: UnitKind) -> &'static str {
    match source {
        UnitKind::Comment => {
            "OPTIONAL MATCH (prior:Argument {text: $text, discussion_id: $discussion_id})
             WITH prior IS NULL AS created
             MERGE (a:Argument {text: $text, discussion_id: $discussion_id})
             ON CREATE SET a.stance = $stance, a.created_at = datetime($now)
             WITH a, created
             OPTIONAL MATCH (src:Comment {id: $source_id, discussion_id: $discussion_id})
             FOREACH (_ IN CASE WHEN src IS NULL THEN [] ELSE [1] END |
                MERGE (a)-[:EXTRACTED_FROM]->(src))
             RETURN created"
        }
        UnitKind::Reply => {
            "OPTIONAL MATCH (prior:Argument {text: $text, discussion_id: $discussion_id})
             WITH prior IS NULL AS created
             MERGE (a:Argument {text: $text, discussion_id: $discussion_id})
             ON CREATE SET a.stance = $stance, a.created_at = datetime($now)
             WITH a, created
             OPTIONAL MATCH (src:Reply {id: $source_id, discussion_id: $discussion_id})
             FOREACH (_ IN CASE WHEN src IS NULL THEN [] ELSE [1] END |
                MERGE (a)-[:EXTRACTED_FROM]->(src))
             RETURN created"
        }
    }
}

/// Format for Cypher `datetime()`; stored values read back as zoned datetimes.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_datetime_is_cypher_compatible() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(format_datetime(&dt), "2025-03-09T14:05:07.000000Z");
    }

    #[test]
    fn each_stance_writes_only_its_own_edge_type() {
        for stance in Stance::ALL {
            let cypher = stance_edge_cypher(stance.edge());
            let merge = cypher
                .lines()
                .find(|l| l.trim_start().starts_with("MERGE"))
                .unwrap();
            assert!(merge.contains(&format!("[:{}]", stance.edge().as_str())));
            assert!(cypher.contains("WHERE NOT (c)-[:SUPPORTS|OPPOSES|NEUTRAL]->(d)"));
        }
    }

    #[test]
    fn each_stance_summary_has_its_own_property() {
        assert!(summary_cypher(Stance::For).contains("d.summary_for = $summary"));
        assert!(summary_cypher(Stance::Against).contains("d.summary_against = $summary"));
        assert!(summary_cypher(Stance::Neutral).contains("d.summary_neutral = $summary"));
    }

    #[test]
    fn argument_source_label_follows_unit_kind() {
        assert!(argument_cypher(UnitKind::Comment).contains("(src:Comment"));
        assert!(argument_cypher(UnitKind::Reply).contains("(src:Reply"));
        for kind in [UnitKind::Comment, UnitKind::Reply] {
            assert!(argument_cypher(kind).contains("RETURN created"));
        }
    }
}
