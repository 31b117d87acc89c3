use chrono::{DateTime, Utc};
use neo4rs::query;

use stancegraph_common::{
    stance_distribution, ArgumentView, DiscussionSnapshot, DiscussionSummary, GroupView, Stance,
    StanceSummary, UnitKind, UnitView,
};

use crate::GraphClient;

/// Read-only view of persisted discussions. Used by the CLI and by tests.
pub struct GraphReader {
    client: GraphClient,
}

impl GraphReader {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Every discussion, most recently ingested first.
    pub async fn list_discussions(&self) -> Result<Vec<DiscussionSummary>, neo4rs::Error> {
        let q = query(
            "MATCH (d:Discussion)
             RETURN d.discussion_id AS discussion_id, d.url AS url, d.title AS title,
                    d.topic AS topic, d.updated_at AS updated_at
             ORDER BY d.updated_at DESC",
        );

        let mut out = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            if let Some(summary) = row_to_summary(&row) {
                out.push(summary);
            }
        }
        Ok(out)
    }

    /// Full picture of one discussion, or None if the id is unknown.
    pub async fn snapshot(
        &self,
        discussion_id: &str,
    ) -> Result<Option<DiscussionSnapshot>, neo4rs::Error> {
        let q = query(
            "MATCH (d:Discussion {discussion_id: $discussion_id})
             RETURN d.discussion_id AS discussion_id, d.url AS url, d.title AS title,
                    d.topic AS topic, d.updated_at AS updated_at,
                    d.summary_for AS summary_for, d.summary_against AS summary_against,
                    d.summary_neutral AS summary_neutral",
        )
        .param("discussion_id", discussion_id);

        let mut stream = self.client.graph.execute(q).await?;
        let Some(row) = stream.next().await? else {
            return Ok(None);
        };
        let Some(discussion) = row_to_summary(&row) else {
            return Ok(None);
        };
        let summaries = Stance::ALL
            .into_iter()
            .filter_map(|stance| {
                let summary = row.get::<String>(summary_key(stance)).ok()?;
                Some(StanceSummary { stance, summary })
            })
            .collect();

        let comments = self.units(UnitKind::Comment, discussion_id).await?;
        let replies = self.units(UnitKind::Reply, discussion_id).await?;
        let distribution =
            stance_distribution(comments.iter().chain(&replies).filter_map(|u| u.stance));

        Ok(Some(DiscussionSnapshot {
            discussion,
            distribution,
            summaries,
            comments,
            replies,
            groups: self.groups(discussion_id).await?,
            arguments: self.arguments(discussion_id).await?,
        }))
    }

    async fn units(
        &self,
        kind: UnitKind,
        discussion_id: &str,
    ) -> Result<Vec<UnitView>, neo4rs::Error> {
        let cypher = match kind {
            UnitKind::Comment => {
                "MATCH (n:Comment {discussion_id: $discussion_id})
                 OPTIONAL MATCH (a:Argument)-[:EXTRACTED_FROM]->(n)
                 WITH n, a ORDER BY a.created_at, a.text
                 RETURN n.id AS id, n.body AS body, n.author AS author, n.score AS score,
                        n.stance AS stance, null AS parent_comment_id,
                        collect(a.text) AS arguments
                 ORDER BY n.score DESC, n.id"
            }
            UnitKind::Reply => {
                "MATCH (n:Reply {discussion_id: $discussion_id})
                 OPTIONAL MATCH (a:Argument)-[:EXTRACTED_FROM]->(n)
                 WITH n, a ORDER BY a.created_at, a.text
                 RETURN n.id AS id, n.body AS body, n.author AS author, n.score AS score,
                        n.stance AS stance, n.parent_comment_id AS parent_comment_id,
                        collect(a.text) AS arguments
                 ORDER BY n.parent_comment_id, n.id"
            }
        };
        let q = query(cypher).param("discussion_id", discussion_id);

        let mut out = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            let Ok(id) = row.get::<String>("id") else {
                continue;
            };
            out.push(UnitView {
                id,
                body: row.get("body").unwrap_or_default(),
                author: row.get("author").unwrap_or_default(),
                score: row.get("score").unwrap_or(0),
                stance: row_stance(&row, "stance"),
                parent_comment_id: row.get::<String>("parent_comment_id").ok(),
                arguments: row.get("arguments").unwrap_or_default(),
            });
        }
        Ok(out)
    }

    async fn groups(&self, discussion_id: &str) -> Result<Vec<GroupView>, neo4rs::Error> {
        let q = query(
            "MATCH (g:ArgumentGroup {discussion_id: $discussion_id})
             OPTIONAL MATCH (a:Argument)-[:HAS_GROUP]->(g)
             WITH g, a ORDER BY a.created_at, a.text
             RETURN g.summary AS summary, g.stance AS stance, collect(a.text) AS arguments
             ORDER BY g.stance, size(arguments) DESC, g.summary",
        )
        .param("discussion_id", discussion_id);

        let mut out = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            let (Ok(summary), Some(stance)) =
                (row.get::<String>("summary"), row_stance(&row, "stance"))
            else {
                continue;
            };
            out.push(GroupView {
                summary,
                stance,
                arguments: row.get("arguments").unwrap_or_default(),
            });
        }
        Ok(out)
    }

    async fn arguments(&self, discussion_id: &str) -> Result<Vec<ArgumentView>, neo4rs::Error> {
        let q = query(
            "MATCH (a:Argument {discussion_id: $discussion_id})
             OPTIONAL MATCH (a)-[:EXTRACTED_FROM]->(src)
             WITH a, collect(src)[0] AS src
             OPTIONAL MATCH (a)-[:HAS_GROUP]->(g:ArgumentGroup)
             RETURN a.text AS text, a.stance AS stance,
                    head(labels(src)) AS source_kind, src.id AS source_id,
                    g.summary AS group_summary
             ORDER BY a.stance, a.created_at, a.text",
        )
        .param("discussion_id", discussion_id);

        let mut out = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            let (Ok(text), Some(stance)) = (row.get::<String>("text"), row_stance(&row, "stance"))
            else {
                continue;
            };
            out.push(ArgumentView {
                text,
                stance,
                source_kind: row
                    .get::<String>("source_kind")
                    .ok()
                    .and_then(|k| UnitKind::from_label(&k)),
                source_id: row.get::<String>("source_id").ok(),
                group_summary: row.get::<String>("group_summary").ok(),
            });
        }
        Ok(out)
    }
}

fn row_to_summary(row: &neo4rs::Row) -> Option<DiscussionSummary> {
    Some(DiscussionSummary {
        discussion_id: row.get::<String>("discussion_id").ok()?,
        url: row.get("url").unwrap_or_default(),
        title: row.get("title").unwrap_or_default(),
        topic: row.get::<String>("topic").ok().filter(|t| !t.is_empty()),
        updated_at: row_datetime_opt(row, "updated_at"),
    })
}

fn summary_key(stance: Stance) -> &'static str {
    match stance {
        Stance::For => "summary_for",
        Stance::Against => "summary_against",
        Stance::Neutral => "summary_neutral",
    }
}

fn row_stance(row: &neo4rs::Row, key: &str) -> Option<Stance> {
    row.get::<String>(key)
        .ok()
        .and_then(|s| Stance::from_label(&s))
}

/// Datetimes written through Cypher `datetime()` come back zoned; older or
/// hand-edited values may be local datetimes or strings.
fn row_datetime_opt(row: &neo4rs::Row, key: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = row.get::<DateTime<chrono::FixedOffset>>(key) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = row.get::<chrono::NaiveDateTime>(key) {
        return Some(ndt.and_utc());
    }
    row.get::<String>(key)
        .ok()
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
