use neo4rs::query;
use tracing::{info, warn};

use crate::GraphClient;

/// Natural-key uniqueness for every node label. Each upsert in the writer
/// MERGEs on exactly one of these keys.
const CONSTRAINTS: &[&str] = &[
    "CREATE CONSTRAINT discussion_url IF NOT EXISTS
     FOR (d:Discussion) REQUIRE d.url IS UNIQUE",
    "CREATE CONSTRAINT discussion_id IF NOT EXISTS
     FOR (d:Discussion) REQUIRE d.discussion_id IS UNIQUE",
    "CREATE CONSTRAINT comment_key IF NOT EXISTS
     FOR (c:Comment) REQUIRE (c.id, c.discussion_id) IS UNIQUE",
    "CREATE CONSTRAINT reply_key IF NOT EXISTS
     FOR (r:Reply) REQUIRE (r.id, r.discussion_id) IS UNIQUE",
    "CREATE CONSTRAINT argument_key IF NOT EXISTS
     FOR (a:Argument) REQUIRE (a.text, a.discussion_id) IS UNIQUE",
    "CREATE CONSTRAINT argument_group_key IF NOT EXISTS
     FOR (g:ArgumentGroup) REQUIRE (g.summary, g.stance, g.discussion_id) IS UNIQUE",
];

/// Lookup paths that are not covered by a constraint's backing index.
const INDEXES: &[&str] = &[
    "CREATE INDEX argument_stance IF NOT EXISTS
     FOR (a:Argument) ON (a.discussion_id, a.stance)",
    "CREATE INDEX group_discussion IF NOT EXISTS
     FOR (g:ArgumentGroup) ON (g.discussion_id, g.stance)",
    "CREATE INDEX reply_parent IF NOT EXISTS
     FOR (r:Reply) ON (r.discussion_id, r.parent_comment_id)",
];

/// Run idempotent schema migrations: constraints, indexes.
pub async fn migrate(client: &GraphClient) -> Result<(), neo4rs::Error> {
    let g = &client.graph;

    info!("Running schema migrations...");

    for c in CONSTRAINTS {
        run_ignoring_exists(g, c).await?;
    }
    info!(count = CONSTRAINTS.len(), "Uniqueness constraints ensured");

    for idx in INDEXES {
        run_ignoring_exists(g, idx).await?;
    }
    info!(count = INDEXES.len(), "Property indexes ensured");

    Ok(())
}

/// Servers without `IF NOT EXISTS` support report a duplicate instead; treat that as success.
async fn run_ignoring_exists(g: &neo4rs::Graph, cypher: &str) -> Result<(), neo4rs::Error> {
    match g.run(query(cypher)).await {
        Ok(_) => Ok(()),
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("already exists") || msg.contains("equivalent") {
                warn!(
                    "Already exists (skipped): {}",
                    cypher.split_whitespace().collect::<Vec<_>>().join(" ")
                );
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_statement_is_idempotent() {
        for stmt in CONSTRAINTS.iter().chain(INDEXES) {
            assert!(stmt.contains("IF NOT EXISTS"), "not idempotent: {stmt}");
        }
    }

    #[test]
    fn every_node_label_has_a_natural_key() {
        for label in ["Discussion", "Comment", "Reply", "Argument", "ArgumentGroup"] {
            let needle = format!("({}:{label})", label[..1].to_lowercase());
            assert!(
                CONSTRAINTS.iter().any(|c| c.contains(&needle)),
                "missing constraint for {label}"
            );
        }
    }
}
