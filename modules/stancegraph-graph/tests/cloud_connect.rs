//! Smoke test: connect to Neo4j via bolt:// and run migrations.
//! Run with: cargo test -p stancegraph-graph --test cloud_connect -- --ignored

use stancegraph_graph::{migrate::migrate, query, GraphClient};

#[tokio::test]
#[ignore] // requires live Neo4j credentials
async fn cloud_connect() {
    let uri = std::env::var("NEO4J_URI").expect("NEO4J_URI required");
    let user = std::env::var("NEO4J_USER").expect("NEO4J_USER required");
    let password = std::env::var("NEO4J_PASSWORD").expect("NEO4J_PASSWORD required");

    let client = GraphClient::connect(&uri, &user, &password)
        .await
        .expect("Failed to connect");

    client.ping().await.expect("ping failed");
    migrate(&client).await.expect("migrations failed");
    // Second run must be a no-op.
    migrate(&client).await.expect("migrations not idempotent");

    let mut result = client
        .inner()
        .execute(query("SHOW CONSTRAINTS YIELD name RETURN collect(name) AS names"))
        .await
        .unwrap();
    let row = result.next().await.unwrap().expect("No result row");
    let names: Vec<String> = row.get("names").unwrap();
    assert!(names.iter().any(|n| n == "comment_key"));
}
