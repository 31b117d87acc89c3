// End-to-end ingestion tests against the in-memory store and generator.
//
// Run with: cargo test -p stancegraph-pipeline --test ingest_test

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use stancegraph_common::{
    IngestReport, IngestResponse, NodesCreated, Stance, StanceEdge, ThreadData, UnitKind,
};
use stancegraph_pipeline::testing::{
    classified_thread, comment, reply, MockDiscussionStore, MockGenerator, PromptKind, StoreOp,
};
use stancegraph_pipeline::{ArgumentExtractor, GroupingEngine, Ingestor};

const URL: &str = "https://www.reddit.com/r/test/comments/abc/is_x_good";
const TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    store: Arc<MockDiscussionStore>,
    generator: Arc<MockGenerator>,
    ingestor: Ingestor,
}

fn harness(store: MockDiscussionStore, generator: MockGenerator) -> Harness {
    harness_with_timeout(store, generator, TIMEOUT)
}

fn harness_with_timeout(
    store: MockDiscussionStore,
    generator: MockGenerator,
    timeout: Duration,
) -> Harness {
    let store = Arc::new(store);
    let generator = Arc::new(generator);
    let ingestor = Ingestor::new(
        store.clone(),
        generator.clone(),
        ArgumentExtractor::new(generator.clone(), timeout),
        GroupingEngine::new(store.clone(), generator.clone(), timeout),
    );
    Harness {
        store,
        generator,
        ingestor,
    }
}

fn success(response: IngestResponse) -> IngestReport {
    match response {
        IngestResponse::Success(report) => report,
        IngestResponse::Error { message } => panic!("ingest failed: {message}"),
    }
}

/// FOR, AGAINST, and NEUTRAL comments, each making one argument.
fn three_stance_thread() -> ThreadData {
    classified_thread(
        "Is X good?",
        URL,
        "X",
        vec![
            (Stance::For, comment("c1", "X is good")),
            (Stance::Against, comment("c2", "X is too expensive")),
            (Stance::Neutral, comment("c3", "Depends on what you need")),
        ],
    )
}

fn three_stance_generator() -> MockGenerator {
    MockGenerator::new()
        .on_extract("X is good", &["X saves time"])
        .on_extract("X is too expensive", &["X costs too much"])
        .on_extract("Depends on what you need", &["X fits some needs only"])
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_comment_thread_creates_discussion_comment_and_edge() {
    let h = harness(
        MockDiscussionStore::new(),
        MockGenerator::new().on_extract("X is good", &["X saves time"]),
    );
    let thread = classified_thread(
        "Is X good?",
        URL,
        "X",
        vec![(Stance::For, comment("c1", "X is good"))],
    );

    let report = success(h.ingestor.ingest(URL, &thread).await);

    assert!(report.new_content_added);
    assert!(report.regrouped);
    assert_eq!(
        report.nodes_created,
        NodesCreated {
            topic: 1,
            comments: 1,
            replies: 0,
            arguments: 1,
        }
    );
    let minted = Uuid::parse_str(&report.discussion_id).expect("discussion id is a uuid");
    assert_eq!(minted.get_version_num(), 4);

    assert_eq!(h.store.comment_ids(&report.discussion_id), vec!["c1"]);
    assert_eq!(
        h.store.stance_edges_of(&report.discussion_id, "c1"),
        vec![StanceEdge::Supports]
    );
    let discussion = h.store.discussion(&report.discussion_id).unwrap();
    assert_eq!(discussion.url, URL);
    assert_eq!(discussion.topic.as_deref(), Some("X"));
}

#[tokio::test]
async fn identical_reingest_adds_nothing_and_skips_regroup() {
    let h = harness(MockDiscussionStore::new(), three_stance_generator());
    let thread = three_stance_thread();

    let first = success(h.ingestor.ingest(URL, &thread).await);
    let size_after_first = h.store.graph_size();
    let extractions = h.generator.calls_of(PromptKind::Extraction);
    let groupings = h.generator.calls_of(PromptKind::Grouping);

    let second = success(h.ingestor.ingest(URL, &thread).await);

    assert_eq!(second.discussion_id, first.discussion_id);
    assert!(!second.new_content_added);
    assert!(!second.regrouped);
    assert_eq!(second.nodes_created, NodesCreated::default());
    assert_eq!(h.store.graph_size(), size_after_first);
    assert_eq!(h.generator.calls_of(PromptKind::Extraction), extractions);
    assert_eq!(h.generator.calls_of(PromptKind::Grouping), groupings);
    assert_eq!(h.store.discussion_count(), 1);
}

#[tokio::test]
async fn new_comment_is_extracted_alone_and_all_stances_regroup() {
    let h = harness(
        MockDiscussionStore::new(),
        three_stance_generator().on_extract("X also saves money", &["X saves money"]),
    );
    let first = success(h.ingestor.ingest(URL, &three_stance_thread()).await);
    let d = first.discussion_id.as_str();

    let before: Vec<_> = Stance::ALL
        .iter()
        .map(|s| h.store.groups(d, *s))
        .collect();
    let extracted_before = h.generator.extraction_inputs().len();

    let mut thread = three_stance_thread();
    let new_comment = comment("c4", "X also saves money");
    thread
        .classified_comments
        .as_mut()
        .unwrap()
        .bucket_mut(Stance::For)
        .push(new_comment);

    let second = success(h.ingestor.ingest(URL, &thread).await);
    assert!(second.new_content_added);
    assert!(second.regrouped);
    assert_eq!(second.nodes_created.comments, 1);
    assert_eq!(second.nodes_created.arguments, 1);

    let newly_extracted = &h.generator.extraction_inputs()[extracted_before..];
    assert_eq!(newly_extracted, ["X also saves money"]);

    for (stance, old_groups) in Stance::ALL.iter().zip(before) {
        let new_groups = h.store.groups(d, *stance);
        assert_eq!(new_groups.len(), 1, "{stance} should have one group");
        assert_eq!(new_groups[0].summary, old_groups[0].summary);
        assert_ne!(
            new_groups[0].serial, old_groups[0].serial,
            "{stance} group should be a new instance"
        );
        assert_ne!(new_groups[0].epoch, old_groups[0].epoch);
    }
    let for_group = &h.store.groups(d, Stance::For)[0];
    let mut members = h.store.group_members(for_group.serial);
    members.sort();
    assert_eq!(members, vec!["X saves money", "X saves time"]);
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn source_ids_are_stable_regardless_of_order() {
    let h = harness(MockDiscussionStore::new(), three_stance_generator());
    let first = success(h.ingestor.ingest(URL, &three_stance_thread()).await);

    // Same comments, different order and an unrelated one in front.
    let reordered = classified_thread(
        "Is X good?",
        URL,
        "X",
        vec![
            (Stance::Neutral, comment("c0", "First!")),
            (Stance::Neutral, comment("c3", "Depends on what you need")),
            (Stance::Against, comment("c2", "X is too expensive")),
            (Stance::For, comment("c1", "X is good")),
        ],
    );
    let second = success(h.ingestor.ingest(URL, &reordered).await);

    assert_eq!(second.nodes_created.comments, 1);
    assert_eq!(
        h.store.comment_ids(&first.discussion_id),
        vec!["c0", "c1", "c2", "c3"]
    );
    for id in ["c1", "c2", "c3"] {
        assert_eq!(h.store.stance_edges_of(&first.discussion_id, id).len(), 1);
    }
}

#[tokio::test]
async fn url_resolves_to_one_id_across_cosmetic_variants() {
    let h = harness(MockDiscussionStore::new(), MockGenerator::new());
    let thread = three_stance_thread();

    let a = success(h.ingestor.ingest(URL, &thread).await);
    let b = success(h.ingestor.ingest(&format!("{URL}/"), &thread).await);
    let c = success(h.ingestor.ingest(&format!("  {URL}#comments "), &thread).await);

    assert_eq!(a.discussion_id, b.discussion_id);
    assert_eq!(a.discussion_id, c.discussion_id);
    assert_eq!(h.store.discussion_count(), 1);
    assert_eq!(b.nodes_created.topic, 0);
}

#[tokio::test]
async fn lost_creation_race_adopts_the_stored_id() {
    let h = harness(
        MockDiscussionStore::new().claimed_by_other_writer(URL, "winner-id"),
        MockGenerator::new(),
    );
    let report = success(h.ingestor.ingest(URL, &three_stance_thread()).await);

    assert_eq!(report.discussion_id, "winner-id");
    assert_eq!(report.nodes_created.topic, 0);
    assert_eq!(h.store.comment_ids("winner-id").len(), 3);
}

#[tokio::test]
async fn missing_source_ids_fall_back_to_positions() {
    let h = harness(MockDiscussionStore::new(), MockGenerator::new());
    let mut anonymous = comment("ignored", "No id here");
    anonymous.id = None;
    let mut anonymous_reply = reply("ignored", "Nor here");
    anonymous_reply.id = None;
    anonymous.replies.push(anonymous_reply);

    let thread = classified_thread(
        "Is X good?",
        URL,
        "X",
        vec![
            (Stance::Against, comment("c2", "X is too expensive")),
            (Stance::Against, anonymous),
        ],
    );
    let report = success(h.ingestor.ingest(URL, &thread).await);
    let d = report.discussion_id.as_str();

    assert_eq!(h.store.comment_ids(d), vec!["c2", "comment_against_1"]);
    assert_eq!(h.store.reply_ids(d), vec!["reply_17_comment_against_1#0"]);
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replies_link_to_parent_and_inherit_stance() {
    let generator = MockGenerator::new()
        .on_extract("Agreed, it is quick", &["X is quick"])
        .on_extract("No, it breaks often", &["X is unreliable"]);
    let h = harness(MockDiscussionStore::new(), generator);

    let mut parent = comment("c1", "X is good");
    parent.replies.push(reply("r1", "Agreed, it is quick"));
    let mut dissent = reply("r2", "No, it breaks often");
    dissent.stance = Some(Stance::Against);
    parent.replies.push(dissent);

    let thread = classified_thread("Is X good?", URL, "X", vec![(Stance::For, parent)]);
    let report = success(h.ingestor.ingest(URL, &thread).await);
    let d = report.discussion_id.as_str();

    assert_eq!(report.nodes_created.replies, 2);
    assert_eq!(h.store.reply_ids(d), vec!["reply_2_c1_r1", "reply_2_c1_r2"]);
    for id in ["reply_2_c1_r1", "reply_2_c1_r2"] {
        assert_eq!(h.store.reply_edges_of(d, id), vec!["c1"]);
        assert_eq!(h.store.reply(d, id).unwrap().parent_comment_id, "c1");
        assert!(h.store.stance_edges_of(d, id).is_empty());
    }

    assert_eq!(h.store.argument(d, "X is quick").unwrap().stance, Stance::For);
    assert_eq!(h.store.argument(d, "X is unreliable").unwrap().stance, Stance::Against);
    assert_eq!(
        h.store.argument(d, "X is unreliable").unwrap().sources,
        vec![(UnitKind::Reply, "reply_2_c1_r2".to_string())]
    );
}

#[tokio::test]
async fn anonymous_reply_and_numeric_reply_id_stay_distinct() {
    let h = harness(MockDiscussionStore::new(), MockGenerator::new());
    let mut parent = comment("c1", "X is good");
    let mut anonymous = reply("ignored", "First!");
    anonymous.id = None;
    parent.replies.push(anonymous);
    parent.replies.push(reply("0", "Second"));

    let thread = classified_thread("Is X good?", URL, "X", vec![(Stance::For, parent)]);
    let report = success(h.ingestor.ingest(URL, &thread).await);
    let d = report.discussion_id.as_str();

    assert_eq!(report.nodes_created.replies, 2);
    assert_eq!(h.store.reply_ids(d), vec!["reply_2_c1#0", "reply_2_c1_0"]);
    assert_eq!(h.store.reply(d, "reply_2_c1#0").unwrap().body, "First!");
    assert_eq!(h.store.reply(d, "reply_2_c1_0").unwrap().body, "Second");
}

#[tokio::test]
async fn underscored_comment_and_reply_ids_stay_distinct() {
    let h = harness(MockDiscussionStore::new(), MockGenerator::new());
    let mut left = comment("a_b", "X is good");
    left.replies.push(reply("c", "From a_b"));
    let mut right = comment("a", "X is bad");
    right.replies.push(reply("b_c", "From a"));

    let thread = classified_thread(
        "Is X good?",
        URL,
        "X",
        vec![(Stance::For, left), (Stance::Against, right)],
    );
    let report = success(h.ingestor.ingest(URL, &thread).await);
    let d = report.discussion_id.as_str();

    assert_eq!(report.nodes_created.replies, 2);
    assert_eq!(h.store.reply_edges_of(d, "reply_3_a_b_c"), vec!["a_b"]);
    assert_eq!(h.store.reply_edges_of(d, "reply_1_a_b_c"), vec!["a"]);
}

#[tokio::test]
async fn new_reply_on_known_comment_counts_as_new_content() {
    let h = harness(MockDiscussionStore::new(), MockGenerator::new());
    let thread = classified_thread(
        "Is X good?",
        URL,
        "X",
        vec![(Stance::For, comment("c1", "X is good"))],
    );
    success(h.ingestor.ingest(URL, &thread).await);

    let mut parent = comment("c1", "X is good");
    parent.replies.push(reply("r1", "Same here"));
    let thread = classified_thread("Is X good?", URL, "X", vec![(Stance::For, parent)]);
    let report = success(h.ingestor.ingest(URL, &thread).await);

    assert!(report.new_content_added);
    assert_eq!(report.nodes_created.comments, 0);
    assert_eq!(report.nodes_created.replies, 1);
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reingest_refreshes_body_but_not_stance() {
    let h = harness(MockDiscussionStore::new(), MockGenerator::new());
    let first = success(h.ingestor.ingest(URL, &three_stance_thread()).await);

    let mut edited = comment("c1", "X is good (edited)");
    edited.score = 42;
    let thread = classified_thread("Is X good?", URL, "X", vec![(Stance::Against, edited)]);
    let second = success(h.ingestor.ingest(URL, &thread).await);

    assert!(!second.new_content_added);
    let stored = h.store.comment(&first.discussion_id, "c1").unwrap();
    assert_eq!(stored.body, "X is good (edited)");
    assert_eq!(stored.score, 42);
    assert_eq!(stored.stance, Stance::For);
    assert_eq!(
        h.store.stance_edges_of(&first.discussion_id, "c1"),
        vec![StanceEdge::Supports]
    );
}

#[tokio::test]
async fn discussion_title_and_topic_are_refreshed() {
    let h = harness(MockDiscussionStore::new(), MockGenerator::new());
    let first = success(h.ingestor.ingest(URL, &three_stance_thread()).await);
    let stamp = h.store.discussion(&first.discussion_id).unwrap().updated_at;

    let mut thread = three_stance_thread();
    thread.post.title = "Is X good? [updated]".to_string();
    thread.topic = Some("Whether X is worth adopting".to_string());
    success(h.ingestor.ingest(URL, &thread).await);

    let discussion = h.store.discussion(&first.discussion_id).unwrap();
    assert_eq!(discussion.title, "Is X good? [updated]");
    assert_eq!(discussion.topic.as_deref(), Some("Whether X is worth adopting"));
    assert!(discussion.updated_at >= stamp);
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_argument_lands_in_exactly_one_group() {
    // The model double-books "a2" and forgets "a4".
    let generator = MockGenerator::new()
        .on_extract("long comment", &["a1", "a2", "a3", "a4"])
        .with_grouping(|_, _| {
            "GROUP: First\n- a1\n- a2\nGROUP: Second\n- a2\n- a3\n- not an argument\n".to_string()
        });
    let h = harness(MockDiscussionStore::new(), generator);
    let thread = classified_thread(
        "Is X good?",
        URL,
        "X",
        vec![(Stance::For, comment("c1", "long comment"))],
    );
    let report = success(h.ingestor.ingest(URL, &thread).await);
    let d = report.discussion_id.as_str();

    for text in ["a1", "a2", "a3", "a4"] {
        assert_eq!(h.store.memberships_of(d, text), 1, "{text}");
    }
    let groups = h.store.groups(d, Stance::For);
    let total: usize = groups.iter().map(|g| h.store.group_members(g.serial).len()).sum();
    assert_eq!(total, h.store.arguments(d).len());

    let summaries: Vec<_> = groups.iter().map(|g| g.summary.as_str()).collect();
    assert_eq!(summaries, vec!["First", "Second", "a4"]);
}

#[tokio::test]
async fn grouping_failure_keeps_previous_groups() {
    let h = harness(
        MockDiscussionStore::new(),
        three_stance_generator().on_extract("X also saves money", &["X saves money"]),
    );
    let first = success(h.ingestor.ingest(URL, &three_stance_thread()).await);
    let d = first.discussion_id.as_str();
    let old_for = h.store.groups(d, Stance::For);
    assert_eq!(old_for.len(), 1);

    h.generator.set_grouping_fails(true);
    let mut thread = three_stance_thread();
    thread
        .classified_comments
        .as_mut()
        .unwrap()
        .bucket_mut(Stance::For)
        .push(comment("c4", "X also saves money"));
    let second = success(h.ingestor.ingest(URL, &thread).await);

    assert!(second.regrouped);
    let kept = h.store.groups(d, Stance::For);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].serial, old_for[0].serial);
    assert_eq!(h.store.memberships_of(d, "X saves time"), 1);
    assert_eq!(h.store.memberships_of(d, "X saves money"), 0);
}

#[tokio::test]
async fn group_write_failure_keeps_previous_groups() {
    let h = harness(MockDiscussionStore::new(), three_stance_generator());
    let first = success(h.ingestor.ingest(URL, &three_stance_thread()).await);
    let d = first.discussion_id.as_str();
    let old_for = h.store.groups(d, Stance::For);

    h.store.set_group_writes_fail(true);
    let stats = GroupingEngine::new(h.store.clone(), h.generator.clone(), TIMEOUT)
        .regroup(d)
        .await;

    assert_eq!(stats.stances_failed, 3);
    assert_eq!(stats.stances_grouped, 0);
    let kept = h.store.groups(d, Stance::For);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].serial, old_for[0].serial);
    assert_eq!(kept[0].epoch, old_for[0].epoch);
    assert_eq!(h.store.memberships_of(d, "X saves time"), 1);
}

#[tokio::test]
async fn duplicate_arguments_merge_into_one_node() {
    let generator = MockGenerator::new()
        .on_extract("X is good", &["X saves time"])
        .on_extract("Totally, X is good", &["X saves time", "X saves time"]);
    let h = harness(MockDiscussionStore::new(), generator);
    let thread = classified_thread(
        "Is X good?",
        URL,
        "X",
        vec![
            (Stance::For, comment("c1", "X is good")),
            (Stance::For, comment("c2", "Totally, X is good")),
        ],
    );
    let report = success(h.ingestor.ingest(URL, &thread).await);
    let d = report.discussion_id.as_str();

    assert_eq!(report.nodes_created.arguments, 1);
    let argument = h.store.argument(d, "X saves time").unwrap();
    assert_eq!(argument.sources.len(), 2);
    assert_eq!(h.store.memberships_of(d, "X saves time"), 1);
}

// ---------------------------------------------------------------------------
// Degradation and failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sentinel_response_yields_no_arguments() {
    let h = harness(
        MockDiscussionStore::new(),
        MockGenerator::new().on_extract_raw("lol", "No arguments."),
    );
    let thread = classified_thread("Is X good?", URL, "X", vec![(Stance::Neutral, comment("c1", "lol"))]);
    let report = success(h.ingestor.ingest(URL, &thread).await);

    assert_eq!(report.nodes_created.comments, 1);
    assert_eq!(report.nodes_created.arguments, 0);
    assert!(h.store.arguments(&report.discussion_id).is_empty());
}

#[tokio::test]
async fn extraction_timeout_degrades_to_no_arguments() {
    let h = harness_with_timeout(
        MockDiscussionStore::new(),
        MockGenerator::new()
            .on_extract("X is good", &["X saves time"])
            .slow_extraction(Duration::from_secs(2)),
        Duration::from_millis(20),
    );
    let thread = classified_thread("Is X good?", URL, "X", vec![(Stance::For, comment("c1", "X is good"))]);
    let report = success(h.ingestor.ingest(URL, &thread).await);

    assert_eq!(report.nodes_created.comments, 1);
    assert_eq!(report.nodes_created.arguments, 0);
    assert_eq!(report.units_failed, 0);
}

#[tokio::test]
async fn unreachable_store_aborts_without_allocating_an_id() {
    let h = harness(MockDiscussionStore::new().unreachable(), MockGenerator::new());
    let response = h.ingestor.ingest(URL, &three_stance_thread()).await;

    let IngestResponse::Error { message } = response else {
        panic!("expected an error response");
    };
    assert!(message.contains("Graph store unavailable"), "{message}");
    assert_eq!(h.store.discussion_count(), 0);
}

#[tokio::test]
async fn unreachable_generator_aborts_without_allocating_an_id() {
    let h = harness(MockDiscussionStore::new(), MockGenerator::new().unreachable());
    let response = h.ingestor.ingest(URL, &three_stance_thread()).await;

    assert!(!response.is_success());
    assert_eq!(h.store.discussion_count(), 0);
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn failing_comment_is_skipped_and_counted() {
    let h = harness(
        MockDiscussionStore::new().failing_unit("c2"),
        three_stance_generator(),
    );
    let mut thread = three_stance_thread();
    thread
        .classified_comments
        .as_mut()
        .unwrap()
        .bucket_mut(Stance::Against)[0]
        .replies
        .push(reply("r1", "orphan"));

    let report = success(h.ingestor.ingest(URL, &thread).await);
    let d = report.discussion_id.as_str();

    assert_eq!(report.units_failed, 1);
    assert_eq!(report.nodes_created.comments, 2);
    assert_eq!(h.store.comment_ids(d), vec!["c1", "c3"]);
    assert!(h.store.reply_ids(d).is_empty());
}

// ---------------------------------------------------------------------------
// Resuming interrupted units
// ---------------------------------------------------------------------------

#[tokio::test]
async fn interrupted_stance_link_is_repaired_on_next_ingest() {
    let h = harness(
        MockDiscussionStore::new().failing_once(StoreOp::LinkStance, "c1"),
        three_stance_generator(),
    );

    let first = success(h.ingestor.ingest(URL, &three_stance_thread()).await);
    let d = first.discussion_id.as_str();
    assert_eq!(first.units_failed, 1);
    assert!(h.store.comment(d, "c1").is_some());
    assert!(h.store.stance_edges_of(d, "c1").is_empty());
    assert!(h.store.argument(d, "X saves time").is_none());
    assert!(!h.store.is_complete(UnitKind::Comment, d, "c1"));

    let second = success(h.ingestor.ingest(URL, &three_stance_thread()).await);
    assert_eq!(second.units_failed, 0);
    assert_eq!(second.nodes_created.comments, 0);
    assert_eq!(second.nodes_created.arguments, 1);
    assert!(second.new_content_added);
    assert!(second.regrouped);
    assert_eq!(h.store.stance_edges_of(d, "c1"), vec![StanceEdge::Supports]);
    assert_eq!(h.store.memberships_of(d, "X saves time"), 1);
    assert!(h.store.is_complete(UnitKind::Comment, d, "c1"));

    // Everything is complete now.
    let third = success(h.ingestor.ingest(URL, &three_stance_thread()).await);
    assert!(!third.new_content_added);
}

#[tokio::test]
async fn interrupted_reply_link_is_repaired_on_next_ingest() {
    let h = harness(
        MockDiscussionStore::new().failing_once(StoreOp::LinkReply, "reply_2_c1_r1"),
        MockGenerator::new().on_extract("Agreed, it is quick", &["X is quick"]),
    );
    let mut parent = comment("c1", "X is good");
    parent.replies.push(reply("r1", "Agreed, it is quick"));
    let thread = classified_thread("Is X good?", URL, "X", vec![(Stance::For, parent)]);

    let first = success(h.ingestor.ingest(URL, &thread).await);
    let d = first.discussion_id.as_str();
    assert_eq!(first.units_failed, 1);
    assert!(h.store.reply_edges_of(d, "reply_2_c1_r1").is_empty());
    assert!(h.store.argument(d, "X is quick").is_none());

    let second = success(h.ingestor.ingest(URL, &thread).await);
    assert_eq!(second.units_failed, 0);
    assert_eq!(second.nodes_created.replies, 0);
    assert_eq!(h.store.reply_edges_of(d, "reply_2_c1_r1"), vec!["c1"]);
    assert_eq!(
        h.store.argument(d, "X is quick").unwrap().sources,
        vec![(UnitKind::Reply, "reply_2_c1_r1".to_string())]
    );
    assert!(h.store.is_complete(UnitKind::Reply, d, "reply_2_c1_r1"));
}

#[tokio::test]
async fn interrupted_argument_write_is_repaired_on_next_ingest() {
    let h = harness(
        MockDiscussionStore::new().failing_once(StoreOp::MergeArgument, "X costs too much"),
        three_stance_generator(),
    );

    let first = success(h.ingestor.ingest(URL, &three_stance_thread()).await);
    let d = first.discussion_id.as_str();
    assert_eq!(first.units_failed, 1);
    assert_eq!(h.store.stance_edges_of(d, "c2"), vec![StanceEdge::Opposes]);
    assert!(h.store.argument(d, "X costs too much").is_none());

    let second = success(h.ingestor.ingest(URL, &three_stance_thread()).await);
    assert_eq!(second.units_failed, 0);
    assert_eq!(second.nodes_created.arguments, 1);
    // The stance edge is not duplicated by the retry.
    assert_eq!(h.store.stance_edges_of(d, "c2"), vec![StanceEdge::Opposes]);
    assert_eq!(h.store.groups(d, Stance::Against).len(), 1);
    assert_eq!(h.store.memberships_of(d, "X costs too much"), 1);
}

#[tokio::test]
async fn unclassified_thread_is_rejected() {
    let h = harness(MockDiscussionStore::new(), MockGenerator::new());
    let mut thread = three_stance_thread();
    thread.classified_comments = None;

    let response = h.ingestor.ingest(URL, &thread).await;
    assert!(!response.is_success());
    assert_eq!(h.store.discussion_count(), 0);
}
