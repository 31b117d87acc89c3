// Test mocks for the ingestion pipeline.
//
// Two mocks matching the two trait boundaries:
// - MockDiscussionStore (DiscussionStore): stateful in-memory graph with
//   the same merge semantics as the Neo4j writer
// - MockGenerator (TextGenerator): canned responses keyed by prompt task
//
// Plus thread-building helpers for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stancegraph_common::{
    ArgumentRecord, CommentRecord, DiscussionRecord, GroupPlan, GroupWrite, PostMeta,
    ReplyRecord, SourceComment, SourceReply, Stance, StanceEdge, ThreadData, UnitKind,
    UnitStatus,
};

use crate::prompts::{
    EXTRACTION_TASK, GROUPING_TASK, NO_ARGUMENTS, STANCE_TASK, SUMMARY_TASK, TOPIC_TASK,
};
use crate::traits::{DiscussionStore, TextGenerator};

// ---------------------------------------------------------------------------
// MockDiscussionStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StoredDiscussion {
    pub discussion_id: String,
    pub url: String,
    pub title: String,
    pub topic: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredArgument {
    pub text: String,
    pub discussion_id: String,
    pub stance: Stance,
    /// EXTRACTED_FROM targets.
    pub sources: Vec<(UnitKind, String)>,
}

/// One ArgumentGroup node. `serial` changes every time the node is re-created.
#[derive(Debug, Clone)]
pub struct StoredGroup {
    pub serial: u64,
    pub summary: String,
    pub stance: Stance,
    pub discussion_id: String,
    pub epoch: String,
}

/// Writes that can be made to fail once with `failing_once`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// Keyed by comment id.
    LinkStance,
    /// Keyed by reply id.
    LinkReply,
    /// Keyed by argument text.
    MergeArgument,
}

struct MockStoreInner {
    discussions: Vec<StoredDiscussion>,
    /// url → id another writer already claimed; invisible to lookups.
    claimed_urls: HashMap<String, String>,
    comments: HashMap<(String, String), CommentRecord>,
    replies: HashMap<(String, String), ReplyRecord>,
    /// (discussion_id, comment_id, edge)
    stance_edges: Vec<(String, String, StanceEdge)>,
    /// (discussion_id, reply_id, parent_comment_id)
    reply_edges: Vec<(String, String, String)>,
    arguments: Vec<StoredArgument>,
    groups: Vec<StoredGroup>,
    /// (discussion_id, argument text, group serial)
    memberships: Vec<(String, String, u64)>,
    next_serial: u64,
    /// (kind, discussion_id, id) of units marked complete.
    completed: HashSet<(UnitKind, String, String)>,
    fail_ping: bool,
    failing_units: HashSet<String>,
    failing_once: HashSet<(StoreOp, String)>,
    fail_group_writes: bool,
}

/// Stateful in-memory graph mock. Thread-safe via interior Mutex.
pub struct MockDiscussionStore {
    inner: Mutex<MockStoreInner>,
}

impl Default for MockDiscussionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDiscussionStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockStoreInner {
                discussions: Vec::new(),
                claimed_urls: HashMap::new(),
                comments: HashMap::new(),
                replies: HashMap::new(),
                stance_edges: Vec::new(),
                reply_edges: Vec::new(),
                arguments: Vec::new(),
                groups: Vec::new(),
                memberships: Vec::new(),
                next_serial: 1,
                completed: HashSet::new(),
                fail_ping: false,
                failing_units: HashSet::new(),
                failing_once: HashSet::new(),
                fail_group_writes: false,
            }),
        }
    }

    /// Make `ping` fail, as if the database were unreachable.
    pub fn unreachable(self) -> Self {
        self.inner.lock().unwrap().fail_ping = true;
        self
    }

    /// Make every upsert of the comment or reply with this id fail.
    pub fn failing_unit(self, id: &str) -> Self {
        self.inner.lock().unwrap().failing_units.insert(id.to_string());
        self
    }

    /// Fail the next `op` on `key`, then let it through.
    pub fn failing_once(self, op: StoreOp, key: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failing_once
            .insert((op, key.to_string()));
        self
    }

    /// Toggle group replacement failures on a shared instance.
    pub fn set_group_writes_fail(&self, fails: bool) {
        self.inner.lock().unwrap().fail_group_writes = fails;
    }

    /// Simulate a concurrent writer that created the discussion for `url`
    /// between our lookup and our create.
    pub fn claimed_by_other_writer(self, url: &str, discussion_id: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .claimed_urls
            .insert(url.to_string(), discussion_id.to_string());
        self
    }

    // --- Assertion helpers ---

    pub fn discussion_count(&self) -> usize {
        self.inner.lock().unwrap().discussions.len()
    }

    pub fn discussion(&self, discussion_id: &str) -> Option<StoredDiscussion> {
        self.inner
            .lock()
            .unwrap()
            .discussions
            .iter()
            .find(|d| d.discussion_id == discussion_id)
            .cloned()
    }

    pub fn comment(&self, discussion_id: &str, id: &str) -> Option<CommentRecord> {
        self.inner
            .lock()
            .unwrap()
            .comments
            .get(&(discussion_id.to_string(), id.to_string()))
            .cloned()
    }

    pub fn comment_ids(&self, discussion_id: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<String> = inner
            .comments
            .keys()
            .filter(|(d, _)| d == discussion_id)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn reply(&self, discussion_id: &str, id: &str) -> Option<ReplyRecord> {
        self.inner
            .lock()
            .unwrap()
            .replies
            .get(&(discussion_id.to_string(), id.to_string()))
            .cloned()
    }

    pub fn reply_ids(&self, discussion_id: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<String> = inner
            .replies
            .keys()
            .filter(|(d, _)| d == discussion_id)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Stance edges leaving one comment.
    pub fn stance_edges_of(&self, discussion_id: &str, comment_id: &str) -> Vec<StanceEdge> {
        self.inner
            .lock()
            .unwrap()
            .stance_edges
            .iter()
            .filter(|(d, c, _)| d == discussion_id && c == comment_id)
            .map(|(_, _, e)| *e)
            .collect()
    }

    /// Parent comment ids of every REPLY_TO edge leaving one reply.
    pub fn reply_edges_of(&self, discussion_id: &str, reply_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .reply_edges
            .iter()
            .filter(|(d, r, _)| d == discussion_id && r == reply_id)
            .map(|(_, _, p)| p.clone())
            .collect()
    }

    /// (nodes, edges) across the whole mock graph.
    pub fn graph_size(&self) -> (usize, usize) {
        let inner = self.inner.lock().unwrap();
        let nodes = inner.discussions.len()
            + inner.comments.len()
            + inner.replies.len()
            + inner.arguments.len()
            + inner.groups.len();
        let extracted: usize = inner.arguments.iter().map(|a| a.sources.len()).sum();
        let edges = inner.stance_edges.len()
            + inner.reply_edges.len()
            + extracted
            + inner.memberships.len();
        (nodes, edges)
    }

    pub fn arguments(&self, discussion_id: &str) -> Vec<StoredArgument> {
        self.inner
            .lock()
            .unwrap()
            .arguments
            .iter()
            .filter(|a| a.discussion_id == discussion_id)
            .cloned()
            .collect()
    }

    pub fn argument(&self, discussion_id: &str, text: &str) -> Option<StoredArgument> {
        self.arguments(discussion_id)
            .into_iter()
            .find(|a| a.text == text)
    }

    pub fn groups(&self, discussion_id: &str, stance: Stance) -> Vec<StoredGroup> {
        self.inner
            .lock()
            .unwrap()
            .groups
            .iter()
            .filter(|g| g.discussion_id == discussion_id && g.stance == stance)
            .cloned()
            .collect()
    }

    /// Argument texts linked to the group with this serial.
    pub fn group_members(&self, serial: u64) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|(_, _, s)| *s == serial)
            .map(|(_, text, _)| text.clone())
            .collect()
    }

    /// Number of HAS_GROUP edges leaving one argument.
    pub fn memberships_of(&self, discussion_id: &str, text: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|(d, t, _)| d == discussion_id && t == text)
            .count()
    }

    pub fn is_complete(&self, kind: UnitKind, discussion_id: &str, id: &str) -> bool {
        self.inner.lock().unwrap().completed.contains(&(
            kind,
            discussion_id.to_string(),
            id.to_string(),
        ))
    }

    fn check_unit(&self, id: &str) -> Result<()> {
        if self.inner.lock().unwrap().failing_units.contains(id) {
            bail!("MockDiscussionStore: write of {id} rejected");
        }
        Ok(())
    }
}

fn check_once(inner: &mut MockStoreInner, op: StoreOp, key: &str) -> Result<()> {
    if inner.failing_once.remove(&(op, key.to_string())) {
        bail!("MockDiscussionStore: {op:?} on {key} interrupted");
    }
    Ok(())
}

#[async_trait]
impl DiscussionStore for MockDiscussionStore {
    async fn ping(&self) -> Result<()> {
        if self.inner.lock().unwrap().fail_ping {
            bail!("MockDiscussionStore: connection refused");
        }
        Ok(())
    }

    async fn find_discussion_by_url(&self, url: &str) -> Result<Option<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .discussions
            .iter()
            .find(|d| d.url == url)
            .map(|d| d.discussion_id.clone()))
    }

    async fn create_discussion(&self, record: &DiscussionRecord) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.discussions.iter().find(|d| d.url == record.url) {
            return Ok(existing.discussion_id.clone());
        }
        let discussion_id = inner
            .claimed_urls
            .remove(&record.url)
            .unwrap_or_else(|| record.discussion_id.clone());
        inner.discussions.push(StoredDiscussion {
            discussion_id: discussion_id.clone(),
            url: record.url.clone(),
            title: record.title.clone(),
            topic: None,
            updated_at: record.created_at,
        });
        Ok(discussion_id)
    }

    async fn touch_discussion(
        &self,
        discussion_id: &str,
        title: &str,
        topic: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(d) = inner
            .discussions
            .iter_mut()
            .find(|d| d.discussion_id == discussion_id)
        {
            d.updated_at = now;
            if !title.is_empty() {
                d.title = title.to_string();
            }
            if let Some(topic) = topic.filter(|t| !t.is_empty()) {
                d.topic = Some(topic.to_string());
            }
        }
        Ok(())
    }

    async fn unit_status(
        &self,
        kind: UnitKind,
        id: &str,
        discussion_id: &str,
    ) -> Result<UnitStatus> {
        let inner = self.inner.lock().unwrap();
        let key = (discussion_id.to_string(), id.to_string());
        let exists = match kind {
            UnitKind::Comment => inner.comments.contains_key(&key),
            UnitKind::Reply => inner.replies.contains_key(&key),
        };
        Ok(if !exists {
            UnitStatus::Absent
        } else if inner.completed.contains(&(kind, key.0, key.1)) {
            UnitStatus::Complete
        } else {
            UnitStatus::Pending
        })
    }

    async fn mark_unit_complete(
        &self,
        kind: UnitKind,
        id: &str,
        discussion_id: &str,
        _now: DateTime<Utc>,
    ) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .completed
            .insert((kind, discussion_id.to_string(), id.to_string()));
        Ok(())
    }

    async fn upsert_comment(&self, comment: &CommentRecord, _now: DateTime<Utc>) -> Result<()> {
        self.check_unit(&comment.id)?;
        let mut inner = self.inner.lock().unwrap();
        let key = (comment.discussion_id.clone(), comment.id.clone());
        match inner.comments.get_mut(&key) {
            Some(existing) => {
                existing.body = comment.body.clone();
                existing.author = comment.author.clone();
                existing.score = comment.score;
            }
            None => {
                inner.comments.insert(key, comment.clone());
            }
        }
        Ok(())
    }

    async fn upsert_reply(&self, reply: &ReplyRecord, _now: DateTime<Utc>) -> Result<()> {
        self.check_unit(&reply.id)?;
        let mut inner = self.inner.lock().unwrap();
        let key = (reply.discussion_id.clone(), reply.id.clone());
        match inner.replies.get_mut(&key) {
            Some(existing) => {
                existing.body = reply.body.clone();
                existing.author = reply.author.clone();
                existing.score = reply.score;
            }
            None => {
                inner.replies.insert(key, reply.clone());
            }
        }
        Ok(())
    }

    async fn link_comment_stance(
        &self,
        comment_id: &str,
        discussion_id: &str,
        stance: Stance,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        check_once(&mut inner, StoreOp::LinkStance, comment_id)?;
        let key = (discussion_id.to_string(), comment_id.to_string());
        let has_discussion = inner
            .discussions
            .iter()
            .any(|d| d.discussion_id == discussion_id);
        let has_edge = inner
            .stance_edges
            .iter()
            .any(|(d, c, _)| d == discussion_id && c == comment_id);
        if inner.comments.contains_key(&key) && has_discussion && !has_edge {
            inner
                .stance_edges
                .push((key.0, key.1, stance.edge()));
        }
        Ok(())
    }

    async fn link_reply_to(
        &self,
        reply_id: &str,
        parent_comment_id: &str,
        discussion_id: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        check_once(&mut inner, StoreOp::LinkReply, reply_id)?;
        let d = discussion_id.to_string();
        let both_exist = inner.replies.contains_key(&(d.clone(), reply_id.to_string()))
            && inner
                .comments
                .contains_key(&(d.clone(), parent_comment_id.to_string()));
        let has_edge = inner
            .reply_edges
            .iter()
            .any(|(ed, r, _)| *ed == d && r == reply_id);
        if both_exist && !has_edge {
            inner
                .reply_edges
                .push((d, reply_id.to_string(), parent_comment_id.to_string()));
        }
        Ok(())
    }

    async fn merge_argument(&self, arg: &ArgumentRecord, _now: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        check_once(&mut inner, StoreOp::MergeArgument, &arg.text)?;
        let source_key = (arg.discussion_id.clone(), arg.source_id.clone());
        let source_exists = match arg.source_kind {
            UnitKind::Comment => inner.comments.contains_key(&source_key),
            UnitKind::Reply => inner.replies.contains_key(&source_key),
        };
        let source = (arg.source_kind, arg.source_id.clone());

        if let Some(existing) = inner
            .arguments
            .iter_mut()
            .find(|a| a.text == arg.text && a.discussion_id == arg.discussion_id)
        {
            if source_exists && !existing.sources.contains(&source) {
                existing.sources.push(source);
            }
            return Ok(false);
        }

        inner.arguments.push(StoredArgument {
            text: arg.text.clone(),
            discussion_id: arg.discussion_id.clone(),
            stance: arg.stance,
            sources: if source_exists { vec![source] } else { Vec::new() },
        });
        Ok(true)
    }

    async fn argument_texts(&self, discussion_id: &str, stance: Stance) -> Result<Vec<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .arguments
            .iter()
            .filter(|a| a.discussion_id == discussion_id && a.stance == stance)
            .map(|a| a.text.clone())
            .collect())
    }

    async fn replace_groups(
        &self,
        discussion_id: &str,
        stance: Stance,
        epoch: &str,
        plan: &[GroupPlan],
        _now: DateTime<Utc>,
    ) -> Result<GroupWrite> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_group_writes {
            bail!("MockDiscussionStore: group transaction rolled back");
        }

        // Every group of the stance is emptied, so every one is deleted.
        let stale: HashSet<u64> = inner
            .groups
            .iter()
            .filter(|g| g.discussion_id == discussion_id && g.stance == stance)
            .map(|g| g.serial)
            .collect();
        inner.memberships.retain(|(_, _, s)| !stale.contains(s));
        inner.groups.retain(|g| !stale.contains(&g.serial));

        let mut write = GroupWrite::default();
        for group in plan {
            let existing = inner.groups.iter().position(|g| {
                g.summary == group.summary && g.stance == stance && g.discussion_id == discussion_id
            });
            let serial = match existing {
                Some(i) => {
                    inner.groups[i].epoch = epoch.to_string();
                    inner.groups[i].serial
                }
                None => {
                    let serial = inner.next_serial;
                    inner.next_serial += 1;
                    inner.groups.push(StoredGroup {
                        serial,
                        summary: group.summary.clone(),
                        stance,
                        discussion_id: discussion_id.to_string(),
                        epoch: epoch.to_string(),
                    });
                    serial
                }
            };
            for text in &group.members {
                let known = inner.arguments.iter().any(|a| {
                    a.text == *text && a.discussion_id == discussion_id && a.stance == stance
                });
                let grouped = inner
                    .memberships
                    .iter()
                    .any(|(d, t, _)| d == discussion_id && t == text);
                if known && !grouped {
                    inner
                        .memberships
                        .push((discussion_id.to_string(), text.clone(), serial));
                }
            }
            write.groups += 1;
            write.linked += group.members.len() as u32;
        }
        Ok(write)
    }
}

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// Which task a prompt asks for, read from its first line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Topic,
    Stance,
    Extraction,
    Grouping,
    Summary,
    Unknown,
}

impl PromptKind {
    pub fn of(prompt: &str) -> Self {
        let first = prompt.lines().next().unwrap_or_default();
        match first {
            TOPIC_TASK => PromptKind::Topic,
            STANCE_TASK => PromptKind::Stance,
            EXTRACTION_TASK => PromptKind::Extraction,
            GROUPING_TASK => PromptKind::Grouping,
            SUMMARY_TASK => PromptKind::Summary,
            _ => PromptKind::Unknown,
        }
    }
}

type GroupingFn = dyn Fn(Stance, &[String]) -> String + Send + Sync;

/// Canned text generator.
///
/// - topic prompts answer with `with_topic` (default: empty, so callers fall back)
/// - stance prompts answer with the label registered for the text, else NEUTRAL
/// - extraction prompts answer with the bullets registered for the text, else the sentinel
/// - grouping prompts go through `with_grouping` (default: one group per stance)
/// - summary prompts answer with `on_summary` for the stance, else fail
pub struct MockGenerator {
    topic: String,
    stances: HashMap<String, String>,
    extractions: HashMap<String, String>,
    summaries: HashMap<Stance, String>,
    grouping: Box<GroupingFn>,
    extraction_delay: Option<Duration>,
    fail_ping: bool,
    fail_grouping: AtomicBool,
    calls: Mutex<Vec<(PromptKind, String)>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            topic: String::new(),
            stances: HashMap::new(),
            extractions: HashMap::new(),
            summaries: HashMap::new(),
            grouping: Box::new(|stance, arguments| {
                let mut out = format!("GROUP: All {} arguments\n", stance.as_str());
                for a in arguments {
                    out.push_str(&format!("- {a}\n"));
                }
                out
            }),
            extraction_delay: None,
            fail_ping: false,
            fail_grouping: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_topic(mut self, topic: &str) -> Self {
        self.topic = topic.to_string();
        self
    }

    /// Raw stance response for a unit whose body is exactly `text`.
    pub fn on_stance(mut self, text: &str, response: &str) -> Self {
        self.stances.insert(text.to_string(), response.to_string());
        self
    }

    /// Arguments to extract from a unit whose body is exactly `text`.
    pub fn on_extract(mut self, text: &str, arguments: &[&str]) -> Self {
        let response = arguments
            .iter()
            .map(|a| format!("- {a}"))
            .collect::<Vec<_>>()
            .join("\n");
        self.extractions.insert(text.to_string(), response);
        self
    }

    /// Raw extraction response for a unit whose body is exactly `text`.
    pub fn on_extract_raw(mut self, text: &str, response: &str) -> Self {
        self.extractions.insert(text.to_string(), response.to_string());
        self
    }

    pub fn on_summary(mut self, stance: Stance, response: &str) -> Self {
        self.summaries.insert(stance, response.to_string());
        self
    }

    pub fn with_grouping(
        mut self,
        grouping: impl Fn(Stance, &[String]) -> String + Send + Sync + 'static,
    ) -> Self {
        self.grouping = Box::new(grouping);
        self
    }

    /// Stall every extraction call, to exercise timeouts.
    pub fn slow_extraction(mut self, delay: Duration) -> Self {
        self.extraction_delay = Some(delay);
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    /// Toggle grouping failures on a shared instance.
    pub fn set_grouping_fails(&self, fails: bool) {
        self.fail_grouping.store(fails, Ordering::SeqCst);
    }

    // --- Assertion helpers ---

    pub fn calls_of(&self, kind: PromptKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Unit bodies sent for extraction, in call order.
    pub fn extraction_inputs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == PromptKind::Extraction)
            .filter_map(|(_, p)| quoted_text(p).map(str::to_string))
            .collect()
    }

    /// Full prompts of one kind, in call order.
    pub fn prompts_of(&self, kind: PromptKind) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let kind = PromptKind::of(prompt);
        self.calls
            .lock()
            .unwrap()
            .push((kind, prompt.to_string()));

        match kind {
            PromptKind::Topic => Ok(self.topic.clone()),
            PromptKind::Stance => {
                let text = quoted_text(prompt).unwrap_or_default();
                Ok(self
                    .stances
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| "NEUTRAL".to_string()))
            }
            PromptKind::Extraction => {
                if let Some(delay) = self.extraction_delay {
                    tokio::time::sleep(delay).await;
                }
                let text = quoted_text(prompt).unwrap_or_default();
                Ok(self
                    .extractions
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| NO_ARGUMENTS.to_string()))
            }
            PromptKind::Grouping => {
                if self.fail_grouping.load(Ordering::SeqCst) {
                    bail!("MockGenerator: grouping service overloaded");
                }
                let (stance, arguments) = grouping_request(prompt);
                Ok((self.grouping)(stance, &arguments))
            }
            PromptKind::Summary => {
                let stance = Stance::ALL
                    .into_iter()
                    .find(|s| prompt.contains(&format!("Stance: {}\n", s.as_str())))
                    .unwrap_or(Stance::Neutral);
                match self.summaries.get(&stance) {
                    Some(summary) => Ok(summary.clone()),
                    None => bail!("MockGenerator: summarizer unavailable"),
                }
            }
            PromptKind::Unknown => bail!("MockGenerator: unrecognized prompt"),
        }
    }

    async fn ping(&self) -> Result<()> {
        if self.fail_ping {
            bail!("MockGenerator: service unreachable");
        }
        Ok(())
    }
}

/// The unit text in stance and extraction prompts: between the last `Text:\n"` and the final quote.
fn quoted_text(prompt: &str) -> Option<&str> {
    let start = prompt.rfind("Text:\n\"")? + "Text:\n\"".len();
    let end = prompt.rfind('"')?;
    (end >= start).then(|| &prompt[start..end])
}

/// Stance and argument list back out of a grouping prompt.
fn grouping_request(prompt: &str) -> (Stance, Vec<String>) {
    let stance = Stance::ALL
        .into_iter()
        .find(|s| prompt.contains(&format!("made {} the same", s.as_str())))
        .unwrap_or(Stance::Neutral);
    let arguments = prompt
        .split_once("Arguments:\n")
        .map(|(_, list)| {
            list.lines()
                .filter_map(|l| l.strip_prefix("- "))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    (stance, arguments)
}

// ---------------------------------------------------------------------------
// Thread builders
// ---------------------------------------------------------------------------

pub fn post(title: &str, url: &str) -> PostMeta {
    PostMeta {
        title: title.to_string(),
        url: url.to_string(),
        ..Default::default()
    }
}

pub fn comment(id: &str, body: &str) -> SourceComment {
    SourceComment {
        id: Some(id.to_string()),
        author: "alice".to_string(),
        body: body.to_string(),
        score: 1,
        ..Default::default()
    }
}

pub fn reply(id: &str, body: &str) -> SourceReply {
    SourceReply {
        id: Some(id.to_string()),
        author: "bob".to_string(),
        body: body.to_string(),
        score: 1,
        ..Default::default()
    }
}

/// A thread whose comments are already bucketed: `(stance, comment)` in source order.
pub fn classified_thread(
    title: &str,
    url: &str,
    topic: &str,
    comments: Vec<(Stance, SourceComment)>,
) -> ThreadData {
    let mut classified = stancegraph_common::ClassifiedComments::default();
    let mut flat = Vec::new();
    for (stance, mut c) in comments {
        c.stance = Some(stance);
        flat.push(c.clone());
        classified.bucket_mut(stance).push(c);
    }
    ThreadData {
        post: post(title, url),
        comments: flat,
        classified_comments: Some(classified),
        topic: Some(topic.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Mock self-tests
// ---------------------------------------------------------------------------
