use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// --- Stance ---

/// Position a unit of text takes toward the discussion topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stance {
    For,
    Against,
    Neutral,
}

impl Stance {
    /// Bucket order used everywhere a discussion is walked stance by stance.
    pub const ALL: [Stance; 3] = [Stance::For, Stance::Against, Stance::Neutral];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::For => "FOR",
            Stance::Against => "AGAINST",
            Stance::Neutral => "NEUTRAL",
        }
    }

    /// Lowercase form used when synthesizing fallback ids.
    pub fn slug(&self) -> &'static str {
        match self {
            Stance::For => "for",
            Stance::Against => "against",
            Stance::Neutral => "neutral",
        }
    }

    /// Strict, case-insensitive parse of a stance label.
    pub fn from_label(label: &str) -> Option<Stance> {
        match label.trim().to_ascii_uppercase().as_str() {
            "FOR" => Some(Stance::For),
            "AGAINST" => Some(Stance::Against),
            "NEUTRAL" => Some(Stance::Neutral),
            _ => None,
        }
    }

    /// Edge type linking a unit with this stance to its discussion.
    pub fn edge(&self) -> StanceEdge {
        match self {
            Stance::For => StanceEdge::Supports,
            Stance::Against => StanceEdge::Opposes,
            Stance::Neutral => StanceEdge::Neutral,
        }
    }
}

impl std::fmt::Display for Stance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types from a Comment to its Discussion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StanceEdge {
    Supports,
    Opposes,
    Neutral,
}

impl StanceEdge {
    pub fn as_str(&self) -> &'static str {
        match self {
            StanceEdge::Supports => "SUPPORTS",
            StanceEdge::Opposes => "OPPOSES",
            StanceEdge::Neutral => "NEUTRAL",
        }
    }
}

impl std::fmt::Display for StanceEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two kinds of text unit arguments can be extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    Comment,
    Reply,
}

impl UnitKind {
    pub fn label(&self) -> &'static str {
        match self {
            UnitKind::Comment => "Comment",
            UnitKind::Reply => "Reply",
        }
    }

    pub fn from_label(label: &str) -> Option<UnitKind> {
        match label {
            "Comment" => Some(UnitKind::Comment),
            "Reply" => Some(UnitKind::Reply),
            _ => None,
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// --- Thread input (produced by the scraping collaborator) ---

/// A scraped thread: post metadata plus top-level comments with one level of replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadData {
    pub post: PostMeta,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Vec<SourceComment>,
    /// Stance buckets attached by the thread classifier before ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classified_comments: Option<ClassifiedComments>,
    /// Topic statement the stances were judged against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl ThreadData {
    /// The identified topic, or the post title when none was attached.
    pub fn topic_or_title(&self) -> &str {
        match self.topic.as_deref().map(str::trim) {
            Some(topic) if !topic.is_empty() => topic,
            _ => self.post.title.trim(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostMeta {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub selftext: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subreddit: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub num_comments: i64,
    /// Anything else the scraper attached (upvote_ratio, created_utc, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceComment {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub replies: Vec<SourceReply>,
    #[serde(default, deserialize_with = "lenient_stance", skip_serializing_if = "Option::is_none")]
    pub stance: Option<Stance>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceReply {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: i64,
    #[serde(default, deserialize_with = "lenient_stance", skip_serializing_if = "Option::is_none")]
    pub stance: Option<Stance>,
}

/// Comments bucketed by classified stance, in source order within each bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifiedComments {
    #[serde(rename = "FOR", default, deserialize_with = "null_as_default")]
    pub for_comments: Vec<SourceComment>,
    #[serde(rename = "AGAINST", default, deserialize_with = "null_as_default")]
    pub against_comments: Vec<SourceComment>,
    #[serde(rename = "NEUTRAL", default, deserialize_with = "null_as_default")]
    pub neutral_comments: Vec<SourceComment>,
}

impl ClassifiedComments {
    pub fn bucket(&self, stance: Stance) -> &[SourceComment] {
        match stance {
            Stance::For => &self.for_comments,
            Stance::Against => &self.against_comments,
            Stance::Neutral => &self.neutral_comments,
        }
    }

    pub fn bucket_mut(&mut self, stance: Stance) -> &mut Vec<SourceComment> {
        match stance {
            Stance::For => &mut self.for_comments,
            Stance::Against => &mut self.against_comments,
            Stance::Neutral => &mut self.neutral_comments,
        }
    }

    /// (stance, comments) pairs in FOR, AGAINST, NEUTRAL order.
    pub fn buckets(&self) -> impl Iterator<Item = (Stance, &[SourceComment])> {
        Stance::ALL.into_iter().map(move |s| (s, self.bucket(s)))
    }

    pub fn len(&self) -> usize {
        self.for_comments.len() + self.against_comments.len() + self.neutral_comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Ids arrive as strings, numbers, null, or empty strings. Empty means absent.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let id = match value {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    Ok(if id.is_empty() { None } else { Some(id) })
}

/// Unknown stance labels are treated as untagged rather than rejecting the thread.
fn lenient_stance<'de, D>(deserializer: D) -> Result<Option<Stance>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(Stance::from_label))
}

// --- Graph write records ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionRecord {
    pub discussion_id: String,
    pub url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub id: String,
    pub discussion_id: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub stance: Stance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRecord {
    pub id: String,
    pub discussion_id: String,
    pub parent_comment_id: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub stance: Stance,
}

/// An extracted argument together with the unit it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentRecord {
    pub text: String,
    pub discussion_id: String,
    pub stance: Stance,
    pub source_kind: UnitKind,
    pub source_id: String,
}

/// How far a comment or reply got through ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Absent,
    /// Node written; its edge or arguments may still be missing.
    Pending,
    Complete,
}

/// One argument group of a stance, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    pub summary: String,
    pub members: Vec<String>,
}

/// What one stance's group replacement wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupWrite {
    pub groups: u32,
    pub linked: u32,
}

// --- Ingest output ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodesCreated {
    /// 1 when this ingestion minted the discussion, else 0.
    pub topic: u32,
    pub comments: u32,
    pub replies: u32,
    pub arguments: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub discussion_id: String,
    pub nodes_created: NodesCreated,
    pub new_content_added: bool,
    /// Comments or replies skipped because their writes failed.
    #[serde(default)]
    pub units_failed: u32,
    /// Whether the grouping engine ran for this ingestion.
    #[serde(default)]
    pub regrouped: bool,
}

/// Wire shape returned to callers of `ingest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestResponse {
    Success(IngestReport),
    Error { message: String },
}

impl IngestResponse {
    pub fn error(message: impl Into<String>) -> Self {
        IngestResponse::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, IngestResponse::Success(_))
    }

    pub fn report(&self) -> Option<&IngestReport> {
        match self {
            IngestResponse::Success(report) => Some(report),
            IngestResponse::Error { .. } => None,
        }
    }
}

// --- Read side ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionSummary {
    pub discussion_id: String,
    pub url: String,
    pub title: String,
    pub topic: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A comment or reply with the argument texts extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitView {
    pub id: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub stance: Option<Stance>,
    pub parent_comment_id: Option<String>,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupView {
    pub summary: String,
    pub stance: Stance,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentView {
    pub text: String,
    pub stance: Stance,
    pub source_kind: Option<UnitKind>,
    pub source_id: Option<String>,
    pub group_summary: Option<String>,
}

/// Share of classified comments and replies holding one stance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StanceShare {
    pub stance: Stance,
    pub count: u32,
    pub percentage: f64,
}

/// Counts per stance in FOR, AGAINST, NEUTRAL order. Percentages are 0 when nothing is classified.
pub fn stance_distribution(stances: impl IntoIterator<Item = Stance>) -> Vec<StanceShare> {
    let mut counts = [0u32; 3];
    for stance in stances {
        counts[stance as usize] += 1;
    }
    let total: u32 = counts.iter().sum();
    Stance::ALL
        .into_iter()
        .map(|stance| {
            let count = counts[stance as usize];
            StanceShare {
                stance,
                count,
                percentage: if total == 0 {
                    0.0
                } else {
                    f64::from(count) * 100.0 / f64::from(total)
                },
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StanceSummary {
    pub stance: Stance,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionSnapshot {
    pub discussion: DiscussionSummary,
    /// Comments and replies together.
    pub distribution: Vec<StanceShare>,
    /// Per-stance summaries saved by `show --summarize`; empty until then.
    pub summaries: Vec<StanceSummary>,
    pub comments: Vec<UnitView>,
    pub replies: Vec<UnitView>,
    pub groups: Vec<GroupView>,
    pub arguments: Vec<ArgumentView>,
}
