//! Prompt builders for every text-generation task.
//!
//! Each prompt opens with its task line, so a reader of the raw request (or a
//! test double) can tell the tasks apart from the first line alone.

use ai_client::util::truncate_to_char_boundary;
use stancegraph_common::Stance;

pub const TOPIC_TASK: &str = "TASK: identify the discussion topic.";
pub const STANCE_TASK: &str = "TASK: classify stance.";
pub const EXTRACTION_TASK: &str = "TASK: extract arguments.";
pub const GROUPING_TASK: &str = "TASK: group equivalent arguments.";
pub const SUMMARY_TASK: &str = "TASK: summarize stance.";

/// What the extraction model answers when a text makes no argument.
pub const NO_ARGUMENTS: &str = "NO ARGUMENTS";

/// Stored in place of a summary when a stance has nothing to summarize.
pub const NO_SIGNIFICANT_ARGUMENTS: &str = "No significant arguments found.";

/// Upper bound on any single piece of user content placed in a prompt.
const MAX_FIELD_BYTES: usize = 6_000;

fn clip(text: &str) -> &str {
    truncate_to_char_boundary(text.trim(), MAX_FIELD_BYTES)
}

pub fn topic_prompt(title: &str, selftext: &str) -> String {
    format!(
        r#"{TOPIC_TASK}
This is the header of a social media discussion thread. Identify the main topic
being discussed, phrased so that a reader knows what being FOR or AGAINST it means.
Answer with one or two short sentences and nothing else.

Title: "{title}"
Post: "{body}""#,
        title = clip(title),
        body = clip(selftext),
    )
}

/// `context` is the post (and for replies, the parent comment) the text responds to.
pub fn stance_prompt(topic: &str, context: &str, text: &str) -> String {
    format!(
        r#"{STANCE_TASK}
You are trained in stance detection. Classify the stance of the text toward the
discussion topic, using the surrounding thread as context. The text may contain
sarcasm or irony. Return ONLY ONE of these labels, with no explanation:
FOR
AGAINST
NEUTRAL

Discussion topic: "{topic}"

Thread context:
{context}

Text:
"{text}"

Label:"#,
        topic = clip(topic),
        context = clip(context),
        text = clip(text),
    )
}

pub fn extraction_prompt(topic: &str, text: &str) -> String {
    format!(
        r#"{EXTRACTION_TASK}
List the distinct arguments the text below makes about the discussion topic.
Write each argument as one self-contained sentence on its own line, starting
with "- ". Do not add commentary. If the text makes no argument, answer exactly
{NO_ARGUMENTS}

Discussion topic: "{topic}"

Text:
"{text}""#,
        topic = clip(topic),
        text = clip(text),
    )
}

pub fn grouping_prompt(stance: Stance, arguments: &[String]) -> String {
    let listing: String = arguments
        .iter()
        .map(|a| format!("- {}\n", clip(a)))
        .collect();
    format!(
        r#"{GROUPING_TASK}
The arguments below were all made {stance} the same discussion topic. Partition
them into groups that share the same core claim. Every argument belongs to
exactly one group. For each group write a header line

GROUP: <one-sentence summary of the shared claim>

followed by its member arguments, one per line, each starting with "- " and
copied verbatim from the list.

Arguments:
{listing}"#,
        stance = stance.as_str(),
    )
}

/// One line per comment or reply; `texts` all share `stance`.
pub fn summary_prompt(topic: &str, stance: Stance, texts: &[String]) -> String {
    let listing: String = texts
        .iter()
        .map(|t| format!("- {}\n", clip(t).replace('\n', " ")))
        .collect();
    format!(
        r#"{SUMMARY_TASK}
You are an expert at synthesizing online discussions. The comments below all
take the same stance toward the discussion topic. Summarize their key points
as a few concise bullet points, each starting with "- ".

Discussion topic: "{topic}"
Stance: {stance}

Comments:
{listing}"#,
        topic = clip(topic),
        stance = stance.as_str(),
    )
}
