use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use ai_client::util::strip_code_blocks;
use stancegraph_common::{DiscussionSnapshot, Stance, StanceSummary};

use crate::prompts::{self, NO_SIGNIFICANT_ARGUMENTS};
use crate::traits::{generate_within, TextGenerator};

/// Condenses what each side of a discussion said into a short bullet summary.
pub struct StanceSummarizer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl StanceSummarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Never fails. No input, a failed call, or an empty answer all yield
    /// the no-arguments sentence.
    pub async fn summarize(&self, topic: &str, stance: Stance, texts: &[String]) -> String {
        let texts: Vec<String> = texts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if texts.is_empty() {
            return NO_SIGNIFICANT_ARGUMENTS.to_string();
        }

        let prompt = prompts::summary_prompt(topic, stance, &texts);
        match generate_within(self.generator.as_ref(), &prompt, self.timeout).await {
            Ok(raw) => {
                let summary = strip_code_blocks(&raw).trim();
                if summary.is_empty() {
                    NO_SIGNIFICANT_ARGUMENTS.to_string()
                } else {
                    debug!(stance = stance.as_str(), inputs = texts.len(), "Stance summarized");
                    summary.to_string()
                }
            }
            Err(e) => {
                warn!(stance = stance.as_str(), error = %format!("{e:#}"), "Summary failed");
                NO_SIGNIFICANT_ARGUMENTS.to_string()
            }
        }
    }

    /// One summary per stance, in FOR, AGAINST, NEUTRAL order, built from the
    /// bodies of the snapshot's comments and replies.
    pub async fn summarize_snapshot(&self, snapshot: &DiscussionSnapshot) -> Vec<StanceSummary> {
        let topic = snapshot
            .discussion
            .topic
            .as_deref()
            .unwrap_or(&snapshot.discussion.title);

        let jobs = Stance::ALL.into_iter().map(|stance| {
            let bodies: Vec<String> = snapshot
                .comments
                .iter()
                .chain(&snapshot.replies)
                .filter(|u| u.stance == Some(stance))
                .map(|u| u.body.clone())
                .collect();
            async move {
                StanceSummary {
                    stance,
                    summary: self.summarize(topic, stance, &bodies).await,
                }
            }
        });
        join_all(jobs).await
    }
}
