use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use ai_client::util::strip_code_blocks;

use crate::prompts;
use crate::traits::{generate_within, TextGenerator};

/// Phrases what a thread is about so FOR/AGAINST have a clear referent.
pub struct TopicIdentifier {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl TopicIdentifier {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Falls back to the post title when the model fails or answers with nothing.
    pub async fn identify(&self, title: &str, selftext: &str) -> String {
        let prompt = prompts::topic_prompt(title, selftext);
        match generate_within(self.generator.as_ref(), &prompt, self.timeout).await {
            Ok(raw) => {
                let topic = strip_code_blocks(&raw).trim();
                if topic.is_empty() {
                    warn!("Empty topic response, using post title");
                    title.trim().to_string()
                } else {
                    info!(topic, "Identified discussion topic");
                    topic.to_string()
                }
            }
            Err(e) => {
                warn!(error = %e, "Topic identification failed, using post title");
                title.trim().to_string()
            }
        }
    }
}
