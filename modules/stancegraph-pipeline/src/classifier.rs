use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use stancegraph_common::Stance;

use crate::prompts;
use crate::traits::{generate_within, TextGenerator};

/// Labels a unit of text FOR, AGAINST, or NEUTRAL toward a topic.
/// Never fails: anything it cannot read becomes NEUTRAL.
pub struct StanceClassifier {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl StanceClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn classify(&self, topic: &str, context: &str, text: &str) -> Stance {
        if text.trim().is_empty() {
            return Stance::Neutral;
        }

        let prompt = prompts::stance_prompt(topic, context, text);
        match generate_within(self.generator.as_ref(), &prompt, self.timeout).await {
            Ok(raw) => match parse_label(&raw) {
                Some(stance) => {
                    debug!(stance = stance.as_str(), "Classified stance");
                    stance
                }
                None => {
                    warn!(response = raw.as_str(), "Unrecognized stance label, defaulting to NEUTRAL");
                    Stance::Neutral
                }
            },
            Err(e) => {
                warn!(error = %e, "Stance classification failed, defaulting to NEUTRAL");
                Stance::Neutral
            }
        }
    }
}

/// Read a stance label out of a model response.
///
/// Takes the first non-blank line, drops a `Label:`/`Stance:` prefix, and trims
/// quotes, markdown emphasis, and punctuation before matching.
pub fn parse_label(raw: &str) -> Option<Stance> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;

    let line = match line.split_once(':') {
        Some((prefix, rest)) if is_label_prefix(prefix) => rest,
        _ => line,
    };

    Stance::from_label(line.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
}

fn is_label_prefix(prefix: &str) -> bool {
    let word = prefix.trim_matches(|c: char| !c.is_ascii_alphabetic());
    word.eq_ignore_ascii_case("label") || word.eq_ignore_ascii_case("stance")
}
