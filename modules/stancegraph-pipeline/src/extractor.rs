use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use ai_client::util::strip_code_blocks;

use crate::prompts::{self, NO_ARGUMENTS};
use crate::traits::{generate_within, TextGenerator};

/// Leading list markers: "1.", "2)", "-", "*", "•".
static RE_LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+").unwrap());

/// Turns a comment or reply into a list of self-contained argument sentences.
pub struct ArgumentExtractor {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl ArgumentExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Ordered, de-duplicated arguments. Empty on generation failure.
    pub async fn extract(&self, text: &str, topic: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let prompt = prompts::extraction_prompt(topic, text);
        match generate_within(self.generator.as_ref(), &prompt, self.timeout).await {
            Ok(raw) => {
                let arguments = parse_arguments(&raw);
                debug!(count = arguments.len(), "Extracted arguments");
                arguments
            }
            Err(e) => {
                warn!(error = %e, "Argument extraction failed, treating text as argument-free");
                Vec::new()
            }
        }
    }
}

/// Parse a line-per-argument response. Never fails; unreadable output yields nothing.
pub fn parse_arguments(raw: &str) -> Vec<String> {
    let body = strip_code_blocks(raw);
    if is_no_arguments(body) {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for line in body.lines() {
        let line = RE_LIST_MARKER.replace(line, "");
        let line = line.trim();
        if line.is_empty() || is_no_arguments(line) {
            continue;
        }
        if seen.insert(line.to_string()) {
            out.push(line.to_string());
        }
    }
    out
}

/// The sentinel, in any case, optionally followed by punctuation.
fn is_no_arguments(text: &str) -> bool {
    text.trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .eq_ignore_ascii_case(NO_ARGUMENTS)
}
