use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ai_client::util::strip_code_blocks;
use stancegraph_common::{GroupPlan, GroupWrite, Stance};

use crate::prompts;
use crate::traits::{generate_within, DiscussionStore, TextGenerator};

/// "GROUP: summary", "Group 2 - summary", "### **GROUP 1:** summary", ...
static RE_GROUP_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:#+\s*)?(?:\*\*)?\s*group(?:\s*\d+)?\s*(?:\*\*)?\s*[:\-–]\s*(?:\*\*)?\s*(.*?)\s*(?:\*\*)?\s*$")
        .unwrap()
});

static RE_MEMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+?)\s*$").unwrap());

/// A group as the model wrote it, before matching against stored arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedGroup {
    pub summary: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegroupStats {
    pub stances_grouped: u32,
    /// Stances whose previous groups were kept because grouping or writing failed.
    pub stances_failed: u32,
    pub groups_created: u32,
    pub arguments_linked: u32,
}

/// Recomputes a discussion's argument groups, one stance at a time.
pub struct GroupingEngine {
    store: Arc<dyn DiscussionStore>,
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl GroupingEngine {
    pub fn new(
        store: Arc<dyn DiscussionStore>,
        generator: Arc<dyn TextGenerator>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            generator,
            timeout,
        }
    }

    /// Full recompute for FOR, AGAINST, and NEUTRAL. A stance that fails keeps its
    /// previous groups and does not stop the others.
    pub async fn regroup(&self, discussion_id: &str) -> RegroupStats {
        let epoch = Uuid::new_v4().to_string();
        let mut stats = RegroupStats::default();

        for stance in Stance::ALL {
            match self.regroup_stance(discussion_id, stance, &epoch).await {
                Ok(write) => {
                    stats.stances_grouped += 1;
                    stats.groups_created += write.groups;
                    stats.arguments_linked += write.linked;
                }
                Err(e) => {
                    warn!(
                        discussion_id,
                        stance = stance.as_str(),
                        error = %format!("{e:#}"),
                        "Regroup failed, previous groups kept"
                    );
                    stats.stances_failed += 1;
                }
            }
        }

        info!(
            discussion_id,
            epoch = epoch.as_str(),
            groups = stats.groups_created,
            arguments = stats.arguments_linked,
            failed = stats.stances_failed,
            "Regroup complete"
        );
        stats
    }

    async fn regroup_stance(
        &self,
        discussion_id: &str,
        stance: Stance,
        epoch: &str,
    ) -> Result<GroupWrite> {
        let texts = self.store.argument_texts(discussion_id, stance).await?;
        if texts.is_empty() {
            debug!(discussion_id, stance = stance.as_str(), "No arguments, clearing stale groups");
            return self
                .store
                .replace_groups(discussion_id, stance, epoch, &[], Utc::now())
                .await;
        }

        let prompt = prompts::grouping_prompt(stance, &texts);
        let raw = generate_within(self.generator.as_ref(), &prompt, self.timeout)
            .await
            .context("grouping request failed")?;
        let plan = plan_groups(&texts, parse_groups(&raw));

        let write = self
            .store
            .replace_groups(discussion_id, stance, epoch, &plan, Utc::now())
            .await
            .context("group write failed")?;

        debug!(
            discussion_id,
            stance = stance.as_str(),
            groups = write.groups,
            linked = write.linked,
            "Stance regrouped"
        );
        Ok(write)
    }
}

/// Read `GROUP:` headers and bulleted members. Lines outside a group are ignored.
pub fn parse_groups(raw: &str) -> Vec<ParsedGroup> {
    let mut groups: Vec<ParsedGroup> = Vec::new();

    for line in strip_code_blocks(raw).lines() {
        if let Some(caps) = RE_GROUP_MARKER.captures(line) {
            groups.push(ParsedGroup {
                summary: caps[1].trim().to_string(),
                members: Vec::new(),
            });
            continue;
        }
        let Some(current) = groups.last_mut() else {
            continue;
        };
        if let Some(caps) = RE_MEMBER.captures(line) {
            current.members.push(caps[1].to_string());
        }
    }
    groups
}

/// Reconcile the model's partition with the stored arguments.
///
/// Members are matched by exact text (ignoring surrounding quotes); unknown
/// members are dropped. The first group to claim a text keeps it. Groups with
/// the same summary are merged, a group without a summary is named after its
/// first member, and arguments the model left out become singleton groups
/// named after themselves.
pub fn plan_groups(texts: &[String], parsed: Vec<ParsedGroup>) -> Vec<GroupPlan> {
    let known: HashSet<&str> = texts.iter().map(String::as_str).collect();
    let mut assigned: HashSet<String> = HashSet::new();
    let mut plan: Vec<GroupPlan> = Vec::new();
    let mut by_summary: HashMap<String, usize> = HashMap::new();

    let mut add = |plan: &mut Vec<GroupPlan>, summary: String, members: Vec<String>| {
        match by_summary.get(&summary) {
            Some(&i) => plan[i].members.extend(members),
            None => {
                by_summary.insert(summary.clone(), plan.len());
                plan.push(GroupPlan { summary, members });
            }
        }
    };

    for group in parsed {
        let members: Vec<String> = group
            .members
            .iter()
            .filter_map(|m| resolve_member(m, &known))
            .filter(|m| assigned.insert(m.to_string()))
            .map(str::to_string)
            .collect();
        if members.is_empty() {
            continue;
        }
        let summary = if group.summary.is_empty() {
            members[0].clone()
        } else {
            group.summary
        };
        add(&mut plan, summary, members);
    }

    for text in texts {
        if assigned.insert(text.clone()) {
            add(&mut plan, text.clone(), vec![text.clone()]);
        }
    }
    plan
}

fn resolve_member<'a>(member: &str, known: &HashSet<&'a str>) -> Option<&'a str> {
    let candidates = [member.trim(), member.trim().trim_matches('"').trim()];
    candidates
        .into_iter()
        .find_map(|c| known.get(c).copied())
}
