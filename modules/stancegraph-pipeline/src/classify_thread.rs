use futures::stream::{self, StreamExt};
use tracing::info;

use stancegraph_common::{ClassifiedComments, SourceComment, Stance, ThreadData};

use crate::classifier::StanceClassifier;

/// Applies the stance classifier to a raw thread and buckets its comments.
pub struct ThreadClassifier {
    classifier: StanceClassifier,
    concurrency: usize,
    max_comments: usize,
}

impl ThreadClassifier {
    /// `max_comments` keeps the highest-scoring top-level comments; 0 keeps all.
    pub fn new(classifier: StanceClassifier, concurrency: usize, max_comments: usize) -> Self {
        Self {
            classifier,
            concurrency: concurrency.max(1),
            max_comments,
        }
    }

    /// Fill `classified_comments` and tag every reply with a stance.
    ///
    /// A thread that is already classified is returned unchanged. Stances the
    /// scraper already attached are kept and not sent to the model.
    pub async fn classify_thread(&self, mut thread: ThreadData, topic: &str) -> ThreadData {
        if thread.classified_comments.is_some() {
            return thread;
        }

        let comments = select_comments(std::mem::take(&mut thread.comments), self.max_comments);
        let post_context = format!(
            "Title: \"{}\"\nPost content: \"{}\"",
            thread.post.title.trim(),
            thread.post.selftext.trim()
        );

        let comment_stances: Vec<Stance> = stream::iter(comments.iter().map(|c| {
            let context = post_context.as_str();
            async move {
                match c.stance {
                    Some(stance) => stance,
                    None => self.classifier.classify(topic, context, &c.body).await,
                }
            }
        }))
        .buffered(self.concurrency)
        .collect()
        .await;

        let reply_contexts: Vec<String> = comments
            .iter()
            .map(|c| format!("{post_context}\nParent comment: \"{}\"", c.body.trim()))
            .collect();
        let reply_jobs: Vec<(usize, usize)> = comments
            .iter()
            .enumerate()
            .flat_map(|(ci, c)| (0..c.replies.len()).map(move |ri| (ci, ri)))
            .collect();

        let reply_stances: Vec<(usize, usize, Stance)> =
            stream::iter(reply_jobs.into_iter().map(|(ci, ri)| {
                let reply = &comments[ci].replies[ri];
                let context = reply_contexts[ci].as_str();
                async move {
                    let stance = match reply.stance {
                        Some(stance) => stance,
                        None => self.classifier.classify(topic, context, &reply.body).await,
                    };
                    (ci, ri, stance)
                }
            }))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut comments = comments;
        for (ci, ri, stance) in reply_stances {
            comments[ci].replies[ri].stance = Some(stance);
        }

        let mut classified = ClassifiedComments::default();
        for (mut comment, stance) in comments.iter().cloned().zip(comment_stances) {
            comment.stance = Some(stance);
            classified.bucket_mut(stance).push(comment);
        }

        info!(
            for_count = classified.for_comments.len(),
            against_count = classified.against_comments.len(),
            neutral_count = classified.neutral_comments.len(),
            "Thread classified"
        );

        thread.comments = comments;
        thread.classified_comments = Some(classified);
        thread.topic.get_or_insert_with(|| topic.to_string());
        thread
    }
}

/// Highest score first, ties in source order.
fn select_comments(mut comments: Vec<SourceComment>, max_comments: usize) -> Vec<SourceComment> {
    if max_comments == 0 || comments.len() <= max_comments {
        return comments;
    }
    comments.sort_by(|a, b| b.score.cmp(&a.score));
    comments.truncate(max_comments);
    comments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str, score: i64) -> SourceComment {
        SourceComment {
            id: Some(id.to_string()),
            score,
            ..Default::default()
        }
    }

    #[test]
    fn zero_keeps_every_comment_in_order() {
        let picked = select_comments(vec![comment("a", 1), comment("b", 9)], 0);
        let ids: Vec<_> = picked.iter().map(|c| c.id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn cap_keeps_top_scores_with_stable_ties() {
        let picked = select_comments(
            vec![comment("a", 1), comment("b", 9), comment("c", 5), comment("d", 5)],
            3,
        );
        let ids: Vec<_> = picked.iter().map(|c| c.id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }
}
