pub mod classifier;
pub mod classify_thread;
pub mod extractor;
pub mod grouping;
pub mod identity;
pub mod ingest;
pub mod prompts;
pub mod summarizer;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod topic;
pub mod traits;

pub use classifier::StanceClassifier;
pub use classify_thread::ThreadClassifier;
pub use extractor::ArgumentExtractor;
pub use grouping::{GroupingEngine, RegroupStats};
pub use identity::{IdentityResolver, Resolution};
pub use ingest::{IngestError, Ingestor};
pub use summarizer::StanceSummarizer;
pub use topic::TopicIdentifier;
pub use traits::{DiscussionStore, TextGenerator};
