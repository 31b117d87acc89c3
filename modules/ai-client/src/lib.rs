//! Thin chat-completion clients for OpenAI and Anthropic.
//!
//! Both providers implement [`ChatAgent`], so callers can hold either behind
//! one trait object and send plain prompts.

pub mod claude;
mod http;
pub mod openai;
pub mod traits;
pub mod util;

pub use claude::Claude;
pub use openai::OpenAi;
pub use traits::{ChatAgent, Message, MessageRole};
