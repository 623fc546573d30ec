//! LLM 层：补全能力抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::{MockLlmClient, RecordedRequest};
pub use openai::OpenAiClient;
pub use traits::{AssistantTurn, LlmClient, LlmError};
