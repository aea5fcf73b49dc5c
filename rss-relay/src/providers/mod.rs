//! Summarization backends registered in the provider table.

pub mod gemini;
pub mod mock;
pub mod openai;

pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use openai::OpenAiCompatibleProvider;
