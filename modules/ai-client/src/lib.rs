pub mod error;
pub mod gemini;
pub mod retry;
pub mod schema;
pub mod usage;
pub mod util;

pub use error::{AiError, AiErrorKind, Result};
pub use gemini::{FileHandle, Gemini, Generation, InputPart, ModelInfo};
pub use retry::RetryPolicy;
pub use schema::StructuredOutput;
pub use usage::TokenUsage;
pub use util::{response_preview, strip_code_blocks};
