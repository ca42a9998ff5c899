//! Answer generation: prompt a completion backend with a tenant's knowledge context and
//! recover the `answer` field from the streamed JSON output.

mod extractor;
mod generator;

pub use extractor::AnswerExtractor;
pub use generator::{build_messages, AnswerGenerator, AnswerRequest, AnswerResult};
