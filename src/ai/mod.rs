mod extractor;
mod provider;

pub use extractor::{ExtractionSettings, TechExtractor};
pub use provider::{CompletionProvider, OpenAiProvider, DEFAULT_OPENAI_BASE_URL};
#[cfg(test)]
pub use provider::CompletionRequest;
