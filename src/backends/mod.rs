// Gateway module for backends - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod factory;
mod ollama;
mod openai;
mod stream;
#[cfg(test)]
mod test_support;
mod traits;
mod types;

// Public re-exports - the ONLY way to access backend functionality
pub use factory::BackendFactory;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use traits::AnalysisBackend;
pub use types::{BackendKind, ChatTurn, CompletionOptions, FragmentStream, Role};

#[cfg(test)]
pub(crate) use test_support::{Script, ScriptedBackend};
