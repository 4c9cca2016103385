// Gateway module for session - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod analysis;
mod history;
mod selector;
mod state;

// Public re-exports - the ONLY way to access session functionality
pub use analysis::AnalysisSession;
pub use history::ChatHistory;
pub use selector::ProviderSelector;
pub use state::{SessionEvent, SessionPhase};
