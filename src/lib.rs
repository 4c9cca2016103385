pub mod app;
pub mod backends;
pub mod capture;
pub mod cli;
pub mod constants;
pub mod crypto;
pub mod session;
pub mod utils;

pub use app::{ConfigurationStore, Settings, StoreOptions};
pub use backends::{AnalysisBackend, BackendFactory};
pub use session::{AnalysisSession, ProviderSelector, SessionEvent};
pub use utils::{AnalyzerError, Result};
