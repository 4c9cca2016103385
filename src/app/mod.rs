// Gateway module for app - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod config;
mod files;
#[cfg(test)]
mod memory;
mod store;
mod watcher;

// Public re-exports - the ONLY way to access app functionality
pub use config::{
    AiSource, GeneralSettings, HotKeySettings, OllamaSettings, OpenAiSettings, Settings,
};
pub use files::{FileAccess, OsFileSystem};
pub use store::{ConfigurationStore, StoreOptions};
pub use watcher::{ChangeNotifier, ChangeToken, ChangeTrigger, NotifyWatcher};

#[cfg(test)]
pub(crate) use memory::MemoryFiles;
