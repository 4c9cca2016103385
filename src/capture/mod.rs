// Gateway module for capture - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod collector;
mod extractor;

// Public re-exports - the ONLY way to access capture functionality
pub use collector::collect_files;
pub use extractor::extract_text;
