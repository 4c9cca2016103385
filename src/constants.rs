//! Constants module to avoid magic numbers and strings in the codebase

// Environment
pub const ENVIRONMENT_VAR: &str = "AILOG_ENVIRONMENT";
pub const PRODUCTION_ENVIRONMENT: &str = "Production";

// Configuration files
pub const BASE_CONFIG_NAME: &str = "appsettings";
pub const CONFIG_EXTENSION: &str = "json";
pub const APP_DIR_NAME: &str = "ai-log-analyzer";

// Secrets
pub const ENCRYPTION_PREFIX: &str = "ENC:";
pub const KEY_DERIVATION_SALT: &str = "randomness-awaits-you";
pub const NONCE_LEN: usize = 12;
pub const REDACTED_SECRET: &str = "****";

// Network Configuration
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

// Timeouts
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 600; // 10 minutes for slow local models

// Default Model Configuration
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

// Hotkey defaults (consumed by the desktop shell, carried through untouched)
pub const DEFAULT_MODIFIER_KEY_1: &str = "Control";
pub const DEFAULT_MODIFIER_KEY_2: &str = "Shift";
pub const DEFAULT_MAIN_KEY: &str = "L";

// Prompts
pub const ADDITIONAL_MESSAGE_PREFIX: &str = "Additional Message:\n";

pub const DEFAULT_ANALYSIS_PROMPT: &str = "\
You are an experienced software engineer diagnosing a failure from its logs.
Be short and professional. Do not introduce yourself and do not echo the log back,
quote only the lines that matter. Trace the components involved and how data moved
between them. If you are not certain, say so instead of guessing.
When the logs come from a test run, start from the test name and the part of the
system under test, and check whether everything it depends on was in place.

For the first message answer with exactly this markdown template:

WHAT HAPPENED: {what went wrong}
- EXPECTED RESULT: {expected result}
- ACTUAL RESULT: {actual result}
HOW TO FIX IT:
1. **{Step}**: {Description}
2. {More steps in the same format if needed}

Messages starting with `Additional Message:` are follow-up questions; answer them in
plain markdown. Never wrap the whole answer in a code block.
Here is the error log:
";
