use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::app::{AiSource, Settings};

#[derive(Parser, Debug)]
#[command(name = "ai-log-analyzer")]
#[command(version)]
#[command(about = "Stream AI diagnoses of application error logs", long_about = None)]
pub struct Cli {
    /// Directory holding appsettings.json (defaults to the user config directory)
    #[arg(long, env = "AILOG_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Configuration environment; Production encrypts the API key at rest
    #[arg(long, global = true)]
    pub environment: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze an error log and stream the diagnosis
    Analyze(AnalyzeArgs),
    /// List models offered by the configured provider
    Models,
    /// Inspect or change the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Log file to analyze (reads stdin when neither FILE nor --dir is given)
    #[arg(conflicts_with = "dir")]
    pub file: Option<PathBuf>,

    /// Collect log files from this directory
    #[arg(long, requires = "patterns")]
    pub dir: Option<PathBuf>,

    /// File name fragment to match inside --dir (repeatable)
    #[arg(long = "pattern", value_name = "NAME", requires = "dir")]
    pub patterns: Vec<String>,

    /// Keep asking follow-up questions after the first answer
    #[arg(long)]
    pub chat: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default appsettings.json
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective settings with the API key masked
    Show,
    /// Change settings and save them to the environment file
    Set(SetArgs),
}

#[derive(Args, Debug, Default)]
pub struct SetArgs {
    /// AI source: OpenAiApi or Ollama
    #[arg(long)]
    pub source: Option<String>,

    /// Prompt placed before the log text (empty restores the default)
    #[arg(long)]
    pub prompt: Option<String>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub openai_model: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint
    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub ollama_model: Option<String>,

    /// Ollama server, e.g. http://localhost:11434
    #[arg(long)]
    pub host: Option<String>,
}

impl SetArgs {
    /// Copy every given flag into `settings`; false when no flag was given
    pub fn apply(&self, settings: &mut Settings) -> bool {
        let general = &mut settings.general_settings;
        let mut changed = false;

        if let Some(source) = &self.source {
            general.ai_source = AiSource::from(source.clone());
            changed = true;
        }
        if let Some(prompt) = &self.prompt {
            general.prompt = prompt.clone();
            changed = true;
        }
        if let Some(max_tokens) = self.max_tokens {
            general.max_tokens = max_tokens;
            changed = true;
        }
        if let Some(temperature) = self.temperature {
            general.temperature = temperature;
            changed = true;
        }

        let openai = &mut general.open_ai_settings;
        changed |= set_field(&mut openai.current_model, &self.openai_model);
        changed |= set_field(&mut openai.api_key, &self.api_key);
        changed |= set_field(&mut openai.base_url, &self.base_url);

        let ollama = &mut general.ollama_settings;
        changed |= set_field(&mut ollama.current_model, &self.ollama_model);
        changed |= set_field(&mut ollama.host, &self.host);

        changed
    }
}

fn set_field(slot: &mut Option<String>, value: &Option<String>) -> bool {
    match value {
        Some(value) => {
            *slot = Some(value.clone());
            true
        }
        None => false,
    }
}
