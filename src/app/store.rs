use figment::{
    providers::{Format, Json, Serialized},
    Figment,
};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::config::Settings;
use super::files::FileAccess;
use super::watcher::{ChangeNotifier, ChangeToken};
use crate::constants::{
    BASE_CONFIG_NAME, CONFIG_EXTENSION, ENCRYPTION_PREFIX, ENVIRONMENT_VAR, PRODUCTION_ENVIRONMENT,
};
use crate::crypto::SecretCipher;
use crate::utils::{AnalyzerError, Result};

/// Where the configuration lives and which environment profile applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub config_dir: PathBuf,
    pub environment: String,
}

impl StoreOptions {
    pub fn new(config_dir: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            config_dir: config_dir.into(),
            environment: environment.into(),
        }
    }

    /// Environment taken from `AILOG_ENVIRONMENT`, `Production` when unset
    pub fn from_env(config_dir: impl Into<PathBuf>) -> Self {
        let environment = std::env::var(ENVIRONMENT_VAR)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| PRODUCTION_ENVIRONMENT.to_string());
        Self::new(config_dir, environment)
    }

    /// Secrets are encrypted at rest only in production
    pub fn is_production(&self) -> bool {
        self.environment
            .eq_ignore_ascii_case(PRODUCTION_ENVIRONMENT)
    }

    /// Required `appsettings.json`
    pub fn base_path(&self) -> PathBuf {
        self.config_dir
            .join(format!("{}.{}", BASE_CONFIG_NAME, CONFIG_EXTENSION))
    }

    /// Optional `appsettings.{Environment}.json`, also the target of every save
    pub fn override_path(&self) -> PathBuf {
        self.config_dir.join(format!(
            "{}.{}.{}",
            BASE_CONFIG_NAME, self.environment, CONFIG_EXTENSION
        ))
    }
}

#[derive(Debug, Default)]
struct CacheEntry {
    settings: Option<Arc<Settings>>,
    token: Option<ChangeToken>,
    generation: u64,
}

/// Loads, caches and persists [`Settings`]
///
/// A loaded `Arc<Settings>` is shared and never mutated; edit a clone and
/// pass it to [`ConfigurationStore::save`].
pub struct ConfigurationStore {
    files: Arc<dyn FileAccess>,
    notifier: Arc<dyn ChangeNotifier>,
    cipher: Arc<dyn SecretCipher>,
    options: StoreOptions,
    cache: Mutex<CacheEntry>,
    loading: AtomicBool,
}

impl ConfigurationStore {
    pub fn new(
        files: Arc<dyn FileAccess>,
        notifier: Arc<dyn ChangeNotifier>,
        cipher: Arc<dyn SecretCipher>,
        options: StoreOptions,
    ) -> Self {
        Self {
            files,
            notifier,
            cipher,
            options,
            cache: Mutex::new(CacheEntry::default()),
            loading: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Number of successful reloads so far; bumps whenever a new instance is built
    pub fn generation(&self) -> u64 {
        self.cache.lock().generation
    }

    /// Return the cached settings while they are still valid, otherwise reload.
    ///
    /// A missing base file fails every call. A reload requested while another
    /// is running gets the current cache (or defaults) instead of waiting.
    pub fn load(&self, force_reload: bool) -> Result<Arc<Settings>> {
        let Some(_guard) = LoadGuard::acquire(&self.loading) else {
            debug!("Settings load already in progress, serving cached settings");
            return Ok(self.cache.lock().settings.clone().unwrap_or_default());
        };

        if !force_reload {
            if let Some(cached) = self.cached() {
                debug!("Returning cached settings");
                return Ok(cached);
            }
        }

        match self.reload() {
            Ok((settings, token)) => {
                let settings = Arc::new(settings);
                let mut cache = self.cache.lock();
                cache.settings = Some(Arc::clone(&settings));
                cache.token = Some(token);
                cache.generation += 1;
                Ok(settings)
            }
            Err(e) => {
                error!(error = %e, "Failed to load settings");
                self.invalidate();
                Err(e)
            }
        }
    }

    /// Persist `settings` to the environment override file.
    ///
    /// Write failures are returned untouched. The cache is dropped afterwards so
    /// the next `load` reads what was written.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let path = self.options.override_path();
        debug!(path = %path.display(), "Saving settings");

        let mut settings = settings.clone();
        settings.apply_default_prompt();
        if self.options.is_production() {
            self.encrypt_secret(&mut settings)?;
        }

        let json = serde_json::to_string_pretty(&settings).map_err(|e| {
            AnalyzerError::Configuration(format!("Failed to serialize settings: {}", e))
        })?;

        if let Err(source) = self.files.write(&path, &json) {
            error!(path = %path.display(), error = %source, "Failed to save settings");
            return Err(AnalyzerError::Persistence { path, source });
        }

        self.invalidate();
        info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Write a default base file. Returns false if one exists and `overwrite` is off.
    pub fn initialize(&self, overwrite: bool) -> Result<bool> {
        let path = self.options.base_path();
        if self.files.exists(&path) && !overwrite {
            return Ok(false);
        }

        let mut defaults = Settings::default();
        defaults.apply_default_prompt();
        let json = serde_json::to_string_pretty(&defaults).map_err(|e| {
            AnalyzerError::Configuration(format!("Failed to serialize settings: {}", e))
        })?;
        self.files
            .write(&path, &json)
            .map_err(|source| AnalyzerError::Persistence {
                path: path.clone(),
                source,
            })?;

        self.invalidate();
        info!(path = %path.display(), "Default configuration written");
        Ok(true)
    }

    /// Drop the cached settings; the next `load` rebuilds them
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock();
        cache.settings = None;
        cache.token = None;
    }

    fn cached(&self) -> Option<Arc<Settings>> {
        let cache = self.cache.lock();
        match (&cache.settings, &cache.token) {
            (Some(settings), Some(token)) if !token.has_changed() => Some(Arc::clone(settings)),
            _ => None,
        }
    }

    fn reload(&self) -> Result<(Settings, ChangeToken)> {
        let base_path = self.options.base_path();
        let override_path = self.options.override_path();
        info!(environment = %self.options.environment, "Loading settings");

        if !self.files.exists(&base_path) {
            return Err(AnalyzerError::NotFound(base_path));
        }

        // Registered before reading so an edit racing the read still invalidates
        let token = self
            .notifier
            .watch(&[base_path.clone(), override_path.clone()])
            .unwrap_or_else(|e| {
                warn!(error = %e, "Configuration changes will not be detected");
                ChangeToken::inert()
            });

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Json::string(&self.read(&base_path)?));
        if self.files.exists(&override_path) {
            figment = figment.merge(Json::string(&self.read(&override_path)?));
        }

        let mut settings: Settings = figment.extract().map_err(|e| {
            AnalyzerError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        settings.apply_default_prompt();
        if self.options.is_production() {
            self.decrypt_secret(&mut settings)?;
        }

        info!(settings = %describe(&settings), "Settings loaded");
        Ok((settings, token))
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.files.read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                AnalyzerError::NotFound(path.to_path_buf())
            } else {
                AnalyzerError::Io(e)
            }
        })
    }

    /// Plaintext passes through; unreadable ciphertext clears the field
    fn decrypt_secret(&self, settings: &mut Settings) -> Result<()> {
        let slot = &mut settings.general_settings.open_ai_settings.api_key;
        let Some(ciphertext) = slot
            .as_deref()
            .and_then(|stored| stored.strip_prefix(ENCRYPTION_PREFIX))
            .map(str::to_string)
        else {
            return Ok(());
        };

        match self.cipher.decrypt(&ciphertext) {
            Ok(plaintext) => *slot = Some(plaintext),
            Err(e @ AnalyzerError::MachineIdentity(_)) => return Err(e),
            Err(e) => {
                error!(error = %e, "Failed to decrypt the API key, it has to be entered again");
                *slot = None;
            }
        }
        Ok(())
    }

    /// Already-encrypted values are left alone
    fn encrypt_secret(&self, settings: &mut Settings) -> Result<()> {
        let slot = &mut settings.general_settings.open_ai_settings.api_key;
        let encrypted = match slot.as_deref() {
            None | Some("") => return Ok(()),
            Some(value) if value.starts_with(ENCRYPTION_PREFIX) => return Ok(()),
            Some(value) => format!("{}{}", ENCRYPTION_PREFIX, self.cipher.encrypt(value)?),
        };
        *slot = Some(encrypted);
        Ok(())
    }
}

fn describe(settings: &Settings) -> String {
    serde_json::to_string(&settings.redacted())
        .unwrap_or_else(|_| "<unprintable>".to_string())
}

/// Holds the single reload slot; released on drop
struct LoadGuard<'a>(&'a AtomicBool);

impl<'a> LoadGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoadGuard(flag))
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
