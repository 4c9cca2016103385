use std::sync::Arc;
use tracing::info;

use super::analysis::AnalysisSession;
use crate::app::ConfigurationStore;
use crate::backends::BackendFactory;
use crate::utils::Result;

/// Owns the session for the currently configured provider
pub struct ProviderSelector {
    store: Arc<ConfigurationStore>,
    factory: BackendFactory,
    session: AnalysisSession,
}

impl ProviderSelector {
    /// Fails if the configuration cannot be loaded or names an unknown provider
    pub fn new(store: Arc<ConfigurationStore>, factory: BackendFactory) -> Result<Self> {
        let session = build_session(&store, &factory, false)?;
        Ok(Self {
            store,
            factory,
            session,
        })
    }

    pub fn current(&mut self) -> &mut AnalysisSession {
        &mut self.session
    }

    /// Reload settings and start a fresh session.
    ///
    /// The previous history and its subscribers are dropped. On error the
    /// current session is kept.
    pub fn refresh(&mut self) -> Result<()> {
        self.session = build_session(&self.store, &self.factory, true)?;
        info!(
            backend = %self.session.backend_kind(),
            model = self.session.model_name(),
            "Provider refreshed"
        );
        Ok(())
    }

    pub fn store(&self) -> &ConfigurationStore {
        &self.store
    }
}

fn build_session(
    store: &ConfigurationStore,
    factory: &BackendFactory,
    force_reload: bool,
) -> Result<AnalysisSession> {
    let settings = store.load(force_reload)?;
    let backend = factory.create(&settings)?;
    Ok(AnalysisSession::new(backend, &settings.general_settings))
}
