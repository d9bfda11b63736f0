use std::sync::Arc;

use tracing::{debug, info, warn};

use social_auth_types::{AuthBackend, Authenticated, BackendId, Credentials};

/// Ordered list of backends tried in turn until one authenticates
#[derive(Clone, Default)]
pub struct AuthChain {
    backends: Vec<Arc<dyn AuthBackend>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: Arc<dyn AuthBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn backends(&self) -> &[Arc<dyn AuthBackend>] {
        &self.backends
    }

    /// Look up a configured backend by identifier
    pub fn backend(&self, id: &BackendId) -> Option<Arc<dyn AuthBackend>> {
        self.backends
            .iter()
            .find(|backend| &backend.backend_id() == id)
            .cloned()
    }

    /// Try each backend in order. A backend that fails is treated as having
    /// abstained.
    pub async fn authenticate(&self, credentials: &Credentials) -> Option<Authenticated> {
        for backend in &self.backends {
            let backend_id = backend.backend_id();
            match backend.authenticate(credentials).await {
                Ok(Some(authenticated)) => {
                    info!(
                        "Authenticated {} via {}",
                        authenticated.user.username, backend_id
                    );
                    return Some(authenticated);
                }
                Ok(None) => debug!("Backend {} abstained", backend_id),
                Err(e) => warn!("Backend {} failed: {}", backend_id, e),
            }
        }

        debug!("No backend authenticated the supplied credentials");
        None
    }
}
