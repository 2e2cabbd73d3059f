//! Shared application state handed to every route handler.

use broker_kite::KiteBroker;
use core::RuntimeSupervisor;
use model::database::DatabaseFactory;
use std::sync::Arc;

/// Everything a route handler needs: the database, the runtime supervisor
/// (for the auth-callback and administrative routes), the broker client,
/// and the JWT signing secret.
#[derive(Clone)]
pub struct AppState {
    /// Persisted store, shared with the runtime's own subsystems.
    pub database: Arc<dyn DatabaseFactory>,
    /// The running tick->signal->order->fill runtime.
    pub supervisor: Arc<RuntimeSupervisor>,
    /// Synchronous REST facade used directly by the auth-callback route.
    pub broker: Arc<KiteBroker>,
    /// Secret used to sign/verify HS256 JWTs.
    pub jwt_secret: Arc<str>,
    /// Origin the login/signup routes redirect back to, if configured.
    pub frontend_url: Option<Arc<str>>,
}
