use crate::auth::Authenticator;
use crate::ledger::Ledger;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub auth: Arc<Authenticator>,
}

impl AppState {
    pub fn new(ledger: Ledger, auth: Authenticator) -> Self {
        Self {
            ledger,
            auth: Arc::new(auth),
        }
    }
}
