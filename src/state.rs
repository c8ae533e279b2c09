use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Cancelled on shutdown; every request works under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_shutdown(dispatcher, CancellationToken::new())
    }

    pub fn with_shutdown(dispatcher: Dispatcher, shutdown: CancellationToken) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            shutdown,
        }
    }
}
