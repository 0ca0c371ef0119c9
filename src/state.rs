//! Shared state handed to every request handler.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;

use crate::allocator::TicketAllocator;
use crate::config::Config;
use crate::store::Store;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub allocator: TicketAllocator,
    /// Random source for draws and reset tokens. Entropy-seeded here;
    /// tests build the state with a fixed seed instead.
    pub rng: Mutex<StdRng>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            allocator: TicketAllocator::new(),
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }
}
