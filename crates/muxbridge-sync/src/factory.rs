//! Cached construction of protocol clients.
//!
//! A client is cheap, but its in-flight `list` coalescing only helps
//! while callers share one instance, so the factory keeps a single
//! cached client keyed by its full connection parameters. The owner
//! invalidates at configuration-change boundaries.

use std::sync::Arc;

use muxbridge_proto::{CliClient, CliOptions};

#[derive(Default)]
pub struct ClientFactory {
    cached: Option<(CliOptions, Arc<CliClient>)>,
}

impl ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached client when the options match, else a fresh one
    /// (which replaces the cache).
    pub fn client(&mut self, options: CliOptions) -> Arc<CliClient> {
        if let Some((cached_options, client)) = &self.cached
            && *cached_options == options
        {
            return Arc::clone(client);
        }
        let client = Arc::new(CliClient::new(options.clone()));
        self.cached = Some((options, Arc::clone(&client)));
        client
    }

    /// Drop the cache; the next request builds a fresh client.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
