//! Response observers run by the bridge and the client.
//!
//! # Design
//! Three ordered chains, mirroring the phases of a response:
//! - `response_header`: once the status and headers are known;
//! - `response_data`: for each body chunk; a hook returning `false` is skipped
//!   for the rest of that response (and only that response);
//! - `response_done`: after the response is complete and attached to its
//!   request.
//!
//! Hooks are reference-counted so a client can keep registering new ones
//! (copy-on-write) while earlier requests still hold the old chains.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::http::InboundResponse;

pub type HeaderHook = Arc<dyn Fn(&mut InboundResponse) + Send + Sync>;
pub type DataHook = Arc<dyn Fn(&InboundResponse, &[u8]) -> bool + Send + Sync>;
pub type DoneHook = Arc<dyn Fn(&mut InboundResponse) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    header: Vec<HeaderHook>,
    data: Vec<DataHook>,
    done: Vec<DoneHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("response_header", &self.header.len())
            .field("response_data", &self.data.len())
            .field("response_done", &self.done.len())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_response_header(&mut self, hook: impl Fn(&mut InboundResponse) + Send + Sync + 'static) {
        self.header.push(Arc::new(hook));
    }

    pub fn on_response_data(
        &mut self,
        hook: impl Fn(&InboundResponse, &[u8]) -> bool + Send + Sync + 'static,
    ) {
        self.data.push(Arc::new(hook));
    }

    pub fn on_response_done(&mut self, hook: impl Fn(&mut InboundResponse) + Send + Sync + 'static) {
        self.done.push(Arc::new(hook));
    }

    pub fn run_response_header(&self, response: &mut InboundResponse) {
        for hook in &self.header {
            hook(response);
        }
    }

    /// Start delivering body chunks of one response.
    pub fn data_delivery(&self) -> DataDelivery<'_> {
        DataDelivery {
            hooks: &self.data,
            skipped: vec![false; self.data.len()],
        }
    }

    pub fn run_response_done(&self, response: &mut InboundResponse) {
        for hook in &self.done {
            hook(response);
        }
    }
}

/// Data hook dispatch state for a single response.
pub struct DataDelivery<'a> {
    hooks: &'a [DataHook],
    skipped: Vec<bool>,
}

impl DataDelivery<'_> {
    /// Offer `chunk` to every hook that has not opted out of this response.
    pub fn deliver(&mut self, response: &InboundResponse, chunk: &[u8]) {
        for (index, hook) in self.hooks.iter().enumerate() {
            if self.skipped[index] {
                continue;
            }
            if !hook(response, chunk) {
                trace!(index, "response_data hook opted out");
                self.skipped[index] = true;
            }
        }
    }

    pub fn is_skipped(&self, index: usize) -> bool {
        self.skipped.get(index).copied().unwrap_or(false)
    }
}
