//! Null transport for dry runs and tests.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::switcher::{CommandOutput, Runner, Switcher};

/// Runner that succeeds without doing anything.
#[derive(Debug, Default)]
pub struct NullRunner;

#[async_trait]
impl Runner for NullRunner {
    async fn command(&self, _command: &str) -> TransportResult<CommandOutput> {
        Ok(CommandOutput::ok(Vec::new()))
    }
}

/// Switcher whose every operation is a no-op success.
#[derive(Debug, Default)]
pub struct NullSwitcher;

impl NullSwitcher {
    pub fn new() -> Self {
        Self
    }
}

impl fmt::Display for NullSwitcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null://")
    }
}

#[async_trait]
impl Switcher for NullSwitcher {
    async fn switch(&self, _node_addr: &str) -> TransportResult<()> {
        Ok(())
    }

    async fn switch_via(&self, _node_addr: &str) -> TransportResult<()> {
        Ok(())
    }

    fn runner(&self) -> Option<Arc<dyn Runner>> {
        Some(Arc::new(NullRunner))
    }

    fn address(&self) -> Option<String> {
        None
    }
}
