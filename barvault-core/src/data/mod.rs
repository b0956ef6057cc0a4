//! Market-data providers

pub mod provider;
pub mod resample;
pub mod synthetic;
pub mod yahoo;

pub use provider::{BarProvider, DataError, ProviderFactory};
pub use synthetic::{SyntheticFactory, SyntheticProvider};
pub use yahoo::{YahooFactory, YahooProvider};

use crate::config::{ProviderConfig, ProviderKind};
use std::sync::Arc;
use std::time::Duration;

/// Build the provider factory selected by the configuration.
pub fn provider_factory(config: &ProviderConfig) -> Arc<dyn ProviderFactory> {
    match config.kind {
        ProviderKind::Yahoo => Arc::new(YahooFactory {
            timeout: Duration::from_secs(config.timeout_secs),
            aliases: config.aliases.clone(),
        }),
        ProviderKind::Synthetic => Arc::new(SyntheticFactory::default()),
    }
}
