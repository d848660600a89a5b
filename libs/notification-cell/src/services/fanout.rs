// libs/notification-cell/src/services/fanout.rs
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use scheduling_cell::effects::{DispatchError, Effect, EffectDispatcher};

/// Sends the same effects to several dispatchers. One failing target does
/// not stop the others; the first error is reported.
pub struct FanoutDispatcher {
    targets: Vec<Arc<dyn EffectDispatcher>>,
}

impl FanoutDispatcher {
    pub fn new(targets: Vec<Arc<dyn EffectDispatcher>>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl EffectDispatcher for FanoutDispatcher {
    async fn dispatch(&self, effects: &[Effect]) -> Result<(), DispatchError> {
        let results = join_all(self.targets.iter().map(|t| t.dispatch(effects))).await;

        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                warn!("Dispatcher failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
