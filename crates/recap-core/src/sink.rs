use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::event::DeltaEvent;

/// Where a stream session delivers its updates
#[async_trait]
pub trait DeltaSink: Send + Sync {
    /// Deliver one event. Returns `false` once nobody is listening anymore.
    async fn deliver(&self, event: DeltaEvent) -> bool;
}

#[async_trait]
impl DeltaSink for mpsc::Sender<DeltaEvent> {
    async fn deliver(&self, event: DeltaEvent) -> bool {
        self.send(event).await.is_ok()
    }
}

#[async_trait]
impl DeltaSink for mpsc::UnboundedSender<DeltaEvent> {
    async fn deliver(&self, event: DeltaEvent) -> bool {
        self.send(event).is_ok()
    }
}
