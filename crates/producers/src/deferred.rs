//! Deferred producer
//!
//! Forwards every request to a bounded queue. A consumer thread or task
//! drains the queue and completes requests on its own schedule, so frames
//! arrive asynchronously (and possibly late) relative to the tick.

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{ContractError, FrameProducer, FrameRequest};
use tracing::{debug, trace};

use crate::metrics::ProducerMetrics;

/// Create a deferred producer and the queue that receives its requests.
pub fn deferred(capacity: usize) -> (DeferredProducer, RequestQueue) {
    let (tx, rx) = bounded(capacity.max(1));
    let metrics = Arc::new(ProducerMetrics::new());
    (
        DeferredProducer {
            tx,
            metrics: metrics.clone(),
        },
        RequestQueue { rx, metrics },
    )
}

/// Producer side: never blocks the tick
pub struct DeferredProducer {
    tx: Sender<FrameRequest>,
    metrics: Arc<ProducerMetrics>,
}

impl DeferredProducer {
    pub fn metrics(&self) -> &Arc<ProducerMetrics> {
        &self.metrics
    }
}

impl FrameProducer for DeferredProducer {
    fn frame_requested(&self, request: &FrameRequest) -> Result<(), ContractError> {
        self.metrics.record_received();
        match self.tx.try_send(request.clone()) {
            Ok(()) => {
                self.metrics.update_queue_len(self.tx.len());
                trace!(request_id = request.request_id, "Request queued");
                Ok(())
            }
            Err(e) => {
                self.metrics.record_dropped();
                let reason = match e {
                    TrySendError::Full(_) => "request queue full",
                    TrySendError::Closed(_) => "request queue closed",
                };
                debug!(request_id = request.request_id, reason, "Request not queued");
                Err(ContractError::producer(
                    request.source_name().as_str(),
                    request.request_id,
                    reason,
                ))
            }
        }
    }
}

/// Consumer side of a [`DeferredProducer`]
#[derive(Clone)]
pub struct RequestQueue {
    rx: Receiver<FrameRequest>,
    metrics: Arc<ProducerMetrics>,
}

impl RequestQueue {
    /// Wait for the next request. `None` once the producer is gone.
    pub async fn recv(&self) -> Option<FrameRequest> {
        let request = self.rx.recv().await.ok();
        self.metrics.update_queue_len(self.rx.len());
        request
    }

    /// Blocking variant for plain threads.
    pub fn recv_blocking(&self) -> Option<FrameRequest> {
        let request = self.rx.recv_blocking().ok();
        self.metrics.update_queue_len(self.rx.len());
        request
    }

    pub fn try_recv(&self) -> Option<FrameRequest> {
        let request = self.rx.try_recv().ok();
        self.metrics.update_queue_len(self.rx.len());
        request
    }

    /// Record a request answered by the consumer.
    pub fn mark_produced(&self) {
        self.metrics.record_produced();
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn metrics(&self) -> &Arc<ProducerMetrics> {
        &self.metrics
    }
}
