//! Best-effort milestone reporting.
//!
//! Events are queued on an unbounded channel and posted by a single worker
//! task, one attempt each. Nothing here can fail or block the caller.

use std::time::Duration;

use serde::Serialize;
use sliver_core::{EventKind, EventSink, Milestone};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::TrackingConfig;

#[derive(Debug, Clone, Serialize)]
struct TrackRequest {
    device_id: String,
    book_title: String,
    event_type: EventKind,
}

pub struct Tracker {
    device_id: String,
    tx: Option<mpsc::UnboundedSender<TrackRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl Tracker {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(config: &TrackingConfig, device_id: &str) -> Self {
        let Some(endpoint) = config.endpoint.clone() else {
            return Self::disabled(device_id);
        };
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("tracking disabled, HTTP client unavailable: {e}");
                return Self::disabled(device_id);
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(client, endpoint, rx));
        Self {
            device_id: device_id.to_string(),
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    pub fn disabled(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            tx: None,
            worker: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue one event. Never blocks, never fails.
    pub fn report(&self, book_title: &str, kind: EventKind) {
        let Some(tx) = &self.tx else {
            tracing::debug!("tracking disabled, dropping {kind}");
            return;
        };
        let req = TrackRequest {
            device_id: self.device_id.clone(),
            book_title: book_title.to_string(),
            event_type: kind,
        };
        if tx.send(req).is_err() {
            tracing::debug!("tracking worker gone, dropping {kind}");
        }
    }

    /// Close the queue and give in-flight reports up to `grace` to finish.
    pub async fn shutdown(mut self, grace: Duration) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take()
            && tokio::time::timeout(grace, worker).await.is_err()
        {
            tracing::warn!("tracking worker did not finish within {grace:?}; abandoning queue");
        }
    }
}

impl EventSink for Tracker {
    fn emit(&self, milestone: &Milestone) {
        self.report(&milestone.book_title, milestone.kind);
    }
}

async fn run_worker(
    client: reqwest::Client,
    endpoint: String,
    mut rx: mpsc::UnboundedReceiver<TrackRequest>,
) {
    while let Some(req) = rx.recv().await {
        send_once(&client, &endpoint, &req).await;
    }
}

async fn send_once(client: &reqwest::Client, endpoint: &str, req: &TrackRequest) -> bool {
    match client.post(endpoint).json(req).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!("tracked {} for '{}'", req.event_type, req.book_title);
            true
        }
        Ok(resp) => {
            tracing::warn!("tracking failed: {}", resp.status());
            false
        }
        Err(e) => {
            tracing::warn!("tracking error: {e}");
            false
        }
    }
}
