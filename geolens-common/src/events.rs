//! Pipeline event bus
//!
//! Broadcast channel carrying observability events emitted by the inference
//! pipeline. Every absorbed provider error and every fallback substitution is
//! visible here, so operators can distinguish "confidently resolved",
//! "resolved via fallback", and "provider outage" even though the
//! caller-facing contract stays uniform.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pipeline observability events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A new inference request started
    AnalysisStarted {
        request_id: Uuid,
        image_bytes: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A provider call failed and was absorbed at the component boundary
    ProviderError {
        request_id: Uuid,
        provider: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A provider result was substituted with the deterministic fallback
    ProviderFallback {
        request_id: Uuid,
        provider: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Inference completed (always fires, even after total outage)
    AnalysisCompleted {
        request_id: Uuid,
        confidence: f32,
        region_match: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A mapping was explicitly committed to the geo-mapping log
    MappingCommitted {
        mapping_id: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Event bus for pipeline events
///
/// Thin wrapper around a tokio broadcast channel. Cloning shares the
/// underlying channel; sends without subscribers are silently dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event. Lagging or absent subscribers never block the pipeline.
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}
