//! Background task that mirrors bus traffic into structured logs.

use tokio::sync::broadcast;

use crate::bus::{EventKind, StudioEvent};

/// Logs every [`StudioEvent`] it receives until the bus is dropped.
pub struct EventLogger;

impl EventLogger {
    pub async fn run(mut receiver: broadcast::Receiver<StudioEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::log(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Event bus closed, logger shutting down");
                    break;
                }
            }
        }
    }

    fn log(event: &StudioEvent) {
        let name = event.name();
        match &event.kind {
            EventKind::JobFailed {
                job_id,
                class,
                message,
            } => {
                tracing::warn!(event = name, job_id = %job_id, class = class.as_str(), %message);
            }
            EventKind::Banner { message } => {
                tracing::warn!(event = name, %message);
            }
            EventKind::QueuePaused { reason } => {
                tracing::info!(event = name, reason = reason.as_str());
            }
            EventKind::ResultDropped { job_id } => {
                tracing::debug!(event = name, job_id = %job_id);
            }
            other => {
                tracing::debug!(event = name, payload = ?other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;

    #[tokio::test]
    async fn exits_when_bus_is_dropped() {
        let bus = EventBus::default();
        let handle = tokio::spawn(EventLogger::run(bus.subscribe()));

        bus.publish(EventKind::QueueStarted);
        drop(bus);

        handle.await.expect("logger task should finish cleanly");
    }
}
