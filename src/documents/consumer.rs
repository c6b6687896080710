//! At-least-once object-store event consumer (§4.5)
//!
//! Consumes `.pdf` upload events from the broker with manual ack/nack and
//! prefetch=1: exactly one delivery is being processed per channel at a
//! time, and every delivery is either acked (processed, or deliberately
//! skipped) or nacked without requeue (poison message).

use crate::broker::{ack, nack_no_requeue, Broker, EventMessage};
use crate::config::BrokerConfig;
use crate::documents::pipeline::DocumentPipeline;
use crate::error::Result;
use futures::StreamExt;
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use std::sync::Arc;
use tracing::{info, warn};

/// Consumes document-upload events and drives them through the ingestion
/// pipeline, one at a time, per the declared prefetch of 1.
pub struct EventConsumer {
    broker: Broker,
    config: BrokerConfig,
    pipeline: Arc<DocumentPipeline>,
}

impl EventConsumer {
    pub fn new(broker: Broker, config: BrokerConfig, pipeline: Arc<DocumentPipeline>) -> Self {
        Self {
            broker,
            config,
            pipeline,
        }
    }

    /// Run the consume loop until a shutdown signal is observed (SIGINT via
    /// `tokio::signal::ctrl_c`) or the channel closes.
    pub async fn run(&self) -> Result<()> {
        let channel = self.broker.declare(&self.config).await?;

        let mut consumer = channel
            .basic_consume(
                &self.config.queue,
                "rag-backend-ingestion",
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| crate::error::AppError::Broker(e.to_string()))?;

        let mut shutdown = Box::pin(tokio::signal::ctrl_c());

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("received shutdown signal, stopping consumer");
                    break;
                }
                delivery = consumer.next() => {
                    match delivery {
                        Some(Ok(delivery)) => {
                            self.handle_delivery(&delivery.data, &delivery).await;
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "error receiving delivery");
                        }
                        None => break,
                    }
                }
            }
        }

        self.broker.close().await
    }

    async fn handle_delivery(&self, body: &[u8], delivery: &lapin::message::Delivery) {
        let object_key = match EventMessage::object_key_from_bytes(body) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "poison message: malformed event payload, nacking without requeue");
                let _ = nack_no_requeue(delivery).await;
                return;
            }
        };

        if !object_key.to_lowercase().ends_with(".pdf") {
            info!(object_key, "skipping non-pdf object");
            let _ = ack(delivery).await;
            return;
        }

        let filename = object_key
            .rsplit('/')
            .next()
            .unwrap_or(&object_key)
            .to_string();

        match self.pipeline.process(&object_key, &filename, None).await {
            Ok(document_id) => {
                info!(document_id, object_key, "document processed");
                let _ = ack(delivery).await;
            }
            Err(e) => {
                warn!(error = %e, object_key, "document processing failed, nacking without requeue");
                let _ = nack_no_requeue(delivery).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::broker::EventMessage;

    #[test]
    fn test_pdf_extension_detection() {
        assert!("uploads/report.PDF".to_lowercase().ends_with(".pdf"));
        assert!(!"uploads/report.txt".to_lowercase().ends_with(".pdf"));
    }

    #[test]
    fn test_filename_extracted_from_key() {
        let key = "uploads/abcd-1234.pdf";
        let filename = key.rsplit('/').next().unwrap_or(key);
        assert_eq!(filename, "abcd-1234.pdf");
    }

    #[test]
    fn test_poison_message_detected() {
        let body = b"{ not valid json";
        assert!(EventMessage::object_key_from_bytes(body).is_err());
    }
}
