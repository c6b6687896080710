//! AMQP message broker client and event message parsing (§4.5, §6)

use crate::config::BrokerConfig;
use crate::error::{AppError, Result};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;

/// An S3-style object-created event, as published to the queue after an
/// upload: `{"Records": [{"s3": {"object": {"key": "<url-encoded key>"}}}]}`.
#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "Records")]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub object: S3Object,
}

#[derive(Debug, Deserialize)]
pub struct S3Object {
    pub key: String,
}

impl EventMessage {
    /// Parse a raw delivery body into the URL-decoded object key it names,
    /// per `Records[0].s3.object.key`. Any malformed payload is a poison
    /// message: the caller should NACK without requeue.
    pub fn object_key_from_bytes(body: &[u8]) -> Result<String> {
        let event: EventMessage = serde_json::from_slice(body)
            .map_err(|e| AppError::Broker(format!("malformed event message: {e}")))?;

        let record = event
            .records
            .first()
            .ok_or_else(|| AppError::Broker("event message has no Records".to_string()))?;

        let decoded = urlencoding::decode(&record.s3.object.key)
            .map_err(|e| AppError::Broker(format!("invalid URL-encoded key: {e}")))?;

        Ok(decoded.into_owned())
    }
}

/// Thin wrapper around a `lapin` connection, following the connect/declare/
/// publish/consume/stop method surface of a typical AMQP client.
pub struct Broker {
    connection: Connection,
}

impl Broker {
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        let connect = Connection::connect(&config.url, ConnectionProperties::default());
        let connection = timeout(Duration::from_secs(config.connect_timeout_secs), connect)
            .await
            .map_err(|_| AppError::Broker("timed out connecting to broker".to_string()))?
            .map_err(|e| AppError::Broker(e.to_string()))?;

        Ok(Self { connection })
    }

    /// Declare the durable exchange and queue, bind them, and set the
    /// consumer prefetch. Messages are published with `delivery_mode=2`
    /// (persistent) so they survive a broker restart.
    pub async fn declare(&self, config: &BrokerConfig) -> Result<Channel> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| AppError::Broker(e.to_string()))?;

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::Broker(e.to_string()))?;

        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::Broker(e.to_string()))?;

        channel
            .queue_bind(
                &config.queue,
                &config.exchange,
                &config.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::Broker(e.to_string()))?;

        channel
            .basic_qos(config.prefetch, Default::default())
            .await
            .map_err(|e| AppError::Broker(e.to_string()))?;

        Ok(channel)
    }

    pub async fn publish(&self, channel: &Channel, config: &BrokerConfig, payload: &[u8]) -> Result<()> {
        channel
            .basic_publish(
                &config.exchange,
                &config.routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| AppError::Broker(e.to_string()))?
            .await
            .map_err(|e| AppError::Broker(e.to_string()))?;
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.connection
            .close(200, "closing")
            .await
            .map_err(|e| AppError::Broker(e.to_string()))?;
        Ok(())
    }
}

pub use lapin::message::Delivery;

/// Manual ack/nack helpers, named to make poison-message handling explicit
/// at call sites.
pub async fn ack(delivery: &Delivery) -> Result<()> {
    delivery
        .ack(BasicAckOptions::default())
        .await
        .map_err(|e| AppError::Broker(e.to_string()))?;
    Ok(())
}

/// NACK without requeue: used for poison messages (unparseable payloads)
/// and for `.pdf`-extension skip-and-ack is handled separately via `ack`.
pub async fn nack_no_requeue(delivery: &Delivery) -> Result<()> {
    delivery
        .nack(BasicNackOptions {
            requeue: false,
            ..Default::default()
        })
        .await
        .map_err(|e| AppError::Broker(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_parsing_decodes_url_encoding() {
        let body = br#"{"Records":[{"s3":{"object":{"key":"uploads%2Fabc%20def.pdf"}}}]}"#;
        let key = EventMessage::object_key_from_bytes(body).unwrap();
        assert_eq!(key, "uploads/abc def.pdf");
    }

    #[test]
    fn test_missing_records_is_an_error() {
        let body = br#"{"Records":[]}"#;
        assert!(EventMessage::object_key_from_bytes(body).is_err());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let body = b"not json";
        assert!(EventMessage::object_key_from_bytes(body).is_err());
    }
}
