use crate::config::AppConfig;
use crate::models::PositionChange;
use futures::stream::{BoxStream, StreamExt};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const CHANNEL_CAPACITY: usize = 1024;

/// Subscribes to the location change topic with SASL/SCRAM authentication.
///
/// Change events are forwarded, in arrival order, to the returned stream.
/// The consumer is released when `cancel` fires or the stream is dropped.
pub fn subscribe_changes(
    config: &AppConfig,
    cancel: CancellationToken,
) -> anyhow::Result<BoxStream<'static, PositionChange>> {
    info!("Initializing Kafka consumer for topic: {}", config.kafka_topic);

    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_bootstrap_servers)
        .set("group.id", &config.kafka_group_id)
        .set("auto.offset.reset", &config.kafka_auto_offset_reset)
        // SASL Configuration
        .set("security.protocol", &config.kafka_security_protocol)
        .set("sasl.mechanism", &config.kafka_sasl_mechanism)
        .set("sasl.username", &config.kafka_username)
        .set("sasl.password", &config.kafka_password);

    let consumer: StreamConsumer = client_config.create()?;
    consumer.subscribe(&[&config.kafka_topic])?;
    info!("Subscribed to topic: {}", config.kafka_topic);

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let breaker = CircuitBreaker {
        max_retries: config.kafka_max_retries,
        cooldown: Duration::from_secs(config.kafka_circuit_breaker_cooldown),
    };
    tokio::spawn(pump(consumer, tx, breaker, cancel));

    Ok(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|change| (change, rx))
    })
    .boxed())
}

struct CircuitBreaker {
    max_retries: u32,
    cooldown: Duration,
}

async fn pump(
    consumer: StreamConsumer,
    tx: mpsc::Sender<PositionChange>,
    breaker: CircuitBreaker,
    cancel: CancellationToken,
) {
    let mut consecutive_failures = 0;

    loop {
        // Circuit Breaker Check
        if consecutive_failures >= breaker.max_retries {
            warn!(
                "Circuit breaker tripped ({} consecutive failures)! Sleeping for {} seconds...",
                consecutive_failures,
                breaker.cooldown.as_secs()
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(breaker.cooldown) => {}
            }
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resuming consumption.");
        }

        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tx.closed() => break,
            received = consumer.recv() => received,
        };

        let change = match received {
            Ok(m) => {
                consecutive_failures = 0;

                match m.payload() {
                    None => {
                        warn!("Received empty payload from Kafka");
                        continue;
                    }
                    Some(p) => decode_change(p),
                }
            }
            Err(e) => {
                consecutive_failures += 1;
                error!(
                    "Kafka error: {}. Failure count ({} / {})",
                    e, consecutive_failures, breaker.max_retries
                );

                // Small delay to prevent tight loop in case of minor network glitches
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
        };

        if let Some(change) = change {
            if tx.send(change).await.is_err() {
                break;
            }
        }
    }

    consumer.unsubscribe();
    info!("Kafka location subscription released");
}

/// Parses one change event; malformed payloads are logged and skipped.
pub fn decode_change(payload: &[u8]) -> Option<PositionChange> {
    match serde_json::from_slice(payload) {
        Ok(change) => Some(change),
        Err(e) => {
            warn!("Failed to parse location change: {}", e);
            None
        }
    }
}
