/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Event Bus Ports
//!
//! The pipeline talks to the broker through two narrow surfaces:
//!
//! - **Producer side**: [`ProducerChannels`], the channel surface of an
//!   asynchronous broker client. Records go into `input`; the client reports
//!   every record exactly once on either `successes` or `errors`. Closing
//!   `input` asks the client to flush in-flight records and then close both
//!   feedback channels.
//! - **Consumer side**: [`BusConsumer`], a consumer-group member streaming
//!   [`ConsumerEvent`]s and committing offsets explicitly.
//!
//! Adapter configuration ([`ProducerOptions`], [`ClientConfig`]) is defined
//! here so every adapter honours the same acknowledgement and retry
//! contract. [`memory::InMemoryBus`] is the in-crate reference adapter;
//! broker-backed adapters live outside the core.

pub mod memory;

pub use memory::{InMemoryBus, MemoryBusConsumer};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ConsumeError;

/// Default topic carrying notification events.
pub const DEFAULT_TOPIC: &str = "notifications";

/// A record handed to the producer side of the bus.
#[derive(Debug, Clone)]
pub struct BusRecord {
    pub topic: String,
    /// Partition key; the pipeline keys by `url_id` for per-URL ordering.
    pub key: String,
    pub payload: Vec<u8>,
    /// Header carrier; carries W3C trace context.
    pub headers: Vec<(String, String)>,
}

/// A message received from a claimed partition.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: String,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

/// Confirmation that a record was accepted by the broker.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: String,
}

/// A record the broker client gave up on after its bounded retries.
#[derive(Debug)]
pub struct PublishFailure {
    pub record: BusRecord,
    pub message: String,
}

/// Channel surface of an asynchronous broker producer client.
///
/// The client owns the other ends: it consumes `input`, delivers records,
/// and reports each outcome on `successes` or `errors`. Dropping `input`
/// triggers a flush; once every in-flight record is resolved the client
/// closes both feedback channels.
pub struct ProducerChannels {
    pub input: mpsc::Sender<BusRecord>,
    pub successes: mpsc::Receiver<DeliveryReport>,
    pub errors: mpsc::Receiver<PublishFailure>,
}

/// Acknowledgement level the producer client must request from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredAcks {
    /// No acknowledgement.
    None,
    /// The partition leader only.
    Leader,
    /// All in-sync replicas.
    All,
}

/// Contract every producer adapter must honour.
#[derive(Debug, Clone)]
pub struct ProducerOptions {
    /// Acknowledgement level; at-least-once requires [`RequiredAcks::All`].
    pub acks: RequiredAcks,
    /// Bounded transient-failure retries before a record surfaces on the
    /// error feedback channel.
    pub retries: u32,
    /// Client identifier reported to the broker.
    pub client_id: String,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            acks: RequiredAcks::All,
            retries: 5,
            client_id: "salus-producer".to_string(),
        }
    }
}

/// Connection settings shared by bus adapters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    /// Consumer-group id; unused by producer adapters.
    pub group: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            topic: DEFAULT_TOPIC.to_string(),
            group: "salus-notifications".to_string(),
        }
    }
}

/// Partition assignment within a consumer-group session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionClaim {
    pub topic: String,
    pub partition: i32,
}

/// Events yielded by a consumer-group member.
#[derive(Debug)]
pub enum ConsumerEvent {
    /// A session started and claimed these partitions.
    Assigned(Vec<PartitionClaim>),
    /// A message from one of the claimed partitions.
    Message(BusMessage),
    /// The session ended (rebalance or shutdown).
    Revoked,
}

/// Consumer-group member for a single topic.
///
/// `poll` blocks until the next event; offsets advance only through
/// `commit`, so a message whose processing fails before commit is
/// redelivered to the next session.
#[async_trait]
pub trait BusConsumer: Send {
    async fn poll(&mut self) -> Result<ConsumerEvent, ConsumeError>;

    async fn commit(&mut self, message: &BusMessage) -> Result<(), ConsumeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_options_default_to_full_acknowledgement() {
        let options = ProducerOptions::default();
        assert_eq!(options.acks, RequiredAcks::All);
        assert_eq!(options.retries, 5);
    }

    #[test]
    fn client_config_defaults_to_the_notifications_topic() {
        let config = ClientConfig::default();
        assert_eq!(config.topic, DEFAULT_TOPIC);
        assert!(config.brokers.is_empty());
    }
}
