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

//! In-memory event bus.
//!
//! Reference adapter implementing both sides of the bus contract against a
//! partitioned in-process log. Partitions are selected by key hash, so
//! per-key ordering matches what a broker provides. Consumer groups track
//! committed offsets; a new session resumes from the last committed offset,
//! which is what makes redelivery of uncommitted messages observable.
//!
//! Delivery failures can be injected per key to exercise the producer's
//! error drain.

use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

use super::{
    BusConsumer, BusMessage, BusRecord, ConsumerEvent, DeliveryReport, PartitionClaim,
    ProducerChannels, PublishFailure,
};
use crate::error::ConsumeError;

#[derive(Debug, Clone)]
struct StoredMessage {
    offset: i64,
    key: String,
    payload: Vec<u8>,
    headers: Vec<(String, String)>,
}

#[derive(Debug)]
struct BusState {
    topic: String,
    partitions: Vec<Mutex<Vec<StoredMessage>>>,
    notify: Notify,
    committed: Mutex<HashMap<(String, i32), i64>>,
    failing_keys: Mutex<HashSet<String>>,
    closed: AtomicBool,
}

impl BusState {
    fn partition_for(&self, key: &str) -> i32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.partitions.len() as u64) as i32
    }
}

/// In-process, partitioned event bus.
#[derive(Clone)]
pub struct InMemoryBus {
    state: Arc<BusState>,
}

impl InMemoryBus {
    /// Creates a bus with one topic and the given partition count.
    pub fn new(topic: &str, partitions: usize) -> Self {
        let partitions = partitions.max(1);
        Self {
            state: Arc::new(BusState {
                topic: topic.to_string(),
                partitions: (0..partitions).map(|_| Mutex::new(Vec::new())).collect(),
                notify: Notify::new(),
                committed: Mutex::new(HashMap::new()),
                failing_keys: Mutex::new(HashSet::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Opens a producer: spawns the client pump and returns its channel
    /// surface. Dropping the input sender flushes and closes the feedback
    /// channels.
    pub fn producer(&self, queue_depth: usize) -> ProducerChannels {
        let (input_tx, mut input_rx) = mpsc::channel::<BusRecord>(queue_depth);
        let (success_tx, success_rx) = mpsc::channel::<DeliveryReport>(queue_depth);
        let (error_tx, error_rx) = mpsc::channel::<PublishFailure>(queue_depth);

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            while let Some(record) = input_rx.recv().await {
                if state.failing_keys.lock().contains(&record.key) {
                    let _ = error_tx
                        .send(PublishFailure {
                            message: "injected broker failure".to_string(),
                            record,
                        })
                        .await;
                    continue;
                }

                let partition = state.partition_for(&record.key);
                let offset = {
                    let mut log = state.partitions[partition as usize].lock();
                    let offset = log.len() as i64;
                    log.push(StoredMessage {
                        offset,
                        key: record.key.clone(),
                        payload: record.payload,
                        headers: record.headers,
                    });
                    offset
                };
                state.notify.notify_waiters();

                let _ = success_tx
                    .send(DeliveryReport {
                        topic: record.topic,
                        partition,
                        offset,
                        key: record.key,
                    })
                    .await;
            }
            // input closed: dropping the feedback senders here closes both
            // streams once every accepted record has been reported
        });

        ProducerChannels {
            input: input_tx,
            successes: success_rx,
            errors: error_rx,
        }
    }

    /// Joins the given consumer group, claiming every partition. The session
    /// resumes from the group's committed offsets.
    pub fn consumer(&self, group: &str) -> MemoryBusConsumer {
        let committed = self.state.committed.lock();
        let cursors = (0..self.state.partitions.len())
            .map(|partition| {
                committed
                    .get(&(group.to_string(), partition as i32))
                    .map(|offset| offset + 1)
                    .unwrap_or(0)
            })
            .collect();
        MemoryBusConsumer {
            state: Arc::clone(&self.state),
            group: group.to_string(),
            cursors,
            assigned: false,
        }
    }

    /// Marks records with this key as permanently failing; the pump routes
    /// them to the error feedback channel.
    pub fn fail_deliveries_for(&self, key: &str) {
        self.state.failing_keys.lock().insert(key.to_string());
    }

    /// Closes the bus; consumers observe [`ConsumeError::Closed`].
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    /// Last committed offset of a group on a partition.
    pub fn committed_offset(&self, group: &str, partition: i32) -> Option<i64> {
        self.state
            .committed
            .lock()
            .get(&(group.to_string(), partition))
            .copied()
    }

    /// Partition a key maps to.
    pub fn partition_for(&self, key: &str) -> i32 {
        self.state.partition_for(key)
    }

    /// Total number of stored messages across partitions.
    pub fn message_count(&self) -> usize {
        self.state
            .partitions
            .iter()
            .map(|partition| partition.lock().len())
            .sum()
    }
}

/// Consumer-group session against an [`InMemoryBus`].
pub struct MemoryBusConsumer {
    state: Arc<BusState>,
    group: String,
    cursors: Vec<i64>,
    assigned: bool,
}

impl MemoryBusConsumer {
    fn try_next(&mut self) -> Option<BusMessage> {
        for (partition, cursor) in self.cursors.iter_mut().enumerate() {
            let log = self.state.partitions[partition].lock();
            if let Some(stored) = log.get(*cursor as usize) {
                *cursor += 1;
                return Some(BusMessage {
                    topic: self.state.topic.clone(),
                    partition: partition as i32,
                    offset: stored.offset,
                    key: stored.key.clone(),
                    payload: stored.payload.clone(),
                    headers: stored.headers.clone(),
                });
            }
        }
        None
    }
}

#[async_trait::async_trait]
impl BusConsumer for MemoryBusConsumer {
    async fn poll(&mut self) -> Result<ConsumerEvent, ConsumeError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(ConsumeError::Closed);
        }

        if !self.assigned {
            self.assigned = true;
            let claims = (0..self.cursors.len())
                .map(|partition| PartitionClaim {
                    topic: self.state.topic.clone(),
                    partition: partition as i32,
                })
                .collect();
            return Ok(ConsumerEvent::Assigned(claims));
        }

        loop {
            let state = Arc::clone(&self.state);
            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.state.closed.load(Ordering::SeqCst) {
                return Err(ConsumeError::Closed);
            }
            if let Some(message) = self.try_next() {
                return Ok(ConsumerEvent::Message(message));
            }
            notified.await;
        }
    }

    async fn commit(&mut self, message: &BusMessage) -> Result<(), ConsumeError> {
        self.state
            .committed
            .lock()
            .insert((self.group.clone(), message.partition), message.offset);
        Ok(())
    }
}
