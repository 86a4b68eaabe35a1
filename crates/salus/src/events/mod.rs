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

//! Event Bus Bridge
//!
//! The at-least-once bridge between the probe side and the notification
//! side: an asynchronous buffered [`EventProducer`] publishing transition
//! events keyed by URL, and a consumer-group-driven [`EventConsumer`]
//! landing them in the outbox before committing offsets.

pub mod consumer;
pub mod producer;

pub use consumer::{EventConsumer, EventConsumerConfig};
pub use producer::{EventProducer, ProducerConfig};
