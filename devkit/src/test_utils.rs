/*!
Test Harness pour le bridge

Regroupe un `MockBus` et un `MemorySink`, initialise les logs de test et
fournit des attentes actives bornées sur ce qui est écrit ou publié.
*/

use crate::bus_stub::MockBus;
use crate::sink_stub::MemorySink;
use anyhow::Result;
use nagmq_core::envelope::Envelope;
use std::collections::HashMap;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct TestHarness {
    pub bus: MockBus,
    pub sink: MemorySink,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::builder().is_test(true).try_init().ok();

        Self {
            bus: MockBus::new(),
            sink: MemorySink::new(),
        }
    }

    pub fn with_bus(bus: MockBus) -> Self {
        Self {
            bus,
            ..Self::new()
        }
    }

    pub fn with_sink(sink: MemorySink) -> Self {
        Self {
            sink,
            ..Self::new()
        }
    }

    /// Attend que le sink contienne au moins `count` lignes
    pub async fn wait_for_lines(&self, count: usize, timeout_ms: u64) -> Result<Vec<String>> {
        let start = std::time::Instant::now();
        loop {
            let lines = self.sink.lines();
            if lines.len() >= count {
                return Ok(lines);
            }
            if start.elapsed() >= Duration::from_millis(timeout_ms) {
                anyhow::bail!(
                    "timeout waiting for {} lines in sink, got {}: {:?}",
                    count,
                    lines.len(),
                    lines
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Attend qu'au moins `count` enveloppes aient été publiées
    pub async fn wait_for_published(&self, count: usize, timeout_ms: u64) -> Result<Vec<Envelope>> {
        let start = std::time::Instant::now();
        loop {
            let published = self.bus.published();
            if published.len() >= count {
                return Ok(published);
            }
            if start.elapsed() >= Duration::from_millis(timeout_ms) {
                anyhow::bail!(
                    "timeout waiting for {} published envelopes, got {}",
                    count,
                    published.len()
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Attend qu'une souscription soit active sur le bus
    pub async fn wait_for_subscription(&self, timeout_ms: u64) -> Result<()> {
        let start = std::time::Instant::now();
        while self.bus.active_subscriptions() == 0 {
            if start.elapsed() >= Duration::from_millis(timeout_ms) {
                anyhow::bail!("timeout waiting for a bus subscription");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }

    pub fn get_stats(&self) -> TestStats {
        let published = self.bus.published();
        let mut topic_counts = HashMap::new();
        for envelope in &published {
            *topic_counts.entry(envelope.topic.clone()).or_insert(0) += 1;
        }
        TestStats {
            total_published: published.len(),
            total_lines: self.sink.lines().len(),
            topic_counts,
            subscriptions: self.bus.subscriptions(),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub total_published: usize,
    pub total_lines: usize,
    pub topic_counts: HashMap<String, usize>,
    pub subscriptions: Vec<String>,
}
