/*!
Sink mémoire pour tester la boucle entrante sans fichier de commandes

Les lignes écrites restent lisibles depuis le test via un clone du sink
(l'état est partagé). Pannes injectables : ouverture refusée, écriture
refusée après N lignes.
*/

use async_trait::async_trait;
use nagmq_core::error::SinkError;
use nagmq_core::sink::CommandSink;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct SinkState {
    lines: Vec<String>,
    opened: bool,
    flushes: usize,
    fail_open: bool,
    fail_after: Option<usize>,
    write_attempts: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `open()` échouera
    pub fn failing_open() -> Self {
        let sink = Self::default();
        sink.state.lock().fail_open = true;
        sink
    }

    /// Les `n` premières lignes passent, les suivantes échouent
    pub fn failing_after(n: usize) -> Self {
        let sink = Self::default();
        sink.state.lock().fail_after = Some(n);
        sink
    }

    pub fn lines(&self) -> Vec<String> {
        self.state.lock().lines.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().opened
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }

    /// Appels à `append`, réussis ou non
    pub fn write_attempts(&self) -> usize {
        self.state.lock().write_attempts
    }
}

#[async_trait]
impl CommandSink for MemorySink {
    async fn open(&mut self) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(SinkError::Open {
                path: "memory".into(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "mock open failure"),
            });
        }
        state.opened = true;
        Ok(())
    }

    async fn append(&mut self, line: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if !state.opened {
            return Err(SinkError::NotOpen);
        }
        state.write_attempts += 1;
        if let Some(limit) = state.fail_after {
            if state.lines.len() >= limit {
                return Err(SinkError::Write(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "mock write failure",
                )));
            }
        }
        state.lines.push(line.to_string());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.state.lock().flushes += 1;
        Ok(())
    }
}
