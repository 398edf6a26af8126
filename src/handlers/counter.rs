use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::connection::{Handler, Server, Session};
use crate::message::{CloseCode, MessageType};

/// Spawns several tasks per connection that each count down and send
/// `"<task>: <count>"` as text. The last task to finish closes the
/// connection with status 1000. Inbound messages are ignored.
#[derive(Debug, Clone, Copy)]
pub struct CounterHandler {
    tasks: usize,
    count: usize,
}

impl Default for CounterHandler {
    fn default() -> Self {
        Self {
            tasks: 10,
            count: 1000,
        }
    }
}

impl CounterHandler {
    /// `tasks` senders, each counting down from `count`.
    #[must_use]
    pub const fn new(tasks: usize, count: usize) -> Self {
        Self { tasks, count }
    }
}

struct Progress {
    active: AtomicUsize,
    stopping: AtomicBool,
}

struct CounterSession {
    progress: Arc<Progress>,
    workers: Vec<JoinHandle<()>>,
}

#[async_trait]
impl Handler for CounterHandler {
    async fn on_connect(&self, server: &Server) -> Option<Box<dyn Session>> {
        let progress = Arc::new(Progress {
            active: AtomicUsize::new(self.tasks),
            stopping: AtomicBool::new(false),
        });

        let workers = (0..self.tasks)
            .map(|index| {
                let server = server.clone();
                let progress = Arc::clone(&progress);
                let count = self.count;
                tokio::spawn(async move { count_down(server, progress, index, count).await })
            })
            .collect();

        Some(Box::new(CounterSession { progress, workers }))
    }
}

async fn count_down(server: Server, progress: Arc<Progress>, index: usize, mut count: usize) {
    while count > 0 && !progress.stopping.load(Ordering::Acquire) {
        let line = format!("{index}: {count}");
        server.send(MessageType::Text, line.as_bytes()).await;
        count -= 1;
    }

    if progress.active.fetch_sub(1, Ordering::AcqRel) == 1 {
        tracing::debug!(task = index, "last counter finished; closing");
        let _ = server.close_with(CloseCode::Normal, "").await;
    }
}

#[async_trait]
impl Session for CounterSession {
    async fn on_message(&mut self, _server: &Server, _kind: MessageType, payload: &[u8]) -> usize {
        payload.len()
    }

    async fn on_disconnect(&mut self, _server: &Server) {
        self.progress.stopping.store(true, Ordering::Release);
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "counter task failed");
            }
        }
    }
}
