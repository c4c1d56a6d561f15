//! Background research workers.
//!
//! Workers poll the shared [`TaskQueue`], claim one task at a time and run
//! a [`Researcher`] on it. Claiming is atomic inside the queue, so any
//! number of workers can share it. All workers stop when the pool's
//! `watch` shutdown flag flips.

use issola_core::error::CommandError;
use issola_memory::{ResearchTask, TaskQueue, VisitGuard};
use issola_tools::{PageReader, SearchEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Researches one topic: search, then read every URL not seen before.
pub struct Researcher {
    search: Arc<dyn SearchEngine>,
    reader: Arc<PageReader>,
    visited: Arc<VisitGuard>,
    num_results: usize,
}

impl Researcher {
    pub fn new(
        search: Arc<dyn SearchEngine>,
        reader: Arc<PageReader>,
        visited: Arc<VisitGuard>,
        num_results: usize,
    ) -> Self {
        Self {
            search,
            reader,
            visited,
            num_results,
        }
    }

    /// Findings for `task`, one `Source: … Summary: …` entry per page read.
    ///
    /// A failing page is skipped; only a failing search fails the task.
    pub async fn research(&self, task: &ResearchTask) -> Result<Vec<String>, CommandError> {
        let urls = self.search.search(&task.topic, self.num_results).await?;
        let mut findings = Vec::new();
        for url in urls {
            if !self.visited.accept(&url).await? {
                debug!(task_id = task.id, url = %url, "Skipping visited URL");
                continue;
            }
            match self.reader.read(&url, &task.topic).await {
                Ok(summary) => findings.push(format!("Source: {url}\nSummary:\n{summary}")),
                Err(e) => warn!(task_id = task.id, url = %url, error = %e, "Page skipped"),
            }
        }
        Ok(findings)
    }
}

pub struct ResearchWorkerPool {
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl ResearchWorkerPool {
    /// Start `workers` tasks polling `queue` every `poll_interval` when idle.
    pub fn start(
        queue: Arc<TaskQueue>,
        researcher: Arc<Researcher>,
        workers: usize,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let workers = (0..workers)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&queue),
                    Arc::clone(&researcher),
                    poll_interval,
                    rx.clone(),
                ))
            })
            .collect::<Vec<_>>();
        info!(workers = workers.len(), "Research workers started");
        Self { shutdown, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Signal every worker to stop and wait for them. A task being
    /// researched is finished first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Research worker ended abnormally");
            }
        }
        info!("Research workers stopped");
    }
}

async fn run_worker(
    id: usize,
    queue: Arc<TaskQueue>,
    researcher: Arc<Researcher>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let task = match queue.claim_next().await {
            Ok(Some(task)) => task,
            Ok(None) => {
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
                continue;
            }
            Err(e) => {
                warn!(worker = id, error = %e, "Could not claim research task");
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
                continue;
            }
        };

        info!(worker = id, task_id = task.id, topic = %task.topic, "Researching");
        if let Err(e) = queue.record_queries(task.id, vec![task.topic.clone()]).await {
            warn!(worker = id, task_id = task.id, error = %e, "Could not record queries");
        }
        let outcome = match researcher.research(&task).await {
            Ok(findings) => queue.save_results(task.id, findings).await,
            Err(e) => queue.fail(task.id, &e.to_string()).await,
        };
        if let Err(e) = outcome {
            warn!(worker = id, task_id = task.id, error = %e, "Could not store research outcome");
        }
    }
    debug!(worker = id, "Research worker stopped");
}
