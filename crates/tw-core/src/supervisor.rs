//! Supervised task group with a shared shutdown signal.
//!
//! Every long-running loop of a process (feed stream, fan-out, servers, sync
//! loop, signal watcher) is spawned into one [`TaskGroup`]. Tasks watch the
//! group's [`ShutdownSignal`]; the first task that fails triggers it, and
//! [`TaskGroup::wait`] reports that first failure once everything has
//! drained.

use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Clonable handle to a group's shutdown flag.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once shutdown has been requested (immediately if it already
    /// was).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Named tasks joined at a single point.
pub struct TaskGroup {
    tasks: JoinSet<(String, anyhow::Result<()>)>,
    shutdown: ShutdownSignal,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self { tasks: JoinSet::new(), shutdown: ShutdownSignal::new() }
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn spawn<F>(&mut self, name: impl Into<String>, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        debug!("[supervisor] spawning {name}");
        self.tasks.spawn(async move { (name, fut.await) });
    }

    /// Wait for every task to finish.
    ///
    /// A task error or panic triggers shutdown for the rest of the group; the
    /// first such failure is returned.
    pub async fn wait(mut self) -> anyhow::Result<()> {
        let mut first_err: Option<anyhow::Error> = None;

        while let Some(joined) = self.tasks.join_next().await {
            let failure = match joined {
                Ok((name, Ok(()))) => {
                    info!("[supervisor] {name} finished");
                    None
                }
                Ok((name, Err(e))) => {
                    error!("[supervisor] {name} failed: {e:#}");
                    Some(e.context(format!("task {name} failed")))
                }
                Err(join_err) => {
                    error!("[supervisor] task aborted: {join_err}");
                    Some(anyhow!("task aborted: {join_err}"))
                }
            };

            if let Some(e) = failure {
                self.shutdown.trigger();
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn clean_exit_on_shutdown() {
        let mut group = TaskGroup::new();
        for i in 0..3 {
            let signal = group.signal();
            group.spawn(format!("worker-{i}"), async move {
                signal.cancelled().await;
                Ok(())
            });
        }
        group.shutdown();
        assert!(group.wait().await.is_ok());
    }

    #[tokio::test]
    async fn first_error_cancels_the_rest() {
        let mut group = TaskGroup::new();
        let signal = group.signal();
        group.spawn("waiter", async move {
            signal.cancelled().await;
            Ok(())
        });
        group.spawn("failing", async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(anyhow!("boom"))
        });
        let observer = group.signal();

        let err = tokio::time::timeout(Duration::from_secs(5), group.wait())
            .await
            .expect("group should drain")
            .unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
        assert!(observer.is_cancelled());
    }

    #[tokio::test]
    async fn panic_is_reported() {
        let mut group = TaskGroup::new();
        group.spawn("panicking", async {
            panic!("bad task");
        });
        assert!(group.wait().await.is_err());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_trigger() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_cancelled());
        signal.trigger();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(100), signal.cancelled()).await.unwrap();
    }
}
