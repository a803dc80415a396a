/// Uniform handle for every long-running producer.
///
/// A producer is spawned with a `CancellationToken`; `stop()` cancels the
/// token and waits for the task to return, which is the shutdown
/// acknowledgment.  Once `stop()` returns the producer sends nothing more.
use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct TaskHandle<T = ()> {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub fn spawn<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(f(token.clone()));
        info!("Start {}", name);
        Self {
            name,
            token,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Asks the task to stop and waits for it to acknowledge by returning.
    pub async fn stop(self) -> anyhow::Result<T> {
        info!("Stop {}", self.name);
        self.token.cancel();
        self.handle
            .await
            .map_err(|e| anyhow::anyhow!("{} task failed: {}", self.name, e))
    }
}
