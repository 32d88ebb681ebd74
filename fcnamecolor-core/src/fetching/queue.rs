use std::sync::Arc;

use log::{debug, error};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver},
    task::{JoinHandle, JoinSet},
};

use crate::RosterClient;

use super::{FetchWorker, Job, JobSender};

/// Runs fetch jobs off the caller's thread.
///
/// Every job gets its own task, so a slow background refresh never holds up a login.
/// Dropping the queue aborts the dispatcher and every job it spawned.
pub struct TaskQueue {
    dispatcher: JoinHandle<()>,
}

impl TaskQueue {
    /// Creates the job channel. The sender goes to the worker, the receiver to [TaskQueue::spawn].
    pub fn channel() -> (JobSender, UnboundedReceiver<Job>) {
        unbounded_channel()
    }

    pub fn spawn<C>(worker: Arc<FetchWorker<C>>, receiver: UnboundedReceiver<Job>) -> Self
    where
        C: RosterClient,
    {
        let dispatcher = tokio::spawn(dispatch(worker, receiver));

        Self { dispatcher }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

async fn dispatch<C>(worker: Arc<FetchWorker<C>>, mut receiver: UnboundedReceiver<Job>)
where
    C: RosterClient,
{
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            job = receiver.recv() => {
                let Some(job) = job else {
                    break;
                };

                debug!("Running {:?}", job);

                let worker = worker.clone();
                tasks.spawn(async move { worker.run(job).await });
            }
            Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = result {
                    if e.is_panic() {
                        error!("Fetch job panicked: {}", e);
                    }
                }
            }
        }
    }

    // Let jobs that are already running finish
    while tasks.join_next().await.is_some() {}
}
