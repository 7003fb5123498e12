use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use keel_core::{CoreError, Disposable, ServiceResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AdapterError, AdapterResult, IntoServiceResult};

/// Unit of queued work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub payload: Value,
    pub attempts: u32,
}

/// Work queue capability
#[async_trait]
pub trait Queue: Disposable {
    /// Append a job and return its id
    async fn enqueue(&self, queue: &str, payload: Value) -> ServiceResult<String>;

    /// Take the oldest job, if any
    async fn dequeue(&self, queue: &str) -> ServiceResult<Option<Job>>;

    /// Put a job back at the end of its queue with its attempt count raised
    async fn retry(&self, job: Job) -> ServiceResult<()>;

    async fn len(&self, queue: &str) -> ServiceResult<usize>;
}

#[derive(Debug, Default)]
struct QueueState {
    queues: HashMap<String, VecDeque<Job>>,
    closed: bool,
}

/// FIFO queues held in process memory
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs waiting across every queue
    pub fn pending(&self) -> usize {
        self.state.lock().queues.values().map(VecDeque::len).sum()
    }

    fn with_open<T>(&self, op: impl FnOnce(&mut QueueState) -> AdapterResult<T>) -> AdapterResult<T> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(AdapterError::Closed("queue".to_string()));
        }
        op(&mut state)
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, queue: &str, payload: Value) -> ServiceResult<String> {
        self.with_open(|state| {
            let job = Job {
                id: uuid::Uuid::new_v4().to_string(),
                queue: queue.to_string(),
                payload,
                attempts: 0,
            };
            let id = job.id.clone();
            state.queues.entry(queue.to_string()).or_default().push_back(job);
            tracing::debug!(queue, job_id = %id, "Enqueued job");
            Ok(id)
        })
        .into_service_result()
    }

    async fn dequeue(&self, queue: &str) -> ServiceResult<Option<Job>> {
        self.with_open(|state| Ok(state.queues.get_mut(queue).and_then(VecDeque::pop_front)))
            .into_service_result()
    }

    async fn retry(&self, mut job: Job) -> ServiceResult<()> {
        self.with_open(|state| {
            job.attempts += 1;
            state.queues.entry(job.queue.clone()).or_default().push_back(job);
            Ok(())
        })
        .into_service_result()
    }

    async fn len(&self, queue: &str) -> ServiceResult<usize> {
        self.with_open(|state| Ok(state.queues.get(queue).map_or(0, VecDeque::len)))
            .into_service_result()
    }
}

#[async_trait]
impl Disposable for InMemoryQueue {
    async fn dispose(&self) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        let dropped: usize = state.queues.values().map(VecDeque::len).sum();
        if dropped > 0 {
            tracing::warn!(dropped, "Queue closed with pending jobs");
        }
        state.queues.clear();
        Ok(())
    }
}
