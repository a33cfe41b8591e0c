//! Fixed pool of validation workers with synchronous admission control.
//!
//! Admission counts queued and running tasks together, so a task is either
//! accepted with a slot reserved for it or rejected on the spot; nothing
//! waits in an unbounded backlog.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, RejectReason, Result};
use crate::job::ValidationJob;
use crate::task::{Outcome, TaskFailure, TaskSlot, ValidationHandle};

struct Task {
    slot: Arc<TaskSlot>,
    job: Box<dyn ValidationJob>,
}

#[derive(Default)]
struct Admission {
    stopped: bool,
    active: HashMap<String, Arc<TaskSlot>>,
}

struct Shared {
    capacity: usize,
    admission: Mutex<Admission>,
}

impl Shared {
    /// Releases the task's slot, then publishes its outcome.
    fn complete(&self, slot: &TaskSlot, outcome: Outcome) {
        let mut admission = self.admission.lock();
        admission.active.remove(&slot.project_key);
        tracing::info!(
            project = %slot.project_key,
            state = %outcome.state(),
            active = admission.active.len(),
            "validation finished"
        );
        slot.finish(outcome);
    }
}

/// Runs at most `capacity` validations at a time, one per project.
pub struct ValidationExecutor {
    shared: Arc<Shared>,
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ValidationExecutor {
    pub fn new(config: &ExecutorConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(ExecutorError::ZeroCapacity);
        }
        // Admission never lets more than `capacity` tasks in, so sends
        // never block.
        let (sender, receiver) = crossbeam_channel::bounded::<Task>(config.capacity);
        let shared = Arc::new(Shared {
            capacity: config.capacity,
            admission: Mutex::new(Admission::default()),
        });

        let mut workers = Vec::with_capacity(config.capacity);
        for idx in 0..config.capacity {
            let name = format!("{}-{idx}", config.thread_name_prefix);
            let receiver = receiver.clone();
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(&receiver, &worker_shared));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    drop(sender);
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(ExecutorError::Spawn { name, source });
                }
            }
        }
        tracing::debug!(capacity = config.capacity, "validation executor started");

        Ok(Self {
            shared,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        })
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Queued plus running tasks.
    pub fn active_count(&self) -> usize {
        self.shared.admission.lock().active.len()
    }

    pub fn is_active(&self, project_key: &str) -> bool {
        self.shared.admission.lock().active.contains_key(project_key)
    }

    /// Accepts `job` or rejects it immediately.
    ///
    /// Rejection happens when every slot is taken, when the job's project
    /// is already in flight, or after [`stop`](Self::stop).
    pub fn execute<J: ValidationJob>(&self, job: J) -> Result<ValidationHandle> {
        let project_key = job.project_key().to_string();
        let mut admission = self.shared.admission.lock();

        let rejection = if admission.stopped {
            Some(RejectReason::Stopped)
        } else if admission.active.contains_key(&project_key) {
            Some(RejectReason::ProjectActive)
        } else if admission.active.len() >= self.shared.capacity {
            Some(RejectReason::CapacityExhausted {
                capacity: self.shared.capacity,
            })
        } else {
            None
        };
        if let Some(reason) = rejection {
            tracing::warn!(project = %project_key, %reason, "validation rejected");
            return Err(ExecutorError::Rejected {
                project_key,
                reason,
            });
        }

        let slot = TaskSlot::new(project_key.clone());
        let task = Task {
            slot: Arc::clone(&slot),
            job: Box::new(job),
        };
        let sent = match self.sender.lock().as_ref() {
            Some(sender) => sender.try_send(task).is_ok(),
            None => false,
        };
        if !sent {
            return Err(ExecutorError::Rejected {
                project_key,
                reason: RejectReason::Stopped,
            });
        }
        admission.active.insert(project_key.clone(), Arc::clone(&slot));
        tracing::info!(
            project = %project_key,
            active = admission.active.len(),
            "validation accepted"
        );
        Ok(ValidationHandle::new(slot))
    }

    /// Signals the project's task, if any. Returns whether one was found.
    pub fn cancel(&self, project_key: &str) -> bool {
        let admission = self.shared.admission.lock();
        match admission.active.get(project_key) {
            Some(slot) => {
                tracing::info!(project = %project_key, "validation cancel requested");
                slot.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Rejects new work, cancels every queued and running task, and blocks
    /// until all workers have exited.
    pub fn stop(&self) {
        {
            let mut admission = self.shared.admission.lock();
            if !admission.stopped {
                tracing::info!(active = admission.active.len(), "stopping validation executor");
            }
            admission.stopped = true;
            for slot in admission.active.values() {
                slot.token.cancel();
            }
        }
        // Workers drain what is queued, then see the channel close.
        self.sender.lock().take();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("validation worker panicked outside a task");
            }
        }
    }
}

impl Drop for ValidationExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(receiver: &Receiver<Task>, shared: &Shared) {
    for task in receiver.iter() {
        let outcome = run_task(&task);
        shared.complete(&task.slot, outcome);
    }
}

fn run_task(task: &Task) -> Outcome {
    let slot = &task.slot;
    if slot.token.is_cancelled() || !slot.start() {
        tracing::debug!(project = %slot.project_key, "cancelled before start");
        return Outcome::Cancelled;
    }
    tracing::info!(project = %slot.project_key, "validation started");

    match panic::catch_unwind(AssertUnwindSafe(|| task.job.run(&slot.token))) {
        Ok(Ok(outcome)) => Outcome::Completed(Box::new(outcome)),
        Ok(Err(err)) if err.is_cancelled() => Outcome::Cancelled,
        Ok(Err(err)) => {
            tracing::error!(project = %slot.project_key, error = %err, "validation failed");
            Outcome::Failed(TaskFailure::Job(Arc::new(err)))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(project = %slot.project_key, panic = %message, "validation panicked");
            Outcome::Failed(TaskFailure::Panicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
