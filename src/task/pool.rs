//! Fixed-size pool of worker threads fed from a shared job queue.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc},
    thread,
};

use log::{debug, error};

use super::TaskError;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

type SharedReceiver = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Worker threads pulling boxed jobs from one channel.
///
/// Jobs run in submission order as workers free up. Shutting down closes the
/// queue; workers finish every job already queued and then exit.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    workers: Mutex<Vec<Worker>>,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
}

impl WorkerPool {
    /// Start `size` workers. A size of zero is raised to one.
    pub(crate) fn new(size: usize) -> Result<Self, TaskError> {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| Worker::spawn(id, Arc::clone(&receiver)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            workers: Mutex::new(workers),
            sender: Mutex::new(Some(sender)),
        })
    }

    /// Queue `job` for the next free worker.
    pub(crate) fn execute(&self, job: Job) -> Result<(), TaskError> {
        let sender = lock(&self.sender);
        let sender = sender.as_ref().ok_or(TaskError::PoolShutDown)?;
        sender.send(job).map_err(|_| TaskError::PoolShutDown)
    }

    pub(crate) fn size(&self) -> usize { lock(&self.workers).len() }

    pub(crate) fn is_shut_down(&self) -> bool { lock(&self.sender).is_none() }

    /// Close the queue and join every worker. Safe to call repeatedly.
    pub(crate) fn shutdown(&self) {
        drop(lock(&self.sender).take());
        let workers: Vec<Worker> = lock(&self.workers).drain(..).collect();
        let current = thread::current().id();

        for worker in workers {
            if worker.thread.thread().id() == current {
                continue;
            }
            debug!("shutting down worker {}", worker.id);
            if worker.thread.join().is_err() {
                error!("worker {} exited by panicking", worker.id);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) { self.shutdown(); }
}

#[derive(Debug)]
struct Worker {
    id: usize,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn spawn(id: usize, receiver: SharedReceiver) -> Result<Self, TaskError> {
        let thread = thread::Builder::new()
            .name(format!("ackwire-worker-{id}"))
            .spawn(move || {
                loop {
                    let next = lock(&receiver).recv();
                    match next {
                        Ok(job) => {
                            debug!("worker {id} running a task");
                            job();
                        }
                        Err(_) => {
                            debug!("worker {id} disconnected");
                            break;
                        }
                    }
                }
            })?;
        Ok(Self { id, thread })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 1)]
    #[case(3, 3)]
    fn pool_starts_requested_workers(#[case] requested: usize, #[case] started: usize) {
        let pool = WorkerPool::new(requested).expect("spawn workers");
        assert_eq!(pool.size(), started);
    }

    #[test]
    fn shutdown_drains_queued_jobs() {
        let pool = WorkerPool::new(2).expect("spawn workers");
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let ran = Arc::clone(&ran);
            pool.execute(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("pool accepts work");
        }
        pool.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn execute_after_shutdown_is_rejected() {
        let pool = WorkerPool::new(1).expect("spawn workers");
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_shut_down());
        let err = pool.execute(Box::new(|| {})).expect_err("pool is closed");
        assert!(matches!(err, TaskError::PoolShutDown));
    }
}
