//! Task executors for batch fetches.

use crate::catalog::FetchResult;
use crate::error::Result;
use crate::ports::{ExecutorPort, FetchTask};
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::warn;

/// Runs every task inline on the caller's thread.
pub struct SynchronousExecutor;

impl SynchronousExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SynchronousExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorPort for SynchronousExecutor {
    fn run_all(&self, tasks: Vec<FetchTask>) -> Vec<(String, Result<FetchResult>)> {
        tasks.into_iter().map(|task| task()).collect()
    }
}

/// Bounded pool of worker threads draining a shared task queue.
///
/// Threads are spawned per `run_all` call and joined before it returns, so
/// the pool holds no state between batches. At most `max_workers` threads
/// run, and never more than there are tasks.
pub struct ThreadPoolExecutor {
    max_workers: usize,
}

impl ThreadPoolExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }
}

impl ExecutorPort for ThreadPoolExecutor {
    fn run_all(&self, tasks: Vec<FetchTask>) -> Vec<(String, Result<FetchResult>)> {
        let task_count = tasks.len();
        if task_count == 0 {
            return Vec::new();
        }

        let queue = Arc::new(Mutex::new(tasks.into_iter().collect::<VecDeque<_>>()));
        let (tx, rx) = mpsc::channel();

        let worker_count = self.max_workers.min(task_count);
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            handles.push(thread::spawn(move || loop {
                let task = {
                    let mut guard = match queue.lock() {
                        Ok(guard) => guard,
                        Err(_) => return,
                    };
                    guard.pop_front()
                };
                let Some(task) = task else { return };
                if tx.send(task()).is_err() {
                    return;
                }
            }));
        }
        drop(tx);

        let results: Vec<_> = rx.iter().collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("fetch worker thread panicked");
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn ok_task(name: &str) -> FetchTask {
        let name = name.to_string();
        Box::new(move || {
            let path = PathBuf::from(format!("/cache/{name}"));
            (name, Ok(FetchResult::Single(path)))
        })
    }

    #[test]
    fn test_synchronous_preserves_order() {
        let executor = SynchronousExecutor::new();
        let results = executor.run_all(vec![ok_task("a"), ok_task("b"), ok_task("c")]);
        let names: Vec<_> = results.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_pool_runs_every_task_once() {
        let executor = ThreadPoolExecutor::new(4);
        let tasks: Vec<FetchTask> = (0..20).map(|i| ok_task(&format!("d{i}"))).collect();
        let results = executor.run_all(tasks);

        assert_eq!(results.len(), 20);
        let names: HashSet<_> = results.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names.len(), 20);
    }

    #[test]
    fn test_pool_with_zero_workers_still_runs() {
        let executor = ThreadPoolExecutor::new(0);
        let results = executor.run_all(vec![ok_task("only")]);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_pool_empty_batch() {
        let executor = ThreadPoolExecutor::new(4);
        assert!(executor.run_all(Vec::new()).is_empty());
    }
}
