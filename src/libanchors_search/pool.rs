// Copyright 2021 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use concurrent_queue::ConcurrentQueue;
use crossbeam_utils::Backoff;

use anchors_utils::config;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads draining a shared job queue. Workers
/// are spawned eagerly and live until the pool is dropped, at which point
/// the queue is drained and every thread is joined.
pub struct WorkerPool {
    queue: Arc<ConcurrentQueue<Job>>,
    is_running: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize
}

impl WorkerPool {
    /// Creates a pool with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(*config::NUM_WORKERS)
    }

    /// Creates a pool with the given number of worker threads, floored at
    /// one.
    ///
    /// # Arguments
    ///
    /// * `capacity` -
    ///
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let queue = Arc::new(ConcurrentQueue::unbounded());
        let is_running = Arc::new(AtomicBool::new(true));
        let handles = (0..capacity).map(|_| {
            let queue = queue.clone();
            let is_running = is_running.clone();

            thread::Builder::new()
                .name("anchors_worker".into())
                .spawn(move || worker_loop(queue, is_running))
                .expect("could not spawn worker thread")
        }).collect::<Vec<_>>();

        Self {
            queue,
            is_running,
            handles: Mutex::new(handles),
            capacity
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueues a job for execution on some worker thread.
    ///
    /// # Arguments
    ///
    /// * `job` -
    ///
    pub fn submit(&self, job: Job) {
        self.queue.push(job).ok().expect("could not push to job queue");
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::Release);

        for handle in self.handles.lock().expect("could not acquire lock").drain(..) {
            handle.join().expect("could not terminate worker thread");
        }
    }
}

fn worker_loop(queue: Arc<ConcurrentQueue<Job>>, is_running: Arc<AtomicBool>) {
    let backoff = Backoff::new();

    loop {
        match queue.pop() {
            Ok(job) => {
                job();
                backoff.reset();
            },
            Err(_) => {
                // drain the queue completely before quitting so that no
                // submitted job is lost during shutdown
                if !is_running.load(Ordering::Acquire) {
                    break;
                }

                backoff.snooze();
            }
        }
    }
}
