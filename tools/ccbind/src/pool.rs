//! Bounded worker pool for independent per-toolchain jobs.
//!
//! Jobs go out over one channel and results come back over another, with
//! workers borrowing the job list through `std::thread::scope`. Results are
//! returned in job order whatever order they finish in.

use std::sync::{Mutex, mpsc};

/// Run `work` over every item on up to `workers` threads.
pub fn run_all<T, R, F>(items: &[T], workers: usize, work: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, items.len());

    let (job_tx, job_rx) = mpsc::channel::<usize>();
    let (result_tx, result_rx) = mpsc::channel::<(usize, R)>();
    let job_rx = Mutex::new(job_rx);

    for idx in 0..items.len() {
        // The receiver is alive until the scope below ends.
        let _ = job_tx.send(idx);
    }
    drop(job_tx);

    let job_rx_ref = &job_rx;
    let work_ref = &work;

    std::thread::scope(|s| {
        for _ in 0..workers {
            let tx = result_tx.clone();
            s.spawn(move || {
                loop {
                    let next = match job_rx_ref.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let Ok(idx) = next else { break };
                    if tx.send((idx, work_ref(&items[idx]))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();
    for (idx, result) in result_rx {
        slots[idx] = Some(result);
    }
    slots.into_iter().flatten().collect()
}
