// Async predictor: fans requests out to a pool of predict workers (one per
// device) and hands results back strictly in submission order.
//
// Cross-thread state is limited to the two bounded channels. The cursors and
// the reorder buffer belong to the dispatcher alone, so callers that share an
// AsyncPredictor across threads must serialise access themselves.

use crate::pipeline::reorder::ReorderBuffer;
use crate::pipeline::types::{
    device_for_worker, pool_size_for, Device, PredictorError, Result, SequenceId, Task,
    TaskResult,
};
use crate::pipeline::worker::{spawn_predict_worker, Predictor, WorkerControl};
use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Channel capacity per worker
pub const DEFAULT_QUEUE_FACTOR: usize = 3;
/// Look-ahead depth per worker for the buffered frame driver
pub const DEFAULT_BUFFER_FACTOR: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Accelerators to spread workers over; 0 runs a single CPU worker
    pub num_accelerators: usize,
    pub queue_factor: usize,
    pub buffer_factor: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            num_accelerators: 0,
            queue_factor: DEFAULT_QUEUE_FACTOR,
            buffer_factor: DEFAULT_BUFFER_FACTOR,
        }
    }
}

enum ShutdownStep<O> {
    StopSent,
    Drained(TaskResult<O>),
    Closed,
}

struct WorkerHandle {
    device: Device,
    join: Option<JoinHandle<()>>,
}

pub struct AsyncPredictor<I, O> {
    task_tx: Sender<Task<I>>,
    result_rx: Receiver<TaskResult<O>>,
    workers: Vec<WorkerHandle>,
    /// Next id handed out by `submit`
    next_submit_id: SequenceId,
    /// Next id `retrieve` will deliver
    next_expected_id: SequenceId,
    pending: ReorderBuffer<Result<O>>,
    buffer_factor: usize,
    is_shut_down: bool,
}

impl<I, O> AsyncPredictor<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Start one worker per configured accelerator (or a single CPU worker).
    pub fn new<P, F>(config: &PredictorConfig, factory: F) -> Result<Self>
    where
        P: Predictor<I, O>,
        F: Fn(Device) -> anyhow::Result<P> + Send + Sync + 'static,
    {
        let num_accelerators = config.num_accelerators;
        Self::with_devices(
            pool_size_for(num_accelerators),
            |index| device_for_worker(num_accelerators, index),
            config.queue_factor,
            config.buffer_factor,
            factory,
        )
    }

    /// Start `pool_size` workers, binding worker `i` to `device_fn(i)`.
    ///
    /// Blocks until every worker has built its predictor. If any of them
    /// fails, the workers that did start are stopped and the first failure
    /// is returned.
    pub fn with_devices<P, F, D>(
        pool_size: usize,
        device_fn: D,
        queue_factor: usize,
        buffer_factor: usize,
        factory: F,
    ) -> Result<Self>
    where
        P: Predictor<I, O>,
        F: Fn(Device) -> anyhow::Result<P> + Send + Sync + 'static,
        D: Fn(usize) -> Device,
    {
        let pool_size = pool_size.max(1);
        let capacity = pool_size * queue_factor.max(1);

        let (task_tx, task_rx) = channel::bounded::<Task<I>>(capacity);
        let (result_tx, result_rx) = channel::bounded::<TaskResult<O>>(capacity);
        let (ready_tx, ready_rx) = channel::bounded(pool_size);
        let factory = Arc::new(factory);

        let mut workers = Vec::with_capacity(pool_size);
        let mut spawn_error = None;
        for index in 0..pool_size {
            let device = device_fn(index);
            let control = WorkerControl {
                index,
                device,
                task_rx: task_rx.clone(),
                result_tx: result_tx.clone(),
                ready_tx: ready_tx.clone(),
            };
            match spawn_predict_worker(control, factory.clone()) {
                Ok(join) => workers.push(WorkerHandle {
                    device,
                    join: Some(join),
                }),
                Err(e) => {
                    spawn_error = Some(PredictorError::WorkerInit {
                        worker: index,
                        device,
                        message: format!("failed to spawn thread: {}", e),
                    });
                    break;
                }
            }
        }

        // Only workers keep these ends alive, so a fully exited pool shows
        // up as a disconnected channel instead of a silent hang.
        drop(task_rx);
        drop(result_tx);
        drop(ready_tx);

        let mut predictor = Self {
            task_tx,
            result_rx,
            workers,
            next_submit_id: 1,
            next_expected_id: 1,
            pending: ReorderBuffer::new(),
            buffer_factor: buffer_factor.max(1),
            is_shut_down: false,
        };

        let mut init_error = spawn_error;
        for report in ready_rx.iter() {
            if let Err(e) = report {
                if init_error.is_none() {
                    init_error = Some(e);
                }
            }
        }

        if let Some(e) = init_error {
            tracing::error!("Async predictor failed to start: {}", e);
            if let Err(join_err) = predictor.join() {
                tracing::warn!("{:#}", join_err);
            }
            return Err(e);
        }

        tracing::info!(
            "Async predictor started {} workers on [{}], queue capacity {}",
            predictor.workers.len(),
            predictor
                .devices()
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            capacity
        );

        Ok(predictor)
    }

    /// Queue `input` and return its sequence id. Blocks while the task
    /// channel is full.
    pub fn submit(&mut self, input: I) -> Result<SequenceId> {
        if self.is_shut_down {
            return Err(PredictorError::ShutDown);
        }

        let id = self.next_submit_id;
        self.task_tx
            .send(Task::Predict { id, input })
            .map_err(|_| PredictorError::Disconnected)?;
        self.next_submit_id += 1;

        tracing::debug!("Submitted task {}", id);
        Ok(id)
    }

    /// Whether `submit` can queue a task right now without blocking. Only the
    /// dispatcher sends on the task channel, so the answer stays true until
    /// the next submit.
    pub fn has_queue_room(&self) -> bool {
        !self.task_tx.is_full()
    }

    /// Tasks the task channel holds before `submit` blocks
    pub fn queue_capacity(&self) -> usize {
        self.task_tx.capacity().unwrap_or(usize::MAX)
    }

    /// Return the result for the oldest outstanding submission, waiting for
    /// it if necessary. Results that arrive early are parked in the reorder
    /// buffer.
    pub fn retrieve(&mut self) -> Result<O> {
        let want = self.next_expected_id;
        if want >= self.next_submit_id {
            return Err(PredictorError::NothingInFlight);
        }

        if let Some(result) = self.pending.take(want) {
            self.next_expected_id += 1;
            return result;
        }

        loop {
            let (id, result) = self
                .result_rx
                .recv()
                .map_err(|_| PredictorError::Disconnected)?;

            if id == want {
                self.pending.mark_delivered(want);
                self.next_expected_id += 1;
                return result;
            }

            self.pending.insert(id, result);
            tracing::debug!(
                "Result {} arrived early while waiting for {} (buffered {}, oldest {:?})",
                id,
                want,
                self.pending.len(),
                self.pending.peek_first_id()
            );
        }
    }

    /// Submit then wait: a blocking call served by whichever worker is free.
    pub fn predict(&mut self, input: I) -> Result<O> {
        self.submit(input)?;
        self.retrieve()
    }

    /// Submitted but not yet retrieved
    pub fn in_flight(&self) -> usize {
        (self.next_submit_id - self.next_expected_id) as usize
    }

    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    pub fn devices(&self) -> Vec<Device> {
        self.workers.iter().map(|w| w.device).collect()
    }

    /// Results currently parked in the reorder buffer
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Look-ahead depth that keeps every worker busy
    pub fn default_buffer_size(&self) -> usize {
        self.pool_size().max(1) * self.buffer_factor
    }

    /// Ask every worker to stop once the tasks queued ahead of the stop
    /// token are done. Does not wait for them to exit. Calling it again is a
    /// no-op.
    pub fn shutdown(&mut self) {
        if self.is_shut_down {
            return;
        }
        self.is_shut_down = true;

        let mut remaining = self.workers.len();
        tracing::info!("Shutting down {} predict workers", remaining);

        // Workers may be parked on a full result channel; keep draining it
        // so the stop tokens can always get through.
        while remaining > 0 {
            let step = crossbeam::select! {
                send(self.task_tx, Task::Stop) -> res => match res {
                    Ok(()) => ShutdownStep::StopSent,
                    Err(_) => ShutdownStep::Closed,
                },
                recv(self.result_rx) -> msg => match msg {
                    Ok(result) => ShutdownStep::Drained(result),
                    Err(_) => ShutdownStep::Closed,
                },
            };

            match step {
                ShutdownStep::StopSent => remaining -= 1,
                ShutdownStep::Drained((id, result)) => {
                    self.pending.insert(id, result);
                }
                ShutdownStep::Closed => {
                    tracing::debug!("Predict workers already gone");
                    break;
                }
            }
        }
    }

    /// Shut down and wait for every worker thread to exit.
    pub fn join(mut self) -> anyhow::Result<()> {
        self.shutdown();

        let handles: Vec<_> = self
            .workers
            .iter_mut()
            .filter_map(|w| w.join.take())
            .collect();
        // Dropping the channels releases any worker blocked on a send
        drop(self);

        let mut panicked = 0;
        for handle in handles {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            anyhow::bail!("{} predict worker thread(s) panicked", panicked);
        }
        Ok(())
    }
}

impl<I, O> Drop for AsyncPredictor<I, O> {
    fn drop(&mut self) {
        if self.is_shut_down {
            return;
        }
        self.is_shut_down = true;
        // Dropping the result receiver unblocks workers waiting to send, so
        // a best-effort stop token per worker is enough here.
        for _ in 0..self.workers.len() {
            if self.task_tx.try_send(Task::Stop).is_err() {
                break;
            }
        }
    }
}
