use crate::pipeline::types::{Device, PredictorError, SequenceId, Task, TaskResult};
use crossbeam::channel::{Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The opaque prediction function a worker drives.
///
/// A predictor is built inside the worker thread that owns it, so it does not
/// need to be `Send` itself; only its factory crosses threads.
pub trait Predictor<I, O> {
    fn predict(&mut self, input: I) -> anyhow::Result<O>;
}

/// Blanket implementation so any closure with the right signature
/// automatically implements Predictor.
impl<F, I, O> Predictor<I, O> for F
where
    F: FnMut(I) -> anyhow::Result<O>,
{
    fn predict(&mut self, input: I) -> anyhow::Result<O> {
        self(input)
    }
}

/// Everything a worker thread needs, handed over at spawn time
pub(crate) struct WorkerControl<I, O> {
    pub index: usize,
    pub device: Device,
    pub task_rx: Receiver<Task<I>>,
    pub result_tx: Sender<TaskResult<O>>,
    /// Readiness report, sent once after the predictor is built (or failed to build)
    pub ready_tx: Sender<Result<(), PredictorError>>,
}

pub(crate) fn spawn_predict_worker<I, O, P, F>(
    control: WorkerControl<I, O>,
    factory: Arc<F>,
) -> std::io::Result<JoinHandle<()>>
where
    I: Send + 'static,
    O: Send + 'static,
    P: Predictor<I, O>,
    F: Fn(Device) -> anyhow::Result<P> + Send + Sync + 'static,
{
    let WorkerControl {
        index,
        device,
        task_rx,
        result_tx,
        ready_tx,
    } = control;

    thread::Builder::new()
        .name(format!("predict-worker-{}", index))
        .spawn(move || {
            let span = tracing::info_span!("predict_worker", worker = index, device = %device);
            let _guard = span.enter();

            let built = panic::catch_unwind(AssertUnwindSafe(|| factory(device)))
                .unwrap_or_else(|payload| Err(anyhow::anyhow!(panic_message(payload.as_ref()))));
            let predictor = match built {
                Ok(predictor) => {
                    let _ = ready_tx.send(Ok(()));
                    predictor
                }
                Err(e) => {
                    tracing::error!("Failed to build predictor: {:#}", e);
                    let _ = ready_tx.send(Err(PredictorError::WorkerInit {
                        worker: index,
                        device,
                        message: format!("{:#}", e),
                    }));
                    return;
                }
            };
            drop(ready_tx);

            tracing::info!("Predict worker started");
            let served = predict_worker(predictor, task_rx, result_tx);
            tracing::info!("Predict worker finished after {} tasks", served);
        })
}

/// Worker loop: pull a task, predict, push the tagged result.
///
/// Returns the number of results delivered. The loop ends on the stop
/// sentinel, or when either channel disconnects.
pub(crate) fn predict_worker<I, O, P>(
    mut predictor: P,
    rx: Receiver<Task<I>>,
    tx: Sender<TaskResult<O>>,
) -> usize
where
    P: Predictor<I, O>,
{
    let mut served = 0;

    for task in rx {
        let (id, input) = match task {
            Task::Predict { id, input } => (id, input),
            Task::Stop => {
                tracing::debug!("Received stop token");
                break;
            }
        };

        let outcome = run_prediction(&mut predictor, id, input);
        if let Err(e) = &outcome {
            tracing::warn!("{}", e);
        }

        if tx.send((id, outcome)).is_err() {
            tracing::debug!("Result channel closed, exiting");
            break;
        }
        served += 1;
    }

    served
}

fn run_prediction<I, O, P>(predictor: &mut P, id: SequenceId, input: I) -> Result<O, PredictorError>
where
    P: Predictor<I, O>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| predictor.predict(input))) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(PredictorError::Prediction {
            id,
            message: format!("{:#}", e),
        }),
        Err(payload) => Err(PredictorError::WorkerPanicked {
            id,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
