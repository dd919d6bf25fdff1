use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Submission-order tag. The first id handed out is 1; 0 is never used.
pub type SequenceId = u64;

/// Device a worker is bound to for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    Cpu,
    Accelerator(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Accelerator(index) => write!(f, "accel:{}", index),
        }
    }
}

/// Default device assignment: one accelerator per worker, or the shared CPU
/// fallback for every worker when no accelerators are configured.
pub fn device_for_worker(num_accelerators: usize, worker_index: usize) -> Device {
    if num_accelerators == 0 {
        Device::Cpu
    } else {
        Device::Accelerator(worker_index % num_accelerators)
    }
}

/// Number of workers started for a given accelerator count (at least one).
pub fn pool_size_for(num_accelerators: usize) -> usize {
    num_accelerators.max(1)
}

/// Message carried by the task channel
pub enum Task<I> {
    Predict { id: SequenceId, input: I },
    /// Stop sentinel: the worker that receives it exits after its current task
    Stop,
}

/// Message carried by the result channel
pub type TaskResult<O> = (SequenceId, Result<O>);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PredictorError {
    #[error("prediction {id} failed: {message}")]
    Prediction { id: SequenceId, message: String },

    #[error("worker panicked while predicting {id}: {message}")]
    WorkerPanicked { id: SequenceId, message: String },

    #[error("worker {worker} failed to start on {device}: {message}")]
    WorkerInit {
        worker: usize,
        device: Device,
        message: String,
    },

    #[error("nothing in flight: retrieve called without a matching submit")]
    NothingInFlight,

    #[error("all predict workers have exited")]
    Disconnected,

    #[error("predictor has been shut down")]
    ShutDown,
}

impl PredictorError {
    /// Sequence id the error belongs to, if it is tied to a single request
    pub fn sequence_id(&self) -> Option<SequenceId> {
        match self {
            PredictorError::Prediction { id, .. } | PredictorError::WorkerPanicked { id, .. } => {
                Some(*id)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PredictorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_assignment() {
        assert_eq!(device_for_worker(0, 0), Device::Cpu);
        assert_eq!(device_for_worker(0, 3), Device::Cpu);
        assert_eq!(device_for_worker(2, 0), Device::Accelerator(0));
        assert_eq!(device_for_worker(2, 1), Device::Accelerator(1));

        assert_eq!(pool_size_for(0), 1);
        assert_eq!(pool_size_for(4), 4);
    }

    #[test]
    fn test_device_display() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Accelerator(3).to_string(), "accel:3");
    }

    #[test]
    fn test_error_sequence_id() {
        let err = PredictorError::Prediction {
            id: 7,
            message: "bad input".to_string(),
        };
        assert_eq!(err.sequence_id(), Some(7));
        assert_eq!(PredictorError::Disconnected.sequence_id(), None);
    }
}
