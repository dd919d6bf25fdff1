// Order-preserving predict pipeline: bounded task/result channels, a pool of
// device-bound workers, and a reorder buffer in front of the caller.

pub mod dispatcher;
pub mod driver;
pub mod reorder;
pub mod types;
pub mod worker;

pub use dispatcher::{AsyncPredictor, PredictorConfig};
pub use driver::{OrderedFrames, SyncFrames};
pub use types::{Device, PredictorError, SequenceId};
pub use worker::Predictor;
