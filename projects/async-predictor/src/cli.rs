use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image file or directory of frames to process
    #[arg(long, env = "ASYNC_PREDICTOR_INPUT")]
    pub input: PathBuf,

    /// Root directory for run outputs
    #[arg(long, env = "ASYNC_PREDICTOR_OUTPUT_ROOT")]
    pub output: PathBuf,

    /// Accelerators to spread predict workers over (0 runs one CPU worker)
    #[arg(long, env = "ASYNC_PREDICTOR_NUM_ACCELERATORS")]
    pub num_accelerators: Option<usize>,

    /// Run the model in a worker pool instead of on the main thread
    #[arg(long, default_value_t = false)]
    pub parallel: bool,

    /// Look-ahead depth for the parallel driver (defaults to 5 per worker)
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// JSON demo config (detector, predictor pool, filtering)
    #[arg(long, env = "ASYNC_PREDICTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip writing annotated frames, only record detections
    #[arg(long, default_value_t = false)]
    pub no_frames: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
