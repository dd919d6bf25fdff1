// Frame drivers: turn a stream of frames into a stream of (frame, prediction)
// pairs in the original frame order.
//
// OrderedFrames keeps a fixed look-ahead window of submissions in flight so
// every worker stays busy; SyncFrames is the single-predictor path.

use crate::pipeline::dispatcher::AsyncPredictor;
use crate::pipeline::types::{PredictorError, Result};
use crate::pipeline::worker::Predictor;
use std::collections::VecDeque;
use std::iter::Fuse;
use std::marker::PhantomData;

/// Lazily pairs each frame with its prediction through an [`AsyncPredictor`].
///
/// The first pair is yielded once `buffer_size + 1` frames have been
/// submitted; after the input runs dry the remaining window is drained. Each
/// frame is yielded exactly once, in input order.
///
/// The window never waits on a full task queue: when the pool cannot take
/// the next frame yet, the oldest frame is yielded first and the new frame is
/// held back until the next call. A window deeper than the channels can hold
/// therefore degrades to the channel capacity instead of blocking.
pub struct OrderedFrames<'a, S, F, O>
where
    S: Iterator<Item = F>,
{
    predictor: &'a mut AsyncPredictor<F, O>,
    source: Fuse<S>,
    window: VecDeque<F>,
    /// Frame pulled from the source but not yet submitted
    held: Option<F>,
    buffer_size: usize,
    submitted: usize,
    failed: bool,
}

impl<'a, S, F, O> OrderedFrames<'a, S, F, O>
where
    S: Iterator<Item = F>,
    F: Clone + Send + 'static,
    O: Send + 'static,
{
    pub fn new(predictor: &'a mut AsyncPredictor<F, O>, source: S, buffer_size: usize) -> Self {
        Self {
            predictor,
            source: source.fuse(),
            window: VecDeque::with_capacity(buffer_size + 1),
            held: None,
            buffer_size,
            submitted: 0,
            failed: false,
        }
    }

    /// Frames submitted but not yet yielded
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn predictor(&self) -> &AsyncPredictor<F, O> {
        &*self.predictor
    }

    fn pop_ready(&mut self) -> Option<(F, Result<O>)> {
        let frame = self.window.pop_front()?;
        let prediction = self.predictor.retrieve();
        Some((frame, prediction))
    }
}

impl<'a, S, F, O> Iterator for OrderedFrames<'a, S, F, O>
where
    S: Iterator<Item = F>,
    F: Clone + Send + 'static,
    O: Send + 'static,
{
    type Item = (F, Result<O>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while let Some(frame) = self.held.take().or_else(|| self.source.next()) {
            if !self.window.is_empty() && !self.predictor.has_queue_room() {
                tracing::trace!(
                    "Task queue full with {} frames in flight, yielding early",
                    self.window.len()
                );
                self.held = Some(frame);
                return self.pop_ready();
            }

            let cnt = self.submitted;
            if let Err(e) = self.predictor.submit(frame.clone()) {
                tracing::error!("Failed to submit frame {}: {}", cnt, e);
                self.failed = true;
                return Some((frame, Err(e)));
            }
            self.window.push_back(frame);
            self.submitted += 1;

            if cnt >= self.buffer_size {
                return self.pop_ready();
            }
        }

        // Input exhausted: drain what is still in flight
        self.pop_ready()
    }
}

impl<F, O> AsyncPredictor<F, O>
where
    F: Clone + Send + 'static,
    O: Send + 'static,
{
    /// Drive `frames` through the pool with a look-ahead of `buffer_size`.
    pub fn run_buffered<S>(&mut self, frames: S, buffer_size: usize) -> OrderedFrames<'_, S, F, O>
    where
        S: Iterator<Item = F>,
    {
        OrderedFrames::new(self, frames, buffer_size)
    }

    /// Drive `frames` with the default look-ahead (`pool_size × 5`).
    pub fn run_ordered<S>(&mut self, frames: S) -> OrderedFrames<'_, S, F, O>
    where
        S: Iterator<Item = F>,
    {
        let buffer_size = self.default_buffer_size();
        OrderedFrames::new(self, frames, buffer_size)
    }
}

/// Frame-by-frame driver over a predictor living on the caller's thread.
pub struct SyncFrames<S, P, O> {
    source: S,
    predictor: P,
    next_id: u64,
    _output: PhantomData<fn() -> O>,
}

impl<S, P, O> SyncFrames<S, P, O> {
    pub fn new(predictor: P, source: S) -> Self {
        Self {
            source,
            predictor,
            next_id: 1,
            _output: PhantomData,
        }
    }
}

impl<S, F, O, P> Iterator for SyncFrames<S, P, O>
where
    S: Iterator<Item = F>,
    F: Clone,
    P: Predictor<F, O>,
{
    type Item = (F, Result<O>);

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.source.next()?;
        let id = self.next_id;
        self.next_id += 1;

        let prediction = self
            .predictor
            .predict(frame.clone())
            .map_err(|e| PredictorError::Prediction {
                id,
                message: format!("{:#}", e),
            });
        Some((frame, prediction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dispatcher::PredictorConfig;
    use std::thread;
    use std::time::Duration;

    fn square_pool(num_accelerators: usize) -> AsyncPredictor<usize, usize> {
        let config = PredictorConfig {
            num_accelerators,
            ..Default::default()
        };
        AsyncPredictor::new(&config, |_device| {
            Ok(|x: usize| -> anyhow::Result<usize> {
                // Later frames finish sooner so workers complete out of order
                thread::sleep(Duration::from_micros(((20 - x % 20) * 100) as u64));
                Ok(x * x)
            })
        })
        .unwrap()
    }

    #[test]
    fn test_buffered_yields_every_frame_in_order() {
        let mut predictor = square_pool(2);
        let out: Vec<_> = predictor.run_buffered(0..15usize, 10).collect();

        assert_eq!(out.len(), 15);
        assert_eq!(out.first().map(|(f, _)| *f), Some(0));
        assert_eq!(out.last().map(|(f, _)| *f), Some(14));
        for (i, (frame, prediction)) in out.into_iter().enumerate() {
            assert_eq!(frame, i);
            assert_eq!(prediction.unwrap(), i * i);
        }
        assert_eq!(predictor.in_flight(), 0);
    }

    #[test]
    fn test_window_fills_before_first_yield() {
        let mut predictor = square_pool(1);
        let mut frames = predictor.run_buffered(0..8usize, 2);

        let (first, _) = frames.next().unwrap();
        assert_eq!(first, 0);
        // 3 submitted, 1 yielded
        assert_eq!(frames.window_len(), 2);
        assert_eq!(frames.predictor().in_flight(), 2);

        let rest: Vec<_> = frames.map(|(f, _)| f).collect();
        assert_eq!(rest, (1..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_short_input_is_drained() {
        let mut predictor = square_pool(2);
        let buffer_size = predictor.default_buffer_size();
        assert_eq!(buffer_size, 10);

        let out: Vec<_> = predictor
            .run_ordered(0..4usize)
            .map(|(f, p)| (f, p.unwrap()))
            .collect();
        assert_eq!(out, vec![(0, 0), (1, 1), (2, 4), (3, 9)]);

        let empty: Vec<_> = predictor.run_ordered(std::iter::empty()).collect();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_window_deeper_than_queue_on_single_worker() {
        let mut predictor = square_pool(1);
        assert_eq!(predictor.queue_capacity(), 3);

        let mut frames = predictor.run_buffered(0..15usize, 10);
        let mut out = Vec::new();
        while let Some((frame, prediction)) = frames.next() {
            assert!(frames.predictor().in_flight() <= 10);
            out.push((frame, prediction.unwrap()));
        }

        assert_eq!(out.len(), 15);
        for (i, (frame, squared)) in out.into_iter().enumerate() {
            assert_eq!(frame, i);
            assert_eq!(squared, i * i);
        }
        assert_eq!(predictor.in_flight(), 0);
    }

    #[test]
    fn test_submit_failure_fuses_iterator() {
        let mut predictor = square_pool(1);
        predictor.shutdown();

        let mut frames = predictor.run_buffered(0..5usize, 2);
        let (frame, prediction) = frames.next().unwrap();
        assert_eq!(frame, 0);
        assert_eq!(prediction, Err(PredictorError::ShutDown));
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_sync_frames() {
        let predictor = |x: i32| -> anyhow::Result<i32> {
            if x == 2 {
                anyhow::bail!("frame two is corrupt");
            }
            Ok(-x)
        };
        let out: Vec<(i32, Result<i32>)> = SyncFrames::new(predictor, 0..4).collect();

        assert_eq!(out.len(), 4);
        assert_eq!(out[0], (0, Ok(0)));
        assert_eq!(out[1], (1, Ok(-1)));
        assert_eq!(
            out[2],
            (
                2,
                Err(PredictorError::Prediction {
                    id: 3,
                    message: "frame two is corrupt".to_string()
                })
            )
        );
        assert_eq!(out[3], (3, Ok(-3)));
    }
}
