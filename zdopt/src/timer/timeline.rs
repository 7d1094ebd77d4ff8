use std::sync::Arc;

use tracing::debug;

use super::keyframe::{KeyFrame, KeyFrameAction};
use crate::error::TimerError;
use crate::pool::{GenericPool, Pooled};

/// Outcome of advancing a timeline.
pub enum Advance {
    /// Not running, or a non-positive delta.
    Idle,
    /// Still running; these actions are due now.
    Fired(Vec<KeyFrameAction>),
    /// Passed the end of a looping timeline and wrapped around.
    Looped,
    /// Passed the end of a one-shot timeline; keyframes were released.
    Finished,
}

/// Keyframes on a clock.
///
/// A keyframe fires once `current >= time - offset`. Past `max + offset`
/// a looping timeline wraps by `max` and re-arms every keyframe, while a
/// one-shot timeline stops and returns its keyframes to the pool.
pub struct Timeline {
    pool: Arc<GenericPool<KeyFrame>>,
    frames: Vec<Pooled<KeyFrame>>,
    offset: f32,
    current: f32,
    max: f32,
    looping: bool,
    running: bool,
}

impl Timeline {
    pub fn new(pool: Arc<GenericPool<KeyFrame>>, offset: f32) -> Result<Self, TimerError> {
        if !(offset > 0.0) {
            return Err(TimerError::InvalidOffset(offset));
        }
        Ok(Self {
            pool,
            frames: Vec::new(),
            offset,
            current: 0.0,
            max: 0.0,
            looping: false,
            running: false,
        })
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn add(&mut self, time: f32, action: KeyFrameAction) -> Result<(), TimerError> {
        if self.running {
            return Err(TimerError::AlreadyRunning);
        }
        if !(time > 0.0) {
            return Err(TimerError::InvalidTime(time));
        }

        let mut frame = self.pool.get();
        frame.set(time, action);
        self.frames.push(frame);
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), TimerError> {
        if self.running {
            return Err(TimerError::AlreadyRunning);
        }
        if self.frames.is_empty() {
            return Err(TimerError::NoKeyFrames);
        }

        self.current = 0.0;
        self.max = self.frames.iter().map(|f| f.time).fold(0.0, f32::max);
        for frame in &mut self.frames {
            frame.reset();
        }
        self.running = true;
        Ok(())
    }

    pub fn advance(&mut self, delta: f32) -> Advance {
        if !self.running || !(delta > 0.0) {
            return Advance::Idle;
        }

        self.current += delta;
        if self.current > self.max + self.offset {
            if self.looping {
                self.current -= self.max;
                for frame in &mut self.frames {
                    frame.reset();
                }
                debug!(current = self.current, "timeline looped");
                return Advance::Looped;
            }

            self.running = false;
            if let Err(e) = self.release_frames() {
                debug!(error = %e, "keyframe release failed");
            }
            return Advance::Finished;
        }

        let threshold = self.current + self.offset;
        let due = self
            .frames
            .iter_mut()
            .filter(|frame| !frame.triggered && threshold >= frame.time)
            .filter_map(|frame| frame.trigger())
            .collect();
        Advance::Fired(due)
    }

    /// Rewind to zero and re-arm every keyframe. The running state is kept.
    pub fn reset(&mut self) {
        self.current = 0.0;
        for frame in &mut self.frames {
            frame.reset();
        }
    }

    /// Stop and return every keyframe to the pool.
    pub fn stop(&mut self) -> Result<(), TimerError> {
        self.running = false;
        self.release_frames()
    }

    fn release_frames(&mut self) -> Result<(), TimerError> {
        let mut first_error = None;
        for frame in self.frames.drain(..) {
            if let Err(e) = self.pool.release_obj(frame) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    /// Fraction of the timeline covered so far.
    pub fn progress(&self) -> f32 {
        if self.max == 0.0 {
            0.0
        } else {
            self.current / self.max
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
