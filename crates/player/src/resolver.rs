use crate::cache::CacheSession;
use crate::time::{BaseFrame, PositionRequest, TimeRange, TimeUnit};

/// Outcome of resolving a requested position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPosition {
    /// Canonical time, inside the cache's time range.
    pub time: f64,
    /// External frame number; `None` when the request left the frame untouched.
    pub frame: Option<i64>,
    /// Whether blending between snapshots makes sense at this position.
    pub interpolation_eligible: bool,
}

/// Converts seconds, normalized time and frame numbers into a canonical
/// position for one opened cache.
#[derive(Debug)]
pub struct TimeResolver<'a, S: ?Sized> {
    session: &'a S,
    range: TimeRange,
    unit: TimeUnit,
    base_frame: BaseFrame,
}

impl<'a, S> TimeResolver<'a, S>
where
    S: CacheSession + ?Sized,
{
    pub fn new(session: &'a S, range: TimeRange, unit: TimeUnit, base_frame: BaseFrame) -> Self {
        Self {
            session,
            range,
            unit,
            base_frame,
        }
    }

    /// Resolves `request` under the current unit.
    ///
    /// Normalized requests are scaled by `range.end`, not by the range
    /// duration. In seconds, time requests only clamp the time. In frames,
    /// every request snaps to a frame and the time is taken from that frame.
    /// Times map to the cache's own frame number, which is then clamped
    /// to the external bounds; the offset is only removed on the way back.
    pub fn resolve(&self, request: PositionRequest) -> ResolvedPosition {
        match (self.unit, request) {
            (TimeUnit::Seconds, PositionRequest::Time(time)) => self.continuous(time),
            (TimeUnit::Seconds, PositionRequest::Normalized(value)) => {
                self.continuous(self.scale_normalized(value))
            }
            (TimeUnit::Seconds, PositionRequest::Frame(frame)) => {
                let frame = self.clamp_frame(frame);
                ResolvedPosition {
                    time: self.time_of_frame(frame),
                    frame: Some(frame),
                    interpolation_eligible: true,
                }
            }
            (TimeUnit::Frames, PositionRequest::Time(time)) => {
                self.discrete(self.frame_at(time))
            }
            (TimeUnit::Frames, PositionRequest::Normalized(value)) => {
                self.discrete(self.frame_at(self.scale_normalized(value)))
            }
            (TimeUnit::Frames, PositionRequest::Frame(frame)) => self.discrete(frame),
        }
    }

    /// Clamps an external frame number to `[base, count - 1 + base]`.
    pub fn clamp_frame(&self, frame: i64) -> i64 {
        let offset = self.base_frame.offset();
        let count = self.session.snapshot_count() as i64;
        if count <= 0 {
            return offset;
        }
        frame.clamp(offset, count - 1 + offset)
    }

    /// Cache frame index of the snapshot shown at `time`, without the
    /// base frame offset.
    pub fn frame_at(&self, time: f64) -> i64 {
        let time = self.range.clamp(time);
        self.session.time_to_frame(time) as i64
    }

    /// Time of external frame `frame`, after clamping it.
    pub fn time_of_frame(&self, frame: i64) -> f64 {
        let index = self.clamp_frame(frame) - self.base_frame.offset();
        self.range
            .clamp(self.session.frame_to_time(index.max(0) as usize))
    }

    fn scale_normalized(&self, value: f64) -> f64 {
        value * self.range.end
    }

    fn continuous(&self, time: f64) -> ResolvedPosition {
        ResolvedPosition {
            time: self.range.clamp(time),
            frame: None,
            interpolation_eligible: true,
        }
    }

    fn discrete(&self, frame: i64) -> ResolvedPosition {
        let frame = self.clamp_frame(frame);
        ResolvedPosition {
            time: self.time_of_frame(frame),
            frame: Some(frame),
            interpolation_eligible: false,
        }
    }
}
