use serde::{Deserialize, Serialize};

/// Playable span of an opened cache, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// Creates a range, swapping the bounds if they are reversed.
    ///
    /// # Example
    /// ```
    /// use player::TimeRange;
    ///
    /// let range = TimeRange::new(4.0, 1.0);
    /// assert_eq!((range.start, range.end), (1.0, 4.0));
    /// ```
    pub fn new(start: f64, end: f64) -> Self {
        if end < start {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    /// Clamps `time` into the range.
    ///
    /// # Example
    /// ```
    /// use player::TimeRange;
    ///
    /// let range = TimeRange::new(0.0, 10.0);
    /// assert_eq!(range.clamp(12.5), 10.0);
    /// assert_eq!(range.clamp(-1.0), 0.0);
    /// ```
    pub fn clamp(&self, time: f64) -> f64 {
        if time.is_nan() {
            return self.start;
        }
        time.clamp(self.start, self.end)
    }
}

/// How the playback position is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    /// Continuous time; interpolation between snapshots is allowed.
    #[default]
    Seconds,
    /// Discrete snapshot indices; interpolation is always off.
    Frames,
}

/// Offset between external frame numbers and zero-based snapshot indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseFrame {
    Zero,
    #[default]
    One,
}

impl BaseFrame {
    pub fn offset(self) -> i64 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

/// A requested play position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionRequest {
    /// Absolute time in seconds.
    Time(f64),
    /// Fraction scaled by the end of the cache's time range.
    Normalized(f64),
    /// External frame number, including the base frame offset.
    Frame(i64),
}

/// Current playback position owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackPosition {
    /// Canonical position in seconds.
    pub time: f64,
    /// External frame number. Only refreshed while the unit is frames.
    pub frame: i64,
    /// Last requested fraction; informational only.
    pub normalized_time: f64,
    pub interpolation: bool,
}

impl Default for PlaybackPosition {
    fn default() -> Self {
        Self {
            time: 0.0,
            frame: 1,
            normalized_time: 0.0,
            interpolation: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BaseFrame, TimeRange};

    #[test]
    fn clamp_maps_nan_to_range_start() {
        let range = TimeRange::new(2.0, 3.0);
        assert_eq!(range.clamp(f64::NAN), 2.0);
    }

    #[test]
    fn base_frame_offsets_match_numbering() {
        assert_eq!(BaseFrame::Zero.offset(), 0);
        assert_eq!(BaseFrame::One.offset(), 1);
    }
}
