use crate::cache::CacheSession;

/// What one [`PreloadController::sync`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadSync {
    /// Window length pushed to the session, if it changed.
    pub pushed_length: Option<usize>,
    pub from_frame: usize,
}

/// Owns the decode-ahead window and keeps the session's copy current.
///
/// A length of zero means no look-ahead; it still gets pushed and still
/// triggers a preload of the current frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadController {
    length: usize,
    pushed: Option<usize>,
}

impl PreloadController {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            pushed: None,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn set_length(&mut self, length: usize) {
        self.length = length;
    }

    /// True when the window changed since it was last pushed.
    pub fn needs_push(&self) -> bool {
        self.pushed != Some(self.length)
    }

    /// Pushes the window length if it changed, then asks the session to
    /// preload from `current_frame`.
    pub fn sync<S>(&mut self, session: &mut S, current_frame: usize) -> PreloadSync
    where
        S: CacheSession + ?Sized,
    {
        let pushed_length = if self.needs_push() {
            session.set_preload_length(self.length);
            self.pushed = Some(self.length);
            Some(self.length)
        } else {
            None
        };
        session.preload(current_frame);
        PreloadSync {
            pushed_length,
            from_frame: current_frame,
        }
    }

    /// Forgets what was pushed, so the next sync pushes again.
    pub fn reset(&mut self) {
        self.pushed = None;
    }
}

impl Default for PreloadController {
    fn default() -> Self {
        Self::new(1)
    }
}
