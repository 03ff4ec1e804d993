//! Frame generations and redraw coalescing
//!
//! Every render starts a new generation. Work that finishes later (an image
//! load, a layer mask) checks its [`FrameToken`] before writing and drops its
//! result if a newer frame has begun.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic render generation counter, shared with in-flight work
#[derive(Debug, Clone, Default)]
pub struct RenderGeneration {
    counter: Arc<AtomicU64>,
}

impl RenderGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame; every older token becomes stale
    pub fn begin(&self) -> FrameToken {
        let generation = self.counter.fetch_add(1, Ordering::AcqRel) + 1;
        FrameToken {
            generation,
            counter: Arc::clone(&self.counter),
        }
    }

    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }
}

/// Handle carried by one frame's work
#[derive(Debug, Clone)]
pub struct FrameToken {
    generation: u64,
    counter: Arc<AtomicU64>,
}

impl FrameToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once a newer frame has started
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::Acquire) == self.generation
    }
}

/// Coalesces any number of state changes into one pending redraw
#[derive(Debug, Default)]
pub struct FrameRequest {
    pending: AtomicBool,
}

impl FrameRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a redraw as needed; returns true if none was pending
    pub fn request(&self) -> bool {
        !self.pending.swap(true, Ordering::AcqRel)
    }

    /// Consume the pending redraw, if any
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_frame_supersedes() {
        let generation = RenderGeneration::new();
        let first = generation.begin();
        assert!(first.is_current());
        let second = generation.begin();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert!(second.generation() > first.generation());
        assert_eq!(generation.current(), second.generation());
    }

    #[test]
    fn test_requests_coalesce() {
        let request = FrameRequest::new();
        assert!(request.request());
        assert!(!request.request());
        assert!(request.is_pending());
        assert!(request.take());
        assert!(!request.take());
    }
}
