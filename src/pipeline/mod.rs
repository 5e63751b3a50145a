//! Polling Pipeline Module
//!
//! ```text
//! 1. Acquire a frame from the camera source (blocking)
//! 2. Locate and encode faces (every `detect_every` frames, optionally downscaled)
//! 3. Name each face from the gallery, or "Unknown"
//! 4. Convert boxes to centre-relative vectors
//! 5. Publish the envelope atomically to every target
//! 6. Sleep until the next cycle (or until Ctrl+C)
//! ```

mod context;
mod poll_loop;

pub use context::{AppContext, CycleError, CycleOutcome};
pub use poll_loop::{PollLoop, PollStats};
