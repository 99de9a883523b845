//! Frame-deferred scheduling

use std::sync::Arc;

/// Work queued for the next rendering opportunity
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// The next-frame primitive (`requestAnimationFrame` on the web).
///
/// Callers cannot await completion; tests substitute a scheduler they can
/// flush deterministically.
pub trait FrameScheduler: Send + Sync {
    /// Run `callback` at the next rendering opportunity
    fn request_frame(&self, callback: FrameCallback);
}

/// Run `callback` after `depth` chained frames.
///
/// Each frame requests the next from inside its own callback, so the work
/// lands after any mutation made during the first frame. A depth of zero
/// runs the callback inline.
pub fn render_in_the_loop(scheduler: Arc<dyn FrameScheduler>, depth: u8, callback: FrameCallback) {
    match depth {
        0 => callback(),
        1 => scheduler.request_frame(callback),
        _ => {
            let next = Arc::clone(&scheduler);
            scheduler.request_frame(Box::new(move || {
                render_in_the_loop(next, depth - 1, callback);
            }));
        }
    }
}
