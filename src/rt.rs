// Real-time thread promotion
// Wraps the platform pro-audio scheduling request. Promotion happens on the
// audio thread itself at first callback entry, so failures must be reported
// through a flag rather than logged in place.

use audio_thread_priority::{
    demote_current_thread_from_real_time, promote_current_thread_to_real_time, RtPriorityHandle,
};

/// Handle to a promoted thread. Demotion is explicit; dropping the guard
/// without demoting leaves the thread promoted until the host retires it.
pub struct RtGuard {
    handle: Option<RtPriorityHandle>,
}

// SAFETY: the guard is created and consumed on the audio thread; it only
// needs Send because the worker that will eventually own it is moved into
// the stream callback before any promotion has happened (the slot is still
// None at that point). On some platforms the inner handle wraps a raw OS
// thread handle that is not automatically Send.
unsafe impl Send for RtGuard {}

/// Ask the OS to move the current thread into its pro-audio scheduling
/// class, sized for the given period and rate. On platforms without such a
/// class this fails and the caller surfaces a warning; it never aborts
/// startup.
pub fn promote(period_frames: u32, sample_rate: u32) -> Result<RtGuard, String> {
    match promote_current_thread_to_real_time(period_frames, sample_rate) {
        Ok(handle) => Ok(RtGuard {
            handle: Some(handle),
        }),
        Err(err) => Err(format!("{err:?}")),
    }
}

impl RtGuard {
    /// Revert the promotion. Must run on the thread that was promoted.
    /// Failures are swallowed: the thread is being torn down anyway and
    /// this runs in callback context where logging is off limits.
    pub fn demote(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = demote_current_thread_from_real_time(handle);
        }
    }
}
