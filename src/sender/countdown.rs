//! Cancellable countdown between sends

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Moves the cursor to the start of the line before each countdown step
const CURSOR_LINE_START: &str = "\u{1b}[1000D";

/// Shared stop flag for the send loop
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Block for `ticks` steps of `tick`, printing the remaining count after
/// each step. Stops early once `cancel` fires.
///
/// Returns true if the full wait elapsed.
pub fn wait_with_countdown(
    ticks: u64,
    tick: Duration,
    cancel: &CancelToken,
    out: &mut dyn Write,
) -> bool {
    let mut completed = true;
    for remaining in (0..ticks).rev() {
        if cancel.is_cancelled() {
            completed = false;
            break;
        }
        thread::sleep(tick);
        // countdown output is cosmetic, a closed stdout must not stop the loop
        let _ = write!(out, "{}Waiting {} seconds", CURSOR_LINE_START, remaining);
        let _ = out.flush();
    }
    let _ = writeln!(out);
    completed
}
