/// Cooperative shutdown signal shared by the tray, OS signal handlers and the loop.
///
/// One-shot: once raised it stays raised. Writers only ever set it, the loop
/// only ever reads it between ticks.
///
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of the interruptible sleep between ticks
const WAIT_SLICE: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for up to `timeout`, returning early (true) once the signal is raised.
    /// A timeout past what `Instant` can represent waits for the signal alone.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.is_raised() {
                return true;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    WAIT_SLICE.min(deadline - now)
                }
                None => WAIT_SLICE,
            };
            thread::sleep(slice);
        }
    }

    /// Route Ctrl-C / SIGTERM (and SIGQUIT on Unix) into this signal
    pub fn register_os_signals(&self) -> io::Result<()> {
        for signal in signal_hook::consts::TERM_SIGNALS {
            signal_hook::flag::register(*signal, Arc::clone(&self.flag))?;
        }
        Ok(())
    }
}
