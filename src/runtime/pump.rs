//! Caller-side event servicing during a synchronous run

/// What the caller's event loop saw while it was serviced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// Keep waiting for the run
    Continue,
    /// The whole host process is shutting down; stop waiting now
    Quit,
}

/// Hook that services the caller's own event queue while it waits on a run
///
/// Called repeatedly from [`CmdEngine::run_blocking`](crate::CmdEngine::run_blocking)
/// between completion checks. An implementation should dispatch whatever
/// work is pending and return quickly. A quit request that only concerns the
/// caller itself should be kept aside until the run completes; return
/// [`PumpStatus::Quit`] only for a shutdown of the whole host process.
pub trait EventPump {
    fn pump(&mut self) -> PumpStatus;
}

/// Pump for callers without an event queue
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPump;

impl EventPump for NoPump {
    fn pump(&mut self) -> PumpStatus {
        PumpStatus::Continue
    }
}

impl<F> EventPump for F
where
    F: FnMut() -> PumpStatus,
{
    fn pump(&mut self) -> PumpStatus {
        self()
    }
}
