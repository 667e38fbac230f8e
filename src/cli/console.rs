//! Terminal progress surface

use crate::runtime::surface::{
    ActivityOptions, CancelHandle, CancelSurface, ProcessWatch, ProgressSurface,
};
use async_trait::async_trait;
use colored::Colorize;
use std::io::Write;
use std::time::{Duration, Instant};

/// Prints the activity header on stderr once a run outlives its reveal
/// delay, then an elapsed-time line on every refresh; cancellable through
/// its [`CancelHandle`]
#[derive(Debug, Clone, Default)]
pub struct ConsoleSurface {
    inner: CancelSurface,
    quiet: bool,
}

impl ConsoleSurface {
    pub fn new(handle: CancelHandle, quiet: bool) -> Self {
        Self {
            inner: CancelSurface::new(handle),
            quiet,
        }
    }

    pub fn handle(&self) -> &CancelHandle {
        self.inner.handle()
    }
}

#[async_trait]
impl ProgressSurface for ConsoleSurface {
    async fn show(&self, mut process: ProcessWatch, options: ActivityOptions) -> bool {
        let started = Instant::now();

        // hidden phase
        tokio::select! {
            biased;
            cancelled = self.inner.wait(&mut process) => return cancelled,
            _ = tokio::time::sleep(options.reveal_delay) => {}
        }

        if !self.quiet {
            eprintln!("{}", options.header.bold());
        }

        let period = options.timeout.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let cancelled = loop {
            tokio::select! {
                biased;
                cancelled = self.inner.wait(&mut process) => break cancelled,
                _ = ticker.tick() => {
                    if !self.quiet {
                        eprint!(
                            "\r{} {:.1}s (Ctrl-C to cancel)",
                            "Running".cyan(),
                            started.elapsed().as_secs_f64()
                        );
                        let _ = std::io::stderr().flush();
                    }
                }
            }
        };

        if !self.quiet && started.elapsed() >= options.reveal_delay + period {
            eprintln!();
        }
        if cancelled && !self.quiet {
            eprintln!("{}", "Cancelled".yellow());
        }
        cancelled
    }
}
