//! Star progress bar for long passes, drawn on stderr.
//!
//! ```text
//! 0              25             50             75            100
//! |--------------|--------------|--------------|--------------|
//! ************************************************************
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of stars of a complete bar.
pub const BAR_WIDTH: usize = 60;

const HEADER: &str = "0              25             50             75            100";
const RULER: &str = "|--------------|--------------|--------------|--------------|";

/// Progress bar over a known number of steps; may be ticked from many threads.
#[derive(Debug)]
pub struct ProgressBar {
    total: usize,
    done: AtomicUsize,
    stars: AtomicUsize,
    visible: bool,
}

impl ProgressBar {
    /// Draws header and ruler and returns a bar over `total` steps.
    pub fn new(total: usize) -> Self {
        eprintln!("{HEADER}");
        eprintln!("{RULER}");
        Self::with_visibility(total, true)
    }

    /// A bar that counts but never draws.
    pub fn hidden(total: usize) -> Self {
        Self::with_visibility(total, false)
    }

    fn with_visibility(total: usize, visible: bool) -> Self {
        ProgressBar {
            total: total.max(1),
            done: AtomicUsize::new(0),
            stars: AtomicUsize::new(0),
            visible,
        }
    }

    /// Advances the bar by one step.
    pub fn tick(&self) {
        self.advance(1);
    }

    /// Advances the bar by `steps`.
    pub fn advance(&self, steps: usize) {
        let done = self.done.fetch_add(steps, Ordering::Relaxed) + steps;
        self.draw_up_to(BAR_WIDTH * done.min(self.total) / self.total);
    }

    /// Number of steps completed so far.
    pub fn position(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    /// Completes the bar and ends its line.
    pub fn finish(&self) {
        self.draw_up_to(BAR_WIDTH);
        if self.visible {
            eprintln!();
        }
    }

    fn draw_up_to(&self, target: usize) {
        let mut drawn = self.stars.load(Ordering::Relaxed);
        while drawn < target {
            match self
                .stars
                .compare_exchange(drawn, target, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => {
                    if self.visible {
                        let mut stderr = std::io::stderr().lock();
                        let _ = stderr.write_all("*".repeat(target - drawn).as_bytes());
                        let _ = stderr.flush();
                    }
                    return;
                }
                Err(current) => drawn = current,
            }
        }
    }
}
