//! Progress reporting for iterative filters.
//!
//! Every filter has a `*_with_progress` variant that reports one
//! [`ProgressStep`] after each completed iteration.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! use fairing::algo::progress::Progress;
//! use fairing::algo::smooth::{filter_taubin_with_progress, TaubinOptions};
//! use fairing::mesh::primitives;
//!
//! let steps = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&steps);
//! let progress = Progress::new(move |step| {
//!     assert_eq!(step.filter, "taubin");
//!     counter.fetch_add(1, Ordering::Relaxed);
//! });
//!
//! let mut mesh = primitives::icosphere(1, 1.0);
//! let options = TaubinOptions::default().with_iterations(4);
//! filter_taubin_with_progress(&mut mesh, &options, None, &progress).unwrap();
//! assert_eq!(steps.load(Ordering::Relaxed), 4);
//! ```

/// State of a filter after one completed iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressStep {
    /// Name of the running filter.
    pub filter: &'static str,

    /// Number of completed iterations (1-based).
    pub iteration: usize,

    /// Total number of iterations requested.
    pub total: usize,

    /// Enclosed volume before this iteration's correction, for
    /// volume-constrained runs.
    pub volume: Option<f64>,
}

impl ProgressStep {
    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.iteration as f64 / self.total as f64
        }
    }
}

/// A progress callback invoked once per filter iteration.
pub struct Progress {
    callback: Box<dyn Fn(&ProgressStep) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&ProgressStep) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report a completed iteration.
    #[inline]
    pub fn report(&self, step: &ProgressStep) {
        (self.callback)(step);
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_report_forwards_step() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |step| sink.lock().unwrap().push(*step));

        let step = ProgressStep {
            filter: "laplacian",
            iteration: 2,
            total: 4,
            volume: Some(1.5),
        };
        progress.report(&step);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[step]);
        assert_eq!(seen[0].fraction(), 0.5);
    }

    #[test]
    fn test_none_is_default() {
        let progress = Progress::default();
        progress.report(&ProgressStep {
            filter: "humphrey",
            iteration: 1,
            total: 1,
            volume: None,
        });
        assert_eq!(format!("{:?}", progress), "Progress { .. }");
    }
}
