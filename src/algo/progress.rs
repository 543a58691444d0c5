//! Progress reporting for the remeshing pipeline.
//!
//! [`remesh_with_progress`](crate::remesh_with_progress) reports one step per
//! pipeline stage, and sub-steps while the orientation field is smoothed
//! level by level.
//!
//! # Example
//!
//! ```
//! use quadify::algo::progress::Progress;
//!
//! let progress = Progress::new(|current, total, message| {
//!     println!("[{}/{}] {}", current, total, message);
//! });
//! progress.report(0, 7, "building hierarchy");
//! ```

/// A progress callback that receives updates during long-running operations.
///
/// The callback receives:
/// - `current`: Current step (0-based)
/// - `total`: Total number of steps
/// - `message`: Description of the current operation
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Report progress within a sub-range.
    ///
    /// Maps progress from `[0, sub_total]` to `[range_current, range_current + 1]`
    /// within a total of `range_total` steps. This enables hierarchical progress
    /// where sub-operations report their progress within an allocated slice.
    ///
    /// # Example
    ///
    /// ```
    /// use quadify::algo::progress::Progress;
    ///
    /// // Step 3 of 7 is orientation smoothing, itself split into 5 levels.
    /// let progress = Progress::none();
    /// progress.report_sub(2, 5, 3, 7, "smoothing orientation field");
    /// ```
    #[inline]
    pub fn report_sub(
        &self,
        sub_current: usize,
        sub_total: usize,
        range_current: usize,
        range_total: usize,
        message: &str,
    ) {
        if sub_total == 0 || range_total == 0 {
            return;
        }
        // Map sub-progress to the range [range_current, range_current + 1)
        // Using fixed-point math to avoid floating point: multiply by 1000 for precision
        let sub_fraction = (sub_current * 1000) / sub_total;
        let effective = range_current * 1000 + sub_fraction;
        let total_scaled = range_total * 1000;
        (self.callback)(effective, total_scaled, message);
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
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
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_report_sub_scales_into_range() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |current, total, _| {
            sink.lock().unwrap().push((current, total));
        });

        progress.report_sub(1, 2, 3, 7, "half of step 3");
        progress.report_sub(1, 0, 3, 7, "ignored");

        assert_eq!(*seen.lock().unwrap(), vec![(3500, 7000)]);
    }
}
