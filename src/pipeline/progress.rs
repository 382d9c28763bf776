//! Progress reporting

use crate::document::Chapter;

use super::cancel::RunToken;

/// Integer percentage of completed pages, rounded down
///
/// Only `completed == total` yields 100.
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((completed * 100) / total) as u8
}

/// Receives a run's intermediate results
///
/// Implementations must drop calls whose token is no longer the active run.
pub trait RunObserver: Send + Sync {
    fn chapters(&self, token: &RunToken, chapters: &[Chapter]);

    fn progress(&self, token: &RunToken, percent: u8);
}
