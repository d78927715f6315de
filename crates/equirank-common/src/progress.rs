//! Progress reporting for long-running rank computations.

/// Receives progress updates from a running pipeline.
///
/// `percent` is in `0..=100`; `current_item` names the candidate being
/// processed, when there is one.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8, step: &str, current_item: Option<&str>);
}

/// Sink used by synchronous callers that don't track progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _step: &str, _current_item: Option<&str>) {}
}

/// `done / total` scaled onto `0..=span` percent, truncating.
pub fn scaled_percent(done: usize, total: usize, span: u8) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total);
    ((done as u64 * span as u64) / total as u64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_percent_truncates() {
        assert_eq!(scaled_percent(0, 3, 80), 0);
        assert_eq!(scaled_percent(1, 3, 80), 26);
        assert_eq!(scaled_percent(3, 3, 80), 80);
    }

    #[test]
    fn test_scaled_percent_empty_total() {
        assert_eq!(scaled_percent(5, 0, 80), 0);
    }

    #[test]
    fn test_scaled_percent_overshoot_is_capped() {
        assert_eq!(scaled_percent(7, 3, 80), 80);
    }
}
