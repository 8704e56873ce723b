/// A passive report at or above this percentage marks the video complete.
pub const COMPLETION_THRESHOLD: u8 = 95;

pub fn percentage(current: f64, duration: f64) -> u8 {
    if !duration.is_finite() || duration <= 0.0 || !current.is_finite() {
        return 0;
    }

    (current / duration * 100.0).round().clamp(0.0, 100.0) as u8
}

pub fn is_completed(percentage: u8) -> bool {
    percentage >= COMPLETION_THRESHOLD
}

/// Lets a percentage through only when it moved since the last one let through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressGate {
    last_emitted: Option<u8>,
}

impl ProgressGate {
    pub fn last_emitted(&self) -> Option<u8> {
        self.last_emitted
    }

    /// Returns `true` and remembers `percentage` when it should be reported.
    pub fn admit(&mut self, percentage: u8) -> bool {
        let moved = self
            .last_emitted
            .map_or(true, |last| last.abs_diff(percentage) >= 1);

        if moved {
            self.last_emitted = Some(percentage);
        }
        moved
    }

    /// Record a percentage that was reported outside the gate.
    pub fn record(&mut self, percentage: u8) {
        self.last_emitted = Some(percentage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_and_caps() {
        assert_eq!(percentage(0.0, 300.0), 0);
        assert_eq!(percentage(1.5, 100.0), 2);
        assert_eq!(percentage(149.0, 300.0), 50);
        assert_eq!(percentage(450.0, 300.0), 100);
    }

    #[test]
    fn percentage_of_unknown_duration_is_zero() {
        assert_eq!(percentage(10.0, 0.0), 0);
        assert_eq!(percentage(10.0, f64::INFINITY), 0);
    }

    #[test]
    fn completion_threshold() {
        assert!(!is_completed(94));
        assert!(is_completed(95));
        assert!(is_completed(100));
    }

    #[test]
    fn consecutive_repeats_collapse() {
        let mut gate = ProgressGate::default();
        let emitted: Vec<u8> = [10, 10, 11, 11, 12]
            .into_iter()
            .filter(|p| gate.admit(*p))
            .collect();

        assert_eq!(emitted, vec![10, 11, 12]);
        assert_eq!(gate.last_emitted(), Some(12));
    }

    #[test]
    fn identical_percentage_is_suppressed() {
        let mut gate = ProgressGate::default();
        assert!(gate.admit(40));
        assert!(!gate.admit(40));
        assert!(gate.admit(39), "moving backwards after a seek is still a change");
    }

    #[test]
    fn recorded_percentage_suppresses_repeat() {
        let mut gate = ProgressGate::default();
        gate.record(100);
        assert!(!gate.admit(100));
    }
}
