// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::time::Duration;

/// A linear volume transition from a start value to a target over a duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    start: f32,
    target: f32,
    started_at: Duration,
    duration: Duration,
}

impl Envelope {
    pub fn new(start: f32, target: f32, started_at: Duration, duration: Duration) -> Envelope {
        Envelope {
            start,
            target,
            started_at,
            duration,
        }
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Progress through the transition, clamped to [0, 1].
    pub fn progress(&self, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.started_at);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0) as f32
    }

    /// The interpolated volume at the given time.
    pub fn value_at(&self, now: Duration) -> f32 {
        let progress = self.progress(now);
        if progress >= 1.0 {
            return self.target;
        }
        let value = self.start + (self.target - self.start) * progress;
        // Rounding must not carry the value past either end.
        value.clamp(self.start.min(self.target), self.start.max(self.target))
    }

    pub fn is_complete(&self, now: Duration) -> bool {
        self.progress(now) >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_interpolation() {
        let envelope = Envelope::new(20.0, 60.0, Duration::from_secs(10), Duration::from_secs(4));
        assert_eq!(envelope.value_at(Duration::from_secs(10)), 20.0);
        assert_eq!(envelope.value_at(Duration::from_secs(11)), 30.0);
        assert_eq!(envelope.value_at(Duration::from_secs(12)), 40.0);
        assert_eq!(envelope.value_at(Duration::from_secs(14)), 60.0);
        assert!(envelope.is_complete(Duration::from_secs(14)));
        assert!(!envelope.is_complete(Duration::from_millis(13999)));
    }

    #[test]
    fn test_progress_is_clamped() {
        let envelope = Envelope::new(80.0, 40.0, Duration::from_secs(5), Duration::from_secs(2));
        assert_eq!(envelope.progress(Duration::from_secs(1)), 0.0);
        assert_eq!(envelope.progress(Duration::from_secs(100)), 1.0);
        assert_eq!(envelope.value_at(Duration::from_secs(100)), 40.0);
    }

    #[test]
    fn test_zero_duration_is_complete() {
        let envelope = Envelope::new(10.0, 90.0, Duration::ZERO, Duration::ZERO);
        assert!(envelope.is_complete(Duration::ZERO));
        assert_eq!(envelope.value_at(Duration::ZERO), 90.0);
    }
}
