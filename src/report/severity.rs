//! Ternary classification of absolute rating errors
//!
//! Bands on the [-10, 10] rating scale: below 3 is low, [3, 6) is medium,
//! 6 and above is high. The thresholds are fixed.

use std::fmt;

use ndarray::Array2;

/// Lower bound of the medium band
pub const MEDIUM_THRESHOLD: f32 = 3.0;
/// Lower bound of the high band
pub const HIGH_THRESHOLD: f32 = 6.0;

/// Error severity label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn classify(abs_error: f32) -> Self {
        if abs_error < MEDIUM_THRESHOLD {
            Severity::Low
        } else if abs_error < HIGH_THRESHOLD {
            Severity::Medium
        } else {
            Severity::High
        }
    }

    /// Table label
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "a",
            Severity::Medium => "b",
            Severity::High => "c",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn classify_matrix(abs_errors: &Array2<f32>) -> Array2<Severity> {
    abs_errors.mapv(Severity::classify)
}

/// Number of cells per label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl SeverityCounts {
    pub fn from_matrix(labels: &Array2<Severity>) -> Self {
        let mut counts = SeverityCounts::default();
        for label in labels {
            match label {
                Severity::Low => counts.low += 1,
                Severity::Medium => counts.medium += 1,
                Severity::High => counts.high += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }

    /// Shares of low, medium and high in percent
    pub fn percentages(&self) -> (f64, f64, f64) {
        let total = self.total();
        if total == 0 {
            return (0.0, 0.0, 0.0);
        }
        let pct = |n: usize| n as f64 / total as f64 * 100.0;
        (pct(self.low), pct(self.medium), pct(self.high))
    }
}

impl fmt::Display for SeverityCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b, c) = self.percentages();
        write!(
            f,
            "a: {} ({:.3}%)  b: {} ({:.3}%)  c: {} ({:.3}%)",
            self.low, a, self.medium, b, self.high, c
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(Severity::classify(0.0), Severity::Low);
        assert_eq!(Severity::classify(2.999), Severity::Low);
        assert_eq!(Severity::classify(3.0), Severity::Medium);
        assert_eq!(Severity::classify(5.999), Severity::Medium);
        assert_eq!(Severity::classify(6.0), Severity::High);
        assert_eq!(Severity::classify(20.0), Severity::High);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Severity::Low.to_string(), "a");
        assert_eq!(Severity::Medium.label(), "b");
        assert_eq!(Severity::High.label(), "c");
    }

    #[test]
    fn test_counts() {
        let labels = classify_matrix(&array![[0.5, 3.0, 7.0], [6.0, 1.0, 2.0]]);
        let counts = SeverityCounts::from_matrix(&labels);

        assert_eq!(
            counts,
            SeverityCounts {
                low: 3,
                medium: 1,
                high: 2
            }
        );
        assert_eq!(counts.total(), 6);
        let (a, b, c) = counts.percentages();
        assert!((a - 50.0).abs() < 1e-9);
        assert!((b + c - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_percentages() {
        assert_eq!(SeverityCounts::default().percentages(), (0.0, 0.0, 0.0));
    }
}
