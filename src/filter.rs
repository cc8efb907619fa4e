//! Class-aware confidence filtering.
//!
//! The primary-subject label gets a low acceptance threshold (a missed
//! subject costs more than a false box); every other label uses a much
//! higher one. The surviving list is then capped for display, keeping the
//! engine's ranking order.

use crate::detect::{FilteredDetection, RawDetection};

pub const DEFAULT_PRIMARY_LABEL: &str = "person";
pub const DEFAULT_PRIMARY_THRESHOLD: f32 = 0.01;
pub const DEFAULT_OTHER_THRESHOLD: f32 = 0.10;
pub const DEFAULT_MAX_DISPLAY: usize = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct ResultFilter {
    primary_label: String,
    primary_threshold: f32,
    other_threshold: f32,
    max_display: usize,
}

impl ResultFilter {
    pub fn new(
        primary_label: impl Into<String>,
        primary_threshold: f32,
        other_threshold: f32,
        max_display: usize,
    ) -> Self {
        Self {
            primary_label: primary_label.into(),
            primary_threshold,
            other_threshold,
            max_display,
        }
    }

    /// Labels are compared case-insensitively.
    pub fn is_primary(&self, label: &str) -> bool {
        label.eq_ignore_ascii_case(&self.primary_label)
    }

    pub fn threshold_for(&self, label: &str) -> f32 {
        if self.is_primary(label) {
            self.primary_threshold
        } else {
            self.other_threshold
        }
    }

    pub fn filter(&self, detections: Vec<RawDetection>) -> Vec<FilteredDetection> {
        detections
            .into_iter()
            .filter(|d| d.score >= self.threshold_for(&d.label))
            .take(self.max_display)
            .collect()
    }
}

impl Default for ResultFilter {
    fn default() -> Self {
        Self::new(
            DEFAULT_PRIMARY_LABEL,
            DEFAULT_PRIMARY_THRESHOLD,
            DEFAULT_OTHER_THRESHOLD,
            DEFAULT_MAX_DISPLAY,
        )
    }
}
