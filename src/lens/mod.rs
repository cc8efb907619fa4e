//! Camera selection.
//!
//! - `select_lens`: pick the widest rear lens from what the device reports.
//! - `ZoomController`: zoom ratio and preview scale, folded into the display
//!   transform as a scale about the display center.

mod zoom;

pub use zoom::{ZoomController, WIDE_ANGLE_PREVIEW_SCALE};

use std::fmt;

/// Platform camera identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LensId(pub String);

impl LensId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LensId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LensFacing {
    Front,
    Back,
    External,
}

/// What the platform reports about one camera.
#[derive(Clone, Debug, PartialEq)]
pub struct LensInfo {
    pub id: LensId,
    pub facing: LensFacing,
    /// Available focal lengths in millimetres. May be empty.
    pub focal_lengths: Vec<f32>,
}

impl LensInfo {
    pub fn new(id: impl Into<String>, facing: LensFacing, focal_lengths: Vec<f32>) -> Self {
        Self {
            id: LensId::new(id),
            facing,
            focal_lengths,
        }
    }

    /// Shortest reported focal length, if any valid one exists.
    pub fn min_focal_length(&self) -> Option<f32> {
        self.focal_lengths
            .iter()
            .copied()
            .filter(|f| f.is_finite() && *f > 0.0)
            .reduce(f32::min)
    }
}

/// Pick the rear lens with the shortest minimum focal length (the widest
/// field of view).
///
/// Falls back to the first rear lens when no rear lens reports a usable focal
/// length. Returns `None` only when the device has no rear lens at all.
pub fn select_lens(available: &[LensInfo]) -> Option<LensId> {
    let mut rear = available.iter().filter(|l| l.facing == LensFacing::Back);
    let default = rear.clone().next()?;

    let mut best: Option<(&LensInfo, f32)> = None;
    for lens in rear.by_ref() {
        let Some(focal) = lens.min_focal_length() else {
            continue;
        };
        match best {
            Some((_, shortest)) if focal >= shortest => {}
            _ => best = Some((lens, focal)),
        }
    }

    let chosen = best.map(|(lens, _)| lens).unwrap_or(default);
    log::debug!(
        "selected lens {} (default rear lens {})",
        chosen.id,
        default.id
    );
    Some(chosen.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_shortest_rear_focal_length() {
        let lenses = vec![
            LensInfo::new("0", LensFacing::Back, vec![4.7]),
            LensInfo::new("1", LensFacing::Front, vec![1.2]),
            LensInfo::new("2", LensFacing::Back, vec![6.0, 2.2]),
            LensInfo::new("3", LensFacing::Back, vec![9.0]),
        ];
        assert_eq!(select_lens(&lenses), Some(LensId::new("2")));
    }

    #[test]
    fn ties_keep_the_first() {
        let lenses = vec![
            LensInfo::new("a", LensFacing::Back, vec![2.2]),
            LensInfo::new("b", LensFacing::Back, vec![2.2]),
        ];
        assert_eq!(select_lens(&lenses), Some(LensId::new("a")));
    }

    #[test]
    fn falls_back_to_first_rear_lens() {
        let lenses = vec![
            LensInfo::new("front", LensFacing::Front, vec![2.0]),
            LensInfo::new("rear", LensFacing::Back, vec![]),
            LensInfo::new("rear-2", LensFacing::Back, vec![f32::NAN]),
        ];
        assert_eq!(select_lens(&lenses), Some(LensId::new("rear")));
    }

    #[test]
    fn single_rear_lens_is_used() {
        let lenses = vec![LensInfo::new("0", LensFacing::Back, vec![4.3])];
        assert_eq!(select_lens(&lenses), Some(LensId::new("0")));
    }

    #[test]
    fn no_rear_lens_means_no_binding() {
        assert_eq!(select_lens(&[]), None);
        let front_only = vec![LensInfo::new("1", LensFacing::Front, vec![2.0])];
        assert_eq!(select_lens(&front_only), None);
    }
}
