use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::{Displayable, Identifiable};

/// Nominal amount stamped on period rows created by the resolver when no
/// administrator has set a real figure yet.
pub const PLACEHOLDER_NOMINAL_AMOUNT: f64 = 1.0;

/// The academic period a student can be enrolled in.
///
/// `Unspecified` is a valid sentinel for rows whose period was never
/// classified, not an error state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PeriodKind {
    First,
    Second,
    Summer,
    Unspecified,
}

impl PeriodKind {
    pub const fn label(self) -> &'static str {
        match self {
            PeriodKind::First => "First",
            PeriodKind::Second => "Second",
            PeriodKind::Summer => "Summer",
            PeriodKind::Unspecified => "None",
        }
    }
}

/// A period row in the catalog.
///
/// Multiple rows of the same kind may exist; the resolver treats any row
/// with a matching kind as interchangeable and never narrows by owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Period {
    pub id: Uuid,
    pub kind: PeriodKind,
    pub nominal_amount: f64,
}

impl Period {
    pub fn new(kind: PeriodKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            nominal_amount: PLACEHOLDER_NOMINAL_AMOUNT,
        }
    }

    pub fn with_nominal_amount(mut self, amount: f64) -> Self {
        self.nominal_amount = amount;
        self
    }

    /// Imports a legacy marker-shaped row. Ambiguous shapes land as
    /// `Unspecified` so the row stays usable as an unclassified sentinel.
    pub fn from_markers(markers: &PeriodMarkers) -> Self {
        let kind = markers.classify().unwrap_or(PeriodKind::Unspecified);
        Self {
            id: Uuid::new_v4(),
            kind,
            nominal_amount: markers.magnitude(),
        }
    }

    /// Exports the row in the legacy marker shape.
    pub fn to_markers(&self) -> PeriodMarkers {
        PeriodMarkers::from_kind(self.kind, self.nominal_amount)
    }
}

impl Identifiable for Period {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for Period {
    fn display_label(&self) -> String {
        self.kind.label().to_string()
    }
}

/// Legacy encoding of period identity: three numeric fields of which the
/// positive one's position, not its magnitude, names the period.
///
/// Kept as an import/export shim only; stored rows carry [`PeriodKind`]
/// directly.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PeriodMarkers {
    pub first: f64,
    pub second: f64,
    pub summer: f64,
}

impl PeriodMarkers {
    pub fn from_kind(kind: PeriodKind, magnitude: f64) -> Self {
        let mut markers = Self::default();
        match kind {
            PeriodKind::First => markers.first = magnitude,
            PeriodKind::Second => markers.second = magnitude,
            PeriodKind::Summer => markers.summer = magnitude,
            PeriodKind::Unspecified => {}
        }
        markers
    }

    /// Classifies the shape. Exactly one positive marker names the period;
    /// all zeros is the `Unspecified` sentinel; two or more positives is
    /// ambiguous and yields `None` so callers treat the row as unclassified.
    pub fn classify(&self) -> Option<PeriodKind> {
        let positives = [
            (self.first, PeriodKind::First),
            (self.second, PeriodKind::Second),
            (self.summer, PeriodKind::Summer),
        ];
        let mut matched = None;
        for (value, kind) in positives {
            if value > 0.0 {
                if matched.is_some() {
                    return None;
                }
                matched = Some(kind);
            }
        }
        Some(matched.unwrap_or(PeriodKind::Unspecified))
    }

    /// The magnitude carried by the active marker, if any.
    pub fn magnitude(&self) -> f64 {
        self.first.max(self.second).max(self.summer).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_positive_marker_names_the_period() {
        let markers = PeriodMarkers {
            first: 0.0,
            second: 1500.0,
            summer: 0.0,
        };
        assert_eq!(markers.classify(), Some(PeriodKind::Second));
        assert_eq!(markers.magnitude(), 1500.0);
    }

    #[test]
    fn all_zero_markers_resolve_to_the_unspecified_sentinel() {
        let markers = PeriodMarkers::default();
        assert_eq!(markers.classify(), Some(PeriodKind::Unspecified));
    }

    #[test]
    fn ambiguous_markers_are_unclassified() {
        let markers = PeriodMarkers {
            first: 1.0,
            second: 0.0,
            summer: 2.0,
        };
        assert_eq!(markers.classify(), None);
        let imported = Period::from_markers(&markers);
        assert_eq!(imported.kind, PeriodKind::Unspecified);
    }

    #[test]
    fn marker_round_trip_preserves_kind_and_magnitude() {
        let period = Period::new(PeriodKind::Summer).with_nominal_amount(980.0);
        let markers = period.to_markers();
        assert_eq!(markers.classify(), Some(PeriodKind::Summer));
        assert_eq!(markers.magnitude(), 980.0);
    }
}
