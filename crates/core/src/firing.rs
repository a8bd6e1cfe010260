//! Firing-period intervals and exercise reconciliation.
//!
//! A firing period is a closed time interval attached to a firing area.
//! The nightly exercise generator turns the periods inside its lookahead
//! window into published "firing exercise" messages; the reconciliation
//! diff deciding what to publish and what to cancel lives here so it can
//! be tested without a store.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Intervals
// ---------------------------------------------------------------------------

/// A firing period's time interval. Ordered by `(from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FiringInterval {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl FiringInterval {
    pub fn new(from: Timestamp, to: Timestamp) -> Self {
        Self { from, to }
    }

    /// Whether the interval intersects the closed window `[from, to]`.
    pub fn intersects(&self, from: Timestamp, to: Timestamp) -> bool {
        self.from <= to && self.to >= from
    }
}

/// Order-independent interval-set equality: same count and pairwise equal
/// after sorting both sides by `(from, to)`.
pub fn same_intervals(a: &[FiringInterval], b: &[FiringInterval]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the fields of a new or updated firing period. The area and both
/// interval endpoints are required; the validated triple is returned.
pub fn validate_period(
    area_id: Option<DbId>,
    from_date: Option<Timestamp>,
    to_date: Option<Timestamp>,
) -> Result<(DbId, Timestamp, Timestamp), CoreError> {
    let area_id = area_id.ok_or_else(|| {
        CoreError::Validation("firing period must be attached to an area".to_string())
    })?;
    match (from_date, to_date) {
        (Some(from), Some(to)) => Ok((area_id, from, to)),
        _ => Err(CoreError::Validation(
            "firing period must define both from-date and to-date".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Exercise reconciliation
// ---------------------------------------------------------------------------

/// A currently published firing-exercise message in the target domain.
#[derive(Debug, Clone)]
pub struct CurrentExercise {
    pub area_id: DbId,
    pub uid: String,
    pub intervals: Vec<FiringInterval>,
}

/// One reconciliation decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExerciseAction {
    /// Publish the newly generated exercise for `area_id`, cancelling the
    /// superseded message if one exists.
    Publish {
        area_id: DbId,
        cancel_uid: Option<String>,
    },
    /// Cancel a published exercise whose area has no upcoming periods.
    Cancel { uid: String },
}

/// Diff newly generated per-area interval sets against the currently
/// published exercises.
///
/// An unchanged interval set leaves the current message untouched; a
/// changed or new set publishes a replacement (cancelling the predecessor);
/// every current exercise left unmatched is cancelled.
pub fn reconcile_exercises(
    new: &[(DbId, Vec<FiringInterval>)],
    current: &[CurrentExercise],
) -> Vec<ExerciseAction> {
    let mut actions = Vec::new();
    let mut unmatched: Vec<&CurrentExercise> = current.iter().collect();

    for (area_id, intervals) in new {
        let existing = unmatched.iter().position(|c| c.area_id == *area_id);
        match existing {
            Some(pos) => {
                let current = unmatched.remove(pos);
                if !same_intervals(intervals, &current.intervals) {
                    actions.push(ExerciseAction::Publish {
                        area_id: *area_id,
                        cancel_uid: Some(current.uid.clone()),
                    });
                }
            }
            None => {
                actions.push(ExerciseAction::Publish {
                    area_id: *area_id,
                    cancel_uid: None,
                });
            }
        }
    }

    for stale in unmatched {
        actions.push(ExerciseAction::Cancel {
            uid: stale.uid.clone(),
        });
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(day: u32, hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 8, day, hour, 0, 0).unwrap()
    }

    fn interval(day: u32, from_hour: u32, to_hour: u32) -> FiringInterval {
        FiringInterval::new(ts(day, from_hour), ts(day, to_hour))
    }

    #[test]
    fn interval_ordering_by_from_then_to() {
        let mut intervals = vec![interval(2, 8, 16), interval(1, 8, 16), interval(1, 8, 12)];
        intervals.sort();
        assert_eq!(
            intervals,
            vec![interval(1, 8, 12), interval(1, 8, 16), interval(2, 8, 16)]
        );
    }

    #[test]
    fn same_intervals_is_order_independent() {
        let a = vec![interval(1, 8, 16), interval(2, 8, 16)];
        let b = vec![interval(2, 8, 16), interval(1, 8, 16)];
        assert!(same_intervals(&a, &b));
    }

    #[test]
    fn same_intervals_detects_differences() {
        let a = vec![interval(1, 8, 16)];
        assert!(!same_intervals(&a, &[interval(1, 8, 12)]));
        assert!(!same_intervals(&a, &[]));
    }

    #[test]
    fn intersects_window() {
        let i = interval(10, 8, 16);
        assert!(i.intersects(ts(10, 0), ts(11, 0)));
        assert!(i.intersects(ts(10, 16), ts(12, 0)));
        assert!(!i.intersects(ts(11, 0), ts(12, 0)));
    }

    #[test]
    fn validate_period_requires_all_fields() {
        assert!(validate_period(Some(1), Some(ts(1, 8)), Some(ts(1, 16))).is_ok());
        assert!(validate_period(None, Some(ts(1, 8)), Some(ts(1, 16))).is_err());
        assert!(validate_period(Some(1), None, Some(ts(1, 16))).is_err());
        assert!(validate_period(Some(1), Some(ts(1, 8)), None).is_err());
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    fn current(area_id: DbId, uid: &str, intervals: Vec<FiringInterval>) -> CurrentExercise {
        CurrentExercise {
            area_id,
            uid: uid.to_string(),
            intervals,
        }
    }

    #[test]
    fn unchanged_exercise_is_left_untouched() {
        let new = vec![(1, vec![interval(1, 8, 16)])];
        let cur = vec![current(1, "a", vec![interval(1, 8, 16)])];
        assert!(reconcile_exercises(&new, &cur).is_empty());
    }

    #[test]
    fn unchanged_comparison_ignores_discovery_order() {
        let new = vec![(1, vec![interval(1, 8, 16), interval(2, 8, 16)])];
        let cur = vec![current(1, "a", vec![interval(2, 8, 16), interval(1, 8, 16)])];
        assert!(reconcile_exercises(&new, &cur).is_empty());
    }

    #[test]
    fn changed_periods_replace_and_cancel() {
        let new = vec![(1, vec![interval(1, 8, 16), interval(3, 8, 16)])];
        let cur = vec![current(1, "a", vec![interval(1, 8, 16)])];
        assert_eq!(
            reconcile_exercises(&new, &cur),
            vec![ExerciseAction::Publish {
                area_id: 1,
                cancel_uid: Some("a".to_string()),
            }]
        );
    }

    #[test]
    fn new_area_publishes_without_cancel() {
        let new = vec![(2, vec![interval(1, 8, 16)])];
        assert_eq!(
            reconcile_exercises(&new, &[]),
            vec![ExerciseAction::Publish {
                area_id: 2,
                cancel_uid: None,
            }]
        );
    }

    #[test]
    fn area_without_upcoming_periods_is_cancelled() {
        let cur = vec![current(1, "a", vec![interval(1, 8, 16)])];
        assert_eq!(
            reconcile_exercises(&[], &cur),
            vec![ExerciseAction::Cancel {
                uid: "a".to_string(),
            }]
        );
    }

    #[test]
    fn mixed_run() {
        let new = vec![
            (1, vec![interval(1, 8, 16)]),
            (2, vec![interval(2, 8, 16)]),
        ];
        let cur = vec![
            current(1, "keep", vec![interval(1, 8, 16)]),
            current(3, "stale", vec![interval(1, 8, 16)]),
        ];
        assert_eq!(
            reconcile_exercises(&new, &cur),
            vec![
                ExerciseAction::Publish {
                    area_id: 2,
                    cancel_uid: None,
                },
                ExerciseAction::Cancel {
                    uid: "stale".to_string(),
                },
            ]
        );
    }
}
