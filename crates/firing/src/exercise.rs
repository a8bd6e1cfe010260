//! Nightly firing-exercise reconciliation.
//!
//! For every active firing schedule the generator resolves the source
//! domain's firing areas, uses that domain's published firing-area
//! messages as templates, collects the firing periods inside the lookahead
//! window and synthesizes one published exercise message per area. The
//! result is diffed against the exercises currently published in the
//! target domain/series: unchanged ones are kept, changed ones replaced
//! and stale ones cancelled.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use navwarn_core::firing::{reconcile_exercises, CurrentExercise, ExerciseAction, FiringInterval};
use navwarn_core::lang::{self, DEFAULT_LANGUAGE, LANGUAGES};
use navwarn_core::types::{DbId, Timestamp};
use navwarn_db::models::area::AreaDesc;
use navwarn_db::models::firing_schedule::FiringSchedule;
use navwarn_db::models::message::{
    CreateMessage, MessageDesc, MessagePart, MessagePartDesc, MessageStatus, MessageWithAreas,
    PART_TYPE_TIME,
};
use navwarn_db::repositories::{AreaRepo, DomainRepo, FiringPeriodRepo, FiringScheduleRepo};
use navwarn_db::DbPool;

use crate::error::FiringError;
use crate::store::MessageStore;

/// Outcome counters for one generator run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExerciseRunSummary {
    pub schedules: usize,
    pub published: usize,
    pub cancelled: usize,
    pub failed: usize,
}

impl ExerciseRunSummary {
    fn absorb(&mut self, other: ExerciseRunSummary) {
        self.published += other.published;
        self.cancelled += other.cancelled;
        self.failed += other.failed;
    }
}

/// Reconciles firing periods into maintained firing-exercise messages.
pub struct FiringExerciseService {
    pool: DbPool,
    store: Arc<dyn MessageStore>,
}

impl FiringExerciseService {
    pub fn new(pool: DbPool, store: Arc<dyn MessageStore>) -> Self {
        Self { pool, store }
    }

    /// Evaluate every active firing schedule. One schedule's failure does
    /// not abort the remaining ones.
    pub async fn update_firing_exercises(&self) -> Result<ExerciseRunSummary, FiringError> {
        let schedules = FiringScheduleRepo::find_active(&self.pool).await?;
        let mut summary = ExerciseRunSummary {
            schedules: schedules.len(),
            ..Default::default()
        };

        for schedule in &schedules {
            match self.process_schedule(schedule).await {
                Ok(s) => summary.absorb(s),
                Err(e) => {
                    tracing::error!(
                        schedule_id = schedule.id,
                        error = %e,
                        "Firing schedule evaluation failed"
                    );
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn process_schedule(
        &self,
        schedule: &FiringSchedule,
    ) -> Result<ExerciseRunSummary, FiringError> {
        let firing_areas = DomainRepo::find_firing_areas(&self.pool, schedule.domain_id).await?;
        if firing_areas.is_empty() {
            tracing::debug!(
                schedule_id = schedule.id,
                "No firing areas visible to the schedule's source domain"
            );
            return Ok(ExerciseRunSummary::default());
        }
        let area_ids: Vec<DbId> = firing_areas.iter().map(|a| a.id).collect();
        let firing_set: HashSet<DbId> = area_ids.iter().copied().collect();

        // Published firing-area messages of the source domain act as the
        // templates for the generated exercises.
        let templates = self
            .store
            .search_published(schedule.domain_id, None, &area_ids)
            .await?;

        let (window_from, window_to) = lookahead_window(Utc::now(), schedule.schedule_days);
        let periods =
            FiringPeriodRepo::find_in_window(&self.pool, &area_ids, window_from, window_to).await?;
        let mut periods_by_area: HashMap<DbId, Vec<FiringInterval>> = HashMap::new();
        for period in &periods {
            periods_by_area
                .entry(period.area_id)
                .or_default()
                .push(period.interval());
        }

        let names = area_names_by_id(&AreaRepo::find_descs_for(&self.pool, &area_ids).await?);

        // One exercise per firing area with upcoming periods; areas without
        // periods are skipped this cycle and their old exercises cancelled
        // by the reconciliation below.
        let mut new_messages: HashMap<DbId, CreateMessage> = HashMap::new();
        let mut new_pairs: Vec<(DbId, Vec<FiringInterval>)> = Vec::new();
        for template in &templates {
            for area_id in &template.area_ids {
                if !firing_set.contains(area_id) || new_messages.contains_key(area_id) {
                    continue;
                }
                let Some(intervals) = periods_by_area.get(area_id) else {
                    continue;
                };
                let message =
                    build_exercise_message(schedule, template, *area_id, intervals, &names);
                new_pairs.push((*area_id, intervals.clone()));
                new_messages.insert(*area_id, message);
            }
        }

        // The currently published exercises in the target domain/series.
        let current = self
            .store
            .search_published(
                schedule.target_domain_id,
                Some(&schedule.target_series_id),
                &area_ids,
            )
            .await?;
        let current_exercises: Vec<CurrentExercise> = current
            .iter()
            .filter_map(|m| {
                let area_id = m.area_ids.iter().find(|id| firing_set.contains(*id))?;
                Some(CurrentExercise {
                    area_id: *area_id,
                    uid: m.message.uid.clone(),
                    intervals: m.message.event_intervals(),
                })
            })
            .collect();

        let actions = reconcile_exercises(&new_pairs, &current_exercises);
        Ok(apply_actions(self.store.as_ref(), &actions, &new_messages).await)
    }
}

/// Apply reconciliation actions through the store. Per-area failures are
/// logged and do not abort the remaining actions.
async fn apply_actions(
    store: &dyn MessageStore,
    actions: &[ExerciseAction],
    messages: &HashMap<DbId, CreateMessage>,
) -> ExerciseRunSummary {
    let mut summary = ExerciseRunSummary::default();

    for action in actions {
        match action {
            ExerciseAction::Publish {
                area_id,
                cancel_uid,
            } => {
                let Some(message) = messages.get(area_id) else {
                    continue;
                };
                match store.create_message(message.clone()).await {
                    Ok(created) => {
                        summary.published += 1;
                        tracing::info!(
                            area_id = area_id,
                            uid = %created.message.uid,
                            "Published firing exercise"
                        );
                        if let Some(uid) = cancel_uid {
                            match store.update_status(uid, MessageStatus::Cancelled).await {
                                Ok(_) => summary.cancelled += 1,
                                Err(e) => {
                                    tracing::error!(
                                        uid = %uid,
                                        error = %e,
                                        "Failed to cancel superseded firing exercise"
                                    );
                                    summary.failed += 1;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            area_id = area_id,
                            error = %e,
                            "Failed to publish firing exercise"
                        );
                        summary.failed += 1;
                    }
                }
            }
            ExerciseAction::Cancel { uid } => {
                match store.update_status(uid, MessageStatus::Cancelled).await {
                    Ok(_) => {
                        summary.cancelled += 1;
                        tracing::info!(uid = %uid, "Cancelled stale firing exercise");
                    }
                    Err(e) => {
                        tracing::error!(
                            uid = %uid,
                            error = %e,
                            "Failed to cancel stale firing exercise"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }
    }
    summary
}

/// The closed lookahead window: from the start of the current UTC day
/// through the end of `today + days`.
fn lookahead_window(now: Timestamp, days: i32) -> (Timestamp, Timestamp) {
    let start = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));
    let end = start + chrono::Duration::days(days as i64 + 1) - chrono::Duration::seconds(1);
    (start, end)
}

/// Synthesize the unpersisted exercise message for one firing area:
/// series/geometry/categories/charts copied from the template, a TIME part
/// carrying the sorted firing periods with per-language time text, subject
/// and auto-title per language, and publish-to set to the latest period
/// end.
fn build_exercise_message(
    schedule: &FiringSchedule,
    template: &MessageWithAreas,
    area_id: DbId,
    intervals: &[FiringInterval],
    names: &HashMap<DbId, HashMap<String, String>>,
) -> CreateMessage {
    let mut intervals = intervals.to_vec();
    intervals.sort();
    let publish_date_to = intervals.iter().map(|i| i.to).max();

    let part_descs = LANGUAGES
        .iter()
        .map(|l| MessagePartDesc {
            lang: (*l).to_string(),
            details: lang::format_intervals(l, &intervals),
        })
        .collect();
    let parts = vec![MessagePart {
        part_type: PART_TYPE_TIME.to_string(),
        event_dates: intervals,
        descs: part_descs,
    }];

    let descs = LANGUAGES
        .iter()
        .map(|l| {
            let subject = lang::firing_exercise_subject(l);
            let title = names
                .get(&area_id)
                .and_then(|n| n.get(*l).or_else(|| n.get(DEFAULT_LANGUAGE)))
                .map(|name| format!("{name}. {subject}"))
                .unwrap_or_else(|| subject.to_string());
            MessageDesc {
                lang: (*l).to_string(),
                title: Some(title),
                subject: Some(subject.to_string()),
            }
        })
        .collect();

    CreateMessage {
        uid: Uuid::new_v4().to_string(),
        domain_id: schedule.target_domain_id,
        series_id: schedule.target_series_id.clone(),
        status: MessageStatus::Published,
        publish_date_from: Some(Utc::now()),
        publish_date_to,
        geometry: template.message.geometry.clone(),
        categories: template.message.categories.clone(),
        charts: template.message.charts.clone(),
        parts,
        descs,
        auto_title: true,
        area_ids: vec![area_id],
    }
}

/// Group localized area names by area id and language.
fn area_names_by_id(descs: &[AreaDesc]) -> HashMap<DbId, HashMap<String, String>> {
    let mut names: HashMap<DbId, HashMap<String, String>> = HashMap::new();
    for desc in descs {
        names
            .entry(desc.area_id)
            .or_default()
            .insert(desc.lang.clone(), desc.name.clone());
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    use navwarn_db::models::message::Message;

    fn ts(day: u32, hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 8, day, hour, 0, 0).unwrap()
    }

    fn interval(day: u32, from_hour: u32, to_hour: u32) -> FiringInterval {
        FiringInterval::new(ts(day, from_hour), ts(day, to_hour))
    }

    fn schedule() -> FiringSchedule {
        FiringSchedule {
            id: 1,
            domain_id: 1,
            target_domain_id: 2,
            target_series_id: "dma-fe".to_string(),
            schedule_days: 30,
            active: true,
            created_at: ts(1, 0),
            updated_at: ts(1, 0),
        }
    }

    fn message_from(input: &CreateMessage, id: DbId) -> MessageWithAreas {
        MessageWithAreas {
            message: Message {
                id,
                uid: input.uid.clone(),
                domain_id: input.domain_id,
                series_id: input.series_id.clone(),
                status: input.status.as_str().to_string(),
                publish_date_from: input.publish_date_from,
                publish_date_to: input.publish_date_to,
                geometry: input.geometry.clone(),
                categories: input.categories.clone(),
                charts: input.charts.clone(),
                parts: serde_json::to_value(&input.parts).unwrap(),
                descs: serde_json::to_value(&input.descs).unwrap(),
                auto_title: input.auto_title,
                created_at: ts(1, 0),
                updated_at: ts(1, 0),
            },
            area_ids: input.area_ids.clone(),
        }
    }

    fn template(area_ids: Vec<DbId>) -> MessageWithAreas {
        let input = CreateMessage {
            uid: "tpl".to_string(),
            domain_id: 1,
            series_id: "dma-fa".to_string(),
            status: MessageStatus::Published,
            publish_date_from: None,
            publish_date_to: None,
            geometry: Some(serde_json::json!({"type": "Point", "coordinates": [11.0, 56.0]})),
            categories: None,
            charts: None,
            parts: Vec::new(),
            descs: Vec::new(),
            auto_title: false,
            area_ids,
        };
        message_from(&input, 100)
    }

    // -----------------------------------------------------------------------
    // Mock store
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct MockStore {
        created: Mutex<Vec<CreateMessage>>,
        cancelled: Mutex<Vec<String>>,
        fail_create: bool,
    }

    #[async_trait]
    impl MessageStore for MockStore {
        async fn create_message(
            &self,
            input: CreateMessage,
        ) -> Result<MessageWithAreas, FiringError> {
            if self.fail_create {
                return Err(FiringError::Store("create failed".to_string()));
            }
            let created = message_from(&input, 1);
            self.created.lock().unwrap().push(input);
            Ok(created)
        }

        async fn update_status(
            &self,
            uid: &str,
            status: MessageStatus,
        ) -> Result<bool, FiringError> {
            assert_eq!(status, MessageStatus::Cancelled);
            self.cancelled.lock().unwrap().push(uid.to_string());
            Ok(true)
        }

        async fn search_published(
            &self,
            _domain_id: DbId,
            _series_id: Option<&str>,
            _area_ids: &[DbId],
        ) -> Result<Vec<MessageWithAreas>, FiringError> {
            Ok(Vec::new())
        }
    }

    // -----------------------------------------------------------------------
    // Message synthesis
    // -----------------------------------------------------------------------

    #[test]
    fn exercise_message_shape() {
        let intervals = vec![interval(7, 8, 16), interval(6, 8, 16)];
        let mut names = HashMap::new();
        names.insert(
            5,
            HashMap::from([
                ("en".to_string(), "Bornholm E".to_string()),
                ("da".to_string(), "Bornholm Ø".to_string()),
            ]),
        );

        let message = build_exercise_message(&schedule(), &template(vec![5]), 5, &intervals, &names);

        assert_eq!(message.domain_id, 2);
        assert_eq!(message.series_id, "dma-fe");
        assert_eq!(message.status, MessageStatus::Published);
        assert_eq!(message.area_ids, vec![5]);
        assert!(message.auto_title);
        assert!(!message.uid.is_empty());
        assert!(message.geometry.is_some());

        // Latest period end becomes the publish-to date.
        assert_eq!(message.publish_date_to, Some(ts(7, 16)));

        // A single TIME part with the intervals sorted.
        assert_eq!(message.parts.len(), 1);
        let part = &message.parts[0];
        assert_eq!(part.part_type, PART_TYPE_TIME);
        assert_eq!(
            part.event_dates,
            vec![interval(6, 8, 16), interval(7, 8, 16)]
        );
        assert_eq!(part.descs.len(), LANGUAGES.len());

        let en_desc = message.descs.iter().find(|d| d.lang == "en").unwrap();
        assert_eq!(
            en_desc.subject.as_deref(),
            Some("Firing exercises. Warning.")
        );
        assert_eq!(
            en_desc.title.as_deref(),
            Some("Bornholm E. Firing exercises. Warning.")
        );
    }

    #[test]
    fn exercise_title_falls_back_to_subject() {
        let intervals = vec![interval(6, 8, 16)];
        let message =
            build_exercise_message(&schedule(), &template(vec![5]), 5, &intervals, &HashMap::new());
        let en_desc = message.descs.iter().find(|d| d.lang == "en").unwrap();
        assert_eq!(en_desc.title.as_deref(), Some("Firing exercises. Warning."));
    }

    #[test]
    fn lookahead_window_spans_whole_days() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 14, 30, 0).unwrap();
        let (from, to) = lookahead_window(now, 1);
        assert_eq!(from, Utc.with_ymd_and_hms(2026, 8, 6, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2026, 8, 7, 23, 59, 59).unwrap());
    }

    // -----------------------------------------------------------------------
    // Action application
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn stale_exercise_is_cancelled_without_replacement() {
        let store = MockStore::default();
        let actions = vec![ExerciseAction::Cancel {
            uid: "old".to_string(),
        }];

        let summary = apply_actions(&store, &actions, &HashMap::new()).await;

        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.published, 0);
        assert!(store.created.lock().unwrap().is_empty());
        assert_eq!(*store.cancelled.lock().unwrap(), vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn replacement_publishes_then_cancels_predecessor() {
        let store = MockStore::default();
        let intervals = vec![interval(6, 8, 16)];
        let message =
            build_exercise_message(&schedule(), &template(vec![5]), 5, &intervals, &HashMap::new());
        let messages = HashMap::from([(5, message)]);
        let actions = vec![ExerciseAction::Publish {
            area_id: 5,
            cancel_uid: Some("old".to_string()),
        }];

        let summary = apply_actions(&store, &actions, &messages).await;

        assert_eq!(summary.published, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(store.created.lock().unwrap().len(), 1);
        assert_eq!(*store.cancelled.lock().unwrap(), vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn publish_failure_does_not_abort_remaining_actions() {
        let store = MockStore {
            fail_create: true,
            ..Default::default()
        };
        let intervals = vec![interval(6, 8, 16)];
        let message =
            build_exercise_message(&schedule(), &template(vec![5]), 5, &intervals, &HashMap::new());
        let messages = HashMap::from([(5, message)]);
        let actions = vec![
            ExerciseAction::Publish {
                area_id: 5,
                cancel_uid: Some("old".to_string()),
            },
            ExerciseAction::Cancel {
                uid: "stale".to_string(),
            },
        ];

        let summary = apply_actions(&store, &actions, &messages).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.published, 0);
        // The failed publish must not cancel its predecessor, but the
        // independent stale cancellation still runs.
        assert_eq!(*store.cancelled.lock().unwrap(), vec!["stale".to_string()]);
    }
}
