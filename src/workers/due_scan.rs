use chrono::Utc;

use crate::store::{LearnerId, Store};

pub type NotifyError = Box<dyn std::error::Error + Send + Sync>;

/// Delivers "you have phrases to review" reminders. The chat transport
/// implements this; the scheduler only decides who gets one.
#[axum::async_trait]
pub trait DueNotifier: Send + Sync {
    async fn notify(&self, learner: LearnerId, due_count: u64) -> Result<(), NotifyError>;
}

/// Logs reminders instead of sending them. Used when no transport is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[axum::async_trait]
impl DueNotifier for LogNotifier {
    async fn notify(&self, learner: LearnerId, due_count: u64) -> Result<(), NotifyError> {
        tracing::info!(learner, due_count, "Study reminder");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub eligible: usize,
    pub notified: usize,
    pub failed: usize,
}

pub async fn run(store: &Store, notifier: &dyn DueNotifier) {
    tracing::debug!("due_scan: start");
    match scan(store, notifier, Utc::now().timestamp()).await {
        Ok(summary) => tracing::info!(
            eligible = summary.eligible,
            notified = summary.notified,
            failed = summary.failed,
            "due_scan: done"
        ),
        Err(e) => tracing::error!(error=%e, "due_scan failed"),
    }
}

/// Notifies every eligible learner. Only successful deliveries are recorded.
pub async fn scan(
    store: &Store,
    notifier: &dyn DueNotifier,
    now: i64,
) -> Result<ScanSummary, crate::store::StoreError> {
    let due = store.get_due_studies(now)?;
    let mut summary = ScanSummary {
        eligible: due.len(),
        ..ScanSummary::default()
    };

    for (learner, due_count) in due {
        match notifier.notify(learner, due_count).await {
            Ok(()) => {
                store.record_notification(learner, now)?;
                summary.notified += 1;
            }
            Err(e) => {
                tracing::warn!(learner, due_count, error = %e, "Study reminder failed");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::constants::{DUE_MIN_COUNT, STUDY_INTERVALS};
    use crate::store::test_support::temp_store;

    const T0: i64 = 1_700_000_000;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<(LearnerId, u64)>>,
        fail_for: Option<LearnerId>,
    }

    #[axum::async_trait]
    impl DueNotifier for Recording {
        async fn notify(&self, learner: LearnerId, due_count: u64) -> Result<(), NotifyError> {
            if self.fail_for == Some(learner) {
                return Err("transport down".into());
            }
            self.sent.lock().unwrap().push((learner, due_count));
            Ok(())
        }
    }

    fn seed(store: &Store, learner: LearnerId) {
        store.subscribe(learner).unwrap();
        for i in 0..DUE_MIN_COUNT {
            store
                .add_phrase(learner, &format!("p{i}"), &format!("e{i}"), T0)
                .unwrap();
        }
    }

    #[tokio::test]
    async fn notifies_eligible_learners_and_counts() {
        let (_dir, store) = temp_store();
        seed(&store, 1);
        seed(&store, 2);
        let notifier = Recording::default();

        let summary = scan(&store, &notifier, T0 + STUDY_INTERVALS[0]).await.unwrap();
        assert_eq!(summary.notified, 2);
        assert_eq!(
            *notifier.sent.lock().unwrap(),
            vec![(1, DUE_MIN_COUNT), (2, DUE_MIN_COUNT)]
        );
        assert_eq!(store.notify_count(1).unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_is_not_counted() {
        let (_dir, store) = temp_store();
        seed(&store, 1);
        seed(&store, 2);
        let notifier = Recording {
            fail_for: Some(2),
            ..Recording::default()
        };

        let summary = scan(&store, &notifier, T0 + STUDY_INTERVALS[0]).await.unwrap();
        assert_eq!(summary, ScanSummary { eligible: 2, notified: 1, failed: 1 });
        assert_eq!(store.notify_count(2).unwrap(), 0);
    }

    #[tokio::test]
    async fn unanswered_reminder_is_not_repeated() {
        let (_dir, store) = temp_store();
        seed(&store, 1);
        store.record_engagement(1, T0).unwrap();
        let notifier = Recording::default();

        let start = T0 + STUDY_INTERVALS[0];
        for tick in 0..6 {
            scan(&store, &notifier, start + tick * 600).await.unwrap();
        }
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
        assert_eq!(store.notify_count(1).unwrap(), 1);

        // Still unread a day later: still held back.
        let summary = scan(&store, &notifier, start + 24 * 3600).await.unwrap();
        assert_eq!(summary.eligible, 0);

        store.record_read(1, start + 24 * 3600).unwrap();
        let summary = scan(&store, &notifier, start + 24 * 3600 + 1).await.unwrap();
        assert_eq!(summary.notified, 1);
        assert_eq!(store.notify_count(1).unwrap(), 2);
    }

    #[tokio::test]
    async fn two_scans_without_engagement_send_one_reminder() {
        let (_dir, store) = temp_store();
        seed(&store, 1);
        let notifier = Recording::default();

        let now = T0 + STUDY_INTERVALS[0];
        scan(&store, &notifier, now).await.unwrap();
        scan(&store, &notifier, now + 600).await.unwrap();
        assert_eq!(*notifier.sent.lock().unwrap(), vec![(1, DUE_MIN_COUNT)]);
        assert_eq!(store.last_activity(1).unwrap(), Some(now));
    }

    #[tokio::test]
    async fn nothing_due_sends_nothing() {
        let (_dir, store) = temp_store();
        seed(&store, 1);
        let summary = scan(&store, &LogNotifier, T0).await.unwrap();
        assert_eq!(summary.eligible, 0);
    }
}
