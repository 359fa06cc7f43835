use crate::emissions::{compute_co2, unit_label};
use crate::errors::LedgerError;
use crate::insights::insight_from_totals;
use crate::models::{
    Category, CommunityStats, Entry, EntryId, Insight, Submission, User, UserId, UserSummary,
};
use crate::notify::{Notifier, TipEvent};
use crate::stats::LEADERBOARD_SIZE;
use crate::storage::Store;
use crate::streak::{advance_streak, log_day, StreakState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAX_USERNAME_LEN: usize = 64;

/// Trims and lower-cases a display name.
pub fn normalize_username(raw: &str) -> Result<String, LedgerError> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return Err(LedgerError::validation("username", "must not be empty"));
    }
    if name.chars().count() > MAX_USERNAME_LEN {
        return Err(LedgerError::validation(
            "username",
            format!("must be at most {MAX_USERNAME_LEN} characters"),
        ));
    }
    Ok(name)
}

/// Footprint ledger and insight engine.
///
/// Stateless apart from its collaborators: every call reads the store afresh.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
    notifier: Notifier,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn register_user(
        &self,
        username: &str,
        password_hash: String,
    ) -> Result<User, LedgerError> {
        let username = normalize_username(username)?;
        let user = self
            .store
            .create_user(User::new(username, password_hash, Utc::now()))
            .await?;
        info!(user_id = %user.id, username = %user.username, "registered user");
        Ok(user)
    }

    pub async fn find_user_by_name(&self, username: &str) -> Result<Option<User>, LedgerError> {
        let username = normalize_username(username)?;
        self.store.find_user_by_name(&username).await
    }

    pub async fn user(&self, id: &UserId) -> Result<User, LedgerError> {
        self.store
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {id}")))
    }

    pub async fn submit_entry(
        &self,
        user_id: &UserId,
        category: Category,
        amount: f64,
    ) -> Result<Submission, LedgerError> {
        self.submit_entry_at(user_id, category, amount, Utc::now()).await
    }

    /// Records an entry created at `now` and advances the user's streak.
    ///
    /// The entry and the streak change commit together or not at all. A
    /// concurrent write to the same user fails this call with
    /// [`LedgerError::Conflict`]; the whole submission can be retried.
    pub async fn submit_entry_at(
        &self,
        user_id: &UserId,
        category: Category,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Result<Submission, LedgerError> {
        let co2 = compute_co2(category, amount)?;
        let user = self.user(user_id).await?;

        let next = advance_streak(StreakState::new(user.streak, user.last_log_date), log_day(now));
        let mut updated = user.clone();
        updated.streak = next.streak;
        updated.last_log_date = next.last_log_date;

        let entry = Entry {
            id: EntryId::new(),
            user_id: user.id.clone(),
            category,
            amount,
            unit: unit_label(category).to_string(),
            co2,
            timestamp: now,
        };

        let saved = self.store.record_entry(&entry, &updated).await?;
        info!(
            user_id = %saved.id,
            category = %category,
            co2,
            streak = saved.streak,
            "recorded entry"
        );

        self.emit_tip(&saved.id).await;

        Ok(Submission {
            entry,
            streak: saved.streak,
        })
    }

    async fn emit_tip(&self, user_id: &UserId) {
        match self.store.aggregate_user_category_totals(user_id).await {
            Ok(totals) => {
                let insight = insight_from_totals(totals);
                let delivered = self.notifier.tip_generated(TipEvent {
                    user_id: user_id.clone(),
                    tip: insight.tip,
                });
                debug!(user_id = %user_id, delivered, "tip emitted");
            }
            Err(err) => warn!(user_id = %user_id, "skipping tip event: {err}"),
        }
    }

    /// A user's entries, newest first, optionally limited to one category.
    pub async fn entries_for_user(
        &self,
        user_id: &UserId,
        category: Option<Category>,
    ) -> Result<Vec<Entry>, LedgerError> {
        self.user(user_id).await?;
        let mut entries = self.store.list_entries_by_user(user_id).await?;
        if let Some(category) = category {
            entries.retain(|entry| entry.category == category);
        }
        Ok(entries)
    }

    pub async fn community_stats(&self) -> Result<CommunityStats, LedgerError> {
        let average = self.store.aggregate_community_average().await?;
        let leaderboard = self.store.aggregate_leaderboard(LEADERBOARD_SIZE).await?;
        Ok(CommunityStats {
            average,
            leaderboard,
        })
    }

    pub async fn insights_for_user(&self, user_id: &UserId) -> Result<Insight, LedgerError> {
        self.user(user_id).await?;
        let totals = self.store.aggregate_user_category_totals(user_id).await?;
        Ok(insight_from_totals(totals))
    }

    pub async fn user_summary(&self, user_id: &UserId) -> Result<UserSummary, LedgerError> {
        let user = self.user(user_id).await?;
        let entries = self.store.list_entries_by_user(user_id).await?;
        Ok(UserSummary {
            id: user.id,
            username: user.username,
            streak: user.streak,
            last_log_date: user.last_log_date,
            total_co2: entries.iter().map(|entry| entry.co2).sum(),
            entry_count: entries.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryTotal, LeaderboardRow};
    use crate::storage::JsonStore;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Barrier;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(JsonStore::in_memory()), Notifier::new())
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, day, hour, 0, 0).unwrap()
    }

    async fn register(ledger: &Ledger, name: &str) -> User {
        ledger.register_user(name, "hash".to_string()).await.unwrap()
    }

    #[tokio::test]
    async fn usernames_are_normalized_and_unique() {
        let ledger = ledger();
        let user = register(&ledger, "  Alice ").await;
        assert_eq!(user.username, "alice");
        assert_eq!(user.streak, 0);
        assert_eq!(user.last_log_date, None);

        let err = ledger.register_user("ALICE", "x".to_string()).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(_)));
        assert!(ledger.find_user_by_name("Alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn blank_username_is_rejected() {
        let err = ledger().register_user("   ", "x".to_string()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation { field: "username", .. }));
    }

    #[tokio::test]
    async fn streak_follows_calendar_days() {
        let ledger = ledger();
        let user = register(&ledger, "bob").await;

        let streak = |s: Submission| s.streak;
        let first = ledger.submit_entry_at(&user.id, Category::Food, 1.0, at(10, 8)).await;
        assert_eq!(first.map(streak), Ok(1));
        let same_day = ledger.submit_entry_at(&user.id, Category::Food, 1.0, at(10, 20)).await;
        assert_eq!(same_day.map(streak), Ok(1));
        let next_day = ledger.submit_entry_at(&user.id, Category::Food, 1.0, at(11, 7)).await;
        assert_eq!(next_day.map(streak), Ok(2));
        let after_gap = ledger.submit_entry_at(&user.id, Category::Food, 1.0, at(13, 7)).await;
        assert_eq!(after_gap.map(streak), Ok(1));

        let stored = ledger.user(&user.id).await.unwrap();
        assert_eq!(stored.last_log_date, NaiveDate::from_ymd_opt(2026, 4, 13));
        assert_eq!(ledger.entries_for_user(&user.id, None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn invalid_submission_changes_nothing() {
        let ledger = ledger();
        let user = register(&ledger, "carol").await;
        let err = ledger
            .submit_entry_at(&user.id, Category::Energy, -3.0, at(10, 8))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { field: "amount", .. }));
        assert_eq!(ledger.user(&user.id).await.unwrap().streak, 0);
        assert!(ledger.entries_for_user(&user.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let ledger = ledger();
        let ghost = UserId::from_string("nobody");
        let err = ledger
            .submit_entry_at(&ghost, Category::Food, 1.0, at(10, 8))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert!(matches!(
            ledger.insights_for_user(&ghost).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn entry_carries_unrounded_co2_and_unit() {
        let ledger = ledger();
        let user = register(&ledger, "dave").await;
        let submission = ledger
            .submit_entry_at(&user.id, Category::Energy, 3.3, at(10, 8))
            .await
            .unwrap();
        assert_eq!(submission.entry.unit, "kWh");
        assert_eq!(submission.entry.co2, 3.3 * 0.385);
    }

    #[tokio::test]
    async fn community_stats_cover_all_users() {
        let ledger = ledger();
        let empty = ledger.community_stats().await.unwrap();
        assert_eq!(empty.average, 0.0);
        assert!(empty.leaderboard.is_empty());

        let green = register(&ledger, "green").await;
        let heavy = register(&ledger, "heavy").await;
        register(&ledger, "idle").await;
        ledger.submit_entry_at(&green.id, Category::Food, 1.0, at(10, 8)).await.unwrap();
        ledger.submit_entry_at(&heavy.id, Category::Food, 3.0, at(10, 8)).await.unwrap();

        let stats = ledger.community_stats().await.unwrap();
        assert_eq!(stats.average, 5.0);
        let names: Vec<&str> = stats.leaderboard.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, vec!["green", "heavy"]);
        assert_eq!(stats, ledger.community_stats().await.unwrap());
    }

    #[tokio::test]
    async fn insights_and_summary_reflect_entries() {
        let ledger = ledger();
        let user = register(&ledger, "erin").await;
        let insight = ledger.insights_for_user(&user.id).await.unwrap();
        assert_eq!(insight.top_category, None);

        ledger.submit_entry_at(&user.id, Category::Transport, 20.0, at(10, 8)).await.unwrap();
        ledger.submit_entry_at(&user.id, Category::Transport, 30.0, at(11, 8)).await.unwrap();

        let insight = ledger.insights_for_user(&user.id).await.unwrap();
        assert_eq!(insight.top_category, Some(Category::Transport));
        assert_eq!(insight.weekly_goal.as_deref(), Some("9.45"));
        assert!(insight.tip.contains("2.1 kg"));

        let summary = ledger.user_summary(&user.id).await.unwrap();
        assert_eq!(summary.streak, 2);
        assert_eq!(summary.entry_count, 2);
        assert!((summary.total_co2 - 10.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn submission_emits_tip_event() {
        let ledger = ledger();
        let mut rx = ledger.notifier().subscribe();
        let user = register(&ledger, "frank").await;
        ledger.submit_entry_at(&user.id, Category::Food, 2.0, at(10, 8)).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.user_id, user.id);
        assert!(event.tip.starts_with("Food"));
    }

    #[tokio::test]
    async fn entries_can_be_filtered_by_category() {
        let ledger = ledger();
        let user = register(&ledger, "hana").await;
        ledger.submit_entry_at(&user.id, Category::Food, 1.0, at(10, 8)).await.unwrap();
        ledger.submit_entry_at(&user.id, Category::Energy, 4.0, at(10, 9)).await.unwrap();
        ledger.submit_entry_at(&user.id, Category::Food, 2.0, at(10, 10)).await.unwrap();

        let food = ledger
            .entries_for_user(&user.id, Some(Category::Food))
            .await
            .unwrap();
        let amounts: Vec<f64> = food.iter().map(|entry| entry.amount).collect();
        assert_eq!(amounts, vec![2.0, 1.0]);

        let transport = ledger
            .entries_for_user(&user.id, Some(Category::Transport))
            .await
            .unwrap();
        assert!(transport.is_empty());
    }

    #[tokio::test]
    async fn oversized_amount_never_reaches_the_data_file() {
        let path = std::env::temp_dir().join(format!(
            "footprint_ledger_oversized_{}_{}.json",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let ledger = Ledger::new(Arc::new(JsonStore::open(path.clone()).await), Notifier::new());
        let user = register(&ledger, "ivan").await;

        let err = ledger
            .submit_entry_at(&user.id, Category::Food, 1e308, at(10, 8))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { field: "amount", .. }));

        let reopened = JsonStore::open(path.clone()).await;
        assert!(reopened.find_user_by_name("ivan").await.unwrap().is_some());
        let _ = std::fs::remove_file(path);
    }

    /// Holds every user lookup until two callers have read the same version.
    struct LockstepStore {
        inner: JsonStore,
        barrier: Barrier,
        armed: AtomicBool,
    }

    #[async_trait]
    impl Store for LockstepStore {
        async fn create_user(&self, user: User) -> Result<User, LedgerError> {
            self.inner.create_user(user).await
        }
        async fn find_user_by_name(&self, username: &str) -> Result<Option<User>, LedgerError> {
            self.inner.find_user_by_name(username).await
        }
        async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>, LedgerError> {
            let user = self.inner.find_user_by_id(id).await;
            if self.armed.load(Ordering::SeqCst) {
                self.barrier.wait().await;
            }
            user
        }
        async fn save_user(&self, user: &User) -> Result<User, LedgerError> {
            self.inner.save_user(user).await
        }
        async fn create_entry(&self, entry: &Entry) -> Result<(), LedgerError> {
            self.inner.create_entry(entry).await
        }
        async fn record_entry(&self, entry: &Entry, user: &User) -> Result<User, LedgerError> {
            self.inner.record_entry(entry, user).await
        }
        async fn list_entries_by_user(&self, id: &UserId) -> Result<Vec<Entry>, LedgerError> {
            self.inner.list_entries_by_user(id).await
        }
        async fn aggregate_community_average(&self) -> Result<f64, LedgerError> {
            self.inner.aggregate_community_average().await
        }
        async fn aggregate_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardRow>, LedgerError> {
            self.inner.aggregate_leaderboard(limit).await
        }
        async fn aggregate_user_category_totals(
            &self,
            id: &UserId,
        ) -> Result<Vec<CategoryTotal>, LedgerError> {
            self.inner.aggregate_user_category_totals(id).await
        }
    }

    #[tokio::test]
    async fn racing_submissions_advance_streak_once() {
        let store = Arc::new(LockstepStore {
            inner: JsonStore::in_memory(),
            barrier: Barrier::new(2),
            armed: AtomicBool::new(false),
        });
        let ledger = Ledger::new(store.clone(), Notifier::new());
        let user = register(&ledger, "gina").await;
        ledger.submit_entry_at(&user.id, Category::Food, 1.0, at(10, 8)).await.unwrap();

        store.armed.store(true, Ordering::SeqCst);
        let (a, b) = tokio::join!(
            ledger.submit_entry_at(&user.id, Category::Food, 1.0, at(11, 8)),
            ledger.submit_entry_at(&user.id, Category::Energy, 2.0, at(11, 9)),
        );
        store.armed.store(false, Ordering::SeqCst);

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|r| matches!(r, Err(e) if e.is_conflict())));
        assert_eq!(ledger.user(&user.id).await.unwrap().streak, 2);

        let retried = ledger
            .submit_entry_at(&user.id, Category::Energy, 2.0, at(11, 9))
            .await
            .unwrap();
        assert_eq!(retried.streak, 2);
        assert_eq!(ledger.entries_for_user(&user.id, None).await.unwrap().len(), 3);
    }
}
