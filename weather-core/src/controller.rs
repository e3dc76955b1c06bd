//! Query state: turns submitted city names into published [`QueryStatus`] values.
//!
//! Every submission bumps a generation counter and publishes `Loading`. The
//! fetch result is published only if its generation is still the latest, so a
//! slow response for an older query never overwrites a newer one. Superseded
//! fetches are left to finish; their results are dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::{
    runtime::Handle,
    sync::{broadcast, watch},
};
use tracing::{debug, info, warn};

use crate::{
    classify::{ClassifiedError, classify},
    config::DEFAULT_CITY,
    error::WeatherError,
    model::WeatherSnapshot,
    repository::WeatherRepository,
};

/// Query issued automatically when the controller starts.
pub const DEFAULT_PLACE: &str = DEFAULT_CITY;

const UPDATE_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryStatus {
    Loading,
    Success(WeatherSnapshot),
    Failure(ClassifiedError),
}

impl QueryStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, QueryStatus::Loading)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_loading()
    }
}

/// A published status, tagged with the query that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub generation: u64,
    pub query: String,
    pub status: QueryStatus,
}

#[derive(Debug)]
struct ActiveQuery {
    generation: u64,
    query: String,
}

#[derive(Debug)]
struct Shared {
    repository: Arc<dyn WeatherRepository>,
    runtime: Handle,
    // Held while publishing so a Loading for a newer query and a result for an
    // older one can never interleave.
    active: Mutex<ActiveQuery>,
    status: watch::Sender<QueryStatus>,
    updates: broadcast::Sender<StatusUpdate>,
}

impl Shared {
    fn lock_active(&self) -> MutexGuard<'_, ActiveQuery> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, generation: u64, query: &str, status: QueryStatus) {
        self.status.send_replace(status.clone());
        // No subscribers is fine.
        let _ = self.updates.send(StatusUpdate {
            generation,
            query: query.to_owned(),
            status,
        });
    }

    fn settle(&self, generation: u64, query: &str, result: Result<WeatherSnapshot, WeatherError>) {
        let active = self.lock_active();
        if active.generation != generation {
            debug!(
                generation,
                latest = active.generation,
                query,
                ok = result.is_ok(),
                "Discarding result of superseded query"
            );
            return;
        }

        let status = match result {
            Ok(snapshot) => QueryStatus::Success(snapshot),
            Err(err) => {
                let classified = classify(&err);
                warn!(
                    generation,
                    query,
                    category = %classified.category,
                    error = %err,
                    "Weather fetch failed"
                );
                QueryStatus::Failure(classified)
            }
        };
        info!(generation, query, success = !matches!(status, QueryStatus::Failure(_)), "Query settled");
        self.publish(generation, query, status);
    }
}

/// Owns the active query and publishes its status.
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct QueryStateController {
    shared: Arc<Shared>,
}

impl QueryStateController {
    /// Start with [`DEFAULT_PLACE`] and immediately fetch it.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(repository: Arc<dyn WeatherRepository>) -> Self {
        Self::with_initial_query(repository, DEFAULT_PLACE)
    }

    /// Start with `city_name` and immediately fetch it.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn with_initial_query(
        repository: Arc<dyn WeatherRepository>,
        city_name: impl Into<String>,
    ) -> Self {
        Self::with_runtime(repository, city_name, Handle::current())
    }

    /// Like [`with_initial_query`](Self::with_initial_query), spawning fetches on `runtime`.
    pub fn with_runtime(
        repository: Arc<dyn WeatherRepository>,
        city_name: impl Into<String>,
        runtime: Handle,
    ) -> Self {
        let (status, _) = watch::channel(QueryStatus::Loading);
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);

        let controller = Self {
            shared: Arc::new(Shared {
                repository,
                runtime,
                active: Mutex::new(ActiveQuery {
                    generation: 0,
                    query: String::new(),
                }),
                status,
                updates,
            }),
        };
        controller.submit_query(city_name);
        controller
    }

    /// Replace the active query and start fetching it.
    ///
    /// Publishes `Loading` before returning. Any fetch still running for an
    /// earlier query can no longer change the published status. Input is not
    /// validated here; callers reject empty city names.
    pub fn submit_query(&self, city_name: impl Into<String>) -> u64 {
        let query = city_name.into();

        let generation = {
            let mut active = self.shared.lock_active();
            active.generation += 1;
            active.query.clone_from(&query);
            self.shared
                .publish(active.generation, &query, QueryStatus::Loading);
            active.generation
        };
        info!(generation, query = %query, "Query submitted");

        let shared = Arc::clone(&self.shared);
        self.shared.runtime.spawn(async move {
            // The fetch runs in its own task so a panicking repository still settles.
            let repository = Arc::clone(&shared.repository);
            let city = query.clone();
            let result = shared
                .runtime
                .spawn(async move { repository.city_weather(&city).await })
                .await
                .unwrap_or_else(|err| Err(WeatherError::Task(err)));
            shared.settle(generation, &query, result);
        });

        generation
    }

    /// Current status.
    pub fn status(&self) -> QueryStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver that always holds the latest status.
    pub fn subscribe(&self) -> watch::Receiver<QueryStatus> {
        self.shared.status.subscribe()
    }

    /// Every status published from now on, in order.
    pub fn updates(&self) -> broadcast::Receiver<StatusUpdate> {
        self.shared.updates.subscribe()
    }

    pub fn query(&self) -> String {
        self.shared.lock_active().query.clone()
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock_active().generation
    }

    /// Wait until the latest query has a terminal status and return it.
    pub async fn settled(&self) -> QueryStatus {
        let mut rx = self.subscribe();
        match rx.wait_for(QueryStatus::is_terminal).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorCategory;
    use async_trait::async_trait;
    use std::{collections::HashMap, time::Duration};
    use tokio::sync::oneshot;

    type Reply = Result<WeatherSnapshot, WeatherError>;

    /// Repository whose calls block until the test releases a reply for that city.
    #[derive(Debug, Default)]
    struct GatedRepository {
        gates: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
        calls: Mutex<Vec<String>>,
    }

    impl GatedRepository {
        fn gate(&self, city: &str) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(city.to_string(), rx);
            tx
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WeatherRepository for GatedRepository {
        async fn city_weather(&self, city_name: &str) -> Reply {
            self.calls.lock().unwrap().push(city_name.to_string());
            let gate = self.gates.lock().unwrap().remove(city_name);
            match gate {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(WeatherError::http_status(599, ""))),
                None => Err(WeatherError::http_status(404, "no gate")),
            }
        }
    }

    #[derive(Debug)]
    struct PanickingRepository;

    #[async_trait]
    impl WeatherRepository for PanickingRepository {
        async fn city_weather(&self, city_name: &str) -> Reply {
            panic!("repository blew up for {city_name}");
        }
    }

    fn snapshot(city: &str, temperature: f64) -> WeatherSnapshot {
        let mut snapshot = WeatherSnapshot {
            city_name: city.to_string(),
            ..Default::default()
        };
        snapshot.measurements.temperature = temperature;
        snapshot
    }

    async fn settle_tasks() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    async fn settled(controller: &QueryStateController) -> QueryStatus {
        tokio::time::timeout(Duration::from_secs(5), controller.settled())
            .await
            .expect("controller did not settle")
    }

    #[tokio::test]
    async fn starts_loading_and_fetches_default_place() {
        let repo = Arc::new(GatedRepository::default());
        let bangkok = repo.gate(DEFAULT_PLACE);

        let controller = QueryStateController::new(repo.clone());
        assert_eq!(controller.status(), QueryStatus::Loading);
        assert_eq!(controller.query(), DEFAULT_PLACE);
        assert_eq!(controller.generation(), 1);

        bangkok.send(Ok(snapshot("Bangkok", 30.2))).unwrap();

        match settled(&controller).await {
            QueryStatus::Success(s) => assert_eq!(s.measurements.temperature, 30.2),
            other => panic!("unexpected status: {other:?}"),
        }
        assert_eq!(repo.calls(), vec![DEFAULT_PLACE.to_string()]);
    }

    #[tokio::test]
    async fn each_query_publishes_loading_then_one_terminal_status() {
        let repo = Arc::new(GatedRepository::default());
        let initial = repo.gate("Oslo");
        let controller = QueryStateController::with_initial_query(repo.clone(), "Oslo");
        initial.send(Ok(snapshot("Oslo", 1.0))).unwrap();
        settled(&controller).await;

        let mut updates = controller.updates();
        let lima = repo.gate("Lima");
        let generation = controller.submit_query("Lima");
        assert_eq!(controller.status(), QueryStatus::Loading);

        lima.send(Ok(snapshot("Lima", 19.0))).unwrap();
        settled(&controller).await;
        settle_tasks().await;

        let first = updates.recv().await.unwrap();
        assert_eq!(first.generation, generation);
        assert_eq!(first.query, "Lima");
        assert_eq!(first.status, QueryStatus::Loading);

        let second = updates.recv().await.unwrap();
        assert_eq!(second.generation, generation);
        assert!(matches!(second.status, QueryStatus::Success(ref s) if s.city_name == "Lima"));

        assert!(updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn latest_query_wins_over_slower_earlier_query() {
        let repo = Arc::new(GatedRepository::default());
        let _bangkok = repo.gate(DEFAULT_PLACE);
        let controller = QueryStateController::new(repo.clone());

        let a = repo.gate("A");
        let b = repo.gate("B");
        controller.submit_query("A");
        controller.submit_query("B");
        settle_tasks().await;

        b.send(Ok(snapshot("B", 2.0))).unwrap();
        match settled(&controller).await {
            QueryStatus::Success(s) => assert_eq!(s.city_name, "B"),
            other => panic!("unexpected status: {other:?}"),
        }

        let mut updates = controller.updates();
        a.send(Ok(snapshot("A", 1.0))).unwrap();
        settle_tasks().await;

        match controller.status() {
            QueryStatus::Success(s) => assert_eq!(s.city_name, "B"),
            other => panic!("unexpected status: {other:?}"),
        }
        assert!(updates.try_recv().is_err());
        assert_eq!(controller.query(), "B");
    }

    #[tokio::test]
    async fn stale_result_arriving_before_latest_is_not_published() {
        let repo = Arc::new(GatedRepository::default());
        let _bangkok = repo.gate(DEFAULT_PLACE);
        let controller = QueryStateController::new(repo.clone());

        let a = repo.gate("A");
        let b = repo.gate("B");
        controller.submit_query("A");
        controller.submit_query("B");
        settle_tasks().await;

        a.send(Err(WeatherError::http_status(500, ""))).unwrap();
        settle_tasks().await;
        assert_eq!(controller.status(), QueryStatus::Loading);

        b.send(Ok(snapshot("B", 2.0))).unwrap();
        assert!(matches!(settled(&controller).await, QueryStatus::Success(_)));
    }

    #[tokio::test]
    async fn failures_are_classified_not_propagated() {
        let repo = Arc::new(GatedRepository::default());
        let gate = repo.gate("Zzqqxx");
        let controller = QueryStateController::with_initial_query(repo.clone(), "Zzqqxx");

        gate.send(Err(WeatherError::http_status(404, "{\"cod\":\"404\"}")))
            .unwrap();

        match settled(&controller).await {
            QueryStatus::Failure(err) => {
                assert_eq!(err.category, ErrorCategory::NotFound);
                assert_eq!(err.raw_status_code, Some(404));
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_repository_settles_as_unknown_failure() {
        let controller =
            QueryStateController::with_initial_query(Arc::new(PanickingRepository), "Atlantis");

        match settled(&controller).await {
            QueryStatus::Failure(err) => {
                assert_eq!(err.category, ErrorCategory::Unknown);
                assert_eq!(err.raw_status_code, None);
            }
            other => panic!("unexpected status: {other:?}"),
        }

        controller.submit_query("Atlantis");
        assert!(controller.status().is_loading());
        assert!(matches!(settled(&controller).await, QueryStatus::Failure(_)));
    }

    #[tokio::test]
    async fn controller_recovers_after_failure() {
        let repo = Arc::new(GatedRepository::default());
        let gate = repo.gate("Nowhere");
        let controller = QueryStateController::with_initial_query(repo.clone(), "Nowhere");
        gate.send(Err(WeatherError::http_status(401, ""))).unwrap();
        assert!(matches!(settled(&controller).await, QueryStatus::Failure(_)));

        let paris = repo.gate("Paris");
        controller.submit_query("Paris");
        assert!(controller.status().is_loading());
        paris.send(Ok(snapshot("Paris", 14.0))).unwrap();
        assert!(matches!(settled(&controller).await, QueryStatus::Success(_)));
    }

    #[tokio::test]
    async fn observers_see_the_same_sequence() {
        let repo = Arc::new(GatedRepository::default());
        let initial = repo.gate("Oslo");
        let controller = QueryStateController::with_initial_query(repo.clone(), "Oslo");
        initial.send(Ok(snapshot("Oslo", 1.0))).unwrap();
        settled(&controller).await;

        let mut first = controller.updates();
        let mut second = controller.clone().updates();

        let rome = repo.gate("Rome");
        controller.submit_query("Rome");
        rome.send(Err(WeatherError::http_status(503, ""))).unwrap();
        settled(&controller).await;
        settle_tasks().await;

        for _ in 0..2 {
            assert_eq!(first.recv().await.unwrap(), second.recv().await.unwrap());
        }
        assert!(first.try_recv().is_err());
        assert!(second.try_recv().is_err());
    }

    #[tokio::test]
    async fn watch_subscribers_observe_latest_status() {
        let repo = Arc::new(GatedRepository::default());
        let gate = repo.gate("Cairo");
        let controller = QueryStateController::with_initial_query(repo.clone(), "Cairo");

        let mut rx = controller.subscribe();
        gate.send(Ok(snapshot("Cairo", 35.0))).unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(QueryStatus::is_terminal))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(status, controller.status());
    }
}
