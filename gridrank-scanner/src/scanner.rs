use crate::client::RankChecker;
use crate::error::Result;
use crate::result::{Coordinate, PointOutcome, ScanResult};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Called after every finished lookup with `(worker_id, completed, total)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize, usize) + Send + Sync>;

pub const DEFAULT_WORKERS: usize = 4;

/// Up-front cost and duration guess for a scan. The duration is an estimate
/// derived from an assumed per-lookup latency, not a measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEstimate {
    pub lookups: usize,
    pub credits: f64,
    pub estimated_duration: Duration,
}

pub struct RankScanner {
    checker: Arc<dyn RankChecker>,
    workers: usize,
    request_interval: Duration,
    progress_callback: Option<ProgressCallback>,
}

type WorkQueue = Arc<Mutex<VecDeque<(usize, Coordinate)>>>;

impl RankScanner {
    pub fn new(checker: Arc<dyn RankChecker>) -> Self {
        Self {
            checker,
            workers: DEFAULT_WORKERS,
            request_interval: Duration::ZERO,
            progress_callback: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Minimum spacing between request starts, shared by all workers.
    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn estimate(
        point_count: usize,
        workers: usize,
        credits_per_lookup: f64,
        assumed_latency: Duration,
    ) -> ScanEstimate {
        let workers = workers.clamp(1, point_count.max(1));
        let rounds = point_count.div_ceil(workers);
        ScanEstimate {
            lookups: point_count,
            credits: point_count as f64 * credits_per_lookup,
            estimated_duration: assumed_latency * rounds as u32,
        }
    }

    /// Look up every point. Individual failures are recorded in the result,
    /// never returned as an error.
    pub async fn scan(
        &self,
        keyword: &str,
        target: Option<&str>,
        points: &[Coordinate],
    ) -> Result<ScanResult> {
        let started = std::time::Instant::now();
        let total = points.len();
        let workers = self.workers.min(total.max(1));

        info!(
            "Scanning '{}' over {} points with {} workers",
            keyword, total, workers
        );

        let queue: WorkQueue = Arc::new(Mutex::new(points.iter().copied().enumerate().collect()));
        let slots: Arc<Mutex<Vec<Option<PointOutcome>>>> = Arc::new(Mutex::new(vec![None; total]));
        let completed = Arc::new(AtomicUsize::new(0));
        let pacer = Arc::new(Mutex::new(Instant::now()));

        let mut worker_handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let checker = self.checker.clone();
            let queue = queue.clone();
            let slots = slots.clone();
            let completed = completed.clone();
            let pacer = pacer.clone();
            let progress_cb = self.progress_callback.clone();
            let interval = self.request_interval;
            let keyword = keyword.to_string();
            let target = target.map(str::to_string);

            let handle = tokio::spawn(async move {
                debug!("Worker {} started", worker_id);

                loop {
                    let work_item = { queue.lock().await.pop_front() };
                    let Some((index, point)) = work_item else {
                        break;
                    };

                    wait_for_slot(&pacer, interval).await;

                    let outcome = match checker
                        .check_rank(&keyword, target.as_deref(), point)
                        .await
                    {
                        Ok(lookup) => PointOutcome::from_lookup(lookup),
                        Err(e) => {
                            warn!(
                                "Rank lookup failed for point {} ({:.5},{:.5}): {}",
                                index, point.latitude, point.longitude, e
                            );
                            PointOutcome::Failed {
                                error: e.to_string(),
                            }
                        }
                    };

                    slots.lock().await[index] = Some(outcome);

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref callback) = progress_cb {
                        callback(worker_id, done, total);
                    }
                }

                debug!("Worker {} finished", worker_id);
            });

            worker_handles.push(handle);
        }

        for result in futures::future::join_all(worker_handles).await {
            if let Err(e) = result {
                warn!("Scan worker task failed: {}", e);
            }
        }

        // A slot is only empty if its worker died mid-lookup.
        let outcomes: Vec<PointOutcome> = slots
            .lock()
            .await
            .drain(..)
            .map(|slot| {
                slot.unwrap_or_else(|| PointOutcome::Failed {
                    error: "lookup did not complete".to_string(),
                })
            })
            .collect();

        let result = ScanResult::new(outcomes, started.elapsed());
        info!(
            "Scan complete: {} points, {} failed, status {}",
            total,
            result.failed_count(),
            result.status.as_str()
        );
        Ok(result)
    }
}

async fn wait_for_slot(pacer: &Mutex<Instant>, interval: Duration) {
    if interval.is_zero() {
        return;
    }

    let start_at = {
        let mut next = pacer.lock().await;
        let start_at = (*next).max(Instant::now());
        *next = start_at + interval;
        start_at
    };

    tokio::time::sleep_until(start_at).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpRankClient;
    use crate::error::ScanError;
    use crate::result::{RankLookup, ScanStatus};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    /// Answers with the point's latitude as the position; latitudes listed in
    /// `failing` error out.
    struct ScriptedChecker {
        failing: HashSet<u32>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedChecker {
        fn new(failing: &[u32], delay: Duration) -> Self {
            Self {
                failing: failing.iter().copied().collect(),
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RankChecker for ScriptedChecker {
        async fn check_rank(
            &self,
            _keyword: &str,
            _target: Option<&str>,
            at: Coordinate,
        ) -> crate::error::Result<RankLookup> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let key = at.latitude as u32;
            if self.failing.contains(&key) {
                return Err(ScanError::Other(format!("boom at {}", key)));
            }
            Ok(RankLookup {
                position: if key == 0 { None } else { Some(key) },
                business_count: Some(key * 2),
            })
        }
    }

    fn points(latitudes: &[u32]) -> Vec<Coordinate> {
        latitudes
            .iter()
            .map(|lat| Coordinate::new(*lat as f64, 0.0))
            .collect()
    }

    #[tokio::test]
    async fn test_outcomes_keep_grid_order() {
        let checker = Arc::new(ScriptedChecker::new(&[], Duration::from_millis(1)));
        let scanner = RankScanner::new(checker).with_workers(3);

        let result = scanner
            .scan("kw", None, &points(&[5, 1, 0, 9, 2, 7, 3]))
            .await
            .unwrap();

        assert_eq!(
            result.positions(),
            vec![Some(5), Some(1), None, Some(9), Some(2), Some(7), Some(3)]
        );
        assert_eq!(result.business_counts()[3], Some(18));
        assert_eq!(result.status, ScanStatus::Complete);
    }

    #[tokio::test]
    async fn test_failed_points_do_not_abort_scan() {
        let checker = Arc::new(ScriptedChecker::new(&[2, 4], Duration::ZERO));
        let scanner = RankScanner::new(checker).with_workers(2);

        let result = scanner
            .scan("kw", None, &points(&[1, 2, 3, 4, 5]))
            .await
            .unwrap();

        assert_eq!(result.positions(), vec![Some(1), None, Some(3), None, Some(5)]);
        assert_eq!(result.status, ScanStatus::Partial { failed: 2 });
        let failed_indexes: Vec<usize> = result.failures().iter().map(|(i, _)| *i).collect();
        assert_eq!(failed_indexes, vec![1, 3]);
        assert!(result.failures()[0].1.contains("boom at 2"));
    }

    #[tokio::test]
    async fn test_total_failure_keeps_every_point() {
        let checker = Arc::new(ScriptedChecker::new(&[1, 2, 3], Duration::ZERO));
        let scanner = RankScanner::new(checker);

        let result = scanner.scan("kw", None, &points(&[1, 2, 3])).await.unwrap();

        assert_eq!(result.outcomes.len(), 3);
        assert_eq!(result.status, ScanStatus::Failed);
    }

    #[tokio::test]
    async fn test_worker_pool_is_bounded() {
        let checker = Arc::new(ScriptedChecker::new(&[], Duration::from_millis(20)));
        let scanner = RankScanner::new(checker.clone()).with_workers(3);

        let lats: Vec<u32> = (1..=12).collect();
        scanner.scan("kw", None, &points(&lats)).await.unwrap();

        let max = checker.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "expected at most 3 concurrent lookups, saw {}", max);
        assert!(max > 1, "expected lookups to overlap, saw {}", max);
    }

    #[tokio::test]
    async fn test_progress_reports_every_point() {
        let reports: Arc<std::sync::Mutex<Vec<(usize, usize, usize)>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));
        let reports_clone = reports.clone();

        let checker = Arc::new(ScriptedChecker::new(&[3], Duration::ZERO));
        let scanner = RankScanner::new(checker)
            .with_workers(2)
            .with_progress_callback(Arc::new(move |worker_id, done, total| {
                reports_clone.lock().unwrap().push((worker_id, done, total));
            }));

        scanner
            .scan("kw", None, &points(&[1, 2, 3, 4]))
            .await
            .unwrap();

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 4);
        let mut done: Vec<usize> = reports.iter().map(|r| r.1).collect();
        done.sort();
        assert_eq!(done, vec![1, 2, 3, 4]);
        assert!(reports.iter().all(|r| r.2 == 4 && r.0 < 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_interval_paces_starts() {
        let checker = Arc::new(ScriptedChecker::new(&[], Duration::ZERO));
        let scanner = RankScanner::new(checker)
            .with_workers(4)
            .with_request_interval(Duration::from_millis(100));

        let started = Instant::now();
        scanner
            .scan("kw", None, &points(&[1, 2, 3, 4, 5]))
            .await
            .unwrap();

        // Five starts spaced 100ms apart: the last begins 400ms in.
        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_empty_point_list() {
        let checker = Arc::new(ScriptedChecker::new(&[], Duration::ZERO));
        let result = RankScanner::new(checker).scan("kw", None, &[]).await.unwrap();

        assert!(result.outcomes.is_empty());
        assert_eq!(result.status, ScanStatus::Complete);
    }

    #[test]
    fn test_estimate() {
        let estimate = RankScanner::estimate(25, 4, 2.0, Duration::from_secs(2));
        assert_eq!(estimate.lookups, 25);
        assert_eq!(estimate.credits, 50.0);
        // ceil(25 / 4) = 7 rounds
        assert_eq!(estimate.estimated_duration, Duration::from_secs(14));

        let estimate = RankScanner::estimate(9, 0, 1.0, Duration::from_secs(1));
        assert_eq!(estimate.estimated_duration, Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_scan_against_http_api() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/rank"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "position": 7,
                "business_count": 31
            })))
            .expect(9)
            .mount(&mock_server)
            .await;

        let client = Arc::new(HttpRankClient::new(&mock_server.uri(), 5).unwrap());
        let scanner = RankScanner::new(client).with_workers(4);

        let grid: Vec<Coordinate> = (0..9)
            .map(|i| Coordinate::new(51.5 + i as f64 * 0.01, -0.12))
            .collect();
        let result = scanner.scan("locksmith", Some("Keys Ltd"), &grid).await.unwrap();

        assert_eq!(result.positions(), vec![Some(7); 9]);
        assert_eq!(result.status, ScanStatus::Complete);
    }
}
