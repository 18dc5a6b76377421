// src/pipeline/harvest.rs

//! Concurrent, resumable harvest of the registry.
//!
//! A run moves through [`HarvestPhase`] in order:
//!
//! ```text
//! Init → Enumerating → Dispatching → Draining → Finalizing → Done
//! ```
//!
//! Records already present in the checkpoint are never dispatched again, and
//! the previous snapshot is carried into the new one, so rerunning against an
//! unchanged listing rewrites the same output without rendering any profile.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{FutureExt, StreamExt, stream};
use tokio::sync::mpsc;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{
    CompiledSelectors, Config, HarvestConfig, HarvestState, HarvestSummary, OutputRow,
    RecordReference,
};
use crate::pipeline::collector::{Collector, Completion};
use crate::services::{PageRenderer, extract_listing, extract_sub_records};
use crate::storage::RowStorage;

/// Named states of a harvest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestPhase {
    Init,
    Enumerating,
    Dispatching,
    Draining,
    Finalizing,
    Done,
}

impl fmt::Display for HarvestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Enumerating => "enumerating",
            Self::Dispatching => "dispatching",
            Self::Draining => "draining",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Drives listing enumeration, the worker pool and snapshot persistence.
pub struct Harvester {
    config: HarvestConfig,
    base_url: Url,
    selectors: Arc<CompiledSelectors>,
    renderer: Arc<dyn PageRenderer>,
    storage: Arc<dyn RowStorage>,
}

impl Harvester {
    /// Create a harvester; fails on an invalid base URL or selector.
    pub fn new(
        config: &Config,
        renderer: Arc<dyn PageRenderer>,
        storage: Arc<dyn RowStorage>,
    ) -> Result<Self> {
        Ok(Self {
            config: config.harvest.clone(),
            base_url: Url::parse(&config.harvest.base_url)?,
            selectors: Arc::new(config.selectors.compile()?),
            renderer,
            storage,
        })
    }

    fn enter(&self, phase: HarvestPhase) {
        log::debug!("Harvest phase: {phase}");
    }

    /// Run the whole harvest and report totals.
    pub async fn run(&self) -> Result<HarvestSummary> {
        let start_time = Utc::now();

        self.enter(HarvestPhase::Init);
        let (seed_rows, state) = self.init().await?;

        self.enter(HarvestPhase::Enumerating);
        let references = self.enumerate().await?;
        if references.is_empty() {
            log::warn!("No dentists found. Nothing to harvest.");
            self.enter(HarvestPhase::Done);
            return Ok(HarvestSummary {
                start_time,
                end_time: Utc::now(),
                records_found: 0,
                records_skipped: 0,
                records_dispatched: 0,
                records_failed: 0,
                rows_produced: 0,
                rows_persisted: 0,
            });
        }

        self.enter(HarvestPhase::Dispatching);
        let records_found = references.len();
        let pending = pending_references(references, &state);
        let records_dispatched = pending.len();
        log::info!(
            "{records_dispatched} dentists remaining to process out of {records_found} total."
        );

        let collector = Collector::new(
            Arc::clone(&self.storage),
            seed_rows,
            self.config.persist_every,
        );

        self.enter(HarvestPhase::Draining);
        let collector = self.dispatch(pending, collector).await?;

        self.enter(HarvestPhase::Finalizing);
        let (_, report) = collector.finalize().await?;

        self.enter(HarvestPhase::Done);
        Ok(HarvestSummary {
            start_time,
            end_time: Utc::now(),
            records_found,
            records_skipped: records_found - records_dispatched,
            records_dispatched,
            records_failed: report.records_failed,
            rows_produced: report.rows_produced,
            rows_persisted: report.rows_persisted,
        })
    }

    /// Load the previous snapshot and the owner names it covers.
    async fn init(&self) -> Result<(Vec<OutputRow>, HarvestState)> {
        let rows = self.storage.load_rows().await?;
        let state = HarvestState::from_rows(&rows);
        if !state.is_empty() {
            log::info!(
                "Loaded {} already-processed dentists from checkpoint.",
                state.len()
            );
        }
        Ok((rows, state))
    }

    /// Render the listing page and extract every record reference.
    async fn enumerate(&self) -> Result<Vec<RecordReference>> {
        log::info!("Fetching listing from {}", self.config.listing_url);
        let html = self.renderer.render(&self.config.listing_url).await?;
        let references = extract_listing(&html, &self.base_url, &self.selectors);
        log::info!("Found {} dentist links.", references.len());
        warn_on_homonyms(&references);
        Ok(references)
    }

    /// Run pending records through the bounded pool, streaming results to the collector.
    async fn dispatch(&self, pending: Vec<RecordReference>, collector: Collector) -> Result<Collector> {
        let pool_size = self.config.pool_size.max(1);
        let (tx, rx) = mpsc::channel(pool_size * 2);
        let collector_task = tokio::spawn(collector.run(rx));

        let mut completions = stream::iter(pending)
            .map(|reference| self.harvest_isolated(reference))
            .buffer_unordered(pool_size);

        while let Some(completion) = completions.next().await {
            if tx.send(completion).await.is_err() {
                log::error!("Collector stopped early; remaining results are dropped.");
                break;
            }
        }
        drop(tx);

        collector_task
            .await
            .map_err(|e| AppError::harvest("collector", e))
    }

    /// Harvest one record, converting errors, panics and overruns into a failed completion.
    async fn harvest_isolated(&self, reference: RecordReference) -> Completion {
        let limit = Duration::from_secs(self.config.record_timeout_secs);
        let guarded = tokio::time::timeout(limit, self.harvest_record(&reference));

        let outcome = match AssertUnwindSafe(guarded).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AppError::harvest(
                &reference.display_name,
                format!("timed out after {}s", limit.as_secs()),
            )),
            Err(panic) => Err(AppError::harvest(
                &reference.display_name,
                format!("worker panicked: {}", panic_message(panic.as_ref())),
            )),
        };

        Completion { reference, outcome }
    }

    /// Render a profile page and flatten its locations into rows.
    async fn harvest_record(&self, reference: &RecordReference) -> Result<Vec<OutputRow>> {
        log::info!("Fetching clinic details for: {}", reference.display_name);

        let sub_records = match self.renderer.render(&reference.detail_url).await {
            Ok(html) => extract_sub_records(&html, &reference.display_name, &self.selectors),
            Err(failure) => {
                log::warn!(
                    "Skipping {} due to missing or inaccessible page: {failure}",
                    reference.display_name
                );
                Vec::new()
            }
        };

        Ok(OutputRow::for_owner(&reference.display_name, sub_records))
    }
}

/// References not yet in the checkpoint, in listing order.
pub fn pending_references(
    references: Vec<RecordReference>,
    state: &HarvestState,
) -> Vec<RecordReference> {
    references
        .into_iter()
        .filter(|r| !state.is_completed(&r.display_name))
        .collect()
}

/// Log display names that appear more than once on the listing.
///
/// Identity is the display name, so a second professional with the same name
/// is treated as already completed on resume.
fn warn_on_homonyms(references: &[RecordReference]) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in references {
        *counts.entry(r.display_name.as_str()).or_default() += 1;
    }
    for (name, count) in counts.into_iter().filter(|(_, c)| *c > 1) {
        log::warn!("Listing has {count} entries named {name}; they share one checkpoint key.");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RenderFailure;
    use crate::storage::CsvStorage;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const LISTING_URL: &str = "https://www.rcdso.org/find-a-dentist/search-results";

    /// Serves canned markup; URLs listed in `panics` panic, others missing time out.
    #[derive(Default)]
    struct FakeRenderer {
        pages: HashMap<String, String>,
        panics: HashSet<String>,
        hangs: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRenderer {
        fn with_dentists(names: &[&str]) -> Self {
            let mut pages = HashMap::new();
            let anchors: String = names
                .iter()
                .enumerate()
                .map(|(i, n)| format!(r#"<section class="row"><h2><a href="/p/{i}">{n}</a></h2></section>"#))
                .collect();
            pages.insert(LISTING_URL.to_string(), format!("<main>{anchors}</main>"));
            for (i, n) in names.iter().enumerate() {
                pages.insert(
                    format!("https://www.rcdso.org/p/{i}"),
                    format!(
                        r#"<main><section id="OtherPractices"><li class="row"><h6 class="col-12">{n} Clinic</h6><address><span>{i} Main St</span><span>Toronto</span></address></li></section></main>"#
                    ),
                );
            }
            Self {
                pages,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render(&self, url: &str) -> std::result::Result<String, RenderFailure> {
            self.calls.lock().unwrap().push(url.to_string());
            if self.panics.contains(url) {
                panic!("renderer exploded on {url}");
            }
            if self.hangs.contains(url) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| RenderFailure::timeout(url, Duration::from_secs(20)))
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.harvest.listing_url = LISTING_URL.to_string();
        config
    }

    fn storage(tmp: &TempDir) -> Arc<CsvStorage> {
        Arc::new(CsvStorage::new(
            tmp.path().join("partial.csv"),
            tmp.path().join("out.csv"),
        ))
    }

    #[test]
    fn test_pending_skips_completed() {
        let refs: Vec<RecordReference> = ["A", "B", "C"]
            .iter()
            .map(|n| RecordReference {
                display_name: n.to_string(),
                detail_url: format!("https://x/{n}"),
            })
            .collect();
        let mut state = HarvestState::default();
        state.mark_completed("B");

        let pending = pending_references(refs, &state);
        let names: Vec<_> = pending.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }

    #[tokio::test]
    async fn test_empty_listing_is_done_without_writing() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        let renderer = Arc::new(FakeRenderer::with_dentists(&[]));
        let harvester = Harvester::new(&config(), renderer, storage.clone()).unwrap();

        let summary = harvester.run().await.unwrap();

        assert_eq!(summary.records_found, 0);
        assert_eq!(summary.records_dispatched, 0);
        assert!(!storage.output_path().exists());
    }

    #[tokio::test]
    async fn test_listing_render_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let renderer = Arc::new(FakeRenderer::default());
        let harvester = Harvester::new(&config(), renderer, storage(&tmp)).unwrap();

        let err = harvester.run().await.unwrap_err();
        assert!(matches!(err, AppError::Render { .. }));
    }

    #[tokio::test]
    async fn test_failing_record_is_isolated() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        let names = ["Dr. A", "Dr. B", "Dr. C", "Dr. D", "Dr. E", "Dr. F", "Dr. G"];
        let mut renderer = FakeRenderer::with_dentists(&names);
        renderer.panics.insert("https://www.rcdso.org/p/3".to_string());
        let harvester = Harvester::new(&config(), Arc::new(renderer), storage.clone()).unwrap();

        let summary = harvester.run().await.unwrap();

        assert_eq!(summary.records_found, 7);
        assert_eq!(summary.records_failed, 1);
        assert_eq!(summary.rows_persisted, 6);

        let completed = storage.load_completed().await.unwrap();
        assert_eq!(completed.len(), 6);
        assert!(!completed.contains("Dr. D"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_record_times_out_as_failure() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        let mut renderer = FakeRenderer::with_dentists(&["Dr. A", "Dr. B"]);
        renderer.hangs.insert("https://www.rcdso.org/p/1".to_string());
        let harvester = Harvester::new(&config(), Arc::new(renderer), storage.clone()).unwrap();

        let summary = harvester.run().await.unwrap();

        assert_eq!(summary.records_failed, 1);
        let rows = storage.load_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].owner_name, "Dr. A");
    }

    #[tokio::test]
    async fn test_resume_skips_checkpointed_records() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        storage
            .write_snapshot(&[OutputRow::no_clinics("Dr. B")])
            .await
            .unwrap();

        let renderer = Arc::new(FakeRenderer::with_dentists(&["Dr. A", "Dr. B"]));
        let harvester = Harvester::new(&config(), renderer.clone(), storage.clone()).unwrap();
        let summary = harvester.run().await.unwrap();

        assert_eq!(summary.records_skipped, 1);
        assert_eq!(summary.records_dispatched, 1);
        assert!(!renderer.calls().contains(&"https://www.rcdso.org/p/1".to_string()));

        let rows = storage.load_rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], OutputRow::no_clinics("Dr. B"));
        assert_eq!(rows[1].location_name, "Dr. A Clinic");
        assert_eq!(rows[1].address, "0 Main St, Toronto");
    }

    /// Wraps canned pages and tracks how many renders overlap.
    struct CountingRenderer {
        inner: FakeRenderer,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageRenderer for CountingRenderer {
        async fn render(&self, url: &str) -> std::result::Result<String, RenderFailure> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            let page = self.inner.render(url).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            page
        }
    }

    #[tokio::test]
    async fn test_concurrent_renders_never_exceed_pool_size() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        let names: Vec<String> = (0..25).map(|i| format!("Dr. {i:02}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let renderer = Arc::new(CountingRenderer {
            inner: FakeRenderer::with_dentists(&names),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let mut config = config();
        config.harvest.pool_size = 3;
        let harvester = Harvester::new(&config, renderer.clone(), storage.clone()).unwrap();

        let summary = harvester.run().await.unwrap();

        assert_eq!(renderer.peak.load(Ordering::SeqCst), 3);
        assert_eq!(summary.records_dispatched, 25);
        assert_eq!(summary.records_failed, 0);
        assert_eq!(storage.load_rows().await.unwrap().len(), 25);
    }
}
