//! End-to-end harvest runs against canned pages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clinic_harvester::{
    models::{Config, OutputRow},
    pipeline::{Harvester, run_grouping},
    services::{PageRenderer, RenderFailure},
    storage::{CsvStorage, RowStorage},
};
use tempfile::TempDir;

const LISTING_URL: &str = "https://www.rcdso.org/find-a-dentist/search-results";

struct CannedSite {
    pages: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl CannedSite {
    fn new() -> Self {
        let mut pages = HashMap::new();
        pages.insert(
            LISTING_URL.to_string(),
            r#"<main>
                <section class="row"><h2><a href="/en-ca/find-a-dentist/dr-a">Dr. A</a></h2></section>
                <section class="row"><h2><a href="/en-ca/find-a-dentist/dr-b">Dr. B</a></h2></section>
                <section class="row"><h2><a href="/en-ca/find-a-dentist/dr-c">Dr. C</a></h2></section>
            </main>"#
                .to_string(),
        );
        pages.insert(
            "https://www.rcdso.org/en-ca/find-a-dentist/dr-a".to_string(),
            r#"<main><section id="OtherPractices">
                <li class="row">
                    <h6 class="col-12">Bay Dental</h6>
                    <address><span>1 Bay St</span><span>Toronto, ON</span></address>
                </li>
            </section></main>"#
                .to_string(),
        );
        pages.insert(
            "https://www.rcdso.org/en-ca/find-a-dentist/dr-c".to_string(),
            r#"<main><section id="OtherPractices">
                <li class="row">
                    <h6 class="col-12">Apex Clinic</h6>
                    <address><span>9 Apex Rd</span><span>Ottawa, ON</span></address>
                </li>
            </section></main>"#
                .to_string(),
        );
        Self {
            pages,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn profile_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() != LISTING_URL)
            .count()
    }
}

#[async_trait]
impl PageRenderer for CannedSite {
    async fn render(&self, url: &str) -> Result<String, RenderFailure> {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| RenderFailure::timeout(url, Duration::from_secs(20)))
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.harvest.listing_url = LISTING_URL.to_string();
    config.harvest.pool_size = 2;
    config
}

fn sorted(mut rows: Vec<OutputRow>) -> Vec<OutputRow> {
    rows.sort_by(|a, b| {
        (&a.owner_name, &a.location_name).cmp(&(&b.owner_name, &b.location_name))
    });
    rows
}

#[tokio::test]
async fn test_unrenderable_profile_becomes_sentinel_row() {
    let tmp = TempDir::new().unwrap();
    let config = config();
    let storage = Arc::new(CsvStorage::from_paths(&config.paths, tmp.path()));
    let site = Arc::new(CannedSite::new());

    let harvester = Harvester::new(&config, site.clone(), storage.clone()).unwrap();
    let summary = harvester.run().await.unwrap();

    assert_eq!(summary.records_found, 3);
    assert_eq!(summary.records_dispatched, 3);
    assert_eq!(summary.records_failed, 0);
    assert_eq!(summary.rows_persisted, 3);

    let rows = sorted(storage.load_rows().await.unwrap());
    assert_eq!(
        rows,
        vec![
            OutputRow {
                owner_name: "Dr. A".to_string(),
                location_name: "Bay Dental".to_string(),
                address: "1 Bay St, Toronto, ON".to_string(),
            },
            OutputRow {
                owner_name: "Dr. B".to_string(),
                location_name: "No clinics found".to_string(),
                address: "N/A".to_string(),
            },
            OutputRow {
                owner_name: "Dr. C".to_string(),
                location_name: "Apex Clinic".to_string(),
                address: "9 Apex Rd, Ottawa, ON".to_string(),
            },
        ]
    );

    let checkpoint = std::fs::read(storage.checkpoint_path()).unwrap();
    let output = std::fs::read(storage.output_path()).unwrap();
    assert_eq!(checkpoint, output);
    assert!(
        String::from_utf8(output)
            .unwrap()
            .starts_with("Dentist Name,Clinic Name,Address\n")
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let config = config();
    let storage = Arc::new(CsvStorage::from_paths(&config.paths, tmp.path()));

    let first = Harvester::new(&config, Arc::new(CannedSite::new()), storage.clone())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.records_dispatched, 3);
    let before = std::fs::read(storage.output_path()).unwrap();

    let site = Arc::new(CannedSite::new());
    let second = Harvester::new(&config, site.clone(), storage.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(second.records_skipped, 3);
    assert_eq!(second.records_dispatched, 0);
    assert_eq!(site.profile_calls(), 0);
    assert_eq!(std::fs::read(storage.output_path()).unwrap(), before);
}

#[tokio::test]
async fn test_grouping_after_harvest() {
    let tmp = TempDir::new().unwrap();
    let config = config();
    let storage = Arc::new(CsvStorage::from_paths(&config.paths, tmp.path()));
    Harvester::new(&config, Arc::new(CannedSite::new()), storage.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    let grouped_path = config.paths.grouped_path(tmp.path());
    let count = run_grouping(storage.output_path(), &grouped_path)
        .await
        .unwrap();

    assert_eq!(count, 2);
    let grouped = std::fs::read_to_string(&grouped_path).unwrap();
    let lines: Vec<_> = grouped.lines().collect();
    assert_eq!(lines[0], "Address,Dentist Name,Clinic Name");
    assert_eq!(lines[1], "\"1 Bay St, Toronto, ON\",Dr. A,Bay Dental");
    assert_eq!(lines[2], "\"9 Apex Rd, Ottawa, ON\",Dr. C,Apex Clinic");
}
