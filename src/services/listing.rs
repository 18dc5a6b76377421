// src/services/listing.rs

//! Listing page extraction.

use scraper::Html;
use url::Url;

use crate::models::{CompiledSelectors, RecordReference};
use crate::utils::{normalize_whitespace, resolve_url};

/// Extract every professional linked from a rendered listing page.
///
/// Anchors without text or `href` are skipped. No matches yields an empty
/// vector, which callers treat as nothing to harvest.
pub fn extract_listing(
    html: &str,
    base_url: &Url,
    selectors: &CompiledSelectors,
) -> Vec<RecordReference> {
    let document = Html::parse_document(html);

    document
        .select(&selectors.listing_anchor)
        .filter_map(|anchor| {
            let display_name = normalize_whitespace(&anchor.text().collect::<String>());
            let href = anchor.value().attr("href")?.trim();
            if display_name.is_empty() || href.is_empty() {
                log::debug!("Skipping listing anchor without name or link");
                return None;
            }
            Some(RecordReference {
                display_name,
                detail_url: resolve_url(base_url, href),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageSelectors;

    fn base() -> Url {
        Url::parse("https://www.rcdso.org").unwrap()
    }

    fn selectors() -> CompiledSelectors {
        PageSelectors::default().compile().unwrap()
    }

    #[test]
    fn test_extract_every_matching_anchor() {
        let html = r#"
            <html><body><main>
              <section class="row"><h2><a href="/find-a-dentist/profile?id=1"> Dr. Ada Lovelace </a></h2></section>
              <section class="row"><h2><a href="/find-a-dentist/profile?id=2">Dr.
                  Alan Turing</a></h2></section>
              <section class="row"><h2><a href="https://www.rcdso.org/find-a-dentist/profile?id=3">Dr. Grace Hopper</a></h2></section>
              <section class="other"><h2><a href="/ignored">Not a dentist</a></h2></section>
            </main></body></html>
        "#;

        let refs = extract_listing(html, &base(), &selectors());

        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].display_name, "Dr. Ada Lovelace");
        assert_eq!(
            refs[0].detail_url,
            "https://www.rcdso.org/find-a-dentist/profile?id=1"
        );
        assert_eq!(refs[1].display_name, "Dr. Alan Turing");
        for r in &refs {
            assert!(!r.display_name.is_empty());
            assert!(Url::parse(&r.detail_url).is_ok());
        }
    }

    #[test]
    fn test_no_matches_is_empty() {
        let html = "<html><body><main><p>No results</p></main></body></html>";
        assert!(extract_listing(html, &base(), &selectors()).is_empty());
    }

    #[test]
    fn test_skips_anchor_without_href_or_text() {
        let html = r#"
            <section class="row"><h2><a>Dr. No Link</a></h2></section>
            <section class="row"><h2><a href="/p/9">   </a></h2></section>
            <section class="row"><h2><a href="/p/10">Dr. Kept</a></h2></section>
        "#;
        let refs = extract_listing(html, &base(), &selectors());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].detail_url, "https://www.rcdso.org/p/10");
    }
}
