//! End-to-end pipeline scenarios driven through the in-process fakes.

use casestrainer::config::Config;
use casestrainer::fakes::{FakeCitationApi, FakeHttp};
use casestrainer::pipeline::Pipeline;
use casestrainer::types::{JobPhase, VerificationSource};
use casestrainer::verify::Verifier;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

fn pipeline_with(
    verification_enabled: bool,
    api: Arc<FakeCitationApi>,
    http: Arc<FakeHttp>,
) -> Pipeline {
    let config = Arc::new(Config {
        verification_enabled,
        ..Config::default()
    });
    let verifier = Arc::new(Verifier::new(&config, api, http));
    Pipeline::new(config, verifier)
}

async fn run(pipeline: &Pipeline, text: &str) -> casestrainer::AnalysisResult {
    let cancel = AtomicBool::new(false);
    pipeline
        .run(text, None, &cancel, &mut |_, _| {})
        .await
        .expect("pipeline run")
}

#[tokio::test]
async fn washington_parallel_citation_forms_one_cluster() {
    let p = pipeline_with(
        false,
        Arc::new(FakeCitationApi::new()),
        Arc::new(FakeHttp::new()),
    );
    let text = "See Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians, \
                388 P.3d 977 (2017); 2017-NM-007.";
    let result = run(&p, text).await;

    assert_eq!(result.stats.citations_total, 2);
    assert_eq!(result.stats.clusters_total, 1);
    let cluster = &result.clusters[0];
    assert_eq!(cluster.citations.len(), 2);
    assert_eq!(
        cluster.cluster_case_name.as_deref(),
        Some("Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians")
    );
    assert_eq!(cluster.cluster_year, Some(2017));
    assert!(cluster.citations.contains(&"388 P.3d 977".to_string()));
    assert!(cluster.citations.contains(&"2017-NM-007".to_string()));
}

#[tokio::test]
async fn parallel_inheritance_copies_canonical_fields_to_peers() {
    let api = Arc::new(FakeCitationApi::new());
    // Only the Supreme Court Reporter member resolves upstream.
    api.add_case(
        "138 S. Ct. 1649",
        "Upper Skagit Indian Tribe v. Lundgren",
        "2018-05-21",
        "https://api.example.com/opinion/4316966/",
        "US",
    );
    let p = pipeline_with(true, api, Arc::new(FakeHttp::new()));
    let text = "Upper Skagit Indian Tribe v. Lundgren, 584 U.S. 554, \
                138 S. Ct. 1649, 200 L. Ed. 2d 931.";
    let result = run(&p, text).await;

    assert_eq!(result.stats.citations_total, 3);
    assert_eq!(result.stats.clusters_total, 1);
    assert_eq!(result.stats.citations_verified, 3);

    for citation in &result.citations {
        assert!(citation.verified, "{} unverified", citation.text);
        assert_eq!(
            citation.canonical_name.as_deref(),
            Some("Upper Skagit Indian Tribe v. Lundgren")
        );
        assert_eq!(citation.canonical_date.as_deref(), Some("2018-05-21"));
        assert_eq!(
            citation.canonical_url.as_deref(),
            Some("https://api.example.com/opinion/4316966/")
        );
        assert_eq!(
            citation.verification_source,
            Some(VerificationSource::CitationApi)
        );
    }

    let direct: Vec<_> = result
        .citations
        .iter()
        .filter(|c| !c.true_by_parallel)
        .collect();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].text, "138 S. Ct. 1649");
    assert!(
        result
            .citations
            .iter()
            .filter(|c| c.true_by_parallel)
            .count()
            == 2
    );
}

#[tokio::test]
async fn wrong_jurisdiction_candidate_is_rejected() {
    let api = Arc::new(FakeCitationApi::new());
    // The primary API knows the citation but attributes it to an Iowa case;
    // the Pacific Reporter does not cover Iowa.
    api.add_case(
        "802 P.2d 784",
        "State v. Hempele",
        "1990-12-12",
        "https://api.example.com/opinion/9999/",
        "IA",
    );
    let p = pipeline_with(true, api.clone(), Arc::new(FakeHttp::new()));
    let result = run(&p, "The court relied on 802 P.2d 784 throughout.").await;

    assert_eq!(result.stats.citations_total, 1);
    assert_eq!(result.stats.citations_verified, 0);
    assert!(!result.citations[0].verified);
    assert!(result.citations[0].canonical_name.is_none());
    // Both structured strategies were consulted before the fallbacks.
    assert_eq!(api.lookup_calls.load(AtomicOrdering::SeqCst), 1);
    assert_eq!(api.search_calls.load(AtomicOrdering::SeqCst), 1);
}

#[tokio::test]
async fn year_mismatch_candidate_is_rejected() {
    let api = Arc::new(FakeCitationApi::new());
    api.add_case(
        "614 P.2d 209",
        "Smith v. Jones",
        "2024-01-05",
        "https://api.example.com/opinion/1234/",
        "WA",
    );
    let p = pipeline_with(true, api, Arc::new(FakeHttp::new()));
    let result = run(&p, "Smith v. Jones, 614 P.2d 209 (1980).").await;

    assert_eq!(result.citations[0].extracted_year, Some(1980));
    assert!(!result.citations[0].verified);
    assert!(result.citations[0].canonical_url.is_none());
}

#[tokio::test]
async fn signal_words_never_reach_the_extracted_name() {
    let p = pipeline_with(
        false,
        Arc::new(FakeCitationApi::new()),
        Arc::new(FakeHttp::new()),
    );
    let text = "Id. For example, in Knocklong Corp. v. Kingdom of Afghanistan, \
                123 F.3d 456 (1997).";
    let result = run(&p, text).await;

    assert_eq!(
        result.citations[0].extracted_case_name.as_deref(),
        Some("Knocklong Corp. v. Kingdom of Afghanistan")
    );
    assert_eq!(result.citations[0].extracted_year, Some(1997));
}

#[tokio::test]
async fn rate_limited_api_short_circuits_but_fallbacks_still_run() {
    let api = Arc::new(FakeCitationApi::new());
    api.start_rate_limiting();
    let http = Arc::new(FakeHttp::new());
    let p = pipeline_with(true, api.clone(), http.clone());

    // Three citations far enough apart to form three clusters.
    let filler = "The court weighed the equities and the record before it. ".repeat(6);
    let text = format!(
        "Smith v. Jones, 123 F.3d 456 (1997). {filler}\
         Brown v. Board of Education, 347 U.S. 483 (1954). {filler}\
         Miranda v. Arizona, 384 U.S. 436 (1966)."
    );
    let result = run(&p, &text).await;

    assert_eq!(result.stats.citations_total, 3);
    assert_eq!(result.stats.clusters_total, 3);
    assert!(result.stats.rate_limited);

    // Exactly one structured-API call happened: the first lookup hit the
    // limit and poisoned both structured strategies for the request.
    assert_eq!(api.lookup_calls.load(AtomicOrdering::SeqCst), 1);
    assert_eq!(api.search_calls.load(AtomicOrdering::SeqCst), 0);

    // Every citation still walked the full HTML fallback chain.
    assert_eq!(http.get_calls.load(AtomicOrdering::SeqCst), 3 * 9);
}

#[tokio::test]
async fn html_fallback_verifies_when_the_api_is_rate_limited() {
    let api = Arc::new(FakeCitationApi::new());
    api.start_rate_limiting();
    let http = Arc::new(FakeHttp::new());
    http.add_page(
        "justia",
        "<html><head><title>Knocklong Corp. v. Kingdom of Afghanistan | Justia\
         </title></head><body><h1>Knocklong Corp. v. Kingdom of Afghanistan</h1>\
         <p>Decided June 2, 1997</p></body></html>",
    );
    let p = pipeline_with(true, api, http.clone());
    let result = run(
        &p,
        "Knocklong Corp. v. Kingdom of Afghanistan, 123 F.3d 456 (1997).",
    )
    .await;

    assert_eq!(result.stats.citations_verified, 1);
    assert!(result.stats.rate_limited);
    let citation = &result.citations[0];
    assert_eq!(citation.verification_source, Some(VerificationSource::Justia));
    assert_eq!(
        citation.canonical_name.as_deref(),
        Some("Knocklong Corp. v. Kingdom of Afghanistan")
    );
    assert!(citation.canonical_url.as_deref().unwrap().contains("justia"));
}

#[tokio::test]
async fn extraction_idempotence_across_repeat_runs() {
    let p = pipeline_with(
        false,
        Arc::new(FakeCitationApi::new()),
        Arc::new(FakeHttp::new()),
    );
    let text = "See Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians, \
                388 P.3d 977 (2017); 2017-NM-007. Later, State v. Gamble, \
                168 Wn.2d 161, 225 P.3d 973 (2010).";

    let mut first = run(&p, text).await;
    let mut second = run(&p, text).await;
    // Wall-clock duration is the one nondeterministic field.
    first.stats.duration_ms = 0;
    second.stats.duration_ms = 0;
    assert_eq!(first, second);
}

#[tokio::test]
async fn progress_reaches_done_even_for_empty_documents() {
    let p = pipeline_with(
        false,
        Arc::new(FakeCitationApi::new()),
        Arc::new(FakeHttp::new()),
    );
    let cancel = AtomicBool::new(false);
    let mut last = None;
    let result = p
        .run(
            "No citations live in this paragraph.",
            None,
            &cancel,
            &mut |phase, pct| last = Some((phase, pct)),
        )
        .await
        .unwrap();
    assert_eq!(result.stats.citations_total, 0);
    assert_eq!(last, Some((JobPhase::Done, 100)));
}
