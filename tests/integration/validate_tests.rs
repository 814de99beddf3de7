//! Integration tests for the integrity validator
//!
//! Mirrors are either written straight to a temp directory or produced by the
//! orchestrator; wiremock stands in for the live origin.

use std::time::Duration;
use sumi_mirror::config::{
    Config, FetchConfig, MirrorConfig, OriginConfig, UserAgentConfig, ValidatorConfig,
};
use sumi_mirror::mirror::{build_http_client, FetchClient, Orchestrator, RetryPolicy};
use sumi_mirror::output::write_json_artifact;
use sumi_mirror::storage::MirrorLayout;
use sumi_mirror::url::PageStyle;
use sumi_mirror::validate::{
    Category, Severity, ValidationReport, Validator, ValidatorSettings,
};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestMirror".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn test_client() -> FetchClient {
    FetchClient::new(
        build_http_client(&user_agent(), &FetchConfig::default()).unwrap(),
        RetryPolicy::no_retries(),
    )
}

fn test_settings() -> ValidatorSettings {
    ValidatorSettings {
        politeness_delay: Duration::ZERO,
        ..ValidatorSettings::default()
    }
}

/// A page body long enough not to be flagged as suspiciously short
fn html(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body>{}<p>{}</p></body></html>",
        title,
        body,
        "lorem ipsum ".repeat(80)
    )
}

/// Writes pages (and assets) straight into a fresh mirror
fn write_mirror(pages: &[(&str, String)], assets: &[(&str, &[u8])]) -> (TempDir, MirrorLayout) {
    let root = TempDir::new().unwrap();
    let layout = MirrorLayout::new(root.path(), "pages", "assets");
    layout.ensure_dirs().unwrap();
    for (name, content) in pages {
        layout.write_page(name, content).unwrap();
    }
    for (name, bytes) in assets {
        layout.write_asset(name, bytes).unwrap();
    }
    (root, layout)
}

async fn mount_origin_page(server: &MockServer, name: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/site/{}", name)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn origin_base(server: &MockServer) -> Url {
    Url::parse(&format!("{}/site/", server.uri())).unwrap()
}

fn assert_scores_bounded(report: &ValidationReport) {
    for score in report.scores.as_array() {
        assert!((0.0..=100.0).contains(&score), "score {} out of bounds", score);
    }
    assert!((0.0..=100.0).contains(&report.overall_score));
}

#[tokio::test]
async fn test_one_broken_link_is_one_high_finding() {
    let server = MockServer::start().await;

    let home = html(
        "Home",
        r#"<a href="news.html">News</a><a href="records.html">Records</a>"#,
    );
    let news = html("News", r#"<a href="home.html">Home</a>"#);
    mount_origin_page(&server, "home.html", home.clone()).await;
    mount_origin_page(&server, "news.html", news.clone()).await;

    let (_root, layout) = write_mirror(&[("home.html", home), ("news.html", news)], &[]);
    let report = Validator::new(layout, origin_base(&server), test_client())
        .with_settings(test_settings())
        .validate()
        .await
        .unwrap();

    assert_eq!(report.statistics.links, 3);
    assert_eq!(report.statistics.broken_links, 1);
    assert!((report.scores.link_integrity - 200.0 / 3.0).abs() < 1e-9);

    let high: Vec<_> = report.findings_with(Severity::High).collect();
    assert_eq!(high.len(), 1);
    assert_eq!(high[0].category, Category::LinkIntegrity);
    assert_eq!(high[0].subject_page.as_deref(), Some("home.html"));
    assert!(high[0].message.contains("records.html"));

    assert_eq!(report.scores.accessibility, 100.0);
    assert_eq!(report.scores.content_fidelity, 100.0);
    assert_scores_bounded(&report);
}

#[tokio::test]
async fn test_unreachable_origin_page_is_not_scored() {
    let server = MockServer::start().await;

    let fast = html("Fast", "<p>fast</p>");
    let slow = html("Slow", "<p>slow</p>");
    mount_origin_page(&server, "fast.html", fast.clone()).await;
    Mock::given(method("GET"))
        .and(path("/site/slow.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(slow.clone())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = FetchClient::new(
        reqwest::Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap(),
        RetryPolicy::no_retries(),
    );
    let (_root, layout) = write_mirror(&[("fast.html", fast), ("slow.html", slow)], &[]);
    let report = Validator::new(layout, origin_base(&server), client)
        .with_settings(test_settings())
        .validate()
        .await
        .unwrap();

    assert_eq!(report.statistics.sampled, 2);
    assert_eq!(report.statistics.scored, 1);
    assert_eq!(report.statistics.excluded, 1);
    assert_eq!(report.scores.accessibility, 100.0);

    let excluded: Vec<_> = report
        .findings_in(Category::Accessibility)
        .filter(|f| f.subject_page.as_deref() == Some("slow.html"))
        .collect();
    assert_eq!(excluded.len(), 1);
    assert_eq!(excluded[0].severity, Severity::Info);
    assert_eq!(report.count(Severity::High), 0);
}

#[tokio::test]
async fn test_missing_and_leftover_images() {
    let server = MockServer::start().await;

    let origin_home = html("Home", r#"<img src="img/logo.png"><img src="img/crest.gif">"#);
    mount_origin_page(&server, "home.html", origin_home).await;

    let mirror_home = html(
        "Home",
        &format!(
            r#"<img src="../assets/logo_1.png"><img src="{}img/crest.gif">"#,
            origin_base(&server)
        ),
    );
    let (_root, layout) = write_mirror(
        &[("home.html", mirror_home)],
        &[
            ("logo_1.png", &b"logo"[..]),
            ("copy_1.png", &b"logo"[..]),
        ],
    );
    let report = Validator::new(layout, origin_base(&server), test_client())
        .with_settings(test_settings())
        .validate()
        .await
        .unwrap();

    assert_eq!(report.statistics.images, 2);
    assert_eq!(report.statistics.missing_images, 1);
    assert_eq!(report.scores.asset_completeness, 50.0);
    assert_eq!(report.statistics.duplicate_files, 1);
    assert_eq!(report.statistics.unreferenced_files, 1);

    let high: Vec<_> = report.findings_with(Severity::High).collect();
    assert_eq!(high.len(), 1);
    assert!(high[0].message.contains("crest.gif"));
    assert!(report
        .findings_with(Severity::Medium)
        .any(|f| f.message.contains("low dedup yield")));
    assert_scores_bounded(&report);
}

#[tokio::test]
async fn test_served_mirror_failures_are_high() {
    let origin = MockServer::start().await;
    let mirror = MockServer::start().await;

    let a = html("A", "<p>a</p>");
    let b = html("B", "<p>b</p>");
    mount_origin_page(&origin, "a.html", a.clone()).await;
    mount_origin_page(&origin, "b.html", b.clone()).await;
    Mock::given(method("GET"))
        .and(path("/pages/a.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(a.clone()))
        .mount(&mirror)
        .await;
    Mock::given(method("GET"))
        .and(path("/pages/b.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mirror)
        .await;

    let (_root, layout) = write_mirror(&[("a.html", a), ("b.html", b)], &[]);
    let settings = ValidatorSettings {
        mirror_base_url: Some(Url::parse(&format!("{}/pages/", mirror.uri())).unwrap()),
        ..test_settings()
    };
    let report = Validator::new(layout, origin_base(&origin), test_client())
        .with_settings(settings)
        .validate()
        .await
        .unwrap();

    assert_eq!(report.scores.accessibility, 50.0);
    let high: Vec<_> = report.findings_with(Severity::High).collect();
    assert_eq!(high.len(), 1);
    assert_eq!(high[0].category, Category::Accessibility);
    assert_eq!(high[0].subject_page.as_deref(), Some("b.html"));
}

#[tokio::test]
async fn test_image_map_problems_are_reported() {
    let server = MockServer::start().await;

    let home = html(
        "Home",
        r##"<img src="../assets/crest_1.gif" usemap="#nav">
            <img src="../assets/crest_1.gif" usemap="#missing">
            <map name="nav">
              <area shape="rect" coords="0,0,9,9" href="home.html">
              <area shape="rect" href="home.html">
            </map>"##,
    );
    mount_origin_page(&server, "home.html", home.clone()).await;
    let (_root, layout) = write_mirror(&[("home.html", home)], &[("crest_1.gif", &b"gif"[..])]);

    let report = Validator::new(layout, origin_base(&server), test_client())
        .with_settings(test_settings())
        .validate()
        .await
        .unwrap();

    assert_eq!(report.statistics.pages_with_maps, 1);
    assert_eq!(report.statistics.map_areas, 2);
    assert_eq!(report.statistics.malformed_areas, 1);
    assert_eq!(report.statistics.dangling_usemaps, 1);

    let structure: Vec<_> = report
        .findings_in(Category::Structure)
        .filter(|f| f.severity == Severity::Medium)
        .collect();
    assert_eq!(structure.len(), 2);
    assert_eq!(report.count(Severity::High), 0);
}

#[tokio::test]
async fn test_sample_size_caps_origin_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html("Any", "")))
        .expect(2)
        .mount(&server)
        .await;

    let pages: Vec<(&str, String)> = ["a.html", "b.html", "c.html", "d.html"]
        .into_iter()
        .map(|name| (name, html(name, "")))
        .collect();
    let (_root, layout) = write_mirror(&pages, &[]);
    let settings = ValidatorSettings {
        sample_size: 2,
        ..test_settings()
    };
    let report = Validator::new(layout, origin_base(&server), test_client())
        .with_settings(settings)
        .validate()
        .await
        .unwrap();

    assert_eq!(report.statistics.pages, 4);
    assert_eq!(report.statistics.sampled, 2);
}

#[tokio::test]
async fn test_empty_mirror_scores_full_with_info() {
    let server = MockServer::start().await;
    let (_root, layout) = write_mirror(&[], &[]);

    let report = Validator::new(layout, origin_base(&server), test_client())
        .with_settings(test_settings())
        .validate()
        .await
        .unwrap();

    assert!((report.overall_score - 100.0).abs() < 1e-9);
    assert_eq!(report.count(Severity::Info), 4);
    assert_eq!(report.count(Severity::High), 0);
}

#[tokio::test]
async fn test_mirror_then_validate() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let home = html("Home", r#"<a href="news.html">News</a><img src="logo.png">"#);
    let news = html("News", r#"<a href="home.html">Home</a>"#);
    mount_origin_page(&server, "home.html", home).await;
    mount_origin_page(&server, "news.html", news).await;
    Mock::given(method("GET"))
        .and(path("/site/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG-logo".to_vec()))
        .mount(&server)
        .await;

    let config = Config {
        origin: OriginConfig {
            base_url: origin_base(&server).to_string(),
            page_style: PageStyle::File,
            pages: vec!["home.html".to_string(), "news.html".to_string()],
            pages_file: None,
            aliases: vec![],
        },
        mirror: MirrorConfig {
            root: root.path().display().to_string(),
            ..MirrorConfig::default()
        },
        fetch: FetchConfig {
            backoff_base_ms: 10,
            backoff_max_ms: 20,
            ..FetchConfig::default()
        },
        user_agent: user_agent(),
        validator: ValidatorConfig {
            politeness_delay_ms: 0,
            report_path: root.path().join("report.json").display().to_string(),
            ..ValidatorConfig::default()
        },
    };

    Orchestrator::new(config.clone()).unwrap().run().await.unwrap();
    let report = Validator::from_config(&config).unwrap().validate().await.unwrap();

    assert_eq!(report.scores.accessibility, 100.0);
    assert_eq!(report.scores.link_integrity, 100.0);
    assert_eq!(report.scores.asset_completeness, 100.0);
    assert!(report.scores.content_fidelity > 80.0);
    assert!(report.overall_score >= 90.0);
    assert_eq!(report.count(Severity::High), 0);

    let report_path = std::path::Path::new(&config.validator.report_path);
    write_json_artifact(&report, report_path).unwrap();
    let written: ValidationReport =
        serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(written.findings, report.findings);
    assert_eq!(written.readiness, report.readiness);
}
