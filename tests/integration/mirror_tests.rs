//! Integration tests for the mirror orchestrator
//!
//! These tests use wiremock to stand in for the origin site and run the full
//! fetch, extract, resolve, rewrite and persist cycle into a temp directory.

use std::time::Duration;
use sumi_mirror::config::{
    Config, FetchConfig, MirrorConfig, OriginConfig, UserAgentConfig, ValidatorConfig,
};
use sumi_mirror::mirror::Orchestrator;
use sumi_mirror::state::{AssetStatus, PageStatus};
use sumi_mirror::storage::{AssetMapping, MirrorLayout, MirrorManifest, RunStatus};
use sumi_mirror::url::PageStyle;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-bytes";

/// Creates a test configuration mirroring `pages` from `<server>/site/`
fn create_test_config(server: &MockServer, root: &TempDir, pages: &[&str]) -> Config {
    Config {
        origin: OriginConfig {
            base_url: format!("{}/site/", server.uri()),
            page_style: PageStyle::File,
            pages: pages.iter().map(|p| p.to_string()).collect(),
            pages_file: None,
            aliases: vec![],
        },
        mirror: MirrorConfig {
            root: root.path().display().to_string(),
            concurrency: 4,
            ..MirrorConfig::default()
        },
        fetch: FetchConfig {
            max_retries: 3,
            backoff_base_ms: 10, // Very short for testing
            backoff_max_ms: 50,
            timeout_secs: 5,
            connect_timeout_secs: 2,
            ..FetchConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestMirror".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        validator: ValidatorConfig::default(),
    }
}

fn html(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body>{}</body></html>",
        title, body
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn read_page(layout: &MirrorLayout, name: &str) -> String {
    std::fs::read_to_string(layout.page_path(name)).expect("page file should exist")
}

#[tokio::test]
async fn test_shared_image_is_stored_once() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/site/a.html", html("A", r#"<img src="img/logo.png">"#)).await;
    mount_page(&server, "/site/b.html", html("B", r#"<img src="/site/img/logo.png">"#)).await;
    Mock::given(method("GET"))
        .and(path("/site/img/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(PNG_BYTES)
                .insert_header("content-type", "image/png"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &root, &["a.html", "b.html"]);
    let orchestrator = Orchestrator::new(config).unwrap();
    let result = orchestrator.run().await.unwrap();
    let layout = orchestrator.layout();

    assert_eq!(result.count(PageStatus::Persisted), 2);
    assert_eq!(result.downloads, 1);

    let files = layout.list_assets().unwrap();
    assert_eq!(files.len(), 1, "exactly one file for the shared image");
    let file = &files[0];
    assert!(file.starts_with("logo_") && file.ends_with(".png"));

    let href = format!(r#"src="../assets/{}""#, file);
    assert!(read_page(layout, "a.html").contains(&href));
    assert!(read_page(layout, "b.html").contains(&href));

    assert_eq!(result.assets.len(), 1);
    let asset = &result.assets[0];
    assert_eq!(asset.status, AssetStatus::Stored);
    assert_eq!(asset.referencing_pages.len(), 2);
    assert_eq!(result.page_assets["a.html"], vec![file.clone()]);
}

#[tokio::test]
async fn test_concurrent_pages_share_one_download() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let names = ["p1.html", "p2.html", "p3.html", "p4.html"];
    for name in names {
        mount_page(
            &server,
            &format!("/site/{}", name),
            html(name, r#"<img src="shared.gif">"#),
        )
        .await;
    }
    Mock::given(method("GET"))
        .and(path("/site/shared.gif"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"GIF89a".to_vec())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &root, &names);
    let result = Orchestrator::new(config).unwrap().run().await.unwrap();

    assert_eq!(result.count(PageStatus::Persisted), 4);
    assert_eq!(result.downloads, 1);
    assert_eq!(result.mapping.len(), 1);
}

#[tokio::test]
async fn test_page_succeeds_after_server_errors() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/site/flaky.html"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    mount_page(&server, "/site/flaky.html", html("Flaky", "<p>finally</p>")).await;

    let config = create_test_config(&server, &root, &["flaky.html"]);
    let orchestrator = Orchestrator::new(config).unwrap();
    let result = orchestrator.run().await.unwrap();

    let page = result.page("flaky.html").unwrap();
    assert_eq!(page.status, PageStatus::Persisted);
    assert_eq!(page.title.as_deref(), Some("Flaky"));
    assert!(read_page(orchestrator.layout(), "flaky.html").contains("finally"));
}

#[tokio::test]
async fn test_not_found_page_is_fetch_failed_without_file() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/site/home.html", html("Home", "<p>home</p>")).await;
    Mock::given(method("GET"))
        .and(path("/site/gone.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &root, &["home.html", "gone.html"]);
    let orchestrator = Orchestrator::new(config).unwrap();
    let result = orchestrator.run().await.unwrap();

    let gone = result.page("gone.html").unwrap();
    assert_eq!(gone.status, PageStatus::FetchFailed);
    assert!(gone.error.as_deref().unwrap_or_default().contains("404"));
    assert!(!orchestrator.layout().page_path("gone.html").exists());

    assert_eq!(result.page("home.html").unwrap().status, PageStatus::Persisted);
    assert_eq!(orchestrator.layout().list_pages().unwrap(), vec!["home.html"]);
}

#[tokio::test]
async fn test_references_are_rewritten() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let origin = server.uri();

    let home = html(
        "Home",
        &format!(
            concat!(
                r#"<a href="news.html#latest">News</a>"#,
                r#"<a href="{origin}/site/news.html">Again</a>"#,
                r#"<a href="records.html">Not mirrored</a>"#,
                r#"<a href="https://other.org/page">Elsewhere</a>"#,
                r#"<img src="https://cdn.other.org/banner.png">"#,
                r#"<img src="img/crest.gif" usemap="map">"#,
                r#"<map name="map"><area href="/site/news.html"></map>"#
            ),
            origin = origin
        ),
    );
    mount_page(&server, "/site/home.html", home).await;
    mount_page(&server, "/site/news.html", html("News", "<p>news</p>")).await;
    Mock::given(method("GET"))
        .and(path("/site/img/crest.gif"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"GIF89a-crest".to_vec()))
        .mount(&server)
        .await;

    let config = create_test_config(&server, &root, &["home.html", "news.html"]);
    let orchestrator = Orchestrator::new(config).unwrap();
    let result = orchestrator.run().await.unwrap();
    assert!(result.all_terminal());

    let content = read_page(orchestrator.layout(), "home.html");
    assert!(content.contains(r##"<a href="news.html#latest">"##));
    assert!(content.contains(r#"<a href="news.html">Again</a>"#));
    assert!(content.contains(r#"<area href="news.html">"#));
    assert!(content.contains(r#"<a href="records.html">"#));
    assert!(content.contains(r#"<a href="https://other.org/page">"#));
    assert!(content.contains(r#"<img src="https://cdn.other.org/banner.png">"#));
    assert!(content.contains(r#"src="../assets/crest_"#));
    assert!(!content.contains(&origin));

    // Every rewritten value points at something that exists in the mirror
    let pages_dir = orchestrator.layout().pages_path();
    let page = result.page("home.html").unwrap();
    for reference in &page.references {
        if let Some(value) = &reference.rewritten_value {
            let target = value.split('#').next().unwrap();
            assert!(pages_dir.join(target).exists(), "{} should exist", value);
        }
    }
}

#[tokio::test]
async fn test_missing_asset_keeps_original_path() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/site/a.html", html("A", r#"<img src="img/missing.png">"#)).await;
    Mock::given(method("GET"))
        .and(path("/site/img/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = create_test_config(&server, &root, &["a.html"]);
    let orchestrator = Orchestrator::new(config).unwrap();
    let result = orchestrator.run().await.unwrap();

    assert_eq!(result.page("a.html").unwrap().status, PageStatus::Persisted);
    assert!(read_page(orchestrator.layout(), "a.html").contains(r#"<img src="img/missing.png">"#));
    assert_eq!(result.assets.len(), 1);
    assert_eq!(result.assets[0].status, AssetStatus::Missing);
    assert!(result.mapping.is_empty());
    assert!(orchestrator.layout().list_assets().unwrap().is_empty());
}

#[tokio::test]
async fn test_artifacts_and_asset_reuse() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/site/a.html", html("A", r#"<img src="logo.png">"#)).await;
    Mock::given(method("GET"))
        .and(path("/site/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &root, &["a.html"]);
    let first = Orchestrator::new(config.clone())
        .unwrap()
        .with_config_hash("abc123")
        .run()
        .await
        .unwrap();
    assert_eq!(first.downloads, 1);

    let layout = MirrorLayout::from_config(&config.mirror);
    let mapping = AssetMapping::load(&layout.mapping_path()).unwrap().unwrap();
    let logo_url = format!("{}/site/logo.png", server.uri());
    assert!(mapping.get(&logo_url).is_some());

    let manifest = MirrorManifest::load(&layout.manifest_path()).unwrap();
    assert_eq!(manifest.config_hash.as_deref(), Some("abc123"));
    assert_eq!(manifest.status, RunStatus::Completed);
    assert_eq!(manifest.count(PageStatus::Persisted), 1);

    // The second run finds the asset in the mapping and does not download it again
    let second = Orchestrator::new(config).unwrap().run().await.unwrap();
    assert_eq!(second.downloads, 0);
    assert_eq!(second.assets[0].status, AssetStatus::Reused);
    assert_eq!(second.mapping.get(&logo_url), mapping.get(&logo_url));
}

#[tokio::test]
async fn test_rerun_with_failed_page_keeps_mapping_and_drops_stale_file() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let a = html("A", r#"<img src="logo.png">"#);
    mount_page(&server, "/site/a.html", a.clone()).await;
    mount_page(&server, "/site/b.html", html("B", r#"<img src="crest.png">"#)).await;
    for image in ["/site/logo.png", "/site/crest.png"] {
        Mock::given(method("GET"))
            .and(path(image))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(image.as_bytes().to_vec()))
            .mount(&server)
            .await;
    }

    let config = create_test_config(&server, &root, &["a.html", "b.html"]);
    let first = Orchestrator::new(config.clone()).unwrap().run().await.unwrap();
    assert_eq!(first.count(PageStatus::Persisted), 2);
    let crest_url = format!("{}/site/crest.png", server.uri());
    let crest_file = first.mapping.get(&crest_url).unwrap().to_string();

    // b.html disappears from the origin
    server.reset().await;
    mount_page(&server, "/site/a.html", a).await;
    Mock::given(method("GET"))
        .and(path("/site/b.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::new(config).unwrap();
    let second = orchestrator.run().await.unwrap();
    let layout = orchestrator.layout();

    assert_eq!(second.page("b.html").unwrap().status, PageStatus::FetchFailed);
    assert!(!layout.page_path("b.html").exists());
    assert_eq!(layout.list_pages().unwrap(), vec!["a.html"]);

    // crest.png was not resolved this run but its file is still there
    assert_eq!(second.downloads, 0);
    let mapping = AssetMapping::load(&layout.mapping_path()).unwrap().unwrap();
    assert_eq!(mapping.get(&crest_url), Some(crest_file.as_str()));
    assert!(mapping.get(&format!("{}/site/logo.png", server.uri())).is_some());
}

#[tokio::test]
async fn test_cancelled_run_dispatches_nothing() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &root, &["a.html", "b.html", "c.html"]);
    let orchestrator = Orchestrator::new(config).unwrap();
    orchestrator.cancellation_token().cancel();
    let result = orchestrator.run().await.unwrap();

    assert!(result.cancelled);
    assert_eq!(result.count(PageStatus::Cancelled), 3);
    assert!(result.all_terminal());

    let manifest = MirrorManifest::load(&orchestrator.layout().manifest_path()).unwrap();
    assert_eq!(manifest.status, RunStatus::Cancelled);
}

#[tokio::test]
async fn test_directory_style_pages() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(
        &server,
        "/site/home/",
        html("Home", r#"<a href="../honours/">Honours</a><img src="crest.gif">"#),
    )
    .await;
    mount_page(&server, "/site/honours/", html("Honours", r#"<a href="/site/home/">Home</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/site/home/crest.gif"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"GIF89a".to_vec()))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server, &root, &["home_.html", "honours.html"]);
    config.origin.page_style = PageStyle::Directory;
    let orchestrator = Orchestrator::new(config).unwrap();
    let result = orchestrator.run().await.unwrap();

    assert_eq!(result.count(PageStatus::Persisted), 2);
    let home = read_page(orchestrator.layout(), "home_.html");
    assert!(home.contains(r#"<a href="honours.html">"#));
    assert!(home.contains(r#"src="../assets/crest_"#));
    assert!(read_page(orchestrator.layout(), "honours.html").contains(r#"<a href="home_.html">"#));
}
