use crate::url::PageStyle;
use serde::Deserialize;

/// Main configuration structure for Sumi-Mirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub origin: OriginConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
}

/// The live site being mirrored
#[derive(Debug, Clone, Deserialize)]
pub struct OriginConfig {
    /// Base URL every page name is resolved against (must end with '/')
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// How page names map onto origin URLs
    #[serde(rename = "page-style", default)]
    pub page_style: PageStyle,

    /// Page names to mirror (also the mirror file names)
    #[serde(default)]
    pub pages: Vec<String>,

    /// Optional file listing additional page names, one per line
    #[serde(rename = "pages-file", default)]
    pub pages_file: Option<String>,

    /// Extra host patterns treated as the same site (e.g. "*.example.com")
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Mirror output layout and worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Root directory of the mirror
    #[serde(default = "default_root")]
    pub root: String,

    /// Directory (under root) holding one file per page
    #[serde(rename = "pages-dir", default = "default_pages_dir")]
    pub pages_dir: String,

    /// Directory (under root) holding deduplicated assets
    #[serde(rename = "assets-dir", default = "default_assets_dir")]
    pub assets_dir: String,

    /// Number of pages processed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Reuse assets recorded in a previous mapping artifact instead of downloading again
    #[serde(rename = "reuse-assets", default = "default_true")]
    pub reuse_assets: bool,
}

/// Fetch client retry and timeout configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Retries after the first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay (milliseconds), doubled on every retry
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// HTTP status codes that are retried
    #[serde(rename = "retry-statuses", default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,

    /// Total timeout of one request (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout of one request (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Integrity validator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    /// Maximum number of pages re-queried on the origin
    #[serde(rename = "sample-size", default = "default_sample_size")]
    pub sample_size: usize,

    /// Pause between origin requests (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Minimum acceptable min/max body length ratio
    #[serde(rename = "similarity-floor", default = "default_similarity_floor")]
    pub similarity_floor: f64,

    /// Retries for origin re-queries
    #[serde(rename = "max-retries", default = "default_validator_retries")]
    pub max_retries: u32,

    /// Where the mirror is served, if it is served at all
    #[serde(rename = "mirror-base-url", default)]
    pub mirror_base_url: Option<String>,

    /// Strings identifying a page body as an error page
    #[serde(rename = "error-markers", default = "default_error_markers")]
    pub error_markers: Vec<String>,

    /// Where the JSON report is written
    #[serde(rename = "report-path", default = "default_report_path")]
    pub report_path: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            pages_dir: default_pages_dir(),
            assets_dir: default_assets_dir(),
            concurrency: default_concurrency(),
            reuse_assets: default_true(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            retry_statuses: default_retry_statuses(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            politeness_delay_ms: default_politeness_delay_ms(),
            similarity_floor: default_similarity_floor(),
            max_retries: default_validator_retries(),
            mirror_base_url: None,
            error_markers: default_error_markers(),
            report_path: default_report_path(),
        }
    }
}

fn default_root() -> String {
    "./web".into()
}
fn default_pages_dir() -> String {
    "pages".into()
}
fn default_assets_dir() -> String {
    "assets".into()
}
fn default_concurrency() -> u32 {
    5
}
fn default_true() -> bool {
    true
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_backoff_max_ms() -> u64 {
    30_000
}
fn default_retry_statuses() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_sample_size() -> usize {
    10
}
fn default_politeness_delay_ms() -> u64 {
    1000
}
fn default_similarity_floor() -> f64 {
    0.8
}
fn default_validator_retries() -> u32 {
    1
}
fn default_error_markers() -> Vec<String> {
    vec!["404: Page not found".into()]
}
fn default_report_path() -> String {
    "./validation_report.json".into()
}
