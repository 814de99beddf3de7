use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// When `origin.pages-file` is set, the listed page names are appended to
/// `origin.pages` (duplicates dropped, order kept). A relative pages file is
/// resolved against the directory containing the configuration file.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sumi_mirror::config::load_config;
///
/// let config = load_config(Path::new("mirror.toml")).unwrap();
/// println!("Concurrency: {}", config.mirror.concurrency);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let mut config: Config = toml::from_str(&content)?;

    // Merge the external page list
    if let Some(pages_file) = config.origin.pages_file.clone() {
        let pages_path = match path.parent() {
            Some(dir) if Path::new(&pages_file).is_relative() => dir.join(&pages_file),
            _ => Path::new(&pages_file).to_path_buf(),
        };
        let listing = std::fs::read_to_string(&pages_path)?;
        config.origin.pages.extend(parse_page_list(&listing));
    }
    config.origin.pages = dedup_preserving_order(std::mem::take(&mut config.origin.pages));

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

/// Parses a page listing: one name per line, blank lines and `#` comments ignored
fn parse_page_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn dedup_preserving_order(pages: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    pages
        .into_iter()
        .filter(|page| seen.insert(page.clone()))
        .collect()
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is recorded in the mirror manifest so a mirror can be traced back to
/// the configuration that produced it.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::PageStyle;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const USER_AGENT: &str = r#"
[user-agent]
crawler-name = "TestMirror"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"
"#;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let config_content = format!(
            r#"
[origin]
base-url = "https://example.com/website/"
pages = ["home_.html", "honours.html"]
{USER_AGENT}"#
        );

        let file = create_temp_config(&config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.origin.pages.len(), 2);
        assert_eq!(config.origin.page_style, PageStyle::File);
        assert_eq!(config.mirror.root, "./web");
        assert_eq!(config.mirror.pages_dir, "pages");
        assert_eq!(config.mirror.concurrency, 5);
        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(config.fetch.backoff_base_ms, 1000);
        assert_eq!(config.validator.sample_size, 10);
        assert!((config.validator.similarity_floor - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_full_config() {
        let config_content = format!(
            r#"
[origin]
base-url = "https://example.com/website/"
page-style = "directory"
pages = ["home_.html"]
aliases = ["*.example.com"]

[mirror]
root = "/tmp/mirror"
concurrency = 8
reuse-assets = false

[fetch]
max-retries = 2
retry-statuses = [404, 500]
timeout-secs = 5

[validator]
sample-size = 3
mirror-base-url = "https://mirror.example.org/pages/"
{USER_AGENT}"#
        );

        let file = create_temp_config(&config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.origin.page_style, PageStyle::Directory);
        assert_eq!(config.origin.aliases, vec!["*.example.com".to_string()]);
        assert_eq!(config.mirror.concurrency, 8);
        assert!(!config.mirror.reuse_assets);
        assert_eq!(config.fetch.retry_statuses, vec![404, 500]);
        assert_eq!(config.validator.sample_size, 3);
        assert_eq!(
            config.validator.mirror_base_url.as_deref(),
            Some("https://mirror.example.org/pages/")
        );
    }

    #[test]
    fn test_pages_file_is_merged_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pages.txt"),
            "# club pages\nhonours.html\n\nrecords.html\nhome_.html\n",
        )
        .unwrap();
        let config_path = dir.path().join("mirror.toml");
        std::fs::write(
            &config_path,
            format!(
                r#"
[origin]
base-url = "https://example.com/website/"
pages = ["home_.html"]
pages-file = "pages.txt"
{USER_AGENT}"#
            ),
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(
            config.origin.pages,
            vec!["home_.html", "honours.html", "records.html"]
        );
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/mirror.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = format!(
            r#"
[origin]
base-url = "https://example.com/website/"
pages = ["home_.html"]

[mirror]
concurrency = 0
{USER_AGENT}"#
        );

        let file = create_temp_config(&config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        assert_ne!(
            compute_config_hash(file1.path()).unwrap(),
            compute_config_hash(file2.path()).unwrap()
        );
    }
}
