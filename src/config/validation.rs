use crate::config::types::{
    Config, FetchConfig, MirrorConfig, OriginConfig, UserAgentConfig, ValidatorConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_origin_config(&config.origin)?;
    validate_mirror_config(&config.mirror)?;
    validate_fetch_config(&config.fetch)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_validator_config(&config.validator)?;
    Ok(())
}

/// Validates the origin section: base URL, page names and alias patterns
fn validate_origin_config(config: &OriginConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base_url '{}' must use the http or https scheme",
            config.base_url
        )));
    }

    // Without the trailing slash Url::join would drop the last path segment
    if !base.path().ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "base_url '{}' must end with '/'",
            config.base_url
        )));
    }

    if config.pages.is_empty() {
        return Err(ConfigError::Validation(
            "origin must list at least one page".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for page in &config.pages {
        validate_page_name(page)?;
        if !seen.insert(page.as_str()) {
            return Err(ConfigError::Validation(format!(
                "page '{}' is listed more than once",
                page
            )));
        }
    }

    for alias in &config.aliases {
        validate_domain_pattern(alias)?;
    }

    Ok(())
}

/// Validates a page name: a plain file name that stays inside the pages directory
fn validate_page_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "page name cannot be empty".to_string(),
        ));
    }

    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(ConfigError::Validation(format!(
            "page name '{}' must be a plain file name",
            name
        )));
    }

    Ok(())
}

/// Validates mirror layout and worker pool settings
fn validate_mirror_config(config: &MirrorConfig) -> Result<(), ConfigError> {
    if config.root.is_empty() {
        return Err(ConfigError::Validation("root cannot be empty".to_string()));
    }

    for (key, dir) in [
        ("pages_dir", &config.pages_dir),
        ("assets_dir", &config.assets_dir),
    ] {
        if dir.is_empty() || dir.contains('/') || dir.contains('\\') || dir == ".." {
            return Err(ConfigError::Validation(format!(
                "{} must be a single directory name, got '{}'",
                key, dir
            )));
        }
    }

    if config.pages_dir == config.assets_dir {
        return Err(ConfigError::Validation(
            "pages_dir and assets_dir must differ".to_string(),
        ));
    }

    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    Ok(())
}

/// Validates retry and timeout settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.backoff_max_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_max_ms ({}) must be >= backoff_base_ms ({})",
            config.backoff_max_ms, config.backoff_base_ms
        )));
    }

    for status in &config.retry_statuses {
        if !(400..600).contains(status) {
            return Err(ConfigError::Validation(format!(
                "retry status {} is not a 4xx or 5xx code",
                status
            )));
        }
    }

    if config.timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be at least one second".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates sampling and scoring settings
fn validate_validator_config(config: &ValidatorConfig) -> Result<(), ConfigError> {
    if config.sample_size == 0 {
        return Err(ConfigError::Validation(
            "sample_size must be at least 1".to_string(),
        ));
    }

    if !(config.similarity_floor > 0.0 && config.similarity_floor <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "similarity_floor must be in (0, 1], got {}",
            config.similarity_floor
        )));
    }

    if let Some(mirror_base) = &config.mirror_base_url {
        let url = Url::parse(mirror_base)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid mirror_base_url: {}", e)))?;
        if !url.path().ends_with('/') {
            return Err(ConfigError::Validation(format!(
                "mirror_base_url '{}' must end with '/'",
                mirror_base
            )));
        }
    }

    if config.report_path.is_empty() {
        return Err(ConfigError::Validation(
            "report_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_domain_string(domain)?;
    } else {
        validate_domain_string(pattern)?;
    }

    Ok(())
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email.split_once('@').ok_or_else(|| {
        ConfigError::Validation(format!("Invalid email format: '{}'", email))
    })?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
