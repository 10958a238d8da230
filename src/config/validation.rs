use crate::config::types::{Config, EmailConfig, OutputConfig, PaginationStyle, PortalConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.portals.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [portals.<name>] table is required".to_string(),
        ));
    }

    for (name, portal) in &config.portals {
        validate_portal(name, portal)?;
    }

    validate_email_config(&config.email)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates one portal definition
pub fn validate_portal(name: &str, portal: &PortalConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&portal.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("portal '{}': base-url '{}': {}", name, portal.base_url, e))
    })?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "portal '{}': base-url must use http or https, got '{}'",
            name,
            base.scheme()
        )));
    }

    if portal.search_path_template.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "portal '{}': search-path-template cannot be empty",
            name
        )));
    }

    if portal.pagination == PaginationStyle::UrlTemplate
        && !portal.search_path_template.contains("{page}")
    {
        return Err(ConfigError::Validation(format!(
            "portal '{}': url-template pagination needs a {{page}} placeholder",
            name
        )));
    }

    for (field, selector) in portal.selectors.named() {
        validate_selector(field, selector)?;
    }
    if let Some(selector) = &portal.cookie_banner {
        validate_selector("cookie-banner", selector)?;
    }
    if let Some(selector) = &portal.website_button {
        validate_selector("website-button", selector)?;
    }

    if portal.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "portal '{}': max-pages must be >= 1, got {}",
            name, portal.max_pages
        )));
    }

    if portal.workers < 1 || portal.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "portal '{}': workers must be between 1 and 64, got {}",
            name, portal.workers
        )));
    }

    if portal.max_retries < 1 || portal.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "portal '{}': max-retries must be between 1 and 10, got {}",
            name, portal.max_retries
        )));
    }

    if portal.page_timeout < 100 {
        return Err(ConfigError::Validation(format!(
            "portal '{}': page-timeout must be >= 100ms, got {}ms",
            name, portal.page_timeout
        )));
    }

    if portal.stagnation_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "portal '{}': stagnation-limit must be >= 1",
            name
        )));
    }

    Ok(())
}

fn validate_selector(field: &str, selector: &str) -> Result<(), ConfigError> {
    if selector.trim().is_empty() || Selector::parse(selector).is_err() {
        return Err(ConfigError::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
        });
    }
    Ok(())
}

fn validate_email_config(config: &EmailConfig) -> Result<(), ConfigError> {
    for pattern in &config.denylist {
        validate_domain_pattern(pattern)?;
    }

    for prefix in &config.business_prefixes {
        if prefix.is_empty() || prefix.contains('@') {
            return Err(ConfigError::Validation(format!(
                "business prefix '{}' must be a non-empty local-part token",
                prefix
            )));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.output_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output-dir cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates a denylist pattern: `example.com`, `*.example.com` or `test.*`
pub(crate) fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_domain_string(domain)
    } else if let Some(label) = pattern.strip_suffix(".*") {
        if label.is_empty() || label.contains('.') || !is_domain_chars(label) {
            return Err(ConfigError::InvalidPattern(format!(
                "'{}' must be a single label followed by '.*'",
                pattern
            )));
        }
        Ok(())
    } else {
        validate_domain_string(pattern)
    }
}

fn is_domain_chars(s: &str) -> bool {
    s.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-')
}

fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !is_domain_chars(domain) {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains("..")
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' is malformed",
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
