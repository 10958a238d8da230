use crate::UrlError;
use url::Url;

/// Query parameters that portals append for tracking and never change the page
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "referrer",
    "jsessionid",
    "sessionid",
    "sid",
];

/// Normalizes a URL into the key used to deduplicate company profiles
///
/// Two links that point at the same profile must normalize to the same key,
/// whatever decorations the list page added to them.
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Use `https` for both schemes
/// 3. Lowercase the host and drop a `www.` prefix
/// 4. Resolve dot segments, collapse repeated slashes, drop a trailing slash
/// 5. Drop the fragment
/// 6. Drop tracking parameters and sort what remains
///
/// # Examples
///
/// ```
/// use portal_harvest::url::normalize_url;
///
/// let url = normalize_url("http://WWW.Directory.example/company/acme/?utm_source=list#top").unwrap();
/// assert_eq!(url.as_str(), "https://directory.example/company/acme");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "https" => {}
        "http" => {
            url.set_scheme("https")
                .map_err(|_| UrlError::Malformed(format!("cannot rewrite scheme of {}", url_str)))?;
        }
        other => {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                other
            )))
        }
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    // Ports only matter when they are not the scheme default
    if url.port() == Some(443) || url.port() == Some(80) {
        let _ = url.set_port(None);
    }

    let path = normalize_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_and_www_unified() {
        let a = normalize_url("http://www.portal.example/firm/acme").unwrap();
        let b = normalize_url("https://portal.example/firm/acme").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_trailing_slash_and_fragment_ignored() {
        let result = normalize_url("https://portal.example/firm/acme/#contact").unwrap();
        assert_eq!(result.as_str(), "https://portal.example/firm/acme");
    }

    #[test]
    fn test_path_case_preserved() {
        let result = normalize_url("https://PORTAL.example/Firm/ACME").unwrap();
        assert_eq!(result.as_str(), "https://portal.example/Firm/ACME");
    }

    #[test]
    fn test_tracking_params_removed_and_sorted() {
        let result = normalize_url(
            "https://portal.example/profile?utm_medium=list&id=42&lang=en&jsessionid=abc",
        )
        .unwrap();
        assert_eq!(result.as_str(), "https://portal.example/profile?id=42&lang=en");
    }

    #[test]
    fn test_dot_segments_and_slashes() {
        let result = normalize_url("https://portal.example//a/../firm/./acme").unwrap();
        assert_eq!(result.as_str(), "https://portal.example/firm/acme");
    }

    #[test]
    fn test_default_port_dropped() {
        let result = normalize_url("http://portal.example:80/firm").unwrap();
        assert_eq!(result.as_str(), "https://portal.example/firm");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("mailto:info@acme.example");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(normalize_url("not a url"), Err(UrlError::Parse(_))));
    }
}
