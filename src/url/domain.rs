use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use portal_harvest::url::extract_domain;
///
/// let url = Url::parse("https://Shop.EXAMPLE.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("shop.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the host of a company website as written on a profile page
///
/// Profile pages often print websites without a scheme ("www.acme.de"), so
/// one is assumed when missing. A leading `www.` is dropped.
pub fn website_domain(website: &str) -> Option<String> {
    let website = website.trim();
    if website.is_empty() {
        return None;
    }

    let parsed = match Url::parse(website) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => url,
        Ok(_) => return None,
        Err(_) => Url::parse(&format!("https://{}", website)).ok()?,
    };

    let host = extract_domain(&parsed)?;
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.contains('.') {
        Some(host.to_string())
    } else {
        None
    }
}

/// Checks whether an email domain belongs to the same site as a website host
///
/// Either side may be a subdomain of the other ("mail.acme.de" and "acme.de").
pub fn same_site(email_domain: &str, site_domain: &str) -> bool {
    email_domain == site_domain
        || email_domain.ends_with(&format!(".{}", site_domain))
        || site_domain.ends_with(&format!(".{}", email_domain))
}
