//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to stand in for a directory portal and drive a
//! complete harvest over plain HTTP: traversal, profile workers, email
//! ranking, summary and output sinks.

use portal_harvest::config::parse_config;
use portal_harvest::crawler::harvest;
use portal_harvest::output::{default_sinks, write_outputs};
use portal_harvest::state::StopReason;
use portal_harvest::{ConfigError, EmailSource, HarvestError, RunOptions};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock portal
fn create_test_config(base_url: &str, max_pages: u32) -> String {
    format!(
        r#"
[portals.mock]
engine = "requests"
base-url = "{base_url}"
search-path-template = "/search/{{sector}}/page-{{page}}"
max-pages = {max_pages}
delay-between-requests = 0
max-retries = 2
retry-base-delay = 1
workers = 3
page-timeout = 2000

[portals.mock.selectors]
company-profiles = "a.profile"
next-page = "a.next"
company-name = "h1.name"
company-address = ".address"
country = ".country"
website-links = "a.website"
email-containers = "a[href^='mailto:'], .email"
"#
    )
}

fn list_page(ids: &[u32], next: bool) -> String {
    let mut html = String::from("<html><body><ul>");
    for id in ids {
        html.push_str(&format!(
            "<li><a class='profile' href='/firm/{}'>Firm {}</a></li>",
            id, id
        ));
    }
    html.push_str("</ul>");
    if next {
        html.push_str("<a class='next' href='#'>Next</a>");
    }
    html.push_str("</body></html>");
    html
}

fn profile_page(id: u32) -> String {
    format!(
        r#"<html><body>
            <h1 class="name">Firm {id} GmbH</h1>
            <div class="address">Industriestr. {id}, Berlin</div>
            <span class="country">DE</span>
            <a href="mailto:info@firm{id}.de">Email</a>
        </body></html>"#
    )
}

async fn mount_list_page(server: &MockServer, page: u32, html: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/search/steel/page-{}", page)))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_profiles(server: &MockServer, ids: impl IntoIterator<Item = u32>) {
    for id in ids {
        Mock::given(method("GET"))
            .and(path(format!("/firm/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(profile_page(id)))
            .expect(1)
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_pagination_stops_at_max_pages() {
    let server = MockServer::start().await;
    for page in 1..=5 {
        let expected = if page <= 3 { 1 } else { 0 };
        mount_list_page(&server, page, list_page(&[page * 2 - 1, page * 2], true), expected).await;
    }
    mount_profiles(&server, 1..=6).await;

    let config = parse_config(&create_test_config(&server.uri(), 3)).unwrap();
    let outcome = harvest(
        &config,
        &RunOptions::new("mock", "steel"),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.summary.pages_scraped, 3);
    assert_eq!(outcome.summary.stop_reason, Some(StopReason::MaxPagesReached));
    assert_eq!(outcome.links.len(), 6);
    assert_eq!(outcome.records.len(), 6);
    assert_eq!(outcome.summary.profiles_with_email, 6);
}

#[tokio::test]
async fn test_lost_list_page_does_not_stop_traversal() {
    let server = MockServer::start().await;
    for page in [1, 3, 4, 5] {
        mount_list_page(&server, page, list_page(&[page * 2 - 1, page * 2], true), 1).await;
    }
    // Page 2 fails on both attempts
    Mock::given(method("GET"))
        .and(path("/search/steel/page-2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    mount_profiles(&server, [1, 2, 5, 6, 7, 8, 9, 10]).await;

    let config = parse_config(&create_test_config(&server.uri(), 5)).unwrap();
    let outcome = harvest(
        &config,
        &RunOptions::new("mock", "steel"),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.summary.pages_scraped, 4);
    assert_eq!(outcome.summary.lost_pages, vec![2]);
    assert_eq!(outcome.records.len(), 8);
    assert!(outcome.skipped.is_empty());
}

#[tokio::test]
async fn test_first_page_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/steel/page-1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = parse_config(&create_test_config(&server.uri(), 5)).unwrap();
    let err = harvest(
        &config,
        &RunOptions::new("mock", "steel"),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, HarvestError::FirstPageFailed { .. }));
}

#[tokio::test]
async fn test_config_errors_abort_before_fetching() {
    let server = MockServer::start().await;
    let config = parse_config(&create_test_config(&server.uri(), 5)).unwrap();

    let err = harvest(
        &config,
        &RunOptions::new("unknown-portal", "steel"),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        HarvestError::Config(ConfigError::UnknownPortal { .. })
    ));

    let mut options = RunOptions::new("mock", "steel");
    options.workers = Some(0);
    let err = harvest(&config, &options, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Config(ConfigError::Validation(_))));

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_invalid_selector_rejected() {
    let toml = create_test_config("https://portal.example", 5)
        .replace("company-profiles = \"a.profile\"", "company-profiles = \"a[[\"");
    let err = parse_config(&toml).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSelector { .. }));
}

#[tokio::test]
async fn test_duplicate_links_across_pages() {
    let server = MockServer::start().await;
    mount_list_page(&server, 1, list_page(&[1, 2], true), 1).await;
    mount_list_page(&server, 2, list_page(&[2, 3], false), 1).await;
    mount_profiles(&server, 1..=3).await;

    let config = parse_config(&create_test_config(&server.uri(), 10)).unwrap();
    let outcome = harvest(
        &config,
        &RunOptions::new("mock", "steel"),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.summary.stop_reason, Some(StopReason::NoNextPage));
    assert_eq!(outcome.links.len(), 3);
    assert_eq!(outcome.records.len(), 3);
    let urls: Vec<&str> = outcome.records.iter().map(|r| r.profile_url.as_str()).collect();
    assert!(urls[0].ends_with("/firm/1"));
    assert!(urls[2].ends_with("/firm/3"));
}

#[tokio::test]
async fn test_emails_ranked_and_website_fallback() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_list_page(&server, 1, list_page(&[1, 2, 3], false), 1).await;

    // Profile 1: obfuscated business address next to denylisted and junk ones
    Mock::given(method("GET"))
        .and(path("/firm/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                <h1 class="name">Company: Acme Steel | Mock Portal</h1>
                <span class="country">at</span>
                <p class="email">sales [at] acme-steel [dot] at</p>
                <p class="email">info@example.com, noreply@acme-steel.at</p>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    // Profile 2: no email on the profile, one on the website's contact page
    Mock::given(method("GET"))
        .and(path("/firm/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>
                <h1 class="name">Globex</h1>
                <a class="website" href="{uri}/site/globex">Website</a>
            </body></html>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/site/globex"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><a href="/site/globex/about">About</a><a href="/site/globex/kontakt">Kontakt</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/site/globex/kontakt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><p>Write to office (at) globex.com</p></body></html>",
        ))
        .mount(&server)
        .await;

    // Profile 3: nothing at all
    Mock::given(method("GET"))
        .and(path("/firm/3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let config = parse_config(&create_test_config(&uri, 5)).unwrap();
    let outcome = harvest(
        &config,
        &RunOptions::new("mock", "steel"),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.records.len(), 3);

    let acme = &outcome.records[0];
    assert_eq!(acme.name.as_deref(), Some("Acme Steel"));
    assert_eq!(acme.country.as_deref(), Some("Austria"));
    assert_eq!(acme.email.as_deref(), Some("sales@acme-steel.at"));
    assert_eq!(acme.email_source, EmailSource::ProfilePage);
    assert!(!acme.all_emails.iter().any(|e| e.ends_with("example.com")));

    let globex = &outcome.records[1];
    assert_eq!(globex.email.as_deref(), Some("office@globex.com"));
    assert_eq!(globex.email_source, EmailSource::ContactPage);

    let empty = &outcome.records[2];
    assert!(empty.email.is_none());
    assert_eq!(empty.email_source, EmailSource::NotFound);

    let summary = &outcome.summary;
    assert_eq!(summary.profiles_found, 3);
    assert_eq!(summary.profiles_with_email, 2);
    let country_total: usize = summary.countries.iter().map(|(_, n)| n).sum();
    assert_eq!(country_total, summary.profiles_found);
    assert!(summary
        .countries
        .iter()
        .any(|(country, n)| country == "Unknown" && *n == 2));
}

#[tokio::test]
async fn test_outputs_written_to_disk() {
    let server = MockServer::start().await;
    mount_list_page(&server, 1, list_page(&[1, 2], false), 1).await;
    mount_profiles(&server, 1..=2).await;

    let config = parse_config(&create_test_config(&server.uri(), 5)).unwrap();
    let outcome = harvest(
        &config,
        &RunOptions::new("mock", "steel"),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let temp_dir = TempDir::new().unwrap();
    let sinks = default_sinks(temp_dir.path(), "mock", "steel").unwrap();
    write_outputs(&sinks, &outcome.run_output()).unwrap();

    let db_path = temp_dir.path().join("harvest_mock_steel.db");
    let summary_path = temp_dir.path().join("summary_mock_steel.md");
    assert!(db_path.exists());

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let with_email: i64 = conn
        .query_row("SELECT COUNT(*) FROM companies_with_email", [], |row| row.get(0))
        .unwrap();
    assert_eq!(with_email, 2);

    let markdown = std::fs::read_to_string(summary_path).unwrap();
    assert!(markdown.contains("# Harvest Summary: mock / steel"));
    assert!(markdown.contains("- Germany: 2"));
}
