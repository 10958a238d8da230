//! HTML extraction driven by configured selectors
//!
//! Everything here is a pure function of a fetched page and a selector string:
//! - Profile links and the presence of a "next" control on list pages
//! - Company fields on profile pages (first match wins, absence is `None`)
//! - Raw email spans for the email normalizer
//! - Contact page discovery on company websites

use crate::config::SelectorSet;
use crate::crawler::fetcher::PageContent;
use crate::record::{clean_company_name, expand_country};
use crate::url::resolve_link;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

static MAILTO: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href^='mailto:' i]").unwrap());

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Words marking a contact page link, in the languages the portals cover
const CONTACT_KEYWORDS: &[&str] = &["contact", "kontakt", "iletişim", "contacto", "contatto"];

/// What a list page offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    /// Profile URLs in page order, resolved against the page URL
    pub links: Vec<Url>,
    /// Whether a `next-page` control is present
    pub has_next: bool,
}

/// Fields read from a profile page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDetails {
    pub name: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
}

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

fn normalized_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace-normalized text of the first non-empty match
pub fn select_first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .map(normalized_text)
        .find(|text| !text.is_empty())
}

/// `href` of the first element matching `css`
pub fn first_href(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    let element = document.select(&sel).next()?;
    element_href(element)
}

/// The element's own `href`, or that of its first descendant anchor
fn element_href(element: ElementRef<'_>) -> Option<String> {
    element
        .value()
        .attr("href")
        .map(str::to_string)
        .or_else(|| {
            element
                .select(&ANCHOR)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string)
        })
}

/// Reads profile links and the next-page control from a list page
pub fn parse_list_page(page: &PageContent, selectors: &SelectorSet) -> ListPage {
    let document = page.document();
    let base = page.parsed_url().ok();

    let links = match (selector(&selectors.company_profiles), &base) {
        (Some(sel), Some(base)) => document
            .select(&sel)
            .filter_map(element_href)
            .filter_map(|href| resolve_link(base, &href))
            .collect(),
        _ => Vec::new(),
    };

    let has_next = selector(&selectors.next_page)
        .map_or(false, |sel| document.select(&sel).next().is_some());

    ListPage { links, has_next }
}

/// Extracts the company fields from a profile page
pub fn extract_details(page: &PageContent, selectors: &SelectorSet) -> ProfileDetails {
    let document = page.document();

    let name = select_first_text(&document, &selectors.company_name)
        .and_then(|raw| clean_company_name(&raw));
    let address = select_first_text(&document, &selectors.company_address);
    let country = select_first_text(&document, &selectors.country)
        .and_then(|raw| expand_country(&raw));
    let website = extract_website(&document, page, &selectors.website_links);

    ProfileDetails {
        name,
        address,
        country,
        website,
    }
}

/// Absolute `href` of the first website link, falling back to its text
fn extract_website(document: &Html, page: &PageContent, css: &str) -> Option<String> {
    let sel = selector(css)?;
    let element = document.select(&sel).next()?;

    let from_href = element_href(element).and_then(|href| {
        let base = page.parsed_url().ok()?;
        resolve_link(&base, &href).map(|url| url.to_string())
    });

    from_href.or_else(|| Some(normalized_text(element)).filter(|text| !text.is_empty()))
}

/// Raw spans from the `email-containers` matches: mailto targets and text
pub fn email_spans(page: &PageContent, css: &str) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    let document = page.document();
    let mut spans = Vec::new();

    for element in document.select(&sel) {
        if let Some(href) = element.value().attr("href") {
            if href.trim_start().to_ascii_lowercase().starts_with("mailto:") {
                spans.push(href.to_string());
            }
        }
        let text = normalized_text(element);
        if !text.is_empty() {
            spans.push(text);
        }
    }

    spans
}

/// Raw spans from a whole page: every mailto target plus the body text
pub fn page_email_spans(page: &PageContent) -> Vec<String> {
    let document = page.document();
    let mut spans: Vec<String> = document
        .select(&MAILTO)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect();

    if let Some(body) = document.select(&BODY).next() {
        spans.push(normalized_text(body));
    }

    spans
}

/// First link on a website page that looks like a contact page
pub fn find_contact_link(page: &PageContent) -> Option<Url> {
    let base = page.parsed_url().ok()?;
    let document = page.document();

    document.select(&ANCHOR).find_map(|anchor| {
        let text = normalized_text(anchor).to_lowercase();
        let href = anchor.value().attr("href")?;
        let href_lower = href.to_lowercase();

        let is_contact = CONTACT_KEYWORDS
            .iter()
            .any(|kw| text.contains(kw) || href_lower.contains(kw));

        if is_contact {
            resolve_link(&base, href).filter(|url| url.host_str() == base.host_str())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors() -> SelectorSet {
        SelectorSet {
            company_profiles: "div.result a.profile".to_string(),
            next_page: "a.next".to_string(),
            company_name: "h1".to_string(),
            company_address: ".address".to_string(),
            country: ".country".to_string(),
            website_links: "a.website".to_string(),
            email_containers: "a[href^='mailto:'], .email".to_string(),
        }
    }

    #[test]
    fn test_parse_list_page() {
        let page = PageContent::new(
            "https://portal.example/search/steel?page=1",
            r#"<html><body>
                <div class="result"><a class="profile" href="/firm/acme">Acme</a></div>
                <div class="result"><a class="profile" href="https://portal.example/firm/globex">Globex</a></div>
                <div class="result"><a class="profile" href="javascript:void(0)">Broken</a></div>
                <a class="next" href="?page=2">Next</a>
            </body></html>"#,
        );

        let list = parse_list_page(&page, &selectors());
        assert!(list.has_next);
        assert_eq!(
            list.links.iter().map(|u| u.as_str()).collect::<Vec<_>>(),
            vec![
                "https://portal.example/firm/acme",
                "https://portal.example/firm/globex"
            ]
        );
    }

    #[test]
    fn test_list_page_without_next() {
        let page = PageContent::new("https://portal.example/", "<html><body></body></html>");
        let list = parse_list_page(&page, &selectors());
        assert!(!list.has_next);
        assert!(list.links.is_empty());
    }

    #[test]
    fn test_profile_link_on_wrapper_element() {
        let mut sel = selectors();
        sel.company_profiles = "div.card".to_string();
        let page = PageContent::new(
            "https://portal.example/",
            r#"<div class="card"><h2>Acme</h2><a href="/firm/acme">more</a></div>"#,
        );
        let list = parse_list_page(&page, &sel);
        assert_eq!(list.links.len(), 1);
    }

    #[test]
    fn test_extract_details() {
        let page = PageContent::new(
            "https://portal.example/firm/acme",
            r#"<html><body>
                <h1>  Acme
                    GmbH | Portal </h1>
                <div class="address">Hauptstr. 1,
                    10115 Berlin</div>
                <span class="country">DE</span>
                <a class="website" href="https://www.acme.de/">Website</a>
            </body></html>"#,
        );

        let details = extract_details(&page, &selectors());
        assert_eq!(details.name.as_deref(), Some("Acme GmbH"));
        assert_eq!(details.address.as_deref(), Some("Hauptstr. 1, 10115 Berlin"));
        assert_eq!(details.country.as_deref(), Some("Germany"));
        assert_eq!(details.website.as_deref(), Some("https://www.acme.de/"));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let page = PageContent::new(
            "https://portal.example/firm/x",
            "<html><body><h1></h1></body></html>",
        );
        assert_eq!(extract_details(&page, &selectors()), ProfileDetails::default());
    }

    #[test]
    fn test_website_falls_back_to_text() {
        let page = PageContent::new(
            "https://portal.example/firm/acme",
            r#"<span class="website">www.acme.de</span>"#,
        );
        let mut sel = selectors();
        sel.website_links = ".website".to_string();
        assert_eq!(extract_details(&page, &sel).website.as_deref(), Some("www.acme.de"));
    }

    #[test]
    fn test_email_spans() {
        let page = PageContent::new(
            "https://portal.example/firm/acme",
            r#"<a href="mailto:info@acme.de">Write us</a>
               <p class="email">sales [at] acme [dot] de</p>"#,
        );
        let spans = email_spans(&page, &selectors().email_containers);
        assert_eq!(
            spans,
            vec!["mailto:info@acme.de", "Write us", "sales [at] acme [dot] de"]
        );
    }

    #[test]
    fn test_page_email_spans_include_body_text() {
        let page = PageContent::new(
            "https://acme.de/",
            r#"<html><body><p>Mail: office@acme.de</p><a href="MAILTO:ceo@acme.de">CEO</a></body></html>"#,
        );
        let spans = page_email_spans(&page);
        assert_eq!(spans[0], "MAILTO:ceo@acme.de");
        assert!(spans[1].contains("office@acme.de"));
    }

    #[test]
    fn test_find_contact_link() {
        let page = PageContent::new(
            "https://acme.de/",
            r#"<a href="https://facebook.com/contact">Contact us on Facebook</a>
               <a href="/about">About</a>
               <a href="/de/kontakt">Kontakt</a>"#,
        );
        assert_eq!(
            find_contact_link(&page).map(|u| u.to_string()).as_deref(),
            Some("https://acme.de/de/kontakt")
        );
    }

    #[test]
    fn test_no_contact_link() {
        let page = PageContent::new("https://acme.de/", r#"<a href="/about">About</a>"#);
        assert!(find_contact_link(&page).is_none());
    }
}
