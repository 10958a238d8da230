//! Denylist and business-relevance scoring

use crate::config::EmailConfig;
use crate::url::{same_site, DomainPattern};
use crate::ConfigError;
use std::collections::HashSet;

/// Candidates scoring below this are dropped
pub const MIN_SCORE: i32 = 30;

const BASE_SCORE: i32 = 50;
const BUSINESS_PREFIX_BONUS: i32 = 30;
const WEBSITE_MATCH_BONUS: i32 = 40;
const COMPANY_DOMAIN_BONUS: i32 = 20;
const FREE_MAIL_PENALTY: i32 = -20;
const JUNK_PENALTY: i32 = -40;
const SHORT_LOCAL_BONUS: i32 = 10;
const LONG_LOCAL_PENALTY: i32 = -10;

const DEFAULT_DENYLIST: &[&str] = &[
    // test and placeholder domains
    "example.com",
    "test.*",
    "domain.com",
    "mydomain.com",
    "yourdomain.com",
    // social networks and platforms
    "google.com",
    "facebook.com",
    "twitter.com",
    "linkedin.com",
    "instagram.com",
    "youtube.com",
    "microsoft.com",
    "apple.com",
    // analytics, tracking and customer tooling
    "*.criteo.com",
    "criteo.net",
    "*.reppublika.com",
    "*.visable.com",
    "googletagmanager.com",
    "google-analytics.com",
    "hotjar.com",
    "mixpanel.com",
    "segment.com",
    "intercom.io",
    "zendesk.com",
    "freshdesk.com",
    "salesforce.com",
    "hubspot.com",
    "marketo.com",
    // error tracking
    "*.sentry.io",
    "rollbar.com",
    "newrelic.com",
    "datadog.com",
    // cookie consent
    "cookiebot.com",
    "onetrust.com",
    "privacymanager.io",
    "cookielaw.org",
    "iubenda.com",
    "termly.io",
    // advertising
    "doubleclick.net",
    "adsense.com",
    "adroll.com",
    "adnxs.com",
    "taboola.com",
    "outbrain.com",
    // CDN and hosting
    "cloudflare.com",
    "akamai.com",
    "fastly.com",
    "*.amazonaws.com",
    "heroku.com",
    "netlify.com",
    // payment
    "stripe.com",
    "paypal.com",
    "square.com",
    // no-reply services
    "noreply.com",
    "no-reply.com",
    "donotreply.com",
];

const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "ymail.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "msn.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "gmx.de",
    "gmx.net",
    "web.de",
    "t-online.de",
    "protonmail.com",
    "yandex.ru",
    "mail.ru",
];

const BUSINESS_PREFIXES: &[&str] = &[
    "info", "contact", "sales", "support", "admin", "office", "hello", "enquiry", "inquiry",
    "business", "service", "mail", "reception", "booking", "reservation", "export", "order",
    "purchase", "commercial", "wholesale", "retail", "marketing", "press", "media", "hr",
    "careers", "jobs", "webmaster", "postmaster", "hostmaster", "billing",
];

const JUNK_TOKENS: &[&str] = &["test", "fake", "example", "noreply", "no-reply"];

/// Domain lists and prefixes used when ranking addresses
#[derive(Debug, Clone)]
pub struct EmailRules {
    denylist: Vec<DomainPattern>,
    free_mail: HashSet<String>,
    business_prefixes: Vec<String>,
}

impl Default for EmailRules {
    fn default() -> Self {
        Self {
            denylist: DEFAULT_DENYLIST
                .iter()
                .filter_map(|p| DomainPattern::parse(p).ok())
                .collect(),
            free_mail: FREE_MAIL_DOMAINS.iter().map(|d| d.to_string()).collect(),
            business_prefixes: BUSINESS_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl EmailRules {
    /// Built-in rules extended with the `[email]` configuration table
    pub fn from_config(config: &EmailConfig) -> Result<Self, ConfigError> {
        let mut rules = Self::default();

        for pattern in &config.denylist {
            rules.denylist.push(DomainPattern::parse(pattern)?);
        }

        for prefix in &config.business_prefixes {
            let prefix = prefix.trim().to_lowercase();
            if !rules.business_prefixes.contains(&prefix) {
                rules.business_prefixes.push(prefix);
            }
        }

        Ok(rules)
    }

    pub fn is_denied(&self, domain: &str) -> bool {
        self.denylist.iter().any(|pattern| pattern.matches(domain))
    }

    pub fn is_free_mail(&self, domain: &str) -> bool {
        self.free_mail.contains(domain)
    }

    /// Integer business-relevance score of a normalized address
    ///
    /// `website` is the company website's domain, when known.
    pub fn score(&self, address: &str, website: Option<&str>) -> i32 {
        let Some((local, domain)) = address.split_once('@') else {
            return 0;
        };

        let mut score = BASE_SCORE;

        if self
            .business_prefixes
            .iter()
            .any(|prefix| local.starts_with(prefix.as_str()))
        {
            score += BUSINESS_PREFIX_BONUS;
        }

        if website.map_or(false, |site| same_site(domain, site)) {
            score += WEBSITE_MATCH_BONUS;
        }

        if self.is_free_mail(domain) {
            score += FREE_MAIL_PENALTY;
        } else {
            score += COMPANY_DOMAIN_BONUS;
        }

        if JUNK_TOKENS.iter().any(|token| local.contains(token)) {
            score += JUNK_PENALTY;
        }

        let length = local.chars().count();
        if length <= 10 {
            score += SHORT_LOCAL_BONUS;
        } else if length > 20 {
            score += LONG_LOCAL_PENALTY;
        }

        score
    }
}
