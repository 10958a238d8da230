/// Country codes seen on European directories, mapped to display names
const COUNTRY_CODES: &[(&str, &str)] = &[
    ("AT", "Austria"),
    ("BE", "Belgium"),
    ("BG", "Bulgaria"),
    ("CH", "Switzerland"),
    ("CY", "Cyprus"),
    ("CZ", "Czech Republic"),
    ("DE", "Germany"),
    ("DK", "Denmark"),
    ("EE", "Estonia"),
    ("ES", "Spain"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("GR", "Greece"),
    ("HR", "Croatia"),
    ("HU", "Hungary"),
    ("IE", "Ireland"),
    ("IT", "Italy"),
    ("LT", "Lithuania"),
    ("LU", "Luxembourg"),
    ("LV", "Latvia"),
    ("MT", "Malta"),
    ("NL", "Netherlands"),
    ("NO", "Norway"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("SE", "Sweden"),
    ("SI", "Slovenia"),
    ("SK", "Slovakia"),
    ("TR", "Turkey"),
    ("UK", "United Kingdom"),
];

/// Label used for records without a usable country
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Expands a scraped country value into a display name
///
/// Codes from the table are expanded, anything else is title-cased.
/// Empty and placeholder values yield `None`.
///
/// ```
/// use portal_harvest::record::expand_country;
///
/// assert_eq!(expand_country(" de ").as_deref(), Some("Germany"));
/// assert_eq!(expand_country("united  KINGDOM").as_deref(), Some("United Kingdom"));
/// assert_eq!(expand_country("n/a"), None);
/// ```
pub fn expand_country(raw: &str) -> Option<String> {
    let country = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    if country.is_empty()
        || country.eq_ignore_ascii_case("unknown")
        || country.eq_ignore_ascii_case("n/a")
    {
        return None;
    }

    let upper = country.to_uppercase();
    if let Some((_, name)) = COUNTRY_CODES.iter().find(|(code, _)| *code == upper) {
        return Some(name.to_string());
    }

    Some(title_case(&country))
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
