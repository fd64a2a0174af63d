//! Field normalizers for scraped review and metadata values.
//!
//! Source pages encode numbers, dates and percentages in loosely formatted
//! text (`"1,204 reviews"`, `"Jan 5, 2024"`, `"<1%"`). Everything here is a
//! pure function: parse failures yield a neutral value (`0`, `None`), never
//! an error.

use chrono::NaiveDate;

/// Extract the first run of digits from a textual value.
///
/// Thousands separators inside the run are tolerated (`"1,204 reviews"` →
/// `1204`). Missing input or input without digits yields `0`.
pub fn extract_numeric(value: Option<&str>) -> i64 {
    let Some(s) = value else { return 0 };

    let mut digits = String::new();
    let mut chars = s.chars().skip_while(|c| !c.is_ascii_digit()).peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if c == ',' && chars.peek().is_some_and(|n| n.is_ascii_digit()) {
            // thousands separator
            continue;
        } else {
            break;
        }
    }

    digits.parse().unwrap_or(0)
}

/// Parse a source date into a [`NaiveDate`].
///
/// Accepts the long textual form (`"Jan 5, 2024"`) or an ISO date
/// (`"2024-01-05"`). Anything else is `None`.
pub fn normalize_date(value: Option<&str>) -> Option<NaiveDate> {
    let s = value?.trim();
    if s.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(s, "%b %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

/// Parse a rating-distribution percentage such as `"38%"`, `"7,5%"` or `"<1%"`.
///
/// The less-than marker maps to 0.5 by convention. Non-numeric or missing
/// input yields `None`.
pub fn pct(value: Option<&str>) -> Option<f64> {
    let s = value?.trim().replace(',', ".").replace('%', "");
    let s = s.trim();

    if s.contains('<') {
        return Some(0.5);
    }

    if s.is_empty()
        || !s.chars().all(|c| c.is_ascii_digit() || c == '.')
        || s.chars().filter(|c| *c == '.').count() > 1
    {
        return None;
    }

    s.parse().ok()
}

/// Split a free-text address into `(street_number, street_name)`.
///
/// The first whitespace-delimited token is treated as the street number only
/// when it is purely numeric; otherwise the whole string is the street name.
pub fn split_address(value: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(s) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return (None, None);
    };

    let mut parts = s.split_whitespace();
    match parts.next() {
        Some(first) if first.chars().all(|c| c.is_ascii_digit()) => {
            let rest = parts.collect::<Vec<_>>().join(" ");
            (Some(first.to_string()), Some(rest))
        }
        _ => (None, Some(s.to_string())),
    }
}

/// Reduce a review-site domain to the slug used in review ids.
///
/// Lowercases, strips a leading `www.` and the final TLD segment:
/// `"www.amazon.fr"` → `"amazon"`.
pub fn company_slug(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    let stripped = lowered.strip_prefix("www.").unwrap_or(&lowered);

    match stripped.rfind('.') {
        Some(idx) => stripped[..idx].to_string(),
        None => stripped.to_string(),
    }
}

/// Display form of a company slug: first letter uppercased.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Collapse a scraped text node: trim and fold newlines into spaces.
pub fn clean_text_node(text: &str) -> String {
    text.trim().replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_numeric_first_digit_run() {
        assert_eq!(extract_numeric(Some("123 reviews")), 123);
        assert_eq!(extract_numeric(Some("1,204 reviews")), 1204);
        assert_eq!(extract_numeric(Some("rated 4 of 5")), 4);
    }

    #[test]
    fn test_extract_numeric_missing() {
        assert_eq!(extract_numeric(None), 0);
        assert_eq!(extract_numeric(Some("")), 0);
        assert_eq!(extract_numeric(Some("no digits here")), 0);
    }

    #[test]
    fn test_extract_numeric_separator_without_following_digit() {
        assert_eq!(extract_numeric(Some("12, then more")), 12);
    }

    #[test]
    fn test_normalize_date_long_form() {
        assert_eq!(
            normalize_date(Some("Jan 5, 2024")),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
    }

    #[test]
    fn test_normalize_date_iso_is_fixed_point() {
        assert_eq!(
            normalize_date(Some("2024-01-05")),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
    }

    #[test]
    fn test_normalize_date_failure_is_none() {
        assert_eq!(normalize_date(Some("not a date")), None);
        assert_eq!(normalize_date(Some("")), None);
        assert_eq!(normalize_date(None), None);
    }

    #[test]
    fn test_pct_plain_and_marker() {
        assert_eq!(pct(Some("38%")), Some(38.0));
        assert_eq!(pct(Some("<1%")), Some(0.5));
        assert_eq!(pct(Some(" <1 ")), Some(0.5));
    }

    #[test]
    fn test_pct_comma_decimal_separator() {
        assert_eq!(pct(Some("7,5%")), Some(7.5));
    }

    #[test]
    fn test_pct_invalid_is_none() {
        assert_eq!(pct(Some("")), None);
        assert_eq!(pct(Some("n/a")), None);
        assert_eq!(pct(None), None);
    }

    #[test]
    fn test_split_address_with_number() {
        assert_eq!(
            split_address(Some("12 Rue de Paris")),
            (Some("12".to_string()), Some("Rue de Paris".to_string()))
        );
    }

    #[test]
    fn test_split_address_without_number() {
        assert_eq!(
            split_address(Some("Rue de la Paix")),
            (None, Some("Rue de la Paix".to_string()))
        );
    }

    #[test]
    fn test_split_address_empty() {
        assert_eq!(split_address(Some("   ")), (None, None));
        assert_eq!(split_address(None), (None, None));
    }

    #[test]
    fn test_company_slug() {
        assert_eq!(company_slug("www.amazon.fr"), "amazon");
        assert_eq!(company_slug("www.showroomprive.com"), "showroomprive");
        assert_eq!(company_slug("loaded.com"), "loaded");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("amazon"), "Amazon");
        assert_eq!(capitalize(""), "");
    }
}
