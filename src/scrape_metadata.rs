//! Company metadata scraper.
//!
//! Fetches one profile page per tracked company and projects it into a
//! single CSV snapshot keyed by the external entity id. The snapshot is the
//! manual cache: when the output file already exists the whole scrape is
//! skipped, and it is only refreshed by deleting the file.
//!
//! Unlike review scraping, a structural parse failure here fails the entire
//! run — the output is one combined table and partial snapshots are not
//! acceptable.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::Config;
use crate::models::CompanyMetadata;

const USER_AGENT: &str = "Mozilla/5.0";

struct ProfileSelectors {
    next_data: Selector,
    row_pct: Selector,
    star_labels: [(Selector, &'static str); 5],
}

impl ProfileSelectors {
    fn get() -> &'static ProfileSelectors {
        static SELECTORS: OnceLock<ProfileSelectors> = OnceLock::new();
        SELECTORS.get_or_init(|| {
            let label = |level: &str| {
                Selector::parse(&format!("label[data-star-rating='{}']", level)).unwrap()
            };
            ProfileSelectors {
                next_data: Selector::parse("script#__NEXT_DATA__").unwrap(),
                row_pct: Selector::parse(
                    "p[data-rating-distribution-row-percentage-typography='true']",
                )
                .unwrap(),
                star_labels: [
                    (label("five"), "five"),
                    (label("four"), "four"),
                    (label("three"), "three"),
                    (label("two"), "two"),
                    (label("one"), "one"),
                ],
            }
        })
    }
}

/// Scrape all tracked companies into the metadata snapshot, unless the
/// snapshot already exists. Returns the snapshot path either way.
pub async fn run_scrape_metadata(config: &Config) -> Result<PathBuf> {
    let out_path = config.storage.metadata_csv.clone();

    if out_path.exists() {
        println!(
            "snapshot {} already exists - skipping metadata scrape",
            out_path.display()
        );
        return Ok(out_path);
    }

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.scrape.timeout_secs))
        .build()?;

    let mut rows = Vec::new();
    for company in &config.scrape.companies {
        let url = format!(
            "{}/{}",
            config.scrape.base_url.trim_end_matches('/'),
            company
        );
        println!("  fetching profile: {}", url);

        let body = client
            .get(&url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .with_context(|| format!("profile request failed for {}", url))?
            .text()
            .await
            .with_context(|| format!("failed to read profile body from {}", url))?;

        let metadata = parse_company_page(&body)
            .with_context(|| format!("unexpected profile structure for {}", company))?;
        rows.push(metadata);
    }

    write_snapshot(&out_path, &rows)?;
    println!(
        "  wrote metadata snapshot for {} companies to {}",
        rows.len(),
        out_path.display()
    );

    Ok(out_path)
}

/// Extract the structured metadata record from one profile page.
///
/// The page embeds its data as a JSON document in a `__NEXT_DATA__` script
/// tag; the rating distribution percentages only exist in the rendered
/// star rows. Any missing structure is an error.
pub fn parse_company_page(html: &str) -> Result<CompanyMetadata> {
    let sel = ProfileSelectors::get();
    let doc = Html::parse_document(html);

    let raw = doc
        .select(&sel.next_data)
        .next()
        .context("profile page has no embedded data document")?
        .text()
        .collect::<String>();
    let data: Value =
        serde_json::from_str(&raw).context("embedded data document is not valid JSON")?;

    let business = &data["props"]["pageProps"]["businessUnit"];
    if !business.is_object() {
        bail!("embedded data document has no business unit");
    }

    let id = business["id"]
        .as_str()
        .context("business unit has no id")?
        .to_string();
    let display_name = business["displayName"]
        .as_str()
        .context("business unit has no display name")?
        .to_string();
    let number_of_reviews = business["numberOfReviews"]
        .as_i64()
        .context("business unit has no review count")?;
    let trust_score = business["trustScore"]
        .as_f64()
        .context("business unit has no trust score")?;
    let stars = business["stars"]
        .as_f64()
        .context("business unit has no star value")?;
    let category = resolve_category(&business["categories"])?;

    let contact = &business["contactInfo"];
    if !contact.is_object() {
        bail!("business unit has no contact info");
    }
    let contact_field = |key: &str| {
        contact[key]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let pct_for = |idx: usize| -> Result<String> {
        let (label_sel, level) = &sel.star_labels[idx];
        star_percentage(&doc, sel, label_sel)
            .with_context(|| format!("profile page has no {}-star distribution row", level))
    };
    let five = pct_for(0)?;
    let four = pct_for(1)?;
    let three = pct_for(2)?;
    let two = pct_for(3)?;
    let one = pct_for(4)?;

    Ok(CompanyMetadata {
        id,
        display_name,
        number_of_reviews,
        trust_score,
        website_url: business["websiteUrl"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        stars,
        category,
        email: contact_field("email"),
        address: contact_field("address"),
        city: contact_field("city"),
        country: contact_field("country"),
        phone: contact_field("phone"),
        zip_code: contact_field("zipCode"),
        five_star_percentage: five,
        four_star_percentage: four,
        three_star_percentage: three,
        two_star_percentage: two,
        one_star_percentage: one,
    })
}

/// Resolve the single primary category.
///
/// One category → that one; several → the one flagged primary; several with
/// none flagged primary is a data error, not a silent default.
fn resolve_category(categories: &Value) -> Result<String> {
    let cats = categories
        .as_array()
        .context("business unit has no category list")?;

    match cats.len() {
        0 => bail!("business unit has an empty category list"),
        1 => cats[0]["name"]
            .as_str()
            .map(str::to_string)
            .context("category entry has no name"),
        _ => cats
            .iter()
            .find(|c| c["isPrimary"].as_bool() == Some(true))
            .and_then(|c| c["name"].as_str())
            .map(str::to_string)
            .context("several categories but none is flagged primary"),
    }
}

/// The percentage cell paired with one star-rating label: first within the
/// same distribution row, otherwise the first one following the label.
fn star_percentage(doc: &Html, sel: &ProfileSelectors, label_sel: &Selector) -> Option<String> {
    let label = doc.select(label_sel).next()?;

    if let Some(row) = label.parent().and_then(ElementRef::wrap) {
        if let Some(p) = row.select(&sel.row_pct).next() {
            return Some(cell_text(p));
        }
    }

    for sibling in label.next_siblings().filter_map(ElementRef::wrap) {
        if is_percentage_cell(&sibling) {
            return Some(cell_text(sibling));
        }
        if let Some(p) = sibling.select(&sel.row_pct).next() {
            return Some(cell_text(p));
        }
    }

    None
}

fn is_percentage_cell(el: &ElementRef) -> bool {
    el.value().name() == "p"
        && el
            .value()
            .attr("data-rating-distribution-row-percentage-typography")
            == Some("true")
}

fn cell_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Write the snapshot atomically: temp file, then rename. A failed run must
/// not leave a partial snapshot behind to be mistaken for current truth.
fn write_snapshot(path: &Path, rows: &[CompanyMetadata]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move snapshot into place at {}", path.display()))?;

    Ok(path.to_path_buf())
}

/// Read a snapshot back into metadata records.
pub fn read_snapshot(path: &Path) -> Result<Vec<CompanyMetadata>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: CompanyMetadata =
            record.with_context(|| format!("malformed snapshot row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}
