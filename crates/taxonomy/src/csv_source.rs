use komal_core::{AgeAction, AgeActionTable, AgeBand, CategoryRule};
use serde::Deserialize;
use tracing::warn;

use crate::error::TaxonomyError;

#[derive(Debug, Default, Deserialize)]
struct TaxonomyRow {
    #[serde(rename = "Category", default)]
    category: Option<String>,
    #[serde(rename = "Subcategory", default)]
    subcategory: Option<String>,
    #[serde(rename = "Tokenized_category_keywords_total", default)]
    category_keywords: Option<String>,
    #[serde(rename = "Tokenized_subcategory_keywords_total", default)]
    subcategory_keywords: Option<String>,
    #[serde(rename = "rules_below_10", default)]
    rules_below_10: Option<String>,
    #[serde(rename = "rules_10_13", default)]
    rules_10_13: Option<String>,
    #[serde(rename = "rules_13_16", default)]
    rules_13_16: Option<String>,
    #[serde(rename = "rules_16_18", default)]
    rules_16_18: Option<String>,
}

/// Parses the spreadsheet export. Category names and category keywords are
/// filled down from earlier rows; rows without a subcategory are not rules.
pub fn parse_csv(raw: &str, source_name: &str) -> Result<Vec<CategoryRule>, TaxonomyError> {
    let raw = raw.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let mut rules = Vec::new();
    let mut last_category = String::new();
    let mut last_category_keywords: Vec<String> = Vec::new();

    for (index, row) in reader.deserialize::<TaxonomyRow>().enumerate() {
        let row = row.map_err(|source| TaxonomyError::Csv {
            source_name: source_name.to_string(),
            source,
        })?;
        // header is line 1
        let line = index + 2;

        let category = cell(&row.category);
        let category = if category.is_empty() {
            last_category.clone()
        } else {
            last_category = category.clone();
            category
        };
        if category.is_empty() {
            continue;
        }

        let mut category_keywords = split_keywords(&row.category_keywords);
        if category_keywords.is_empty() {
            category_keywords = last_category_keywords.clone();
        } else {
            last_category_keywords = category_keywords.clone();
        }

        let subcategory = cell(&row.subcategory);
        if subcategory.is_empty() {
            continue;
        }

        let mut age_actions = AgeActionTable::default();
        let cells = [
            (AgeBand::Under10, &row.rules_below_10),
            (AgeBand::From10To13, &row.rules_10_13),
            (AgeBand::From13To16, &row.rules_13_16),
            (AgeBand::Over16, &row.rules_16_18),
        ];
        for (band, value) in cells {
            age_actions.set(band, age_action_cell(value, band, line, source_name));
        }

        rules.push(CategoryRule::new(
            category,
            subcategory,
            category_keywords,
            split_keywords(&row.subcategory_keywords),
            age_actions,
        ));
    }

    Ok(rules)
}

fn cell(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn split_keywords(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

fn age_action_cell(value: &Option<String>, band: AgeBand, line: usize, source_name: &str) -> AgeAction {
    let raw = cell(value);
    if raw.is_empty() {
        return AgeActionTable::default_for(band);
    }

    AgeAction::parse(&raw).unwrap_or_else(|| {
        let fallback = AgeActionTable::default_for(band);
        warn!(
            source = %source_name,
            line,
            band = band.as_label(),
            value = %raw,
            fallback = fallback.as_str(),
            "unrecognized age action in taxonomy"
        );
        fallback
    })
}
