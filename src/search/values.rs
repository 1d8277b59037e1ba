use serde_json::Value;

use super::date::{FhirDateTime, SearchPrefix};
use crate::path;

/// Picks a canonical query value from the elements a path resolved to.
///
/// The first element a value can be derived from wins. `None` means no
/// element carried anything usable as a search value.
pub fn value_for_search_param<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a Value>,
{
    representative_value(values).map(|(_, value)| value)
}

/// Like [`value_for_search_param`], also returning the element the value came from
pub fn representative_value<'a, I>(values: I) -> Option<(&'a Value, String)>
where
    I: IntoIterator<Item = &'a Value>,
{
    values
        .into_iter()
        .find_map(|element| derive(element).map(|value| (element, value)))
}

fn derive(element: &Value) -> Option<String> {
    match element {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(fields) => {
            if fields.contains_key("coding") {
                return path::first_str(element, "coding.code").map(str::to_string);
            }
            if let Some(reference) = fields.get("reference").and_then(Value::as_str) {
                return Some(reference.to_string());
            }
            if let Some(code) = fields.get("code").and_then(Value::as_str) {
                return Some(code.to_string());
            }
            if fields.contains_key("start") || fields.contains_key("end") {
                return period_value(element);
            }
            if fields.contains_key("family") || fields.contains_key("given") {
                return first_of(element, &["family", "given", "text"]);
            }
            if ["city", "state", "postalCode", "country", "line"]
                .iter()
                .any(|key| fields.contains_key(*key))
            {
                return first_of(element, &["text", "city", "state", "postalCode", "country"]);
            }
            first_of(element, &["value", "text"])
        }
        _ => None,
    }
}

fn first_of(element: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| path::first_str(element, key))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Query value matching a Period: just before its start, else just after its end
fn period_value(period: &Value) -> Option<String> {
    comparator_value(SearchPrefix::Gt, period)
        .filter(|_| period.get("start").is_some())
        .or_else(|| comparator_value(SearchPrefix::Lt, period))
}

/// Derives a prefixed date query from a date, dateTime or Period.
///
/// `gt` lands one unit before the lower boundary (period start) and `lt`
/// one unit after the upper boundary (period end); `ge` and `le` use the
/// boundaries themselves. A period missing one boundary falls back to the
/// other. The original element matches every value produced here.
pub fn comparator_value(comparator: SearchPrefix, baseline: &Value) -> Option<String> {
    let (lower, upper) = boundaries(baseline)?;
    let value = match comparator {
        SearchPrefix::Gt => lower.shift(-1)?,
        SearchPrefix::Ge => lower,
        SearchPrefix::Lt => upper.shift(1)?,
        SearchPrefix::Le => upper,
        _ => return None,
    };
    Some(format!("{comparator}{value}"))
}

fn boundaries(baseline: &Value) -> Option<(FhirDateTime, FhirDateTime)> {
    let parse = |key: &str| {
        baseline
            .get(key)
            .and_then(Value::as_str)
            .and_then(FhirDateTime::parse)
    };

    match baseline {
        Value::String(raw) => {
            let value = FhirDateTime::parse(raw)?;
            Some((value.clone(), value))
        }
        Value::Object(_) => match (parse("start"), parse("end")) {
            (Some(start), Some(end)) => Some((start, end)),
            (Some(only), None) | (None, Some(only)) => Some((only.clone(), only)),
            (None, None) => None,
        },
        _ => None,
    }
}
