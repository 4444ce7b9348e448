use rust_decimal::Decimal;

use crate::models::{PricingRule, SelectedOptions, ServiceCatalog, ServiceDefinition};

/// Advisory price for a booking's selections. Missing or unparseable
/// multipliers count as 1, so the result is never below the base price.
/// A multiplier that would overflow is also treated as 1.
pub fn calculate(service: &ServiceDefinition, selected: &SelectedOptions) -> Decimal {
    let multipliers = match &service.pricing {
        PricingRule::Flat => vec![],
        PricingRule::Duration { duration_category } => {
            vec![hours(service, selected, duration_category)]
        }
        PricingRule::DurationTimesCount {
            duration_category,
            count_category,
        } => vec![
            hours(service, selected, duration_category),
            count(service, selected, count_category),
        ],
        PricingRule::UnitCount { count_category } => {
            vec![count(service, selected, count_category)]
        }
    };

    multipliers
        .into_iter()
        .fold(service.base_price, |total, multiplier| {
            total.checked_mul(multiplier).unwrap_or_else(|| {
                tracing::warn!(
                    service_id = %service.id,
                    %multiplier,
                    "estimate overflowed, multiplier treated as 1"
                );
                total
            })
        })
}

/// Looks the service up first; `None` only when the service id is unknown.
pub fn estimate_for(
    catalog: &ServiceCatalog,
    service_id: &str,
    selected: &SelectedOptions,
) -> Option<Decimal> {
    catalog.service(service_id).map(|s| calculate(s, selected))
}

fn hours(service: &ServiceDefinition, selected: &SelectedOptions, category: &str) -> Decimal {
    service
        .selected_option_name(selected, category)
        .and_then(parse_hours)
        .map(Decimal::from)
        .unwrap_or(Decimal::ONE)
}

fn count(service: &ServiceDefinition, selected: &SelectedOptions, category: &str) -> Decimal {
    service
        .selected_option_name(selected, category)
        .and_then(parse_count)
        .map(Decimal::from)
        .unwrap_or(Decimal::ONE)
}

/// "3 Hours" -> 3, "1 hour" -> 1. The number must be followed by "hour".
pub fn parse_hours(name: &str) -> Option<u32> {
    let (n, rest) = leading_integer(name)?;
    let unit = rest
        .trim_start_matches(|c: char| c.is_whitespace() || c == '-')
        .to_ascii_lowercase();
    unit.starts_with("hour").then_some(n)
}

/// "3 Bathrooms" -> 3, "2 Tanks" -> 2.
pub fn parse_count(name: &str) -> Option<u32> {
    leading_integer(name).map(|(n, _)| n)
}

fn leading_integer(s: &str) -> Option<(u32, &str)> {
    let s = s.trim_start();
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let n: u32 = s[..end].parse().ok()?;
    (n > 0).then_some((n, &s[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(json: &str) -> SelectedOptions {
        serde_json::from_str(json).unwrap()
    }

    fn catalog() -> ServiceCatalog {
        ServiceCatalog::builtin().unwrap()
    }

    #[test]
    fn test_parse_hours() {
        assert_eq!(parse_hours("2 Hours"), Some(2));
        assert_eq!(parse_hours("1 hour"), Some(1));
        assert_eq!(parse_hours("3-hours"), Some(3));
        assert_eq!(parse_hours("30 minutes"), None);
        assert_eq!(parse_hours("Half day"), None);
        assert_eq!(parse_hours("0 hours"), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("3 Bathrooms"), Some(3));
        assert_eq!(parse_count("  2 Tanks"), Some(2));
        assert_eq!(parse_count("Several"), None);
    }

    #[test]
    fn test_gardening_priced_by_duration() {
        let amount = estimate_for(&catalog(), "gardening", &selection(r#"{"duration":"3-hours"}"#));
        assert_eq!(amount, Some(Decimal::from(90)));
    }

    #[test]
    fn test_bathroom_priced_by_duration_and_count() {
        let catalog = catalog();
        let service = catalog.service("bathroom-cleaning").unwrap();
        let amount = calculate(
            service,
            &selection(r#"{"duration":"2-hours","num-bathrooms":"3-bathrooms"}"#),
        );
        assert_eq!(amount, service.base_price * Decimal::from(2) * Decimal::from(3));
    }

    #[test]
    fn test_tank_priced_by_unit_count() {
        let amount = estimate_for(&catalog(), "tank-cleaning", &selection(r#"{"num-tanks":"2-tanks"}"#));
        assert_eq!(amount, Some(Decimal::from(80)));
    }

    #[test]
    fn test_flat_service_ignores_options() {
        let amount = estimate_for(
            &catalog(),
            "pest-control",
            &selection(r#"{"pests":["termites","rodents"]}"#),
        );
        assert_eq!(amount, Some(Decimal::from(60)));
    }

    #[test]
    fn test_missing_duration_defaults_to_one_hour() {
        let amount = estimate_for(&catalog(), "house-cleaning", &SelectedOptions::new());
        assert_eq!(amount, Some(Decimal::from(25)));
    }

    #[test]
    fn test_unparseable_option_name_defaults_to_one() {
        let custom = ServiceCatalog::from_json(
            r#"{"services":[{
                "id":"ironing","name":"Ironing","base_price":15,
                "pricing":{"kind":"duration"},
                "sub_categories":[{"id":"duration","name":"Duration","options":[
                    {"id":"long","name":"A long while"}
                ]}]
            }]}"#,
        )
        .unwrap();
        let amount = estimate_for(&custom, "ironing", &selection(r#"{"duration":"long"}"#));
        assert_eq!(amount, Some(Decimal::from(15)));
    }

    #[test]
    fn test_unknown_option_id_defaults_to_one() {
        let amount = estimate_for(&catalog(), "gardening", &selection(r#"{"duration":"bogus"}"#));
        assert_eq!(amount, Some(Decimal::from(30)));
    }

    #[test]
    fn test_overflowing_multiplier_falls_back_to_one() {
        let oversized = ServiceCatalog::from_json(
            r#"{"services":[{
                "id":"silo-cleaning","name":"Silo Cleaning","base_price":"100000000000000000000",
                "pricing":{"kind":"unit_count","count_category":"num-silos"},
                "sub_categories":[{"id":"num-silos","name":"Silos","options":[
                    {"id":"many","name":"4000000000 Silos"}
                ]}]
            }]}"#,
        )
        .unwrap();
        let base = oversized.service("silo-cleaning").unwrap().base_price;

        let amount = estimate_for(&oversized, "silo-cleaning", &selection(r#"{"num-silos":"many"}"#));
        assert_eq!(amount, Some(base));
    }

    #[test]
    fn test_unknown_service() {
        assert_eq!(estimate_for(&catalog(), "car-wash", &SelectedOptions::new()), None);
    }
}
