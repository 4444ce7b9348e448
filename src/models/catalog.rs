use std::collections::{BTreeMap, HashSet};

use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

static BUILTIN_CATALOG: &str = include_str!("../../catalog/services.json");

/// Sub-category id the duration-based pricing rules read by default.
pub const DURATION_CATEGORY: &str = "duration";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCatalog {
    pub services: Vec<ServiceDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    pub name: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub pricing: PricingRule,
    #[serde(default)]
    pub sub_categories: Vec<SubCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingRule {
    #[default]
    Flat,
    Duration {
        #[serde(default = "default_duration_category")]
        duration_category: String,
    },
    DurationTimesCount {
        #[serde(default = "default_duration_category")]
        duration_category: String,
        count_category: String,
    },
    UnitCount {
        count_category: String,
    },
}

fn default_duration_category() -> String {
    DURATION_CATEGORY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub selection: SelectionMode,
    pub options: Vec<ServiceOption>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOption {
    pub id: String,
    pub name: String,
}

/// What the customer picked in one sub-category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionSelection {
    Single(String),
    Multiple(Vec<String>),
}

impl OptionSelection {
    pub fn ids(&self) -> Vec<&str> {
        match self {
            OptionSelection::Single(id) => vec![id.as_str()],
            OptionSelection::Multiple(ids) => ids.iter().map(String::as_str).collect(),
        }
    }
}

/// Sub-category id → selected option id(s).
pub type SelectedOptions = BTreeMap<String, OptionSelection>;

impl ServiceCatalog {
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("built-in service catalog is invalid")
    }

    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read service catalog: {path}"))?;
                Self::from_json(&json)
                    .with_context(|| format!("failed to parse service catalog: {path}"))
            }
            None => Self::builtin(),
        }
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let catalog: ServiceCatalog = serde_json::from_str(s)?;

        let mut seen = HashSet::new();
        for service in &catalog.services {
            if !seen.insert(service.id.as_str()) {
                anyhow::bail!("duplicate service id: {}", service.id);
            }
            if service.base_price < Decimal::ZERO {
                anyhow::bail!("negative base price for service: {}", service.id);
            }
            for category in service.pricing.referenced_categories() {
                if service.sub_category(category).is_none() {
                    anyhow::bail!(
                        "service {} prices by unknown sub-category: {category}",
                        service.id
                    );
                }
            }
        }

        Ok(catalog)
    }

    pub fn service(&self, id: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.id == id)
    }
}

impl PricingRule {
    fn referenced_categories(&self) -> Vec<&str> {
        match self {
            PricingRule::Flat => vec![],
            PricingRule::Duration { duration_category } => vec![duration_category.as_str()],
            PricingRule::DurationTimesCount {
                duration_category,
                count_category,
            } => vec![duration_category.as_str(), count_category.as_str()],
            PricingRule::UnitCount { count_category } => vec![count_category.as_str()],
        }
    }
}

impl ServiceDefinition {
    pub fn sub_category(&self, id: &str) -> Option<&SubCategory> {
        self.sub_categories.iter().find(|c| c.id == id)
    }

    /// Display name of the first option selected in `category`, if any.
    pub fn selected_option_name<'a>(
        &'a self,
        selected: &SelectedOptions,
        category: &str,
    ) -> Option<&'a str> {
        let sub_category = self.sub_category(category)?;
        let selection = selected.get(category)?;
        let first = *selection.ids().first()?;
        sub_category
            .options
            .iter()
            .find(|o| o.id == first)
            .map(|o| o.name.as_str())
    }

    /// Checks that every selection names a known sub-category and option, and
    /// that single-select sub-categories carry exactly one option.
    pub fn validate_selection(&self, selected: &SelectedOptions) -> Result<(), String> {
        for (category_id, selection) in selected {
            let category = self.sub_category(category_id).ok_or_else(|| {
                format!("unknown sub-category {category_id} for service {}", self.id)
            })?;

            let ids = selection.ids();
            if ids.is_empty() {
                return Err(format!("no option selected for {category_id}"));
            }
            if category.selection == SelectionMode::Single && ids.len() > 1 {
                return Err(format!("{category_id} accepts a single option"));
            }
            for id in ids {
                if !category.options.iter().any(|o| o.id == id) {
                    return Err(format!("unknown option {id} for {category_id}"));
                }
            }
        }
        Ok(())
    }
}
