use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;

/// One keyword-to-URL mapping. Order within a table defines match priority.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkMapping {
    pub keywords: Vec<String>,
    pub target_url: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub external: bool,
}

impl LinkMapping {
    fn internal(keywords: &[&str], target_url: &str, label: Option<&str>) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            target_url: target_url.to_string(),
            label: label.map(|l| l.to_string()),
            external: false,
        }
    }

    fn external(keywords: &[&str], target_url: &str, label: Option<&str>) -> Self {
        Self {
            external: true,
            ..Self::internal(keywords, target_url, label)
        }
    }
}

/// Eligibility class for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    One,
    Two,
    Three,
    All,
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1" => Ok(Tier::One),
            "2" => Ok(Tier::Two),
            "3" => Ok(Tier::Three),
            "all" => Ok(Tier::All),
            other => anyhow::bail!("invalid tier '{}' (expected 1, 2, 3 or all)", other),
        }
    }
}

/// Immutable pipeline configuration. Built-in defaults, optionally overridden
/// from a JSON file with the same field names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub internal_mappings: Vec<LinkMapping>,
    pub external_mappings: Vec<LinkMapping>,
    pub cta: LinkMapping,
    pub cta_phrases: Vec<String>,
    pub internal_interval: usize,
    pub external_interval: usize,
    pub tier1_slugs: Vec<String>,
    pub tier2_categories: Vec<String>,
    pub page_url_base: String,
    pub default_category: String,
    pub min_field_len: usize,
}

impl PipelineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config {}", p.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse config {}", p.display()))
            }
        }
    }

    pub fn page_url(&self, slug: &str) -> String {
        format!("{}{}/", self.page_url_base.trim_end_matches('/'), slug_path(slug))
    }

    /// Tier predicate: 1 = slug allow-list, 2 = category allow-list minus
    /// tier-1 slugs, 3 = everything else, all = everything.
    pub fn eligible(&self, slug: &str, category: &str, tier: Tier) -> bool {
        let t1 = self.tier1_slugs.iter().any(|s| s == slug);
        let t2 = !t1
            && self
                .tier2_categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(category));
        match tier {
            Tier::All => true,
            Tier::One => t1,
            Tier::Two => t2,
            Tier::Three => !t1 && !t2,
        }
    }
}

fn slug_path(slug: &str) -> String {
    let trimmed = slug.trim_matches('/');
    format!("/{}", trimmed)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            internal_mappings: vec![
                LinkMapping::internal(
                    &["milestone checklist", "developmental milestones"],
                    "https://www.babypillars.com/milestone-checklist/",
                    Some("Baby milestone checklist"),
                ),
                LinkMapping::internal(
                    &["tummy time"],
                    "https://www.babypillars.com/tummy-time-guide/",
                    Some("Tummy time guide"),
                ),
                LinkMapping::internal(
                    &["sleep routine", "bedtime routine", "baby sleep"],
                    "https://www.babypillars.com/baby-sleep-routines/",
                    Some("Baby sleep routines"),
                ),
                LinkMapping::internal(
                    &["fine motor skills", "motor development"],
                    "https://www.babypillars.com/fine-motor-skills/",
                    Some("Fine motor skills"),
                ),
                LinkMapping::internal(
                    &["sensory play", "sensory activities"],
                    "https://www.babypillars.com/sensory-play-ideas/",
                    Some("Sensory play ideas"),
                ),
                LinkMapping::internal(
                    &["crawling", "learning to crawl"],
                    "https://www.babypillars.com/crawling-stage/",
                    Some("The crawling stage"),
                ),
                LinkMapping::internal(
                    &["first steps", "learning to walk"],
                    "https://www.babypillars.com/first-steps/",
                    Some("First steps"),
                ),
            ],
            external_mappings: vec![
                LinkMapping::external(
                    &["american academy of pediatrics", "pediatrician"],
                    "https://www.healthychildren.org/",
                    Some("HealthyChildren.org (AAP)"),
                ),
                LinkMapping::external(
                    &["cdc milestones", "milestone tracker"],
                    "https://www.cdc.gov/ncbddd/actearly/milestones/",
                    Some("CDC developmental milestones"),
                ),
                LinkMapping::external(
                    &["world health organization", "growth standards"],
                    "https://www.who.int/tools/child-growth-standards",
                    Some("WHO child growth standards"),
                ),
                LinkMapping::external(
                    &["early development research", "brain development"],
                    "https://www.zerotothree.org/",
                    Some("Zero to Three"),
                ),
            ],
            cta: LinkMapping::internal(
                &[],
                "https://www.babypillars.com/all-courses/",
                Some("BabyPillars video courses"),
            ),
            cta_phrases: vec![
                "babypillars".to_string(),
                "online baby development courses".to_string(),
                "development courses".to_string(),
                "our courses".to_string(),
            ],
            internal_interval: 60,
            external_interval: 210,
            tier1_slugs: vec![
                "baby-development-0-3-months".to_string(),
                "baby-development-3-6-months".to_string(),
                "tummy-time-basics".to_string(),
                "when-do-babies-crawl".to_string(),
            ],
            tier2_categories: vec![
                "development".to_string(),
                "milestones".to_string(),
            ],
            page_url_base: "https://www.babypillars.com".to_string(),
            default_category: "general".to_string(),
            min_field_len: 30,
        }
    }
}
