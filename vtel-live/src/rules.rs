//! Static rule catalogue
//!
//! Maps `(industry, sub_industry, rule_id)` to the rule's display name, the
//! series it produces (and which raw field feeds each), and the headline
//! fields shown from its latest result. Adding a rule is a table edit.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Name of the placeholder series for unknown rules
pub const GENERIC_SERIES: &str = "Data";

/// How a raw field becomes a y-value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Number passthrough (numeric strings parsed), 0 when absent or invalid
    Number,
    /// `true` / `"True"` / `1` -> 1, anything else -> 0
    Alert,
    /// Float parse of number or string, 0 when absent or invalid
    Percentage,
}

/// One raw field feeding one series
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub series: &'static str,
    pub field: &'static str,
    pub coercion: Coercion,
}

/// Rendering of a headline result field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFormat {
    Count,
    Seconds,
    Percent,
    Text,
}

/// A headline field read from the latest result record
#[derive(Debug, Clone, Copy)]
pub struct SummaryField {
    pub title: &'static str,
    pub key: &'static str,
    pub format: SummaryFormat,
}

/// Everything the engine knows about one analytics rule
#[derive(Debug)]
pub struct RuleSpec {
    pub name: &'static str,
    pub fields: &'static [FieldRule],
    /// Emit nothing for records without a frame index
    pub requires_frame_index: bool,
    pub summary: &'static [SummaryField],
}

impl RuleSpec {
    /// Series names in first-appearance order
    pub fn series_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for field in self.fields {
            if !names.contains(&field.series) {
                names.push(field.series);
            }
        }
        names
    }
}

struct SubIndustryRules {
    sub_industry: &'static str,
    rules: &'static [(&'static str, RuleSpec)],
}

struct IndustryRules {
    industry: &'static str,
    sub_industries: &'static [SubIndustryRules],
}

const fn number(series: &'static str, field: &'static str) -> FieldRule {
    FieldRule {
        series,
        field,
        coercion: Coercion::Number,
    }
}

const fn alert(field: &'static str) -> FieldRule {
    FieldRule {
        series: "Alert Status",
        field,
        coercion: Coercion::Alert,
    }
}

const fn percentage(series: &'static str, field: &'static str) -> FieldRule {
    FieldRule {
        series,
        field,
        coercion: Coercion::Percentage,
    }
}

const fn headline(title: &'static str, key: &'static str, format: SummaryFormat) -> SummaryField {
    SummaryField { title, key, format }
}

const DAIRY_FIELDS: &[FieldRule] = &[
    number("Approx. Wastage Percentage", "Approx. Wastage Percentage"),
    alert("Alert Status"),
];

const SAFE_UNSAFE: &[SummaryField] = &[
    headline("Safe", "safe_count", SummaryFormat::Count),
    headline("Unsafe", "unsafe_count", SummaryFormat::Count),
];

static CATALOGUE: &[IndustryRules] = &[
    IndustryRules {
        industry: "retail",
        sub_industries: &[SubIndustryRules {
            sub_industry: "store_analytics",
            rules: &[
                (
                    "1",
                    RuleSpec {
                        name: "Person Count",
                        fields: &[number("Persons Count", "Number of Persons")],
                        requires_frame_index: true,
                        summary: &[headline("Total People Count", "person_count", SummaryFormat::Count)],
                    },
                ),
                (
                    "2",
                    RuleSpec {
                        name: "Dwell Time",
                        fields: &[number("Total Dwell Time", "Total Dwell Time")],
                        requires_frame_index: true,
                        summary: &[headline("Total Dwell Time", "total_dwell_time", SummaryFormat::Seconds)],
                    },
                ),
            ],
        }],
    },
    IndustryRules {
        industry: "manufacturing",
        sub_industries: &[
            SubIndustryRules {
                sub_industry: "dairy",
                rules: &[
                    (
                        "1",
                        RuleSpec {
                            name: "Milk Spillage",
                            fields: DAIRY_FIELDS,
                            requires_frame_index: false,
                            summary: &[
                                headline("White Percentage", "white_percentage", SummaryFormat::Percent),
                                headline("Detection Start Time", "detection_start_time", SummaryFormat::Text),
                                headline("Total Detection Time", "total_detection_time", SummaryFormat::Seconds),
                            ],
                        },
                    ),
                    (
                        "2",
                        RuleSpec {
                            name: "Milk Wastage",
                            fields: DAIRY_FIELDS,
                            requires_frame_index: false,
                            summary: &[
                                headline("White Percentage", "white_percentage", SummaryFormat::Percent),
                                headline("Detection Start Time", "detection_start_time", SummaryFormat::Text),
                            ],
                        },
                    ),
                ],
            },
            SubIndustryRules {
                sub_industry: "production",
                rules: &[
                    (
                        "1",
                        RuleSpec {
                            name: "Crate Count",
                            fields: &[number("Crates", "Crates"), number("Crates Count", "Crates_count")],
                            requires_frame_index: false,
                            summary: &[
                                headline("ROI Box Count", "roi_box_count", SummaryFormat::Count),
                                headline("Total Crates", "total_crates", SummaryFormat::Count),
                            ],
                        },
                    ),
                    (
                        "2",
                        RuleSpec {
                            name: "Conveyor Belt Crate Count",
                            fields: &[number("Total Crate Count", "Total Crate Count")],
                            requires_frame_index: false,
                            summary: &[headline("Box Count", "box_count", SummaryFormat::Count)],
                        },
                    ),
                ],
            },
        ],
    },
    IndustryRules {
        industry: "safety_industry",
        sub_industries: &[SubIndustryRules {
            sub_industry: "safety",
            rules: &[
                (
                    "1",
                    RuleSpec {
                        name: "Speed",
                        fields: &[number("Normal Speed", "Normal"), number("Over Speed", "Overspeed")],
                        requires_frame_index: false,
                        summary: &[
                            headline("Normal Speed Count", "normal_count", SummaryFormat::Count),
                            headline("Over Speed Count", "overspeed_count", SummaryFormat::Count),
                        ],
                    },
                ),
                (
                    "2",
                    RuleSpec {
                        name: "Helmet",
                        fields: &[alert("Alert Status")],
                        requires_frame_index: false,
                        summary: SAFE_UNSAFE,
                    },
                ),
                (
                    "3",
                    RuleSpec {
                        name: "PPE",
                        fields: &[alert("Alert Status")],
                        requires_frame_index: false,
                        summary: SAFE_UNSAFE,
                    },
                ),
                (
                    "4",
                    RuleSpec {
                        name: "Intrusion",
                        fields: &[number("Persons in ROI", "No_of_persons_in_ROI"), alert("Alert_status")],
                        requires_frame_index: false,
                        summary: &[
                            headline("Intrusion Time", "intrusion_time_sec", SummaryFormat::Seconds),
                            headline("Total Persons Detected", "max_persons_in_roi", SummaryFormat::Count),
                        ],
                    },
                ),
                (
                    "5",
                    RuleSpec {
                        name: "Crowd",
                        fields: &[percentage("Percentage in ROI", "Percentage_in_roi"), alert("Alert_status")],
                        requires_frame_index: false,
                        summary: &[
                            headline("Detection Start Time", "detection_start_time", SummaryFormat::Text),
                            headline("Total Detection Time", "detection_duration", SummaryFormat::Seconds),
                        ],
                    },
                ),
                (
                    "6",
                    RuleSpec {
                        name: "Camera Tampering",
                        fields: &[alert("Alert_Status")],
                        requires_frame_index: false,
                        summary: &[
                            headline("Detection Type", "detection_type", SummaryFormat::Text),
                            headline("Detection Start Time", "detection_start_time", SummaryFormat::Text),
                            headline("Total Detection Time", "total_detection_time", SummaryFormat::Seconds),
                        ],
                    },
                ),
            ],
        }],
    },
];

type RuleIndex = HashMap<&'static str, HashMap<&'static str, HashMap<&'static str, &'static RuleSpec>>>;

static INDEX: Lazy<RuleIndex> = Lazy::new(|| {
    let mut index: RuleIndex = HashMap::new();
    for industry in CATALOGUE {
        let subs = index.entry(industry.industry).or_default();
        for sub in industry.sub_industries {
            let rules = subs.entry(sub.sub_industry).or_default();
            for (rule_id, spec) in sub.rules {
                rules.insert(*rule_id, spec);
            }
        }
    }
    index
});

/// Look up a rule; `None` for any unknown combination
pub fn lookup(industry: &str, sub_industry: &str, rule_id: &str) -> Option<&'static RuleSpec> {
    INDEX
        .get(industry)
        .and_then(|subs| subs.get(sub_industry))
        .and_then(|rules| rules.get(rule_id))
        .copied()
}

/// Display name of a rule, `"Rule {rule_id}"` when unknown
pub fn rule_name(industry: &str, sub_industry: &str, rule_id: &str) -> String {
    lookup(industry, sub_industry, rule_id)
        .map(|spec| spec.name.to_string())
        .unwrap_or_else(|| format!("Rule {}", rule_id))
}

/// Series a session should be seeded with before data arrives
pub fn canonical_series(industry: &str, sub_industry: &str, rule_id: &str) -> Vec<&'static str> {
    match lookup(industry, sub_industry, rule_id) {
        Some(spec) => spec.series_names(),
        None => vec![GENERIC_SERIES],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_names() {
        assert_eq!(rule_name("retail", "store_analytics", "1"), "Person Count");
        assert_eq!(rule_name("safety_industry", "safety", "6"), "Camera Tampering");
        assert_eq!(rule_name("manufacturing", "production", "2"), "Conveyor Belt Crate Count");
        assert_eq!(rule_name("retail", "store_analytics", "99"), "Rule 99");
        assert_eq!(rule_name("mining", "x", "1"), "Rule 1");
    }

    #[test]
    fn test_canonical_series() {
        assert_eq!(
            canonical_series("manufacturing", "dairy", "1"),
            vec!["Approx. Wastage Percentage", "Alert Status"]
        );
        assert_eq!(
            canonical_series("safety_industry", "safety", "1"),
            vec!["Normal Speed", "Over Speed"]
        );
        assert_eq!(canonical_series("safety_industry", "safety", "99"), vec![GENERIC_SERIES]);
    }

    #[test]
    fn test_catalogue_has_twelve_rules() {
        let count: usize = INDEX
            .values()
            .flat_map(|subs| subs.values())
            .map(|rules| rules.len())
            .sum();
        assert_eq!(count, 12);
    }

    #[test]
    fn test_every_rule_has_fields_and_summary() {
        for spec in INDEX
            .values()
            .flat_map(|subs| subs.values())
            .flat_map(|rules| rules.values())
        {
            assert!(!spec.fields.is_empty(), "{} has no fields", spec.name);
            assert!(!spec.summary.is_empty(), "{} has no summary", spec.name);
        }
    }
}
