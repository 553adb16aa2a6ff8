//! Schema inference for raw survey exports.
//!
//! Every column is judged on its own:
//!
//! 1. **Eligibility**: some present value must repeat, and the number of
//!    distinct values must stay under half the present rows. Free text and
//!    respondent ids fail here.
//! 2. **Denylist**: export artifacts (`version`, `sample`, `unnamed` in the
//!    header) are dropped.
//! 3. **Evidence**: a [`ColumnEvidence`] bundle records the lower-cased
//!    header and distinct values plus the list/number probes.
//! 4. **Rules**: [`ROLE_RULES`] is scanned in order and the first matching
//!    rule binds an identifier role. A column no rule claims becomes a
//!    [`QuestionDescriptor`].
//!
//! Role bindings are last-match-wins: a later column that matches the same
//! role replaces the earlier one, and a warning is logged.

use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    decode,
    raw::{RawColumn, RawTable},
    schema::{ColumnRole, InputType, QuestionDescriptor, SurveySchema, ValueType},
};

pub const HEADER_DENYLIST: &[&str] = &["version", "sample", "unnamed"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnEvidence {
    pub header_lower: String,
    pub distinct_lower: BTreeSet<String>,
    pub is_list: bool,
    pub is_number: bool,
}

impl ColumnEvidence {
    pub fn gather(column: &RawColumn) -> Self {
        let present = column.present().map(|(_, value)| value).collect::<Vec<_>>();
        Self {
            header_lower: column.name.to_lowercase(),
            distinct_lower: present.iter().map(|value| value.to_lowercase()).collect(),
            is_list: decode::is_list(present.iter().copied()),
            is_number: decode::is_number(present.iter().copied()),
        }
    }

    fn header_has(&self, token: &str) -> bool {
        self.header_lower.contains(token)
    }

    fn has_value(&self, token: &str) -> bool {
        self.distinct_lower.contains(token)
    }
}

pub struct RoleRule {
    pub name: &'static str,
    pub role: ColumnRole,
    pub applies: fn(&ColumnEvidence) -> bool,
}

impl fmt::Debug for RoleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleRule")
            .field("name", &self.name)
            .field("role", &self.role)
            .finish()
    }
}

pub const ROLE_RULES: &[RoleRule] = &[
    RoleRule {
        name: "degree values",
        role: ColumnRole::GradType,
        applies: has_degree_values,
    },
    RoleRule {
        name: "class standing values",
        role: ColumnRole::UndergradYear,
        applies: has_class_standing_values,
    },
    RoleRule {
        name: "year header on text",
        role: ColumnRole::GradYear,
        applies: is_text_year,
    },
    RoleRule {
        name: "year header on numbers",
        role: ColumnRole::GradYear,
        applies: is_numeric_year,
    },
    RoleRule {
        name: "undergrad header",
        role: ColumnRole::IsUndergrad,
        applies: has_undergrad_header,
    },
];

fn has_degree_values(e: &ColumnEvidence) -> bool {
    !e.is_number && (e.has_value("phd") || e.has_value("ph.d."))
}

fn has_class_standing_values(e: &ColumnEvidence) -> bool {
    !e.is_number && e.has_value("senior")
}

fn is_text_year(e: &ColumnEvidence) -> bool {
    !e.is_number && e.header_has("year") && !e.has_value("senior")
}

fn is_numeric_year(e: &ColumnEvidence) -> bool {
    e.is_number && e.header_has("year")
}

fn has_undergrad_header(e: &ColumnEvidence) -> bool {
    e.header_has("undergrad")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Role {
        role: ColumnRole,
        rule: &'static str,
    },
    Question {
        input_type: InputType,
        value_type: ValueType,
    },
}

/// Applies [`ROLE_RULES`] in order; the first match wins.
pub fn decide(evidence: &ColumnEvidence) -> Decision {
    if let Some(rule) = ROLE_RULES.iter().find(|rule| (rule.applies)(evidence)) {
        return Decision::Role {
            role: rule.role,
            rule: rule.name,
        };
    }
    Decision::Question {
        input_type: if evidence.is_list {
            InputType::MultiSelect
        } else {
            InputType::SingleSelect
        },
        value_type: if evidence.is_number {
            ValueType::Numeric
        } else {
            ValueType::Categorical
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    NoRepeatedValue,
    TooManyDistinct { distinct: usize, non_missing: usize },
    Denylisted(&'static str),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NoRepeatedValue => f.write_str("no repeated value"),
            DropReason::TooManyDistinct {
                distinct,
                non_missing,
            } => write!(
                f,
                "{distinct} distinct value(s) across {non_missing} response(s)"
            ),
            DropReason::Denylisted(token) => write!(f, "header contains '{token}'"),
        }
    }
}

pub fn eligibility(column: &RawColumn) -> Result<(), DropReason> {
    let counts = column.present().map(|(_, value)| value).counts();
    if !counts.values().any(|count| *count > 1) {
        return Err(DropReason::NoRepeatedValue);
    }
    let non_missing = column.non_missing();
    let distinct = counts.len();
    if distinct * 2 >= non_missing {
        return Err(DropReason::TooManyDistinct {
            distinct,
            non_missing,
        });
    }
    Ok(())
}

pub fn denylisted(header: &str) -> Option<&'static str> {
    let lowered = header.to_lowercase();
    HEADER_DENYLIST
        .iter()
        .copied()
        .find(|token| lowered.contains(*token))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Dropped(DropReason),
    Role {
        role: ColumnRole,
        rule: &'static str,
        /// Column previously bound to the same role, now displaced.
        replaced: Option<String>,
    },
    Question(QuestionDescriptor),
}

/// Review record for one column of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDiagnostic {
    pub column: String,
    pub verdict: Verdict,
    pub evidence: Option<ColumnEvidence>,
}

impl ColumnDiagnostic {
    pub fn label(&self) -> &'static str {
        match &self.verdict {
            Verdict::Dropped(_) => "dropped",
            Verdict::Role { .. } => "identifier",
            Verdict::Question(_) => "question",
        }
    }

    pub fn detail(&self) -> String {
        match &self.verdict {
            Verdict::Dropped(reason) => reason.to_string(),
            Verdict::Role {
                role,
                rule,
                replaced: Some(previous),
            } => format!("{role} ({rule}); replaces '{previous}'"),
            Verdict::Role { role, rule, .. } => format!("{role} ({rule})"),
            Verdict::Question(descriptor) => {
                format!("{} {}", descriptor.input_type, descriptor.value_type)
            }
        }
    }
}

pub fn classify(table: &RawTable) -> SurveySchema {
    classify_with_diagnostics(table).0
}

pub fn classify_with_diagnostics(table: &RawTable) -> (SurveySchema, Vec<ColumnDiagnostic>) {
    let mut schema = SurveySchema::default();
    let mut diagnostics = Vec::with_capacity(table.columns().len());

    for column in table.columns() {
        let (verdict, evidence) = judge(column, &mut schema);
        diagnostics.push(ColumnDiagnostic {
            column: column.name.clone(),
            verdict,
            evidence,
        });
    }

    info!(
        "Classified {} column(s): {} identifier(s), {} question(s)",
        table.columns().len(),
        schema.identifiers.bound().len(),
        schema.useful_columns.len()
    );
    (schema, diagnostics)
}

fn judge(column: &RawColumn, schema: &mut SurveySchema) -> (Verdict, Option<ColumnEvidence>) {
    if let Err(reason) = eligibility(column) {
        debug!("Skipping '{}': {}", column.name, reason);
        return (Verdict::Dropped(reason), None);
    }
    if let Some(token) = denylisted(&column.name) {
        let reason = DropReason::Denylisted(token);
        debug!("Skipping '{}': {}", column.name, reason);
        return (Verdict::Dropped(reason), None);
    }

    let evidence = ColumnEvidence::gather(column);
    let verdict = match decide(&evidence) {
        Decision::Role { role, rule } => {
            let replaced = schema.identifiers.bind(role, &column.name);
            if let Some(previous) = &replaced {
                warn!(
                    "Identifier '{}' rebound from '{}' to '{}'",
                    role, previous, column.name
                );
            }
            info!("Possible {} column: '{}' ({})", role, column.name, rule);
            Verdict::Role {
                role,
                rule,
                replaced,
            }
        }
        Decision::Question {
            input_type,
            value_type,
        } => {
            let descriptor = QuestionDescriptor {
                question: column.name.clone(),
                input_type,
                value_type,
            };
            info!(
                "Question '{}': input type {}, value type {}",
                column.name, input_type, value_type
            );
            schema.useful_columns.push(descriptor.clone());
            Verdict::Question(descriptor)
        }
    };
    (verdict, Some(evidence))
}
