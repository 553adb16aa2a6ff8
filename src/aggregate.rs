//! Per-category tallies for classified survey columns.
//!
//! A row is *valid* when the target cell is present and, when a grouping
//! column is supplied, the group cell is present too. `valid_count` and every
//! per-group block use valid rows. The overall block of a single-select tally
//! does too; multi-select and numeric overall blocks keep every row with an
//! answer, grouped or not. Groups are the sorted distinct present values of
//! the grouping column.
//!
//! - Single-select: one category per raw value, counted as-is. Tallies are
//!   ordered by descending count, ties in order of first appearance.
//! - Multi-select: values decode into an [`IndicatorMatrix`] whose category
//!   axis is fixed by the ungrouped decode, so every group tally lists every
//!   category (zero when absent) in the same order.
//! - Numeric: the raw distribution, parsed as floats.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::{
    decode::{self, IndicatorMatrix},
    error::AggregateError,
    raw::{RawColumn, RawTable},
    schema::{ColumnRole, Identifiers, InputType, QuestionDescriptor, ValueType},
};

/// Ordered `(category, count)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TallyTable(Vec<(String, usize)>);

impl TallyTable {
    pub fn new(entries: Vec<(String, usize)>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[(String, usize)] {
        &self.0
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(category, _)| category.as_str())
    }

    pub fn get(&self, category: &str) -> Option<usize> {
        self.0
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, count)| *count)
    }

    pub fn total(&self) -> usize {
        self.0.iter().map(|(_, count)| count).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(String, usize)>> for TallyTable {
    fn from(entries: Vec<(String, usize)>) -> Self {
        Self(entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    pub column: String,
    pub group_column: Option<String>,
    pub input_type: InputType,
    pub overall: TallyTable,
    pub by_group: BTreeMap<String, TallyTable>,
    /// Rows with both a target and a group value.
    pub valid_count: usize,
    /// Valid rows per group.
    pub group_sizes: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericAggregation {
    pub column: String,
    pub group_column: Option<String>,
    pub overall: Vec<f64>,
    pub by_group: BTreeMap<String, Vec<f64>>,
    pub valid_count: usize,
    pub group_sizes: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "value_type", rename_all = "lowercase")]
pub enum QuestionAggregation {
    Categorical(Aggregation),
    Numeric(NumericAggregation),
}

impl QuestionAggregation {
    pub fn valid_count(&self) -> usize {
        match self {
            QuestionAggregation::Categorical(agg) => agg.valid_count,
            QuestionAggregation::Numeric(agg) => agg.valid_count,
        }
    }
}

/// Tallies of the bound identifier columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Population {
    pub columns: Vec<(ColumnRole, Aggregation)>,
    /// `grad_year` grouped by `grad_type`, when both are bound.
    pub grad_year_by_type: Option<Aggregation>,
}

struct Frame<'a> {
    target: &'a RawColumn,
    group: Option<&'a RawColumn>,
    valid: Vec<bool>,
    valid_count: usize,
    groups: BTreeSet<&'a str>,
}

impl<'a> Frame<'a> {
    fn new(table: &'a RawTable, target: &str, group: Option<&str>) -> Result<Self, AggregateError> {
        let target = column(table, target)?;
        let group = group.map(|name| column(table, name)).transpose()?;
        let valid = (0..table.row_count())
            .map(|row| {
                target.get(row).is_some() && group.is_none_or(|g| g.get(row).is_some())
            })
            .collect::<Vec<_>>();
        let valid_count = valid.iter().filter(|v| **v).count();
        let groups: BTreeSet<&str> = group
            .map(|g| g.present().map(|(_, value)| value).collect())
            .unwrap_or_default();
        Ok(Self {
            target,
            group,
            valid,
            valid_count,
            groups,
        })
    }

    fn is_valid(&self, row: usize) -> bool {
        self.valid.get(row).copied().unwrap_or(false)
    }

    fn in_group(&self, row: usize, key: &str) -> bool {
        self.is_valid(row) && self.group.and_then(|g| g.get(row)) == Some(key)
    }

    fn group_column(&self) -> Option<String> {
        self.group.map(|g| g.name.clone())
    }

    fn group_sizes(&self) -> BTreeMap<String, usize> {
        self.groups
            .iter()
            .map(|key| {
                let size = (0..self.valid.len())
                    .filter(|row| self.in_group(*row, key))
                    .count();
                (key.to_string(), size)
            })
            .collect()
    }
}

fn column<'a>(table: &'a RawTable, name: &str) -> Result<&'a RawColumn, AggregateError> {
    table
        .column(name)
        .ok_or_else(|| AggregateError::ColumnNotFound {
            column: name.to_string(),
        })
}

/// Tallies a categorical column, optionally partitioned by `group`.
pub fn aggregate(
    table: &RawTable,
    target: &str,
    input_type: InputType,
    group: Option<&str>,
) -> Result<Aggregation, AggregateError> {
    let frame = Frame::new(table, target, group)?;
    let (overall, by_group) = match input_type {
        InputType::SingleSelect => tally_single(&frame),
        InputType::MultiSelect => tally_multi(&frame)?,
    };
    Ok(Aggregation {
        column: frame.target.name.clone(),
        group_column: frame.group_column(),
        input_type,
        overall,
        by_group,
        valid_count: frame.valid_count,
        group_sizes: frame.group_sizes(),
    })
}

fn tally_single(frame: &Frame<'_>) -> (TallyTable, BTreeMap<String, TallyTable>) {
    let overall = count_values(
        frame
            .target
            .present()
            .filter(|(row, _)| frame.is_valid(*row))
            .map(|(_, value)| value),
    );
    let by_group = frame
        .groups
        .iter()
        .map(|key| {
            let tally = count_values(
                frame
                    .target
                    .present()
                    .filter(|(row, _)| frame.in_group(*row, key))
                    .map(|(_, value)| value),
            );
            (key.to_string(), tally)
        })
        .collect();
    (overall, by_group)
}

fn count_values<'a, I>(values: I) -> TallyTable
where
    I: Iterator<Item = &'a str>,
{
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut entries: Vec<(String, usize)> = Vec::new();
    for value in values {
        match positions.get(value) {
            Some(idx) => entries[*idx].1 += 1,
            None => {
                positions.insert(value, entries.len());
                entries.push((value.to_string(), 1));
            }
        }
    }
    // Stable, so ties keep first-appearance order.
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    TallyTable(entries)
}

fn tally_multi(
    frame: &Frame<'_>,
) -> Result<(TallyTable, BTreeMap<String, TallyTable>), AggregateError> {
    let matrix = decode_matrix(frame.target)?;
    // The overall block keeps every answered row, grouped or not.
    let overall = TallyTable(matrix.column_sums(|_| true));
    let by_group = frame
        .groups
        .iter()
        .map(|key| {
            let tally = TallyTable(matrix.column_sums(|row| frame.in_group(row, key)));
            (key.to_string(), tally)
        })
        .collect();
    Ok((overall, by_group))
}

/// Decodes every present value of a multi-select column. Any value that does
/// not decode is an error; skipping it would undercount.
pub fn decode_matrix(target: &RawColumn) -> Result<IndicatorMatrix, AggregateError> {
    let decoded = target
        .present()
        .map(|(row, raw)| {
            decode::parse_list(raw)
                .map(|labels| (row, labels))
                .map_err(|source| AggregateError::Parse {
                    column: target.name.clone(),
                    row: row + 1,
                    value: raw.to_string(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(IndicatorMatrix::from_decoded(decoded))
}

/// Numeric distribution of a column, optionally partitioned by `group`.
pub fn aggregate_numeric(
    table: &RawTable,
    target: &str,
    group: Option<&str>,
) -> Result<NumericAggregation, AggregateError> {
    let frame = Frame::new(table, target, group)?;
    let parsed = frame
        .target
        .present()
        .map(|(row, raw)| {
            decode::parse_number(raw)
                .map(|value| (row, value))
                .ok_or_else(|| AggregateError::SchemaMismatch {
                    column: frame.target.name.clone(),
                    row: row + 1,
                    value: raw.to_string(),
                    expected: "numeric",
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let overall = parsed.iter().map(|(_, value)| *value).collect();
    let by_group = frame
        .groups
        .iter()
        .map(|key| {
            let values = parsed
                .iter()
                .filter(|(row, _)| frame.in_group(*row, key))
                .map(|(_, value)| *value)
                .collect();
            (key.to_string(), values)
        })
        .collect();
    Ok(NumericAggregation {
        column: frame.target.name.clone(),
        group_column: frame.group_column(),
        overall,
        by_group,
        valid_count: frame.valid_count,
        group_sizes: frame.group_sizes(),
    })
}

/// Aggregates a question the way its descriptor says: numeric questions as a
/// distribution, categorical ones by their input type.
pub fn aggregate_question(
    table: &RawTable,
    descriptor: &QuestionDescriptor,
    group: Option<&str>,
) -> Result<QuestionAggregation, AggregateError> {
    match descriptor.value_type {
        ValueType::Numeric => {
            aggregate_numeric(table, &descriptor.question, group).map(QuestionAggregation::Numeric)
        }
        ValueType::Categorical => aggregate(table, &descriptor.question, descriptor.input_type, group)
            .map(QuestionAggregation::Categorical),
    }
}

pub fn population(
    table: &RawTable,
    identifiers: &Identifiers,
) -> Result<Population, AggregateError> {
    let columns = identifiers
        .bound()
        .into_iter()
        .map(|(role, name)| {
            aggregate(table, name, InputType::SingleSelect, None).map(|agg| (role, agg))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let grad_year_by_type = match (
        identifiers.get(ColumnRole::GradYear),
        identifiers.get(ColumnRole::GradType),
    ) {
        (Some(year), Some(kind)) => {
            Some(aggregate(table, year, InputType::SingleSelect, Some(kind))?)
        }
        _ => None,
    };
    Ok(Population {
        columns,
        grad_year_by_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills_table() -> RawTable {
        RawTable::from_rows(
            &["Skills", "Cohort"],
            &[
                vec![r#"["Python"]"#, "A"],
                vec![r#"["Python","SQL"]"#, "A"],
                vec![r#"["SQL"]"#, "B"],
            ],
        )
        .expect("table")
    }

    fn tally(entries: &[(&str, usize)]) -> TallyTable {
        TallyTable::new(
            entries
                .iter()
                .map(|(c, n)| (c.to_string(), *n))
                .collect(),
        )
    }

    #[test]
    fn multi_select_sums_memberships() {
        let agg = aggregate(&skills_table(), "Skills", InputType::MultiSelect, None)
            .expect("aggregate");
        assert_eq!(agg.overall, tally(&[("Python", 2), ("SQL", 2)]));
        assert_eq!(agg.valid_count, 3);
        assert!(agg.by_group.is_empty());
        assert_eq!(agg.group_column, None);
    }

    #[test]
    fn multi_select_groups_share_category_axis() {
        let agg = aggregate(
            &skills_table(),
            "Skills",
            InputType::MultiSelect,
            Some("Cohort"),
        )
        .expect("aggregate");
        assert_eq!(agg.by_group["A"], tally(&[("Python", 2), ("SQL", 1)]));
        assert_eq!(agg.by_group["B"], tally(&[("Python", 0), ("SQL", 1)]));
        assert_eq!(agg.group_column.as_deref(), Some("Cohort"));
    }

    #[test]
    fn single_select_orders_by_count_then_appearance() {
        let table = RawTable::from_rows(
            &["Degree"],
            &[
                vec!["MS"],
                vec!["PhD"],
                vec!["PhD"],
                vec!["BS"],
                vec![""],
                vec!["phd"],
            ],
        )
        .expect("table");
        let agg = aggregate(&table, "Degree", InputType::SingleSelect, None).expect("aggregate");
        assert_eq!(
            agg.overall,
            tally(&[("PhD", 2), ("MS", 1), ("BS", 1), ("phd", 1)])
        );
        assert_eq!(agg.valid_count, 5);
    }

    #[test]
    fn rows_missing_the_group_are_not_valid() {
        let table = RawTable::from_rows(
            &["Answer", "Year"],
            &[
                vec!["yes", "2023"],
                vec!["no", "2021"],
                vec!["yes", ""],
                vec!["", "2022"],
                vec!["yes", "2021"],
            ],
        )
        .expect("table");
        let agg =
            aggregate(&table, "Answer", InputType::SingleSelect, Some("Year")).expect("aggregate");
        assert_eq!(agg.valid_count, 3);
        assert_eq!(agg.overall, tally(&[("yes", 2), ("no", 1)]));
        let keys = agg.by_group.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(keys, ["2021", "2022", "2023"]);
        assert!(agg.by_group["2022"].is_empty());
        assert_eq!(agg.group_sizes["2021"], 2);
        assert_eq!(agg.group_sizes["2022"], 0);
        assert_eq!(agg.group_sizes["2023"], 1);
        assert_eq!(agg.by_group["2021"], tally(&[("no", 1), ("yes", 1)]));
    }

    #[test]
    fn multi_select_overall_keeps_rows_without_group() {
        let table = RawTable::from_rows(
            &["Skills", "Cohort"],
            &[
                vec![r#"["Python"]"#, "A"],
                vec![r#"["Python","SQL"]"#, "A"],
                vec![r#"["SQL"]"#, ""],
            ],
        )
        .expect("table");
        let agg = aggregate(&table, "Skills", InputType::MultiSelect, Some("Cohort"))
            .expect("aggregate");
        assert_eq!(agg.overall, tally(&[("Python", 2), ("SQL", 2)]));
        assert_eq!(agg.by_group["A"], tally(&[("Python", 2), ("SQL", 1)]));
        assert_eq!(agg.valid_count, 2);
    }

    #[test]
    fn malformed_list_is_a_parse_error() {
        let table = RawTable::from_rows(&["Skills"], &[vec!["['a']"], vec!["a, b"]])
            .expect("table");
        let err = aggregate(&table, "Skills", InputType::MultiSelect, None).unwrap_err();
        match err {
            AggregateError::Parse { column, row, value, .. } => {
                assert_eq!(column, "Skills");
                assert_eq!(row, 2);
                assert_eq!(value, "a, b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn numeric_rejects_text_values() {
        let table =
            RawTable::from_rows(&["Hours"], &[vec!["10"], vec!["lots"]]).expect("table");
        let err = aggregate_numeric(&table, "Hours", None).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::SchemaMismatch { row: 2, expected: "numeric", .. }
        ));
    }

    #[test]
    fn numeric_distribution_is_partitioned_by_group() {
        let table = RawTable::from_rows(
            &["Hours", "Cohort"],
            &[
                vec!["10", "B"],
                vec!["2.5", "A"],
                vec!["", "A"],
                vec!["7", ""],
            ],
        )
        .expect("table");
        let agg = aggregate_numeric(&table, "Hours", Some("Cohort")).expect("aggregate");
        assert_eq!(agg.valid_count, 2);
        assert_eq!(agg.overall, vec![10.0, 2.5, 7.0]);
        assert_eq!(agg.by_group["A"], vec![2.5]);
        assert_eq!(agg.by_group["B"], vec![10.0]);
    }

    #[test]
    fn unknown_columns_are_reported() {
        let err = aggregate(&skills_table(), "Nope", InputType::SingleSelect, None).unwrap_err();
        assert!(matches!(err, AggregateError::ColumnNotFound { ref column } if column == "Nope"));
        let err = aggregate(
            &skills_table(),
            "Skills",
            InputType::SingleSelect,
            Some("Missing"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'Missing' not found"));
    }

    #[test]
    fn question_dispatch_follows_value_type() {
        let table = RawTable::from_rows(&["Age"], &[vec!["30"], vec!["30"], vec!["41"]])
            .expect("table");
        let numeric = QuestionDescriptor {
            question: "Age".to_string(),
            input_type: InputType::SingleSelect,
            value_type: ValueType::Numeric,
        };
        let result = aggregate_question(&table, &numeric, None).expect("aggregate");
        assert!(matches!(result, QuestionAggregation::Numeric(_)));
        assert_eq!(result.valid_count(), 3);

        let categorical = QuestionDescriptor {
            value_type: ValueType::Categorical,
            ..numeric
        };
        let result = aggregate_question(&table, &categorical, None).expect("aggregate");
        match result {
            QuestionAggregation::Categorical(agg) => {
                assert_eq!(agg.overall, tally(&[("30", 2), ("41", 1)]));
            }
            other => panic!("unexpected aggregation: {other:?}"),
        }
    }

    #[test]
    fn population_breaks_down_year_by_type() {
        let table = RawTable::from_rows(
            &["Degree", "Year"],
            &[
                vec!["PhD", "1"],
                vec!["MS", "2"],
                vec!["PhD", "2"],
                vec!["PhD", "1"],
            ],
        )
        .expect("table");
        let mut identifiers = Identifiers::default();
        identifiers.bind(ColumnRole::GradType, "Degree");
        identifiers.bind(ColumnRole::GradYear, "Year");

        let population = population(&table, &identifiers).expect("population");
        assert_eq!(population.columns.len(), 2);
        assert_eq!(population.columns[0].0, ColumnRole::GradType);
        assert_eq!(
            population.columns[0].1.overall,
            tally(&[("PhD", 3), ("MS", 1)])
        );
        let breakdown = population.grad_year_by_type.expect("breakdown");
        assert_eq!(breakdown.by_group["PhD"], tally(&[("1", 2), ("2", 1)]));
        assert_eq!(breakdown.by_group["MS"], tally(&[("2", 1)]));
    }
}
