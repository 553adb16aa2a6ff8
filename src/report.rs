//! Text rendering of aggregation results for review in a terminal.
//!
//! Each section mirrors one chart: a title naming the question and the
//! grouping column, the overall valid response count, then one block for all
//! valid responses followed by one block per group.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::{
    aggregate::{Aggregation, NumericAggregation, Population, QuestionAggregation, TallyTable},
    classify::ColumnDiagnostic,
    error::UnknownEnumError,
    stats::{self, NumericSummary},
    table::Table,
};

pub const OVERALL_LABEL: &str = "(all)";

/// How a numeric distribution is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericPlotKind {
    /// Histogram bins over a shared range.
    #[default]
    Bar,
    /// Location and spread summary.
    Line,
}

impl NumericPlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumericPlotKind::Bar => "bar",
            NumericPlotKind::Line => "line",
        }
    }
}

impl fmt::Display for NumericPlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NumericPlotKind {
    type Err = UnknownEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(NumericPlotKind::Bar),
            "line" => Ok(NumericPlotKind::Line),
            _ => Err(UnknownEnumError::new("plot kind", value, &["bar", "line"])),
        }
    }
}

pub fn title(column: &str, group: Option<&str>) -> String {
    match group {
        Some(group) => format!("\"{column}\" by \"{group}\""),
        None => format!("\"{column}\""),
    }
}

fn percent(count: usize, base: usize) -> String {
    if base == 0 {
        String::new()
    } else {
        format!("{:.2}%", count as f64 / base as f64 * 100.0)
    }
}

fn tally_rows(label: &str, tally: &TallyTable, base: usize) -> Vec<Vec<String>> {
    tally
        .entries()
        .iter()
        .map(|(category, count)| {
            vec![
                label.to_string(),
                category.clone(),
                count.to_string(),
                percent(*count, base),
            ]
        })
        .collect()
}

/// Percentages are relative to the valid responses of each block, so
/// multi-select blocks may add up to more than 100%.
pub fn render_aggregation(agg: &Aggregation) -> String {
    let mut table = Table::new(["group", "category", "count", "percent"]).right_align(&[2, 3]);
    table.extend(tally_rows(OVERALL_LABEL, &agg.overall, agg.valid_count));
    for (group, tally) in &agg.by_group {
        let base = agg.group_sizes.get(group).copied().unwrap_or_default();
        table.extend(tally_rows(group, tally, base));
    }

    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} [{}]",
        title(&agg.column, agg.group_column.as_deref()),
        agg.input_type
    );
    let _ = writeln!(output, "Valid responses = {}", agg.valid_count);
    output.push_str(&table.render());
    output
}

pub fn render_numeric(agg: &NumericAggregation, kind: NumericPlotKind) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} [numeric, {kind}]",
        title(&agg.column, agg.group_column.as_deref())
    );
    let _ = writeln!(output, "Valid responses = {}", agg.valid_count);
    let blocks = std::iter::once((OVERALL_LABEL, &agg.overall))
        .chain(agg.by_group.iter().map(|(k, v)| (k.as_str(), v)));

    match kind {
        NumericPlotKind::Bar => {
            let overall = NumericSummary::from_values(&agg.overall);
            let (Some(lo), Some(hi)) = (overall.min, overall.max) else {
                return output;
            };
            // Every block shares the overall bin edges.
            let bin_count = stats::histogram(&agg.overall, lo, hi, None).len();
            let mut table = Table::new(["group", "bin", "count"]).right_align(&[2]);
            for (label, values) in blocks {
                let bins = stats::histogram(values, lo, hi, Some(bin_count));
                let last = bins.len().saturating_sub(1);
                for (idx, bin) in bins.iter().enumerate() {
                    table.push(vec![
                        label.to_string(),
                        bin.label(idx == last),
                        bin.count.to_string(),
                    ]);
                }
            }
            output.push_str(&table.render());
        }
        NumericPlotKind::Line => {
            let mut table = Table::new(["group", "count", "min", "max", "mean", "median", "std_dev"])
                .right_align(&[1, 2, 3, 4, 5, 6]);
            for (label, values) in blocks {
                let summary = NumericSummary::from_values(values);
                let metric = |value: Option<f64>| value.map(stats::format_number).unwrap_or_default();
                table.push(vec![
                    label.to_string(),
                    summary.count.to_string(),
                    metric(summary.min),
                    metric(summary.max),
                    metric(summary.mean),
                    metric(summary.median),
                    metric(summary.std_dev),
                ]);
            }
            output.push_str(&table.render());
        }
    }
    output
}

pub fn render_question(result: &QuestionAggregation, kind: NumericPlotKind) -> String {
    match result {
        QuestionAggregation::Categorical(agg) => render_aggregation(agg),
        QuestionAggregation::Numeric(agg) => render_numeric(agg, kind),
    }
}

pub fn render_population(population: &Population) -> String {
    let mut output = String::from("Population distribution\n");
    let mut table = Table::new(["role", "column", "category", "count", "percent"])
        .right_align(&[3, 4]);
    for (role, agg) in &population.columns {
        for (category, count) in agg.overall.entries() {
            table.push(vec![
                role.to_string(),
                agg.column.clone(),
                category.clone(),
                count.to_string(),
                percent(*count, agg.valid_count),
            ]);
        }
    }
    output.push_str(&table.render());
    if let Some(breakdown) = &population.grad_year_by_type {
        output.push('\n');
        output.push_str(&render_aggregation(breakdown));
    }
    output
}

fn flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "yes".to_string(),
        Some(false) => "no".to_string(),
        None => String::new(),
    }
}

pub fn render_diagnostics(diagnostics: &[ColumnDiagnostic]) -> String {
    let mut table = Table::new(["#", "column", "verdict", "detail", "list", "number"])
        .right_align(&[0]);
    for (idx, diagnostic) in diagnostics.iter().enumerate() {
        let evidence = diagnostic.evidence.as_ref();
        table.push(vec![
            (idx + 1).to_string(),
            diagnostic.column.clone(),
            diagnostic.label().to_string(),
            diagnostic.detail(),
            flag(evidence.map(|e| e.is_list)),
            flag(evidence.map(|e| e.is_number)),
        ]);
    }
    table.render()
}
