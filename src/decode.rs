//! Value decoding shared by the classifier and the aggregator.
//!
//! Multi-select answers arrive as serialized lists, frequently written with
//! single quotes (`['Python', 'SQL']`). Decoding is a two step affair:
//! [`normalize_list_literal`] rewrites every `'` to `"`, then [`parse_list`]
//! reads the result as a JSON array of scalar labels.

use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::Value;

use crate::error::ListParseError;

pub fn normalize_list_literal(raw: &str) -> Cow<'_, str> {
    if raw.contains('\'') {
        Cow::Owned(raw.replace('\'', "\""))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Decodes one serialized list into its labels, in order of appearance.
///
/// Strings are taken verbatim; numbers, booleans and `null` use their JSON
/// text so `[1, 2]` yields `"1"` and `"2"`.
pub fn parse_list(raw: &str) -> Result<Vec<String>, ListParseError> {
    let normalized = normalize_list_literal(raw);
    let value: Value = serde_json::from_str(&normalized)?;
    let Value::Array(items) = value else {
        return Err(ListParseError::NotAnArray);
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(label) => Ok(label),
            Value::Array(_) | Value::Object(_) => Err(ListParseError::NestedElement),
            scalar => Ok(scalar.to_string()),
        })
        .collect()
}

pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

/// True when every value decodes as a list. An empty input is vacuously true.
pub fn is_list<'a, I>(values: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    values.into_iter().all(|value| parse_list(value).is_ok())
}

/// True when every value parses as a float. An empty input is vacuously true.
pub fn is_number<'a, I>(values: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    values.into_iter().all(|value| parse_number(value).is_some())
}

/// Row × category membership for one multi-select column.
///
/// Categories are ordered by first appearance across the decoded rows.
/// A label repeated inside one answer counts once for that row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorMatrix {
    categories: Vec<String>,
    rows: Vec<usize>,
    cells: Vec<Vec<bool>>,
}

impl IndicatorMatrix {
    /// Builds the matrix from `(row index, decoded labels)` pairs.
    pub fn from_decoded<I>(decoded: I) -> Self
    where
        I: IntoIterator<Item = (usize, Vec<String>)>,
    {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut categories = Vec::new();
        let mut rows = Vec::new();
        let mut members: Vec<Vec<usize>> = Vec::new();

        for (row, labels) in decoded {
            let mut row_members = Vec::with_capacity(labels.len());
            for label in labels {
                let position = match positions.get(&label) {
                    Some(position) => *position,
                    None => {
                        let position = categories.len();
                        positions.insert(label.clone(), position);
                        categories.push(label);
                        position
                    }
                };
                row_members.push(position);
            }
            rows.push(row);
            members.push(row_members);
        }

        let cells = members
            .into_iter()
            .map(|row_members| {
                let mut cells = vec![false; categories.len()];
                for position in row_members {
                    cells[position] = true;
                }
                cells
            })
            .collect();

        Self {
            categories,
            rows,
            cells,
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Source table row indices, one per matrix row.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn contains(&self, matrix_row: usize, category: &str) -> bool {
        self.categories
            .iter()
            .position(|c| c == category)
            .and_then(|col| self.cells.get(matrix_row).map(|cells| cells[col]))
            .unwrap_or(false)
    }

    /// Per-category count of true cells over the matrix rows accepted by
    /// `keep`, which receives the source table row index.
    pub fn column_sums<F>(&self, mut keep: F) -> Vec<(String, usize)>
    where
        F: FnMut(usize) -> bool,
    {
        let mut sums = vec![0usize; self.categories.len()];
        for (row, cells) in self.rows.iter().zip(&self.cells) {
            if !keep(*row) {
                continue;
            }
            for (sum, cell) in sums.iter_mut().zip(cells) {
                if *cell {
                    *sum += 1;
                }
            }
        }
        self.categories.iter().cloned().zip(sums).collect()
    }
}
