//! In-memory survey export: named columns of optional string cells.
//!
//! A missing cell (`None`) is distinct from an empty list literal such as
//! `[]`, which is a present value.

use std::{
    collections::{HashMap, HashSet},
    io::Read,
    path::Path,
};

use anyhow::{Context, Result, ensure};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, warn};

use crate::io_utils;

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    /// Also treat NA-style tokens (`NA`, `N/A`, `null`, ...) as missing.
    pub placeholders_as_missing: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
            placeholders_as_missing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<Option<String>>,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// `(row index, value)` for every present cell, in row order.
    pub fn present(&self) -> impl Iterator<Item = (usize, &str)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(idx, value)| value.as_deref().map(|v| (idx, v)))
    }

    pub fn non_missing(&self) -> usize {
        self.values.iter().filter(|value| value.is_some()).count()
    }

    pub fn get(&self, row: usize) -> Option<&str> {
        self.values.get(row).and_then(|value| value.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<RawColumn>,
    row_count: usize,
}

impl RawTable {
    /// Builds a table from uniquely named columns of equal length.
    pub fn from_columns(columns: Vec<RawColumn>) -> Result<Self> {
        let row_count = columns.first().map_or(0, |c| c.values.len());
        let mut names = HashSet::with_capacity(columns.len());
        for column in &columns {
            ensure!(
                names.insert(column.name.as_str()),
                "Column '{}' appears more than once",
                column.name
            );
            ensure!(
                column.values.len() == row_count,
                "Column '{}' has {} value(s) but the table has {} row(s)",
                column.name,
                column.values.len(),
                row_count
            );
        }
        Ok(Self { columns, row_count })
    }

    /// Convenience for fixtures: `""` becomes a missing cell.
    pub fn from_rows(headers: &[&str], rows: &[Vec<&str>]) -> Result<Self> {
        let mut columns = headers
            .iter()
            .map(|name| RawColumn::new(*name, Vec::with_capacity(rows.len())))
            .collect::<Vec<_>>();
        for (row_idx, row) in rows.iter().enumerate() {
            ensure!(
                row.len() == headers.len(),
                "Row {} has {} field(s) but {} header(s) were given",
                row_idx + 1,
                row.len(),
                headers.len()
            );
            for (column, cell) in columns.iter_mut().zip(row) {
                column
                    .values
                    .push((!cell.is_empty()).then(|| cell.to_string()));
            }
        }
        Self::from_columns(columns)
    }

    pub fn load(path: &Path, options: &LoadOptions) -> Result<Self> {
        let reader = io_utils::open_csv_reader_from_path(path, options.delimiter)?;
        Self::from_csv_reader(reader, options).with_context(|| format!("Loading survey {path:?}"))
    }

    pub fn from_reader<R: Read>(reader: R, options: &LoadOptions) -> Result<Self> {
        Self::from_csv_reader(io_utils::open_csv_reader(reader, options.delimiter), options)
    }

    fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>, options: &LoadOptions) -> Result<Self> {
        let headers = dedupe_headers(io_utils::reader_headers(&mut reader, options.encoding)?);
        let mut columns = headers
            .iter()
            .map(|name| RawColumn::new(name.clone(), Vec::new()))
            .collect::<Vec<_>>();

        let mut record = csv::ByteRecord::new();
        let mut row_idx = 0usize;
        while reader
            .read_byte_record(&mut record)
            .with_context(|| format!("Reading row {}", row_idx + 2))?
        {
            let decoded = io_utils::decode_record(&record, options.encoding)
                .with_context(|| format!("Decoding row {}", row_idx + 2))?;
            for (idx, column) in columns.iter_mut().enumerate() {
                let cell = decoded.get(idx).map(String::as_str).unwrap_or("");
                column.values.push(cell_value(cell, options));
            }
            row_idx += 1;
        }
        debug!(
            "Loaded {} row(s) across {} column(s)",
            row_idx,
            columns.len()
        );
        Ok(Self {
            columns,
            row_count: row_idx,
        })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&RawColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Renames repeated headers `Q`, `Q` to `Q`, `Q.1`, skipping suffixes that
/// collide with another header.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = headers.iter().cloned().collect();
    let mut seen: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut suffixes: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .map(|header| {
            if seen.insert(header.clone()) {
                return header;
            }
            let next = suffixes.entry(header.clone()).or_insert(0);
            let renamed = loop {
                *next += 1;
                let candidate = format!("{header}.{next}");
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            warn!("Duplicate header '{header}' renamed to '{renamed}'");
            taken.insert(renamed.clone());
            seen.insert(renamed.clone());
            renamed
        })
        .collect()
}

fn cell_value(cell: &str, options: &LoadOptions) -> Option<String> {
    if cell.is_empty() {
        return None;
    }
    if options.placeholders_as_missing && is_placeholder_token(cell) {
        return None;
    }
    Some(cell.to_string())
}

fn is_placeholder_token(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    matches!(
        lowered.as_str(),
        "na" | "n/a"
            | "#n/a"
            | "#n/a n/a"
            | "#na"
            | "<na>"
            | "nan"
            | "-nan"
            | "null"
            | "none"
            | "-1.#ind"
            | "1.#ind"
            | "-1.#qnan"
            | "1.#qnan"
    )
}
