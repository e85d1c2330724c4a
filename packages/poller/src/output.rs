//! Rendering of samples as a terminal table, YAML or JSON.

use clap::ValueEnum;
use console::{measure_text_width, pad_str, style, Alignment};
use serde::Serialize;

use sempwatch_extractor::{ExtractedDataset, ExtractionMode};

use crate::error::Result;
use crate::poll::Sample;

/// Separator between table columns.
const COLUMN_GAP: &str = "  ";

/// How a sample is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns for reading in a terminal.
    #[default]
    Table,
    Yaml,
    Json,
}

/// Nested rows belonging to one primary row.
#[derive(Debug, Serialize)]
struct NestedOutput<'a> {
    key: &'a str,
    rows: &'a [Vec<String>],
}

/// Sample representation for YAML/JSON serialization.
#[derive(Debug, Serialize)]
struct SampleOutput<'a> {
    monitor: &'a str,
    taken_at: String,
    columns: &'a [String],
    rows: Vec<&'a [String]>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    nested_columns: &'a [String],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    nested: Vec<NestedOutput<'a>>,
    mismatches: usize,
}

impl<'a> From<&'a Sample> for SampleOutput<'a> {
    fn from(sample: &'a Sample) -> Self {
        let dataset = &sample.dataset;
        let nested = dataset
            .nested_tables()
            .map(|tables| {
                tables
                    .iter()
                    .map(|(key, rows)| NestedOutput { key, rows })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            monitor: &sample.monitor,
            taken_at: sample.taken_at.to_rfc3339(),
            columns: dataset.columns(),
            rows: dataset.rows().iter().map(|r| r.cells.as_slice()).collect(),
            nested_columns: dataset.nested_columns(),
            nested,
            mismatches: dataset.mismatches().len(),
        }
    }
}

/// Render a sample in the requested format.
///
/// # Arguments
/// * `sample` - The extracted sample
/// * `format` - Output format
///
/// # Returns
/// The rendered text, without a trailing newline for tables
pub fn render(sample: &Sample, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(sample)),
        OutputFormat::Yaml => Ok(serde_yaml_ng::to_string(&SampleOutput::from(sample))?),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&SampleOutput::from(sample))?),
    }
}

fn render_table(sample: &Sample) -> String {
    let dataset = &sample.dataset;
    let mut out = format!(
        "{} at {}\n\n",
        style(&sample.monitor).cyan().bold(),
        sample.taken_at.format("%Y-%m-%d %H:%M:%S")
    );

    if dataset.is_empty() {
        out.push_str("(no rows)");
        return out;
    }

    if dataset.mode() == ExtractionMode::Flat {
        out.push_str(&render_fields(dataset));
    } else {
        let rows: Vec<&[String]> = dataset.rows().iter().map(|r| r.cells.as_slice()).collect();
        out.push_str(&render_grid(dataset.columns(), &rows));
    }

    if let Some(tables) = dataset.nested_tables() {
        for (key, nested) in tables.iter().filter(|(_, rows)| !rows.is_empty()) {
            let rows: Vec<&[String]> = nested.iter().map(Vec::as_slice).collect();
            out.push_str(&format!("\n\n{}\n", style(key).bold()));
            out.push_str(&render_grid(dataset.nested_columns(), &rows));
        }
    }

    let mismatches = dataset.mismatches().len();
    out.push_str(&format!("\n\n{} rows", dataset.row_count()));
    if mismatches > 0 {
        out.push_str(&format!(
            ", {}",
            style(format!("{mismatches} structural mismatches")).yellow()
        ));
    }
    out
}

/// Flat results read better as field/value pairs.
fn render_fields(dataset: &ExtractedDataset) -> String {
    let header = ["field".to_string(), "value".to_string()];
    let pairs: Vec<[String; 2]> = dataset
        .fields()
        .into_iter()
        .map(|(name, value)| [name.to_string(), value.to_string()])
        .collect();
    let rows: Vec<&[String]> = pairs.iter().map(|p| p.as_slice()).collect();
    render_grid(&header, &rows)
}

/// Left-aligned columns, bold header, dashed rule.
fn render_grid(header: &[String], rows: &[&[String]]) -> String {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|cell| single_line(cell)).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| measure_text_width(h)).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(measure_text_width(cell));
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad_str(cell, *width, Alignment::Left, None).into_owned())
            .collect::<Vec<_>>()
            .join(COLUMN_GAP)
            .trim_end()
            .to_string()
    };

    let mut lines = vec![
        style(line(header)).bold().to_string(),
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join(COLUMN_GAP),
    ];
    lines.extend(rows.iter().map(|row| line(row.as_slice())));
    lines.join("\n")
}

/// Collapse whitespace so multi-line values keep the grid intact.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
