//! Delimited-text adapters for demand input and plan output.

use crate::error::{Error, Result};
use crate::types::{CuttingPlanLine, DemandRecord, Measure};
use std::io::{BufRead, Write};

pub const REQUIRED_LENGTH: &str = "Required Length (mm)";
pub const THICKNESS: &str = "Thickness (mm)";
pub const DIAMETER: &str = "Diameter (mm)";
pub const DEMAND: &str = "Demand";
pub const STANDARD_LENGTH: &str = "Standard Tube Length (mm)";

pub const PLAN_HEADER: [&str; 3] = ["Raw Tube Length", "Cut Plan", "Scrap (mm)"];

struct Columns {
    required_length: usize,
    thickness: usize,
    diameter: usize,
    demand: usize,
    standard_length: usize,
}

impl Columns {
    fn locate(header: &[String], line: usize) -> Result<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| Error::parse(line, format!("missing column '{name}'")))
        };
        Ok(Self {
            required_length: find(REQUIRED_LENGTH)?,
            thickness: find(THICKNESS)?,
            diameter: find(DIAMETER)?,
            demand: find(DEMAND)?,
            standard_length: find(STANDARD_LENGTH)?,
        })
    }
}

/// Reads demand rows from comma-separated text with a header row.
///
/// Columns are matched by name, so their order does not matter and extra
/// columns are ignored. Blank lines are skipped. Values are checked for
/// shape only; whether they make sense is left to normalization.
pub fn read_demand<R: BufRead>(reader: R) -> Result<Vec<DemandRecord>> {
    let mut columns: Option<Columns> = None;
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let line = line.trim_start_matches('\u{feff}');
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_fields(line, line_no)?;
        if columns.is_none() {
            columns = Some(Columns::locate(&fields, line_no)?);
            continue;
        }
        let Some(cols) = columns.as_ref() else {
            continue;
        };

        let field = |col: usize, name: &str| {
            fields
                .get(col)
                .map(|f| f.trim())
                .ok_or_else(|| Error::parse(line_no, format!("missing value for '{name}'")))
        };

        records.push(DemandRecord {
            required_length: parse_whole(
                field(cols.required_length, REQUIRED_LENGTH)?,
                REQUIRED_LENGTH,
                line_no,
            )?,
            thickness: parse_measure(field(cols.thickness, THICKNESS)?, THICKNESS, line_no)?,
            diameter: parse_measure(field(cols.diameter, DIAMETER)?, DIAMETER, line_no)?,
            demand: parse_whole(field(cols.demand, DEMAND)?, DEMAND, line_no)?,
            standard_length: parse_whole(
                field(cols.standard_length, STANDARD_LENGTH)?,
                STANDARD_LENGTH,
                line_no,
            )?,
        });
    }

    if columns.is_none() {
        return Err(Error::parse(1, "input has no header row"));
    }

    tracing::debug!(rows = records.len(), "read demand table");
    Ok(records)
}

/// Writes plan lines with a `Raw Tube Length,Cut Plan,Scrap (mm)` header.
pub fn write_plan<'a, W, I>(mut writer: W, lines: I) -> std::io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a CuttingPlanLine>,
{
    writeln!(writer, "{}", PLAN_HEADER.map(quote).join(","))?;
    for line in lines {
        writeln!(
            writer,
            "{},{},{}",
            line.stock_length,
            quote(&line.cut_plan()),
            line.scrap
        )?;
    }
    writer.flush()
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn split_fields(line: &str, line_no: usize) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(Error::parse(line_no, "unterminated quoted field"));
    }
    fields.push(current);
    Ok(fields)
}

fn parse_number(value: &str, column: &str, line: usize) -> Result<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::parse(line, format!("column '{column}': '{value}' is not a number")))
}

/// Accepts `6000` and `6000.0`, rejects `6000.5`.
fn parse_whole(value: &str, column: &str, line: usize) -> Result<i64> {
    let number = parse_number(value, column, line)?;
    if number.fract() != 0.0 || number.abs() > i64::MAX as f64 {
        return Err(Error::parse(
            line,
            format!("column '{column}': expected a whole number, got '{value}'"),
        ));
    }
    Ok(number as i64)
}

fn parse_measure(value: &str, column: &str, line: usize) -> Result<Measure> {
    let number = parse_number(value, column, line)?;
    Measure::new(number)
        .ok_or_else(|| Error::parse(line, format!("column '{column}': '{value}' is not a number")))
}
