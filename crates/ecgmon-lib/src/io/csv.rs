use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::{io::Read, path::Path};

use crate::signal::Sample;

/// Column positions for timestamp and amplitude.
fn locate_columns(header: &StringRecord) -> Option<(usize, usize)> {
    let find = |names: &[&str]| {
        header
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };
    let ts = find(&["timestamp", "timestamp_ms", "time", "t"])?;
    let amp = find(&["amplitude", "value", "mv", "ecg"])?;
    Some((ts, amp))
}

/// Parse `timestamp,amplitude` rows. A header row is optional; when present
/// the columns are looked up by name, otherwise the first two columns are used.
/// Rows are returned in file order, duplicates included.
pub fn read_samples_csv<R: Read>(reader: R) -> Result<Vec<Sample>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader);
    let mut columns = (0, 1);
    let mut out = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", row + 1))?;
        let parse = |idx: usize| -> Option<f64> { record.get(idx)?.parse().ok() };
        match (parse(columns.0), parse(columns.1)) {
            (Some(ts), Some(amp)) => out.push(Sample::new(ts, amp)),
            _ if row == 0 => {
                columns = locate_columns(&record)
                    .context("header must name a timestamp and an amplitude column")?;
            }
            _ => anyhow::bail!("row {} is not a timestamp,amplitude pair: {:?}", row + 1, record),
        }
    }
    if out.is_empty() {
        anyhow::bail!("no samples found");
    }
    Ok(out)
}

pub fn read_samples_csv_path(path: &Path) -> Result<Vec<Sample>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    read_samples_csv(file).with_context(|| format!("in {}", path.display()))
}
