use std::fs::File;
use std::path::Path;

use log::{debug, warn};

use crate::{Time, time::parse_time};

/// Read every row of a CSV file. Rows that fail to deserialize are skipped
/// and their count returned alongside the parsed rows.
pub fn deserialize_gtfs_file<T>(path: &Path) -> Result<(Vec<T>, usize), std::io::Error>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let file = File::open(path).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("Failed to open file '{}': {}", path.display(), e),
        )
    })?;

    let mut skipped = 0;
    let rows = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file)
        .deserialize()
        .filter_map(|row| match row {
            Ok(row) => Some(row),
            Err(e) => {
                debug!("Skipping row in '{}': {e}", path.display());
                skipped += 1;
                None
            }
        })
        .collect::<Vec<T>>();

    if skipped > 0 {
        warn!("Skipped {skipped} unreadable rows in '{}'", path.display());
    }
    Ok((rows, skipped))
}

/// Outcome of converting one time field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldTime {
    Missing,
    Parsed(Time),
    /// Malformed in the source; replaced with a zero offset
    Defaulted,
}

impl FieldTime {
    pub(crate) fn value(self) -> Option<Time> {
        match self {
            FieldTime::Missing => None,
            FieldTime::Parsed(time) => Some(time),
            FieldTime::Defaulted => Some(0),
        }
    }
}

pub(crate) fn parse_field_time(text: &str) -> FieldTime {
    if text.trim().is_empty() {
        return FieldTime::Missing;
    }
    match parse_time(text) {
        Ok(time) => FieldTime::Parsed(time),
        Err(e) => {
            warn!("{e}; using a zero offset");
            FieldTime::Defaulted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_time_fields() {
        assert_eq!(parse_field_time(""), FieldTime::Missing);
        assert_eq!(parse_field_time("   "), FieldTime::Missing);
        assert_eq!(parse_field_time("08:00:00"), FieldTime::Parsed(28_800));
        assert_eq!(parse_field_time("8h00"), FieldTime::Defaulted);
        assert_eq!(FieldTime::Defaulted.value(), Some(0));
        assert_eq!(FieldTime::Missing.value(), None);
    }
}
