//! Tabular view of a programme for display and export.

use crate::entry::ProgrammeEntry;
use chrono::{Duration, NaiveDate};
use polars::prelude::*;

fn date_to_i32(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
    (date - epoch).num_days() as i32
}

fn i32_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(Duration::days(days as i64))
}

fn date_series(name: &'static str, values: Vec<Option<NaiveDate>>) -> PolarsResult<Series> {
    let days: Vec<Option<i32>> = values.into_iter().map(|d| d.map(date_to_i32)).collect();
    Series::new(PlSmallStr::from_static(name), days).cast(&DataType::Date)
}

/// One row per entry in the order given.
pub fn entries_to_dataframe(entries: &[ProgrammeEntry]) -> PolarsResult<DataFrame> {
    let seq: Vec<i32> = entries.iter().map(|e| e.sequence_order).collect();
    let group: Vec<String> = entries.iter().map(|e| e.group_key.clone()).collect();
    let pour: Vec<Option<String>> = entries.iter().map(|e| e.pour_label.clone()).collect();
    let days: Vec<i64> = entries.iter().map(|e| i64::from(e.cycle_days)).collect();
    let pred: Vec<Option<i32>> = entries
        .iter()
        .map(|e| e.predecessor_sequence_order)
        .collect();
    let rel: Vec<Option<String>> = entries
        .iter()
        .map(|e| e.relationship.map(|r| r.as_str().to_string()))
        .collect();

    DataFrame::new(vec![
        Series::new(PlSmallStr::from_static("seq"), seq).into(),
        Series::new(PlSmallStr::from_static("group"), group).into(),
        Series::new(PlSmallStr::from_static("pour"), pour).into(),
        Series::new(PlSmallStr::from_static("days"), days).into(),
        Series::new(PlSmallStr::from_static("pred"), pred).into(),
        Series::new(PlSmallStr::from_static("rel"), rel).into(),
        date_series(
            "manual_start",
            entries.iter().map(|e| e.manual_start_date).collect(),
        )?
        .into(),
        date_series("manual_end", entries.iter().map(|e| e.manual_end_date).collect())?.into(),
        date_series("start", entries.iter().map(|e| e.estimated_start_date).collect())?.into(),
        date_series("end", entries.iter().map(|e| e.estimated_end_date).collect())?.into(),
    ])
}

fn cell(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::Date(days) => i32_to_date(*days)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Renders a frame as a boxed text table.
pub fn render_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();
    let rows: Vec<Vec<String>> = (0..df.height())
        .map(|row_idx| {
            columns
                .iter()
                .map(|col| col.get(row_idx).map(|av| cell(&av)).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = names.iter().map(|n| n.len()).collect();
    for row in &rows {
        for (ci, value) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(value.len());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(w + 2));
        sep.push('+');
    }

    let line = |values: &[String]| {
        let mut out = String::from("|");
        for (ci, value) in values.iter().enumerate() {
            out.push(' ');
            out.push_str(value);
            out.push_str(&" ".repeat(widths[ci].saturating_sub(value.len())));
            out.push_str(" |");
        }
        out
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&line(&names));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in &rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

pub fn programme_table(entries: &[ProgrammeEntry]) -> PolarsResult<String> {
    entries_to_dataframe(entries).map(|df| render_table(&df))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{OwnerId, Relationship};

    #[test]
    fn table_shows_dates_and_links() {
        let mut first = ProgrammeEntry::new(OwnerId::from("job"), "1-GF", 0, 5);
        first.estimated_start_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        first.estimated_end_date = NaiveDate::from_ymd_opt(2024, 1, 5);
        let second =
            ProgrammeEntry::new(OwnerId::from("job"), "1-L1", 1, 3).with_predecessor(0, Relationship::SS);

        let df = entries_to_dataframe(&[first, second]).unwrap();
        assert_eq!(df.height(), 2);
        let table = render_table(&df);
        assert!(table.contains("2024-01-05"));
        assert!(table.contains("| SS "));
        assert!(table.contains("1-L1"));
    }
}
