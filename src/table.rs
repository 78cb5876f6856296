//! Columnar tables and their file formats.
//!
//! Every table is flat: `INT64`, `DOUBLE` and UTF-8 columns, all nullable.
//! Parquet files are published by writing `<path>.tmp` and renaming it over
//! the target, so readers never see a half-written file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parquet::basic::Type as PhysicalType;
use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::Field;
use parquet::schema::parser::parse_message_type;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::features::{FeatureRow, FeatureSelection, FeatureSet, Label, Target};
use crate::form::FormRow;
use crate::match_record::{MatchRecord, ResultClass};
use crate::standings::StandingsRow;
use crate::team_view::{Metric, Tally};

/// Columns a match input file must carry.
pub const MATCH_COLUMNS: [&str; 16] = [
    "match_id",
    "league_id",
    "league_name",
    "season_name",
    "match_day",
    "match_day_name",
    "team_id_1",
    "team_id_2",
    "team_name_1",
    "team_name_2",
    "goals_1",
    "goals_2",
    "result_class",
    "points_1",
    "points_2",
    "result_name",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int64(Vec<Option<i64>>),
    Double(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn parquet_decl(&self) -> &'static str {
        match self {
            ColumnData::Int64(_) => "INT64",
            ColumnData::Double(_) => "DOUBLE",
            ColumnData::Utf8(_) => "BYTE_ARRAY",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, data: ColumnData) {
        self.columns.push(Column {
            name: name.into(),
            data,
        });
    }

    pub fn push_int(&mut self, name: impl Into<String>, values: Vec<Option<i64>>) {
        self.push(name, ColumnData::Int64(values));
    }

    pub fn push_double(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        self.push(name, ColumnData::Double(values));
    }

    pub fn push_str(&mut self, name: impl Into<String>, values: Vec<Option<String>>) {
        self.push(name, ColumnData::Utf8(values));
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or_default()
    }

    /// Non-empty, uniquely named, equally long columns.
    pub fn check_shape(&self) -> Result<()> {
        let Some(first) = self.columns.first() else {
            return Err(EngineError::SchemaViolation("table has no columns".to_string()));
        };
        let rows = first.data.len();
        for (idx, col) in self.columns.iter().enumerate() {
            if col.data.len() != rows {
                return Err(EngineError::SchemaViolation(format!(
                    "column {} has {} rows, expected {rows}",
                    col.name,
                    col.data.len()
                )));
            }
            if self.columns[..idx].iter().any(|c| c.name == col.name) {
                return Err(EngineError::SchemaViolation(format!(
                    "duplicate column {}",
                    col.name
                )));
            }
        }
        Ok(())
    }

    fn int(&self, name: &str) -> Result<&[Option<i64>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Int64(v)) => Ok(v),
            Some(_) => Err(EngineError::SchemaViolation(format!(
                "column {name} is not an integer column"
            ))),
            None => Err(missing_columns(&[name])),
        }
    }

    fn utf8(&self, name: &str) -> Result<&[Option<String>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Utf8(v)) => Ok(v),
            Some(_) => Err(EngineError::SchemaViolation(format!(
                "column {name} is not a string column"
            ))),
            None => Err(missing_columns(&[name])),
        }
    }
}

fn missing_columns(missing: &[&str]) -> EngineError {
    EngineError::SchemaViolation(format!("missing required columns: {}", missing.join(", ")))
}

/// Fails naming every required column absent from `present`.
pub fn require_columns<S: AsRef<str>>(present: &[S], required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !present.iter().any(|p| p.as_ref() == *name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing_columns(&missing))
    }
}

pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

pub fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    table.check_shape()?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    if let Err(err) = write_parquet_file(table, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), rows = table.num_rows(), "table published");
    Ok(())
}

fn write_parquet_file(table: &Table, path: &Path) -> Result<()> {
    let fields: String = table
        .columns
        .iter()
        .map(|c| {
            let annotation = if matches!(c.data, ColumnData::Utf8(_)) {
                " (UTF8)"
            } else {
                ""
            };
            format!("  OPTIONAL {} {}{};\n", c.data.parquet_decl(), c.name, annotation)
        })
        .collect();
    let schema = Arc::new(parse_message_type(&format!("message table {{\n{fields}}}"))?);
    let props = Arc::new(WriterProperties::builder().build());

    let file = File::create(path)?;
    let mut writer = SerializedFileWriter::new(file, schema, props)?;
    let mut row_group = writer.next_row_group()?;
    let mut columns = table.columns.iter();
    while let Some(mut col_writer) = row_group.next_column()? {
        let Some(column) = columns.next() else {
            return Err(EngineError::SchemaViolation(
                "parquet schema has more columns than the table".to_string(),
            ));
        };
        match &column.data {
            ColumnData::Int64(values) => {
                let (present, defs) = definition_levels(values, |v| *v);
                col_writer
                    .typed::<Int64Type>()
                    .write_batch(&present, Some(defs.as_slice()), None)?;
            }
            ColumnData::Double(values) => {
                let (present, defs) = definition_levels(values, |v| *v);
                col_writer
                    .typed::<DoubleType>()
                    .write_batch(&present, Some(defs.as_slice()), None)?;
            }
            ColumnData::Utf8(values) => {
                let (present, defs) =
                    definition_levels(values, |v| ByteArray::from(v.as_str()));
                col_writer
                    .typed::<ByteArrayType>()
                    .write_batch(&present, Some(defs.as_slice()), None)?;
            }
        }
        col_writer.close()?;
    }
    row_group.close()?;
    writer.close()?;
    Ok(())
}

/// Non-null values plus one definition level per row (1 present, 0 null).
fn definition_levels<T, U>(values: &[Option<T>], convert: impl Fn(&T) -> U) -> (Vec<U>, Vec<i16>) {
    let mut present = Vec::with_capacity(values.len());
    let mut defs = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Some(v) => {
                present.push(convert(v));
                defs.push(1);
            }
            None => defs.push(0),
        }
    }
    (present, defs)
}

pub fn read_parquet(path: &Path) -> Result<Table> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;

    let mut table = Table::new();
    for col in reader.metadata().file_metadata().schema_descr().columns() {
        let data = match col.physical_type() {
            PhysicalType::INT64 | PhysicalType::INT32 => ColumnData::Int64(Vec::new()),
            PhysicalType::DOUBLE | PhysicalType::FLOAT => ColumnData::Double(Vec::new()),
            PhysicalType::BYTE_ARRAY => ColumnData::Utf8(Vec::new()),
            other => {
                return Err(EngineError::SchemaViolation(format!(
                    "column {} has unsupported type {other:?}",
                    col.name()
                )));
            }
        };
        table.push(col.name(), data);
    }

    for row in reader.get_row_iter(None)? {
        let row = row?;
        for (column, (name, field)) in table.columns.iter_mut().zip(row.get_column_iter()) {
            push_field(&mut column.data, name, field)?;
        }
    }
    Ok(table)
}

fn push_field(data: &mut ColumnData, name: &str, field: &Field) -> Result<()> {
    match (data, field) {
        (ColumnData::Int64(v), Field::Long(x)) => v.push(Some(*x)),
        (ColumnData::Int64(v), Field::Int(x)) => v.push(Some(i64::from(*x))),
        (ColumnData::Int64(v), Field::Null) => v.push(None),
        (ColumnData::Double(v), Field::Double(x)) => v.push(Some(*x)),
        (ColumnData::Double(v), Field::Float(x)) => v.push(Some(f64::from(*x))),
        (ColumnData::Double(v), Field::Null) => v.push(None),
        (ColumnData::Utf8(v), Field::Str(s)) => v.push(Some(s.clone())),
        (ColumnData::Utf8(v), Field::Null) => v.push(None),
        (_, other) => {
            return Err(EngineError::SchemaViolation(format!(
                "unexpected value {other} in column {name}"
            )));
        }
    }
    Ok(())
}

/// Match input by extension: `.csv` is read as CSV, anything else as parquet.
pub fn read_matches(path: &Path) -> Result<Vec<MatchRecord>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        read_matches_csv(File::open(path)?)
    } else {
        matches_from_table(&read_parquet(path)?)
    }
}

pub fn read_matches_csv<R: Read>(reader: R) -> Result<Vec<MatchRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    require_columns(&headers, &MATCH_COLUMNS)?;
    rdr.set_headers(csv::StringRecord::from(headers));
    let mut out = Vec::new();
    for record in rdr.deserialize::<MatchRecord>() {
        out.push(record?);
    }
    Ok(out)
}

pub fn matches_from_table(table: &Table) -> Result<Vec<MatchRecord>> {
    require_columns(&table.column_names(), &MATCH_COLUMNS)?;
    let int = |name: &'static str| table.int(name).map(|v| (name, v));
    let ints = [
        int("match_id")?,
        int("league_id")?,
        int("match_day")?,
        int("team_id_1")?,
        int("team_id_2")?,
        int("goals_1")?,
        int("goals_2")?,
        int("result_class")?,
        int("points_1")?,
        int("points_2")?,
    ];
    let texts = [
        table.utf8("league_name")?,
        table.utf8("season_name")?,
        table.utf8("match_day_name")?,
        table.utf8("team_name_1")?,
        table.utf8("team_name_2")?,
        table.utf8("result_name")?,
    ];

    (0..table.num_rows())
        .map(|row| -> Result<MatchRecord> {
            let mut n = [0_i64; 10];
            for (slot, (name, values)) in n.iter_mut().zip(ints.iter()) {
                *slot = values[row].ok_or_else(|| {
                    EngineError::SchemaViolation(format!("null {name} in row {row}"))
                })?;
            }
            let text = |idx: usize| texts[idx][row].clone().unwrap_or_default();
            Ok(MatchRecord {
                match_id: n[0],
                league_id: n[1],
                match_day: n[2],
                team_id_1: n[3],
                team_id_2: n[4],
                goals_1: n[5],
                goals_2: n[6],
                result_class: ResultClass::try_from(n[7])?,
                points_1: n[8],
                points_2: n[9],
                league_name: text(0),
                season_name: text(1),
                match_day_name: text(2),
                team_name_1: text(3),
                team_name_2: text(4),
                result_name: text(5),
            })
        })
        .collect()
}

pub fn matches_table(records: &[MatchRecord]) -> Table {
    let int = |f: fn(&MatchRecord) -> i64| -> Vec<Option<i64>> {
        records.iter().map(|r| Some(f(r))).collect()
    };
    let text = |f: fn(&MatchRecord) -> &str| -> Vec<Option<String>> {
        records.iter().map(|r| Some(f(r).to_string())).collect()
    };
    let mut t = Table::new();
    t.push_int("match_id", int(|r| r.match_id));
    t.push_int("league_id", int(|r| r.league_id));
    t.push_str("league_name", text(|r| r.league_name.as_str()));
    t.push_str("season_name", text(|r| r.season_name.as_str()));
    t.push_int("match_day", int(|r| r.match_day));
    t.push_str("match_day_name", text(|r| r.match_day_name.as_str()));
    t.push_int("team_id_1", int(|r| r.team_id_1));
    t.push_int("team_id_2", int(|r| r.team_id_2));
    t.push_str("team_name_1", text(|r| r.team_name_1.as_str()));
    t.push_str("team_name_2", text(|r| r.team_name_2.as_str()));
    t.push_int("goals_1", int(|r| r.goals_1));
    t.push_int("goals_2", int(|r| r.goals_2));
    t.push_int("result_class", int(|r| r.result_class.as_i64()));
    t.push_int("points_1", int(|r| r.points_1));
    t.push_int("points_2", int(|r| r.points_2));
    t.push_str("result_name", text(|r| r.result_name.as_str()));
    t
}

pub fn standings_table(rows: &[StandingsRow]) -> Table {
    let mut t = Table::new();
    t.push_int("league_id", rows.iter().map(|r| Some(r.league_id)).collect());
    t.push_str("league_name", rows.iter().map(|r| Some(r.league_name.clone())).collect());
    t.push_str("season_name", rows.iter().map(|r| Some(r.season_name.clone())).collect());
    t.push_int("match_day", rows.iter().map(|r| Some(r.match_day)).collect());
    t.push_int("team_id", rows.iter().map(|r| Some(r.team_id)).collect());
    t.push_str("team_name", rows.iter().map(|r| Some(r.team_name.clone())).collect());
    push_tallies(&mut t, "", "", rows.iter().map(|r| Some(&r.tally)));
    t.push_int("rank", rows.iter().map(|r| Some(r.rank)).collect());
    t
}

fn push_tallies<'a>(
    t: &mut Table,
    prefix: &str,
    suffix: &str,
    tallies: impl Iterator<Item = Option<&'a Tally>> + Clone,
) {
    for metric in Metric::ALL {
        t.push_int(
            format!("{prefix}{}{suffix}", metric.name()),
            tallies.clone().map(|tally| tally.map(|x| x.get(metric))).collect(),
        );
    }
}

pub fn form_table(rows: &[FormRow], windows: &[usize]) -> Table {
    let mut t = Table::new();
    t.push_int("match_id", rows.iter().map(|r| Some(r.match_id)).collect());
    t.push_int("league_id", rows.iter().map(|r| Some(r.league_id)).collect());
    t.push_int("match_day", rows.iter().map(|r| Some(r.match_day)).collect());
    t.push_int("team_id", rows.iter().map(|r| Some(r.team_id)).collect());
    t.push_str("team_name", rows.iter().map(|r| Some(r.team_name.clone())).collect());
    t.push_int("home_flag", rows.iter().map(|r| Some(i64::from(r.home_flag))).collect());
    push_form(&mut t, "", "", windows, rows.iter().map(Some));
    t
}

fn push_form<'a>(
    t: &mut Table,
    prefix: &str,
    suffix: &str,
    windows: &[usize],
    rows: impl Iterator<Item = Option<&'a FormRow>> + Clone,
) {
    t.push_int(
        format!("{prefix}games{suffix}"),
        rows.clone().map(|r| r.map(|r| r.games)).collect(),
    );
    for &size in windows {
        for metric in Metric::FORM {
            t.push_int(
                format!("{prefix}{}_last_{size}{suffix}", metric.name()),
                rows.clone().map(|r| r.and_then(|r| r.last(metric, size))).collect(),
            );
        }
    }
    for metric in Metric::FORM {
        t.push_double(
            format!("{prefix}{}_avg{suffix}", metric.name()),
            rows.clone().map(|r| r.and_then(|r| r.avg(metric))).collect(),
        );
    }
}

/// Key and label columns, then `standings_*_1/2` and `form_*_1/2` for each
/// selected feature set.
pub fn features_table(
    rows: &[FeatureRow],
    target: Target,
    selection: &FeatureSelection,
    windows: &[usize],
) -> Table {
    let mut t = Table::new();
    t.push_int("match_id", rows.iter().map(|r| Some(r.base.match_id)).collect());
    t.push_int("league_id", rows.iter().map(|r| Some(r.base.league_id)).collect());
    t.push_int("match_day", rows.iter().map(|r| Some(r.base.match_day)).collect());
    t.push_int("team_id_1", rows.iter().map(|r| Some(r.base.team_id_1)).collect());
    t.push_str("team_name_1", rows.iter().map(|r| Some(r.base.team_name_1.clone())).collect());
    t.push_int("team_id_2", rows.iter().map(|r| Some(r.base.team_id_2)).collect());
    t.push_str("team_name_2", rows.iter().map(|r| Some(r.base.team_name_2.clone())).collect());
    t.push_int("home_flag", rows.iter().map(|r| Some(i64::from(r.base.home_flag))).collect());

    match target {
        Target::Goals => {
            t.push_int(
                "goals",
                rows.iter()
                    .map(|r| match r.base.label {
                        Label::Goals(goals) => Some(goals),
                        Label::Result { .. } => None,
                    })
                    .collect(),
            );
        }
        Target::ResultClass => {
            let result = |f: fn(i64, i64, i64, ResultClass) -> i64| -> Vec<Option<i64>> {
                rows.iter()
                    .map(|r| match r.base.label {
                        Label::Result {
                            goals_1,
                            goals_2,
                            goals_diff,
                            result_class,
                        } => Some(f(goals_1, goals_2, goals_diff, result_class)),
                        Label::Goals(_) => None,
                    })
                    .collect()
            };
            t.push_int("goals_1", result(|g1, _, _, _| g1));
            t.push_int("goals_2", result(|_, g2, _, _| g2));
            t.push_int("goals_diff", result(|_, _, d, _| d));
            t.push_int("result_class", result(|_, _, _, c| c.as_i64()));
        }
    }

    for (side, suffix) in [(1, "_1"), (2, "_2")] {
        if selection.contains(FeatureSet::OverallStandings) {
            let standings = || {
                rows.iter().map(move |r| {
                    if side == 1 {
                        r.standings_1.as_ref()
                    } else {
                        r.standings_2.as_ref()
                    }
                })
            };
            push_tallies(&mut t, "standings_", suffix, standings().map(|s| s.map(|s| &s.tally)));
            t.push_int(
                format!("standings_rank{suffix}"),
                standings().map(|s| s.map(|s| s.rank)).collect(),
            );
        }
        if selection.contains(FeatureSet::OverallForm) {
            let form = rows.iter().map(move |r| {
                if side == 1 {
                    r.form_1.as_ref()
                } else {
                    r.form_2.as_ref()
                }
            });
            push_form(&mut t, "form_", suffix, windows, form);
        }
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path(Path::new("out/standings.parquet")),
            PathBuf::from("out/standings.parquet.tmp")
        );
    }

    #[test]
    fn missing_columns_are_all_named() {
        let err = require_columns(&["match_id", "goals_1"], &["match_id", "goals_2", "league_id"])
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("goals_2"));
        assert!(msg.contains("league_id"));
        assert!(!msg.contains("match_id"));
    }

    #[test]
    fn ragged_table_is_rejected() {
        let mut t = Table::new();
        t.push_int("a", vec![Some(1), None]);
        t.push_str("b", vec![Some("x".to_string())]);
        assert!(matches!(t.check_shape(), Err(EngineError::SchemaViolation(_))));
        assert!(Table::new().check_shape().is_err());
    }

    #[test]
    fn csv_matches_need_every_column() {
        let data = "match_id,league_id,match_day\n1,1,1\n";
        let err = read_matches_csv(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("team_id_1"));
    }

    #[test]
    fn csv_matches_deserialize() {
        let data = format!(
            "{}\n7,4,1. Bundesliga,2023/2024,1,1. Spieltag,40,87,\
             FC Bayern,Werder,4,0,1,3,0,Endergebnis\n",
            MATCH_COLUMNS.join(",")
        );
        let records = read_matches_csv(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].result_class, ResultClass::Win);
        assert_eq!(records[0].team_name_2, "Werder");
        records[0].validate().unwrap();
    }

    #[test]
    fn matches_survive_table_conversion() {
        let records = vec![
            MatchRecord::new(1, 1, 1, 10, 20, 2, 2),
            MatchRecord::new(2, 1, 2, 20, 10, 0, 1),
        ];
        let back = matches_from_table(&matches_table(&records)).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn null_key_is_a_schema_violation() {
        let records = vec![MatchRecord::new(1, 1, 1, 10, 20, 2, 2)];
        let mut table = matches_table(&records);
        let idx = table
            .columns
            .iter()
            .position(|c| c.name == "goals_1")
            .unwrap();
        table.columns[idx].data = ColumnData::Int64(vec![None]);
        assert!(matches!(
            matches_from_table(&table),
            Err(EngineError::SchemaViolation(_))
        ));
    }
}
