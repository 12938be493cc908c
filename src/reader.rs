use crate::duckdb_impl::bind::{
    COMPRESSION_PARAM, PATH_PATTERN_PARAM_INDEX, expand_path_pattern, resolve_compression_mode,
};
use crate::error::ErrorAccumulator;
use crate::input::CompressionMode;
use crate::log;
use crate::solution::{decode_solution_with, puzzle_id_from_path};
use crate::types::{ActionCounts, Solution};
use chrono::DateTime;
use duckdb::{
    core::{DataChunkHandle, Inserter, LogicalTypeHandle, LogicalTypeId},
    vtab::{BindInfo, InitInfo, TableFunctionInfo, VTab},
};
use libduckdb_sys::duckdb_timestamp;
use std::borrow::Cow;
use std::error::Error;
use std::ffi::CString;
use std::path::PathBuf;
use std::sync::Mutex;

#[repr(C)]
pub struct ReadSolutionsBindData {
    paths: Vec<PathBuf>,
    compression: CompressionMode,
}

#[repr(C)]
pub struct ReadSolutionsInitData {
    state: Mutex<SharedState>,
}

struct SharedState {
    next_path_idx: usize,
}

pub struct ReadSolutionsVTab;

pub(crate) const ROWS_PER_CHUNK: usize = 2048;
const READ_SOLUTIONS_COLUMN_COUNT: usize = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ReadSolutionsColumn {
    PuzzleId = 0,
    UserId = 1,
    GroupId = 2,
    Score = 3,
    Timestamp = 4,
    SubmittedAt = 5,
    Actions = 6,
    History = 7,
    Filename = 8,
    ParseError = 9,
}

impl ReadSolutionsColumn {
    const fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        READ_SOLUTIONS_COLUMNS[self.index()].name
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SolutionLogicalType {
    Bigint,
    Double,
    Timestamp,
    Varchar,
}

impl SolutionLogicalType {
    fn to_handle(self) -> LogicalTypeHandle {
        match self {
            Self::Bigint => LogicalTypeHandle::from(LogicalTypeId::Bigint),
            Self::Double => LogicalTypeHandle::from(LogicalTypeId::Double),
            Self::Timestamp => LogicalTypeHandle::from(LogicalTypeId::Timestamp),
            Self::Varchar => LogicalTypeHandle::from(LogicalTypeId::Varchar),
        }
    }
}

struct ColumnDef {
    name: &'static str,
    logical_type: SolutionLogicalType,
}

const READ_SOLUTIONS_COLUMNS: [ColumnDef; READ_SOLUTIONS_COLUMN_COUNT] = [
    ColumnDef {
        name: "PuzzleID",
        logical_type: SolutionLogicalType::Bigint,
    },
    ColumnDef {
        name: "UserID",
        logical_type: SolutionLogicalType::Bigint,
    },
    ColumnDef {
        name: "GroupID",
        logical_type: SolutionLogicalType::Bigint,
    },
    ColumnDef {
        name: "Score",
        logical_type: SolutionLogicalType::Double,
    },
    ColumnDef {
        name: "Timestamp",
        logical_type: SolutionLogicalType::Bigint,
    },
    ColumnDef {
        name: "SubmittedAt",
        logical_type: SolutionLogicalType::Timestamp,
    },
    ColumnDef {
        name: "Actions",
        logical_type: SolutionLogicalType::Varchar,
    },
    ColumnDef {
        name: "History",
        logical_type: SolutionLogicalType::Varchar,
    },
    ColumnDef {
        name: "Filename",
        logical_type: SolutionLogicalType::Varchar,
    },
    ColumnDef {
        name: "parse_error",
        logical_type: SolutionLogicalType::Varchar,
    },
];

/// `Actions` column value: a JSON object, or NULL when the PDL line had no action segment.
fn actions_json(actions: Option<&ActionCounts>) -> Option<String> {
    actions.map(|counts| serde_json::to_string(counts).unwrap_or_else(|_| "{}".to_string()))
}

fn history_json(history: &[String]) -> String {
    serde_json::to_string(history).unwrap_or_else(|_| "[]".to_string())
}

/// `SubmittedAt` in microseconds; NULL for a missing (0) or unrepresentable timestamp.
fn submitted_at_micros(timestamp: i64) -> Option<i64> {
    if timestamp == 0 {
        return None;
    }
    DateTime::from_timestamp(timestamp, 0).map(|submitted| submitted.timestamp_micros())
}

pub(crate) fn sanitize_for_cstring<'a>(
    value: &'a str,
    field_name: &str,
    parse_error: &mut ErrorAccumulator,
) -> Cow<'a, str> {
    if value.contains('\0') {
        parse_error.push(&format!("Sanitized interior NUL in {}", field_name));
        Cow::Owned(value.replace('\0', " "))
    } else {
        Cow::Borrowed(value)
    }
}

/// Column values of one output row, computed before touching DuckDB vectors.
struct SolutionRow<'a> {
    solution: &'a Solution,
    actions: Option<String>,
    history: String,
    submitted_at: Option<i64>,
    parse_error: ErrorAccumulator,
}

impl<'a> SolutionRow<'a> {
    fn new(solution: &'a Solution) -> Self {
        let mut parse_error = ErrorAccumulator::default();
        if puzzle_id_from_path(&solution.filename).is_none() {
            parse_error.push("puzzle id not found in path");
        }

        Self {
            solution,
            actions: actions_json(solution.actions.as_ref()),
            history: history_json(&solution.history),
            submitted_at: submitted_at_micros(solution.timestamp),
            parse_error,
        }
    }
}

struct ChunkWriter<'a> {
    output: &'a mut DataChunkHandle,
    row_count: usize,
}

impl<'a> ChunkWriter<'a> {
    fn new(output: &'a mut DataChunkHandle) -> Self {
        Self {
            output,
            row_count: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.row_count >= ROWS_PER_CHUNK
    }

    fn write_row(&mut self, solution: &Solution) -> Result<(), Box<dyn Error>> {
        let row_idx = self.row_count;
        let mut row = SolutionRow::new(solution);

        self.write_bigint(ReadSolutionsColumn::PuzzleId, row_idx, solution.puzzle_id);
        self.write_bigint(ReadSolutionsColumn::UserId, row_idx, solution.user_id);
        self.write_bigint(ReadSolutionsColumn::GroupId, row_idx, solution.group_id);
        self.write_double(ReadSolutionsColumn::Score, row_idx, solution.score);
        self.write_bigint(ReadSolutionsColumn::Timestamp, row_idx, solution.timestamp);
        self.write_optional_timestamp(
            ReadSolutionsColumn::SubmittedAt,
            row_idx,
            row.submitted_at,
        );
        self.write_optional_varchar(
            ReadSolutionsColumn::Actions,
            row_idx,
            row.actions.as_deref(),
            &mut row.parse_error,
        )?;
        self.write_optional_varchar(
            ReadSolutionsColumn::History,
            row_idx,
            Some(row.history.as_str()),
            &mut row.parse_error,
        )?;
        self.write_optional_varchar(
            ReadSolutionsColumn::Filename,
            row_idx,
            Some(row.solution.filename.as_str()),
            &mut row.parse_error,
        )?;

        let mut parse_error_vec = self.output.flat_vector(ReadSolutionsColumn::ParseError.index());
        match row.parse_error.take() {
            None => parse_error_vec.set_null(row_idx),
            Some(message) => {
                parse_error_vec.insert(row_idx, CString::new(message.replace('\0', " "))?)
            }
        }

        self.row_count += 1;
        Ok(())
    }

    fn set_output_len(&mut self) {
        self.output.set_len(self.row_count);
    }

    fn write_bigint(&mut self, column: ReadSolutionsColumn, row_idx: usize, value: i64) {
        let mut vector = self.output.flat_vector(column.index());
        vector.as_mut_slice::<i64>()[row_idx] = value;
    }

    fn write_double(&mut self, column: ReadSolutionsColumn, row_idx: usize, value: f64) {
        let mut vector = self.output.flat_vector(column.index());
        vector.as_mut_slice::<f64>()[row_idx] = value;
    }

    fn write_optional_timestamp(
        &mut self,
        column: ReadSolutionsColumn,
        row_idx: usize,
        micros: Option<i64>,
    ) {
        let mut vector = self.output.flat_vector(column.index());
        if let Some(micros) = micros {
            vector.as_mut_slice::<duckdb_timestamp>()[row_idx] = duckdb_timestamp { micros };
        } else {
            vector.set_null(row_idx);
        }
    }

    fn write_optional_varchar(
        &mut self,
        column: ReadSolutionsColumn,
        row_idx: usize,
        value: Option<&str>,
        parse_error: &mut ErrorAccumulator,
    ) -> Result<(), Box<dyn Error>> {
        let mut vector = self.output.flat_vector(column.index());
        if let Some(value) = value {
            let sanitized = sanitize_for_cstring(value, column.name(), parse_error);
            vector.insert(row_idx, CString::new(sanitized.as_ref())?);
        } else {
            vector.set_null(row_idx);
        }
        Ok(())
    }
}

/// Decodes the next readable file. A file that cannot be opened fails the query when it is the
/// only input and is skipped with a warning otherwise.
fn next_solution(
    init_data: &ReadSolutionsInitData,
    bind_data: &ReadSolutionsBindData,
) -> Result<Option<Solution>, Box<dyn Error>> {
    loop {
        let path_idx = {
            let mut state = init_data
                .state
                .lock()
                .map_err(|_| "read_solutions state lock poisoned")?;
            if state.next_path_idx >= bind_data.paths.len() {
                return Ok(None);
            }
            let path_idx = state.next_path_idx;
            state.next_path_idx += 1;
            path_idx
        };

        let path = &bind_data.paths[path_idx];
        match decode_solution_with(path, bind_data.compression) {
            Ok(solution) => return Ok(Some(solution)),
            Err(err) => {
                if bind_data.paths.len() == 1 {
                    log::error(err.to_string());
                    return Err(err.into());
                }
                log::warn(format!("Skipping solution file: {}", err));
            }
        }
    }
}

impl VTab for ReadSolutionsVTab {
    type InitData = ReadSolutionsInitData;
    type BindData = ReadSolutionsBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let pattern = bind.get_parameter(PATH_PATTERN_PARAM_INDEX).to_string();
        let compression = resolve_compression_mode(bind)?;
        let paths = expand_path_pattern(&pattern)?;
        log::debug(format!(
            "read_solutions: {} file(s) for '{}'",
            paths.len(),
            pattern
        ));

        for column in READ_SOLUTIONS_COLUMNS.iter() {
            bind.add_result_column(column.name, column.logical_type.to_handle());
        }

        Ok(ReadSolutionsBindData { paths, compression })
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn Error>> {
        Ok(ReadSolutionsInitData {
            state: Mutex::new(SharedState { next_path_idx: 0 }),
        })
    }

    fn func(
        func: &TableFunctionInfo<Self>,
        output: &mut DataChunkHandle,
    ) -> Result<(), Box<dyn Error>> {
        let init_data = func.get_init_data();
        let bind_data = func.get_bind_data();
        let mut chunk_writer = ChunkWriter::new(output);

        while !chunk_writer.is_full() {
            let Some(solution) = next_solution(init_data, bind_data)? else {
                break;
            };
            chunk_writer.write_row(&solution)?;
        }

        chunk_writer.set_output_len();
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(vec![
            LogicalTypeHandle::from(LogicalTypeId::Varchar), // path or glob pattern
        ])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        Some(vec![(
            COMPRESSION_PARAM.to_string(),
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_read_solutions_columns_match_contract() {
        let expected: [(&str, SolutionLogicalType); READ_SOLUTIONS_COLUMN_COUNT] = [
            ("PuzzleID", SolutionLogicalType::Bigint),
            ("UserID", SolutionLogicalType::Bigint),
            ("GroupID", SolutionLogicalType::Bigint),
            ("Score", SolutionLogicalType::Double),
            ("Timestamp", SolutionLogicalType::Bigint),
            ("SubmittedAt", SolutionLogicalType::Timestamp),
            ("Actions", SolutionLogicalType::Varchar),
            ("History", SolutionLogicalType::Varchar),
            ("Filename", SolutionLogicalType::Varchar),
            ("parse_error", SolutionLogicalType::Varchar),
        ];

        for (idx, column) in READ_SOLUTIONS_COLUMNS.iter().enumerate() {
            assert_eq!(column.name, expected[idx].0);
            assert_eq!(column.logical_type, expected[idx].1);
        }
        assert_eq!(ReadSolutionsColumn::ParseError.name(), "parse_error");
    }

    #[test]
    fn test_actions_json_distinguishes_none_from_empty() {
        assert_eq!(actions_json(None), None);
        assert_eq!(actions_json(Some(&ActionCounts::new())).as_deref(), Some("{}"));

        let mut counts = ActionCounts::new();
        counts.insert("wiggle".to_string(), 3);
        counts.insert("shake".to_string(), 1);
        assert_eq!(
            actions_json(Some(&counts)).as_deref(),
            Some(r#"{"shake":1,"wiggle":3}"#)
        );
    }

    #[test]
    fn test_history_json_escapes_entries() {
        let history = vec!["V1:0".to_string(), "quote\"d".to_string()];
        assert_eq!(history_json(&history), r#"["V1:0","quote\"d"]"#);
        assert_eq!(history_json(&[]), "[]");
    }

    #[test]
    fn test_submitted_at_micros() {
        assert_eq!(submitted_at_micros(0), None);
        assert_eq!(
            submitted_at_micros(1_600_000_000),
            Some(1_600_000_000_000_000)
        );
        assert_eq!(submitted_at_micros(i64::MAX), None);
    }

    #[test]
    fn test_solution_row_notes_missing_puzzle_id() {
        let solution = Solution {
            filename: "/tmp/loose.pdb".to_string(),
            ..Solution::default()
        };
        let mut row = SolutionRow::new(&solution);
        assert_eq!(row.actions, None);
        assert_eq!(row.history, "[]");
        assert_eq!(row.submitted_at, None);
        assert_eq!(
            row.parse_error.take().as_deref(),
            Some("puzzle id not found in path")
        );
    }

    #[test]
    fn test_solution_row_for_complete_solution_has_no_parse_error() {
        let solution = Solution {
            puzzle_id: 9,
            timestamp: 60,
            history: vec!["a".to_string()],
            filename: "/data/solution_9/top.pdb".to_string(),
            ..Solution::default()
        };
        let row = SolutionRow::new(&solution);
        assert!(row.parse_error.is_empty());
        assert_eq!(row.submitted_at, Some(60_000_000));
        assert_eq!(row.history, r#"["a"]"#);
    }

    #[test]
    fn test_sanitize_for_cstring_replaces_interior_nul() {
        let mut parse_error = ErrorAccumulator::default();
        let sanitized = sanitize_for_cstring("a\0b", "History", &mut parse_error);
        assert_eq!(sanitized.as_ref(), "a b");
        assert_eq!(
            parse_error.take().as_deref(),
            Some("Sanitized interior NUL in History")
        );
    }

    fn bind_data(paths: Vec<PathBuf>) -> ReadSolutionsBindData {
        ReadSolutionsBindData {
            paths,
            compression: CompressionMode::Plain,
        }
    }

    fn init_data() -> ReadSolutionsInitData {
        ReadSolutionsInitData {
            state: Mutex::new(SharedState { next_path_idx: 0 }),
        }
    }

    #[test]
    fn test_next_solution_skips_unreadable_files_among_many() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("solution_4").join("top.pdb");
        fs::create_dir_all(good.parent().unwrap()).unwrap();
        fs::write(&good, "IRDATA TIMESTAMP 0 77\n").unwrap();

        let bind_data = bind_data(vec![dir.path().join("missing.pdb"), good]);
        let init_data = init_data();

        let solution = next_solution(&init_data, &bind_data).unwrap().unwrap();
        assert_eq!(solution.puzzle_id, 4);
        assert_eq!(solution.timestamp, 77);
        assert!(next_solution(&init_data, &bind_data).unwrap().is_none());
    }

    #[test]
    fn test_next_solution_single_unreadable_file_is_error() {
        let bind_data = bind_data(vec![PathBuf::from("/nonexistent/solution_1/top.pdb")]);
        let init_data = init_data();

        let err = next_solution(&init_data, &bind_data).unwrap_err().to_string();
        assert!(err.contains("Unable to open solution file"));
    }
}
