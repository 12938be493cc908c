use crate::duckdb_impl::bind::{
    COMPRESSION_PARAM, PATH_PATTERN_PARAM_INDEX, expand_path_pattern, resolve_compression_mode,
};
use crate::error::ErrorAccumulator;
use crate::fields::read_fields_with;
use crate::input::CompressionMode;
use crate::log;
use crate::reader::{ROWS_PER_CHUNK, sanitize_for_cstring};
use crate::types::FieldMap;
use duckdb::{
    core::{DataChunkHandle, Inserter, LogicalTypeHandle, LogicalTypeId},
    vtab::{BindInfo, InitInfo, TableFunctionInfo, VTab},
};
use std::error::Error;
use std::ffi::CString;
use std::path::PathBuf;
use std::sync::Mutex;
use std::vec::IntoIter;

#[repr(C)]
pub struct ReadIrdataBindData {
    paths: Vec<PathBuf>,
    compression: CompressionMode,
}

#[repr(C)]
pub struct ReadIrdataInitData {
    state: Mutex<SharedState>,
}

struct SharedState {
    next_path_idx: usize,
    available_cursors: Vec<FieldCursor>,
}

pub struct ReadIrdataVTab;

const READ_IRDATA_COLUMN_COUNT: usize = 4;
const READ_IRDATA_COLUMNS: [&str; READ_IRDATA_COLUMN_COUNT] =
    ["Key", "Value", "Ordinal", "Filename"];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ReadIrdataColumn {
    Key = 0,
    Value = 1,
    Ordinal = 2,
    Filename = 3,
}

impl ReadIrdataColumn {
    const fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        READ_IRDATA_COLUMNS[self.index()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldRow {
    key: String,
    value: String,
    ordinal: u32,
}

/// Flattens a field map into rows, keys sorted, values in file order.
fn field_rows(fields: FieldMap) -> Vec<FieldRow> {
    let mut keyed: Vec<(String, Vec<String>)> = fields.into_iter().collect();
    keyed.sort_by(|left, right| left.0.cmp(&right.0));

    keyed
        .into_iter()
        .flat_map(|(key, values)| {
            values
                .into_iter()
                .enumerate()
                .map(move |(ordinal, value)| FieldRow {
                    key: key.clone(),
                    value,
                    ordinal: ordinal as u32,
                })
        })
        .collect()
}

/// Rows of one file that have not been emitted yet.
struct FieldCursor {
    path_idx: usize,
    rows: IntoIter<FieldRow>,
}

fn acquire_cursor(
    init_data: &ReadIrdataInitData,
    bind_data: &ReadIrdataBindData,
) -> Result<Option<FieldCursor>, Box<dyn Error>> {
    loop {
        let path_idx = {
            let mut state = init_data
                .state
                .lock()
                .map_err(|_| "read_irdata state lock poisoned")?;

            if let Some(cursor) = state.available_cursors.pop() {
                return Ok(Some(cursor));
            }

            if state.next_path_idx < bind_data.paths.len() {
                let path_idx = state.next_path_idx;
                state.next_path_idx += 1;
                path_idx
            } else {
                return Ok(None);
            }
        };

        let path = &bind_data.paths[path_idx];
        match read_fields_with(path, bind_data.compression) {
            Ok(fields) => {
                return Ok(Some(FieldCursor {
                    path_idx,
                    rows: field_rows(fields).into_iter(),
                }));
            }
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

fn release_cursor(
    init_data: &ReadIrdataInitData,
    cursor: FieldCursor,
) -> Result<(), Box<dyn Error>> {
    let mut state = init_data
        .state
        .lock()
        .map_err(|_| "read_irdata state lock poisoned")?;
    state.available_cursors.push(cursor);
    Ok(())
}

fn write_varchar(
    output: &mut DataChunkHandle,
    column: ReadIrdataColumn,
    row_idx: usize,
    value: &str,
) -> Result<(), Box<dyn Error>> {
    // Key/Value come straight from the file; NUL bytes cannot cross the C boundary.
    let mut ignored = ErrorAccumulator::default();
    let sanitized = sanitize_for_cstring(value, column.name(), &mut ignored);
    output
        .flat_vector(column.index())
        .insert(row_idx, CString::new(sanitized.as_ref())?);
    Ok(())
}

impl VTab for ReadIrdataVTab {
    type InitData = ReadIrdataInitData;
    type BindData = ReadIrdataBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let pattern = bind.get_parameter(PATH_PATTERN_PARAM_INDEX).to_string();
        let compression = resolve_compression_mode(bind)?;
        let paths = expand_path_pattern(&pattern)?;
        log::debug(format!(
            "read_irdata: {} file(s) for '{}'",
            paths.len(),
            pattern
        ));

        bind.add_result_column(
            ReadIrdataColumn::Key.name(),
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        );
        bind.add_result_column(
            ReadIrdataColumn::Value.name(),
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        );
        bind.add_result_column(
            ReadIrdataColumn::Ordinal.name(),
            LogicalTypeHandle::from(LogicalTypeId::UInteger),
        );
        bind.add_result_column(
            ReadIrdataColumn::Filename.name(),
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        );

        Ok(ReadIrdataBindData { paths, compression })
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn Error>> {
        Ok(ReadIrdataInitData {
            state: Mutex::new(SharedState {
                next_path_idx: 0,
                available_cursors: Vec::new(),
            }),
        })
    }

    fn func(
        func: &TableFunctionInfo<Self>,
        output: &mut DataChunkHandle,
    ) -> Result<(), Box<dyn Error>> {
        let init_data = func.get_init_data();
        let bind_data = func.get_bind_data();
        let mut row_count = 0;
        let mut current: Option<FieldCursor> = None;

        while row_count < ROWS_PER_CHUNK {
            if current.is_none() {
                current = acquire_cursor(init_data, bind_data)?;
            }
            let Some(cursor) = current.as_mut() else {
                break;
            };
            let Some(row) = cursor.rows.next() else {
                // File exhausted; drop it and pick up the next one.
                current = None;
                continue;
            };

            let filename = bind_data.paths[cursor.path_idx].to_string_lossy();
            write_varchar(output, ReadIrdataColumn::Key, row_count, &row.key)?;
            write_varchar(output, ReadIrdataColumn::Value, row_count, &row.value)?;
            output
                .flat_vector(ReadIrdataColumn::Ordinal.index())
                .as_mut_slice::<u32>()[row_count] = row.ordinal;
            write_varchar(output, ReadIrdataColumn::Filename, row_count, &filename)?;
            row_count += 1;
        }

        if let Some(cursor) = current {
            release_cursor(init_data, cursor)?;
        }

        output.set_len(row_count);
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

    fn row(key: &str, value: &str, ordinal: u32) -> FieldRow {
        FieldRow {
            key: key.to_string(),
            value: value.to_string(),
            ordinal,
        }
    }

    #[test]
    fn test_read_irdata_columns_match_contract() {
        assert_eq!(READ_IRDATA_COLUMNS, ["Key", "Value", "Ordinal", "Filename"]);
        assert_eq!(ReadIrdataColumn::Ordinal.name(), "Ordinal");
    }

    #[test]
    fn test_field_rows_sorted_by_key_with_ordinals() {
        let mut fields = FieldMap::new();
        fields.insert(
            "TIMESTAMP".to_string(),
            vec!["1600000000".to_string()],
        );
        fields.insert(
            "HISTORY".to_string(),
            vec!["a,b".to_string(), "c".to_string()],
        );

        assert_eq!(
            field_rows(fields),
            vec![
                row("HISTORY", "a,b", 0),
                row("HISTORY", "c", 1),
                row("TIMESTAMP", "1600000000", 0),
            ]
        );
    }

    #[test]
    fn test_field_rows_empty_map() {
        assert!(field_rows(FieldMap::new()).is_empty());
    }

    fn init_data() -> ReadIrdataInitData {
        ReadIrdataInitData {
            state: Mutex::new(SharedState {
                next_path_idx: 0,
                available_cursors: Vec::new(),
            }),
        }
    }

    #[test]
    fn test_cursor_is_reused_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top.pdb");
        fs::write(&path, "IRDATA A 1\nIRDATA A 2\nIRDATA B 3\n").unwrap();

        let bind_data = ReadIrdataBindData {
            paths: vec![path],
            compression: CompressionMode::Plain,
        };
        let init_data = init_data();

        let mut cursor = acquire_cursor(&init_data, &bind_data).unwrap().unwrap();
        assert_eq!(cursor.rows.next(), Some(row("A", "1", 0)));
        release_cursor(&init_data, cursor).unwrap();

        let mut cursor = acquire_cursor(&init_data, &bind_data).unwrap().unwrap();
        assert_eq!(cursor.path_idx, 0);
        assert_eq!(cursor.rows.next(), Some(row("A", "2", 1)));
        assert_eq!(cursor.rows.next(), Some(row("B", "3", 0)));
        assert_eq!(cursor.rows.next(), None);
        assert!(acquire_cursor(&init_data, &bind_data).unwrap().is_none());
    }

    #[test]
    fn test_acquire_cursor_single_missing_file_is_error() {
        let bind_data = ReadIrdataBindData {
            paths: vec![PathBuf::from("/nonexistent/solution_3/top.pdb")],
            compression: CompressionMode::Plain,
        };
        let err = acquire_cursor(&init_data(), &bind_data)
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("/nonexistent/solution_3/top.pdb"));
    }

    #[test]
    fn test_acquire_cursor_skips_missing_file_among_many() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top.pdb");
        fs::write(&path, "IRDATA ONLY yes\n").unwrap();

        let bind_data = ReadIrdataBindData {
            paths: vec![dir.path().join("missing.pdb"), path],
            compression: CompressionMode::Plain,
        };
        let mut cursor = acquire_cursor(&init_data(), &bind_data).unwrap().unwrap();
        assert_eq!(cursor.path_idx, 1);
        assert_eq!(cursor.rows.next(), Some(row("ONLY", "yes", 0)));
    }
}
