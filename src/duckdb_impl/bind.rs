use crate::input::CompressionMode;
use duckdb::vtab::BindInfo;
use libduckdb_sys::{
    duckdb_bind_get_named_parameter, duckdb_bind_info, duckdb_destroy_value, duckdb_free,
    duckdb_get_varchar, duckdb_is_null_value,
};
use std::error::Error;
use std::ffi::{CStr, CString};
use std::os::raw::c_void;
use std::path::PathBuf;

pub(crate) const PATH_PATTERN_PARAM_INDEX: u64 = 0;
pub(crate) const COMPRESSION_PARAM: &str = "compression";

#[derive(Debug, Eq, PartialEq)]
pub(crate) enum NamedParameterVarchar {
    Missing,
    Null,
    Value(String),
}

/// Single path, or every match of a glob when the argument contains `*` or `?`.
pub(crate) fn expand_path_pattern(pattern: &str) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if pattern.contains('*') || pattern.contains('?') {
        let mut paths: Vec<PathBuf> = glob::glob(pattern)?
            .filter_map(|entry| entry.ok())
            .filter(|path| !path.is_dir())
            .collect();
        paths.sort();
        Ok(paths)
    } else {
        Ok(vec![PathBuf::from(pattern)])
    }
}

pub(crate) fn compression_from_parameter(
    parameter: NamedParameterVarchar,
) -> Result<CompressionMode, Box<dyn Error>> {
    match parameter {
        NamedParameterVarchar::Missing | NamedParameterVarchar::Null => {
            Ok(CompressionMode::Plain)
        }
        NamedParameterVarchar::Value(raw) => {
            let normalized = raw.trim();
            if normalized.eq_ignore_ascii_case("null") {
                Ok(CompressionMode::Plain)
            } else {
                Ok(CompressionMode::parse(normalized)?)
            }
        }
    }
}

pub(crate) fn resolve_compression_mode(
    bind: &BindInfo,
) -> Result<CompressionMode, Box<dyn Error>> {
    compression_from_parameter(get_named_parameter_varchar(bind, COMPRESSION_PARAM)?)
}

pub(crate) fn get_named_parameter_varchar(
    bind: &BindInfo,
    name: &str,
) -> Result<NamedParameterVarchar, Box<dyn Error>> {
    let name_cstr = CString::new(name)?;

    // SAFETY: the returned value is owned by us and only valid during this bind callback.
    let mut value =
        unsafe { duckdb_bind_get_named_parameter(bind_info_ptr(bind), name_cstr.as_ptr()) };
    if value.is_null() {
        return Ok(NamedParameterVarchar::Missing);
    }

    // SAFETY: `value` is a live `duckdb_value`, destroyed exactly once below.
    let result = unsafe {
        if duckdb_is_null_value(value) {
            Ok(NamedParameterVarchar::Null)
        } else {
            let varchar = duckdb_get_varchar(value);
            if varchar.is_null() {
                Err(format!("Failed to read named parameter '{}' as VARCHAR", name).into())
            } else {
                let text = CStr::from_ptr(varchar).to_string_lossy().into_owned();
                duckdb_free(varchar as *mut c_void);
                Ok(NamedParameterVarchar::Value(text))
            }
        }
    };

    // SAFETY: `value` has not been destroyed yet.
    unsafe {
        duckdb_destroy_value(&mut value);
    }

    result
}

fn bind_info_ptr(bind: &BindInfo) -> duckdb_bind_info {
    // SAFETY: duckdb-rs keeps the raw `duckdb_bind_info` as the only field of `BindInfo` and
    // offers no accessor for it nor a null-aware named parameter getter.
    // Re-check `duckdb/src/vtab/function.rs` whenever duckdb-rs is upgraded.
    unsafe { *(bind as *const BindInfo as *const duckdb_bind_info) }
}
