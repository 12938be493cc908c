use crate::error::OpenError;
use crate::input::{CompressionMode, open_input, scan_lines};
use crate::log;
use crate::types::FieldMap;
use regex::Regex;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

static IRDATA_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^IRDATA ([^ ]*) (.*)$").unwrap());

/// Reads every `IRDATA <KEY> <VALUE>` line of a solution file.
///
/// Lines without the `IRDATA ` tag are skipped. Repeated keys keep all of their values in
/// the order they appear in the file.
pub fn read_fields(path: impl AsRef<Path>) -> Result<FieldMap, OpenError> {
    read_fields_with(path, CompressionMode::Plain)
}

pub fn read_fields_with(
    path: impl AsRef<Path>,
    compression: CompressionMode,
) -> Result<FieldMap, OpenError> {
    let path = path.as_ref();
    let input = open_input(path, compression)?;
    Ok(collect_fields(input, path, &IRDATA_LINE))
}

pub(crate) fn collect_fields<R: Read>(input: R, source: &Path, pattern: &Regex) -> FieldMap {
    let mut fields = FieldMap::new();

    scan_lines(input, source, |line| {
        let Some(captures) = pattern.captures(line) else {
            return;
        };

        let (Some(key), Some(value), 3) = (captures.get(1), captures.get(2), captures.len())
        else {
            log::warn(format!(
                "IRDATA line not properly matched in '{}':\n\t{}",
                source.display(),
                line
            ));
            return;
        };

        fields
            .entry(key.as_str().to_string())
            .or_default()
            .push(value.as_str().to_string());
    });

    fields
}
