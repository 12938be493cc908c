use crate::error::OpenError;
use crate::log;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use zstd::stream::read::Decoder as ZstdDecoder;

pub type SolutionInput = Box<dyn Read + Send>;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CompressionMode {
    #[default]
    Plain,
    Zstd,
}

impl CompressionMode {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let normalized = raw.trim();
        if normalized.is_empty() {
            return Err(
                "Invalid compression value ''. Supported values: 'zstd' or NULL/omitted."
                    .to_string(),
            );
        }

        if normalized.eq_ignore_ascii_case("zstd") {
            Ok(Self::Zstd)
        } else {
            Err(format!(
                "Invalid compression value '{}'. Supported values: 'zstd' or NULL/omitted.",
                normalized
            ))
        }
    }
}

pub fn open_input(path: &Path, compression: CompressionMode) -> Result<SolutionInput, OpenError> {
    let file = File::open(path).map_err(|source| OpenError::File {
        path: path.to_path_buf(),
        source,
    })?;

    match compression {
        CompressionMode::Plain => Ok(Box::new(file)),
        CompressionMode::Zstd => ZstdDecoder::new(file)
            .map(|decoder| Box::new(decoder) as SolutionInput)
            .map_err(|source| OpenError::Decoder {
                path: path.to_path_buf(),
                source,
            }),
    }
}

/// Feeds every line of `input` to `on_line`, without the trailing `\n` / `\r\n`.
///
/// Invalid UTF-8 is decoded lossily. A read error mid-stream ends the scan; whatever was
/// read up to that point stays valid.
pub fn scan_lines<R: Read>(input: R, source: &Path, mut on_line: impl FnMut(&str)) {
    let mut reader = BufReader::new(input);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = trim_line_ending(&buf);
                let line: Cow<'_, str> = String::from_utf8_lossy(line);
                on_line(line.as_ref());
            }
            Err(err) => {
                log::warn(format!(
                    "Stopped reading '{}' early: {}",
                    source.display(),
                    err
                ));
                break;
            }
        }
    }
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
