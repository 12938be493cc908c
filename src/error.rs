use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The only fatal condition when reading a solution file: the input could not be opened.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Unable to open solution file '{}': {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to initialize zstd decoder for '{}': {source}", .path.display())]
    Decoder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OpenError {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::File { path, .. } | Self::Decoder { path, .. } => path,
        }
    }
}

/// Collects per-row diagnostics into a single `; `-separated message.
#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator(Option<String>);

impl ErrorAccumulator {
    pub fn push(&mut self, msg: &str) {
        match &mut self.0 {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(msg);
            }
            None => {
                self.0 = Some(msg.to_string());
            }
        }
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorAccumulator, OpenError};
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_open_error_message_names_path() {
        let err = OpenError::File {
            path: PathBuf::from("/data/solution_42/missing.pdb"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };

        let message = err.to_string();
        assert!(message.contains("Unable to open solution file"));
        assert!(message.contains("/data/solution_42/missing.pdb"));
        assert!(message.contains("No such file or directory"));
        assert_eq!(err.path(), &PathBuf::from("/data/solution_42/missing.pdb"));
    }

    #[test]
    fn test_push_single_message() {
        let mut accumulator = ErrorAccumulator::default();
        accumulator.push("first error");

        assert_eq!(accumulator.take().as_deref(), Some("first error"));
    }

    #[test]
    fn test_push_multiple_messages_uses_separator() {
        let mut accumulator = ErrorAccumulator::default();
        accumulator.push("first");
        accumulator.push("second");

        assert_eq!(accumulator.take().as_deref(), Some("first; second"));
    }

    #[test]
    fn test_take_consumes_accumulator() {
        let mut accumulator = ErrorAccumulator::default();
        accumulator.push("error");

        assert_eq!(accumulator.take().as_deref(), Some("error"));
        assert!(accumulator.is_empty());
        assert!(accumulator.take().is_none());
    }
}
