use crate::error::OpenError;
use crate::input::{CompressionMode, open_input, scan_lines};
use crate::log;
use crate::types::{ActionCounts, Solution};
use regex::Regex;
use smallvec::SmallVec;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

static PUZZLE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"solution_(\d+)/").unwrap());

/// Fixed-prefix line patterns, compiled once and shared read-only by every decode.
struct LinePatterns {
    pdl: Regex,
    timestamp: Regex,
    history: Regex,
}

static LINE_PATTERNS: LazyLock<LinePatterns> = LazyLock::new(|| LinePatterns {
    pdl: Regex::new(r"^IRDATA PDL").unwrap(),
    timestamp: Regex::new(r"^IRDATA TIMESTAMP").unwrap(),
    history: Regex::new(r"^IRDATA HISTORY").unwrap(),
});

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LineKind {
    Pdl,
    Timestamp,
    History,
}

impl LinePatterns {
    fn classify(&self, line: &str) -> Option<LineKind> {
        if self.pdl.is_match(line) {
            Some(LineKind::Pdl)
        } else if self.timestamp.is_match(line) {
            Some(LineKind::Timestamp)
        } else if self.history.is_match(line) {
            Some(LineKind::History)
        } else {
            None
        }
    }
}

const PDL_USER_ID: usize = 2;
const PDL_GROUP_ID: usize = 3;
const PDL_SCORE_AND_ACTIONS: usize = 7;
const FIRST_ACTION_TOKEN: usize = 3;
const LINE_PAYLOAD: usize = 2;
const LINE_PAYLOAD_AFTER_IGNORED: usize = 3;

type LineTokens<'a> = SmallVec<[&'a str; 16]>;

/// Decodes a solution file into a [`Solution`].
///
/// Only a failure to open the file is an error. The puzzle id comes from the path; when the
/// path does not follow the `solution_<digits>/` convention it is left at 0 and a warning is
/// logged. Numeric fields that fail to parse are silently 0.
pub fn decode_solution(path: impl AsRef<Path>) -> Result<Solution, OpenError> {
    decode_solution_with(path, CompressionMode::Plain)
}

pub fn decode_solution_with(
    path: impl AsRef<Path>,
    compression: CompressionMode,
) -> Result<Solution, OpenError> {
    let path = path.as_ref();
    let input = open_input(path, compression)?;
    Ok(decode_from(input, path, &LINE_PATTERNS))
}

fn decode_from<R: Read>(input: R, path: &Path, patterns: &LinePatterns) -> Solution {
    let filename = path.to_string_lossy().into_owned();
    let puzzle_id = puzzle_id_from_path(&filename).unwrap_or_else(|| {
        log::warn(format!(
            "Unable to get puzzle id from filename: {}",
            filename
        ));
        0
    });

    let mut solution = Solution {
        puzzle_id,
        filename,
        ..Solution::default()
    };

    scan_lines(input, path, |line| match patterns.classify(line) {
        Some(LineKind::Pdl) => solution.apply_pdl(line),
        Some(LineKind::Timestamp) => solution.apply_timestamp(line),
        Some(LineKind::History) => solution.apply_history(line),
        None => {}
    });

    solution
}

/// Puzzle id embedded in a `.../solution_<digits>/...` path, if the path has one.
///
/// A digit run too long for `i64` still counts as a match and yields 0.
pub fn puzzle_id_from_path(path: &str) -> Option<i64> {
    let captures = PUZZLE_ID.captures(path)?;
    let digits = captures.get(1)?;
    Some(parse_int(digits.as_str()))
}

/// Aggregated action counts of a single `IRDATA PDL` line; `None` for any other line.
pub fn pdl_actions(pdl_line: &str) -> Option<ActionCounts> {
    if LINE_PATTERNS.classify(pdl_line) != Some(LineKind::Pdl) {
        return None;
    }
    let mut solution = Solution::default();
    solution.apply_pdl(pdl_line);
    solution.actions
}

impl Solution {
    fn apply_pdl(&mut self, line: &str) {
        let fields: LineTokens<'_> = line.split(',').collect();

        if let Some(raw) = fields.get(PDL_USER_ID) {
            self.user_id = parse_int(raw);
        }
        if let Some(raw) = fields.get(PDL_GROUP_ID) {
            self.group_id = parse_int(raw);
        }

        let Some(last) = fields.get(PDL_SCORE_AND_ACTIONS) else {
            return;
        };
        let items: LineTokens<'_> = last.split(' ').collect();
        self.score = parse_float(items[0]);

        if items.len() > FIRST_ACTION_TOKEN {
            self.add_actions(&items[FIRST_ACTION_TOKEN..]);
        }
    }

    /// Counts are summed per action name, both within a line and across PDL lines.
    fn add_actions(&mut self, tokens: &[&str]) {
        let actions = self.actions.get_or_insert_with(ActionCounts::new);

        for &token in tokens {
            let key_value = token.rsplit('|').next().unwrap_or(token);
            let mut parts = key_value.split('=');
            let (Some(name), Some(count), None) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let total = actions.entry(name.to_string()).or_insert(0);
            *total = total.wrapping_add(parse_int(count));
        }
    }

    fn apply_timestamp(&mut self, line: &str) {
        let tokens = line_tokens(line);
        let Some(payload) = line_payload(&tokens) else {
            return;
        };
        // `<secs> <suffix>` lines keep the value in the slot normally taken by the ignored token.
        self.timestamp = payload
            .parse::<i64>()
            .or_else(|_| tokens[LINE_PAYLOAD].parse::<i64>())
            .unwrap_or(0);
    }

    fn apply_history(&mut self, line: &str) {
        let tokens = line_tokens(line);
        if let Some(payload) = line_payload(&tokens) {
            self.history = payload.split(',').map(str::to_string).collect();
        }
    }
}

/// Single-space tokens of a line; trailing whitespace does not produce empty tokens.
fn line_tokens(line: &str) -> LineTokens<'_> {
    line.trim_end().split(' ').collect()
}

/// Payload of `IRDATA <KEY> [<ignored>] <payload> ...`: token 3 when the line has at least
/// four tokens, token 2 otherwise. Anything after the payload is ignored.
fn line_payload<'a>(tokens: &[&'a str]) -> Option<&'a str> {
    tokens
        .get(LINE_PAYLOAD_AFTER_IGNORED)
        .or_else(|| tokens.get(LINE_PAYLOAD))
        .copied()
}

fn parse_int(raw: &str) -> i64 {
    raw.parse().unwrap_or(0)
}

fn parse_float(raw: &str) -> f64 {
    raw.parse().unwrap_or(0.0)
}
