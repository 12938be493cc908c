use std::collections::{BTreeMap, HashMap};

/// Raw `IRDATA` values keyed by field name, each key's values in file order.
pub type FieldMap = HashMap<String, Vec<String>>;

/// Per-action counts from a PDL line, e.g. `{"ActionGlobalMinimize": 12}`.
pub type ActionCounts = BTreeMap<String, i64>;

/// Attempt metadata decoded from one solution file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    /// Taken from the `solution_<digits>/` part of the path, 0 when absent.
    pub puzzle_id: i64,
    pub user_id: i64,
    pub group_id: i64,
    pub score: f64,
    /// Seconds since the Unix epoch, 0 when the file has no TIMESTAMP line.
    pub timestamp: i64,
    /// `None` when the PDL line carried no action segment at all.
    pub actions: Option<ActionCounts>,
    pub history: Vec<String>,
    pub filename: String,
}
