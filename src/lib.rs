//! Reader for Foldit solution files.
//!
//! The core is usable on its own: [`read_fields`] collects the raw `IRDATA <KEY> <VALUE>`
//! lines of a file and [`decode_solution`] turns a file into a typed [`Solution`]. Loaded into
//! DuckDB, the crate registers `read_solutions`, `read_irdata`, `foldit_puzzle_id` and
//! `foldit_pdl_actions`.

mod duckdb_impl;
mod error;
mod fields;
mod functions;
mod input;
mod irdata;
mod log;
mod reader;
mod solution;
mod types;

pub use error::OpenError;
pub use fields::{read_fields, read_fields_with};
pub use input::CompressionMode;
pub use solution::{decode_solution, decode_solution_with, pdl_actions, puzzle_id_from_path};
pub use types::{ActionCounts, FieldMap, Solution};

use duckdb::{Connection, Result};
use duckdb_ext_macros::duckdb_extension;
use functions::{FolditPdlActionsScalar, FolditPuzzleIdScalar};
use irdata::ReadIrdataVTab;
use reader::ReadSolutionsVTab;
use std::error::Error;

#[duckdb_extension(name = "duckdb_foldit", api_version = "v1.0.0")]
pub unsafe fn extension_entrypoint(con: Connection) -> Result<(), Box<dyn Error>> {
    // Table functions
    con.register_table_function::<ReadSolutionsVTab>("read_solutions")?;
    con.register_table_function::<ReadIrdataVTab>("read_irdata")?;

    // Scalar functions
    con.register_scalar_function::<FolditPuzzleIdScalar>("foldit_puzzle_id")?;
    con.register_scalar_function::<FolditPdlActionsScalar>("foldit_pdl_actions")?;

    Ok(())
}
