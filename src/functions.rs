use crate::duckdb_impl::scalar::{
    VarcharOutput, invoke_unary_varchar_to_i64_nullable, invoke_unary_varchar_to_varchar,
};
use crate::log;
use crate::solution::{pdl_actions, puzzle_id_from_path};
use duckdb::{
    Result,
    core::{DataChunkHandle, LogicalTypeHandle, LogicalTypeId},
    vscalar::{ScalarFunctionSignature, VScalar},
    vtab::arrow::WritableVector,
};
use std::error::Error;

/// `foldit_puzzle_id(path)`: the id from a `solution_<digits>/` path, NULL when absent.
pub struct FolditPuzzleIdScalar;

impl VScalar for FolditPuzzleIdScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_unary_varchar_to_i64_nullable(input, output, puzzle_id_from_path)
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Bigint),
        )]
    }
}

/// `foldit_pdl_actions(line)`: aggregated action counts of an `IRDATA PDL` line as JSON.
pub struct FolditPdlActionsScalar;

fn pdl_actions_json(line: &str) -> VarcharOutput {
    let Some(actions) = pdl_actions(line) else {
        return VarcharOutput::Null;
    };

    match serde_json::to_string(&actions) {
        Ok(json) => VarcharOutput::Value(json),
        Err(err) => {
            log::error(format!("Error serializing PDL actions: {}", err));
            VarcharOutput::Null
        }
    }
}

impl VScalar for FolditPdlActionsScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_unary_varchar_to_varchar(input, output, |line| Ok(pdl_actions_json(line)))
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )]
    }
}
