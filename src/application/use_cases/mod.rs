pub mod ado_discovery;
pub mod ado_import;
pub mod test_execution;
