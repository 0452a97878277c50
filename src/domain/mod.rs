pub mod azure_devops;
pub mod error;
pub mod test_case;
pub mod test_run;
