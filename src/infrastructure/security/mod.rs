pub mod pat_store;
