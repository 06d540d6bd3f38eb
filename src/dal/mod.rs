pub mod answer_db;
pub mod json_file;
pub mod ledger_db;
pub mod llm_call_db;

pub use json_file::PersistError;
