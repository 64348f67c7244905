pub mod engine;
pub mod ndjson;
pub mod process;
pub mod storage;
pub mod store;
