pub mod import;
pub mod extraction;
pub mod classify;
pub mod structuring;
pub mod storage;
pub mod processor;
pub mod batch;
