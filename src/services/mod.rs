pub mod archive;
pub mod audio;
pub mod invocation;
pub mod merge_service;
pub mod staging;
pub mod storage;
