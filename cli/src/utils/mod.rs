pub mod project_root;
pub mod storage;
