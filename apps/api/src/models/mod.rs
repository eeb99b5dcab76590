pub mod summary;
pub mod topic;
