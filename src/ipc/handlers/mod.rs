pub mod core;
pub mod details;
pub mod drafts;
pub mod finance;
pub mod references;
pub mod setup;
pub mod structure;
pub mod wizard;
