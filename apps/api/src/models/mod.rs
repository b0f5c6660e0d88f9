pub mod interview;
pub mod report;
pub mod transcript;
