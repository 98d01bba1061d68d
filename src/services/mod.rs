pub mod analytics;
pub mod analyzer;
pub mod history;
