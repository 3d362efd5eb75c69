pub mod formatter;
pub mod generator;
pub mod prompt;
