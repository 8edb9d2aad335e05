pub mod parser;
pub mod records;
pub mod scanner;
