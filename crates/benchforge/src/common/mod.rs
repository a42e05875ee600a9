pub mod error;
pub mod fsutils;
pub mod kvfile;
pub mod parser;
pub mod process;
pub mod settings;
pub mod setup;
pub mod timeutils;
