mod migrations;
pub mod utils;
