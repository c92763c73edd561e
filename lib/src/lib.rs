pub mod config;
pub mod error;
mod html;
pub mod loader;
pub mod model;
pub mod parser;
pub mod reader;
pub mod site;
pub mod store;
pub mod text;
pub mod transport;

pub use self::error::*;
