//! # assistant-tools
//!
//! Supplemental tools beyond the built-ins in assistant-core: unit
//! conversion, JSON processing, web search (real and mock backends),
//! page scraping, and file operations. Each tool declares its schema and
//! returns failure results instead of raising, so the registry stays
//! total over any invocation.

pub mod file_tools;
pub mod json_tool;
pub mod scrape;
pub mod unit_converter;
pub mod web_search;

pub use file_tools::{DirectoryListTool, FileWriterTool};
pub use json_tool::JsonProcessorTool;
pub use scrape::WebScrapeTool;
pub use unit_converter::UnitConverterTool;
pub use web_search::{MockSearchTool, WebSearchTool};
