//! xlsxsight - Pure-Rust OOXML workbook extractor for Markdown, HTML and JSON
//!
//! This crate opens `.xlsx` packages directly (ZIP + XML), builds a complete
//! document model of every selected sheet and renders it for humans and for
//! downstream tooling. Besides cell values it recovers the things a plain
//! table export loses: merged ranges, print settings, data validations,
//! shapes, pictures and connectors. Connectors are turned into graph edges by
//! nearest-shape inference and summarized as a mermaid flowchart.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use xlsxsight::ConverterBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create a converter with default settings (Markdown, work mode)
//!     let converter = ConverterBuilder::new().build()?;
//!
//!     let output = File::create("output.md")?;
//!     converter.convert_path("example.xlsx", output)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Inspecting the document model
//!
//! ```rust,no_run
//! use xlsxsight::ConverterBuilder;
//!
//! # fn main() -> Result<(), xlsxsight::XlsxToMdError> {
//! let converter = ConverterBuilder::new().build()?;
//! let doc = converter.parse_path("flow.xlsx")?;
//!
//! for sheet in &doc.sheets {
//!     println!("{} [{}]", sheet.name, sheet.state.as_str());
//!     for region in &sheet.regions {
//!         println!("  region {}: {}", region.region_id, region.bounds.reference);
//!     }
//!     if let Some(mermaid) = &sheet.mermaid {
//!         println!("{}", mermaid);
//!     }
//! }
//! println!("warnings: {}", doc.summary.warning_count);
//! # Ok(())
//! # }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use std::fs::File;
//! use xlsxsight::{ConverterBuilder, DateFormat, MergeStrategy, OutputFormat, SheetSelector};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = ConverterBuilder::new()
//!         .with_sheet_selector(SheetSelector::Index(0))  // First sheet only
//!         .with_merge_strategy(MergeStrategy::HtmlFallback)  // HTML for merged cells
//!         .with_date_format(DateFormat::Custom("%Y年%m月%d日".to_string()))  // Japanese format
//!         .with_output_format(OutputFormat::Html)
//!         .with_connector_threshold(120.0)
//!         .build()?;
//!
//!     let input = File::open("example.xlsx")?;
//!     let output = File::create("output.html")?;
//!     converter.convert(input, output)?;
//!
//!     Ok(())
//! }
//! ```

mod api;
mod builder;
mod connector;
mod error;
mod format;
mod formatter;
mod grid;
mod output;
mod parser;
pub mod reference;
mod region;
mod security;
mod types;
mod xml;

// 公開API
pub use api::{
    ConnectorEndpoints, DateFormat, FormulaMode, ImageMode, MergeStrategy, OutputFormat,
    OutputMode, SheetSelector,
};
pub use builder::{Converter, ConverterBuilder};
pub use error::XlsxToMdError;
pub use reference::RangeRef;
pub use types::{
    AnchorKind, AnchorPoint, BoundingBox, Cell, CellRegion, CellType, ConnectorDirection,
    ConnectorInfo, DataValidation, DefinedName, DrawingKind, DrawingObject, HeaderFooter,
    HeaderFooterEntry, HeaderFooterSections, PageBreaks, Pane, PrintMetadata, RegionCellRow,
    RegionFlag, SheetDocument, SheetState, ShapeStyle, SourceMetadata, Summary,
    UnsupportedElement, UnsupportedScope, WorkbookDocument,
};
pub use xml::XmlNode;
