//! Parser Module
//!
//! OOXMLパッケージの各パーツを解析するモジュール群。
//! パッケージ、共有文字列、テーマ、スタイル、ワークシート、描画の各パーサーと、
//! それらを依存順に呼び出すワークブックのオーケストレーターで構成されます。

pub(crate) mod drawing;
pub(crate) mod package;
mod shared_strings;
pub(crate) mod styles;
pub(crate) mod theme;
mod workbook;
mod worksheet;

pub(crate) use styles::StyleTables;
pub(crate) use theme::ThemePalette;
pub(crate) use workbook::WorkbookParser;
