//! Format Module
//!
//! Excel Number Format Stringの分類と、生の値への表示書式の適用を提供します。

mod parser;
mod sections;
mod tokens;

pub(crate) use parser::{DateContext, NumberFormat};
