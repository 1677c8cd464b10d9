//! Columnar table storage for computed-column evaluation.
//!
//! This crate focuses on:
//! - A self-describing [`Scalar`] value that carries its [`ScalarKind`] even when missing.
//! - Typed column storage with a validity bitmap (no per-cell enum boxing).
//! - Shared-ownership columns (`Arc<Column>`) so evaluators can bind inputs for one pass while
//!   the owning [`DataTable`] stays free to copy-on-write its outputs.

#![forbid(unsafe_code)]

mod bitmap;
mod column;
mod error;
mod table;
mod types;

pub use crate::bitmap::BitVec;
pub use crate::column::{Column, MAX_ROWS};
pub use crate::error::{TableError, TableResult};
pub use crate::table::{ColumnSchema, DataTable, Schema};
pub use crate::types::{Scalar, ScalarKind};
