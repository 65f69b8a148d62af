//! # Materials
//!
//! Structural steel section catalog and grades used by the member selector.

pub mod steel;

pub use steel::{
    builtin_catalog, CatalogQuery, SectionCatalog, SectionFamily, SectionProperties, SteelGrade,
};
