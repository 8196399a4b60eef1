//! Field mapping and bulk import for rental properties and buildings.
//!
//! Storage-agnostic: everything that touches a database goes through
//! [`persistence::PersistencePort`].

pub mod dictionaries;
pub mod error;
pub mod field_dictionary;
pub mod import_report;
pub mod importer;
pub mod normalizer;
pub mod parser;
pub mod persistence;
pub mod reconciler;
pub mod reference;
pub mod splitter;
pub mod types;
