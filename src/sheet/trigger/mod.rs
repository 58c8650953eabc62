// Trigger schema and normalized trigger values

pub mod field;
pub mod notation;
pub mod schema;
#[allow(clippy::module_inception)]
pub mod trigger;

pub use field::{Constraint, FieldSpec, FieldType, FieldValue};
pub use schema::{KindSpec, Schema, Scope, kind_fits_column, schema};
pub use trigger::Trigger;
