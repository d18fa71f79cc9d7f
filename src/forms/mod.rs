//! Workspace-scoped custom expense forms and the entries captured against them.

pub mod amount;
pub mod entries;
pub mod fields;
pub mod schema;
