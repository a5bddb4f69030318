pub mod index;
pub mod sql;
