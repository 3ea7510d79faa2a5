//! On-disk format for the persisted link tables.

pub mod link_table;

pub use link_table::{LinkTableError, LinkTableFile};
