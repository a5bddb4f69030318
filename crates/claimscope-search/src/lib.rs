pub mod paging;
pub mod parameters;
pub mod range;
pub mod sql_builder;
pub mod store;

pub use paging::{CursorKey, CursorLinkBuilder, PagingError, is_first_page, next_cursor};
pub use parameters::SearchPrefix;
pub use range::{Comparison, LastUpdatedRecord, RangeBound, RangeError, RangeQuery, RangeRules};
pub use sql_builder::{
    BuiltQuery, ClaimQueryBuilder, FieldRef, Operator, SearchCondition, SqlBuilderError, SqlValue,
};
pub use store::{MemoryStore, Row, StoreError, Truth};
