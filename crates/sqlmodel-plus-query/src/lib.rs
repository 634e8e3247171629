//! Query construction for SQLModel Plus.
//!
//! `sqlmodel-plus-query` turns `Model` metadata and caller input into SQL
//! plus parameters:
//!
//! - **Structured queries**: [`Select`] with the [`Expr`] DSL for WHERE
//!   clauses, [`OrderBy`], LIMIT and OFFSET.
//! - **Raw text**: [`TextClause`] carries literal SQL with `:name` binds.
//! - **Statements**: [`Executable`] is what sessions run; [`Count`] and
//!   [`Mapped`] wrap another statement to change what its rows decode into.

pub mod clause;
pub mod expr;
pub mod select;
pub mod statement;
pub mod text;

pub use clause::{Limit, Offset, OrderBy, OrderDirection, Where};
pub use expr::{BinaryOp, Expr};
pub use select::Select;
pub use statement::{Count, Executable, IntoStatement, Mapped};
pub use text::{TextClause, text};

/// Create a SELECT query for a model.
///
/// ```ignore
/// let heroes = select!(Hero).filter(Expr::col("age").gt(18));
/// ```
#[macro_export]
macro_rules! select {
    ($model:ty) => {
        $crate::Select::<$model>::new()
    };
}
