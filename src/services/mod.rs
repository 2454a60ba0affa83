//! Catalog coordinators.
//!
//! - [`CommandService`]: validates writes and commits each entity together
//!   with its outbox envelope
//! - [`QueryService`]: point lookups and paged listings, optionally cached
//!
//! Both report failures as `tonic::Status` so they can sit behind a gRPC
//! surface unchanged.

use std::fmt::Display;

use tonic::Status;
use tracing::error;

use crate::model::Product;
use crate::storage::PagingState;

pub mod command;
pub mod query;

pub use command::CommandService;
pub use query::QueryService;

/// Input for [`CommandService::create_category`].
#[derive(Debug, Clone, Default)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: String,
}

/// Input for [`CommandService::create_product`].
///
/// Numeric fields are optional so an unset field can be told apart from zero.
#[derive(Debug, Clone, Default)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    pub stock: Option<i32>,
    pub category_id: Option<u64>,
}

/// Input for [`QueryService::list_products`].
#[derive(Debug, Clone, Default)]
pub struct ListProductsRequest {
    pub category_id: u64,
    pub page_size: i32,
    /// Token from the previous response; empty for the first page.
    pub paging_state: PagingState,
}

/// One page of products.
#[derive(Debug, Clone, PartialEq)]
pub struct ListProductsResponse {
    pub products: Vec<Product>,
    /// Empty when there are no further pages.
    pub paging_state: PagingState,
}

/// Log the underlying failure and return an opaque internal status.
pub(crate) fn internal_error(context: &str, err: impl Display) -> Status {
    error!(error = %err, "{}", context);
    Status::internal("internal error")
}

/// Reject a missing (empty) string field.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), Status> {
    if value.is_empty() {
        return Err(Status::invalid_argument(format!("{field} is required")));
    }
    Ok(())
}
