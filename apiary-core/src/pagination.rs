//! Pagination of list endpoints.
//!
//! A paginated view either slices its data itself, reading
//! [`Call::pagination`](crate::call::Call::pagination) and reporting the
//! total with [`Call::set_item_count`](crate::call::Call::set_item_count), or
//! returns the whole collection and lets a [`Pager`] slice it.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::schema::{Field, Fields};

/// Response header carrying the pagination metadata as JSON.
pub const PAGINATION_HEADER: &str = "X-Pagination";

/// Defaults and bounds of the `page` / `page_size` query arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginateOptions {
    pub page: u64,
    pub page_size: u64,
    pub max_page_size: u64,
}

impl Default for PaginateOptions {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            max_page_size: 100,
        }
    }
}

impl PaginateOptions {
    pub fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn max_page_size(mut self, max_page_size: u64) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    /// Query schema of the pagination arguments.
    pub fn parameters_schema(&self) -> Fields {
        Fields::new()
            .field(
                "page",
                Field::integer()
                    .load_default(self.page)
                    .range(Some(1.0), None),
            )
            .field(
                "page_size",
                Field::integer()
                    .load_default(self.page_size)
                    .range(Some(1.0), Some(self.max_page_size as f64)),
            )
    }
}

/// Resolved pagination of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationParameters {
    pub page: u64,
    pub page_size: u64,
    pub item_count: Option<u64>,
}

impl PaginationParameters {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size,
            item_count: None,
        }
    }

    /// Zero-based index of the first item of the page. Saturates at
    /// `u64::MAX` for pages beyond any addressable collection.
    pub fn first_item(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    /// Zero-based index of the last item of the page.
    pub fn last_item(&self) -> u64 {
        self.first_item()
            .saturating_add(self.page_size.saturating_sub(1))
    }
}

/// Content of the `X-Pagination` header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaginationMetadata {
    pub total: u64,
    pub total_pages: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<u64>,
}

impl PaginationMetadata {
    /// Metadata of `page` for a collection of `item_count` items.
    ///
    /// ```
    /// use apiary_core::pagination::PaginationMetadata;
    ///
    /// let meta = PaginationMetadata::compute(2, 10, 25);
    /// assert_eq!(meta.total_pages, 3);
    /// assert_eq!(meta.previous_page, Some(1));
    /// assert_eq!(meta.next_page, Some(3));
    /// ```
    pub fn compute(page: u64, page_size: u64, item_count: u64) -> Self {
        let mut meta = Self {
            total: item_count,
            ..Self::default()
        };
        if item_count == 0 {
            return meta;
        }
        let last_page = (item_count - 1) / page_size + 1;
        meta.total_pages = last_page;
        meta.first_page = Some(1);
        meta.last_page = Some(last_page);
        if page <= last_page {
            meta.page = Some(page);
            if page > 1 {
                meta.previous_page = Some(page - 1);
            }
            if page < last_page {
                meta.next_page = Some(page + 1);
            }
        }
        meta
    }

    /// Compact JSON rendering used as header value.
    pub fn header_value(&self) -> Result<String, ApiError> {
        Ok(serde_json::to_string(self)?)
    }

    /// JSON schema of the metadata object, for the documentation.
    pub fn json_schema() -> Value {
        let fields = Fields::new()
            .named("PaginationMetadata")
            .field("total", Field::integer())
            .field("total_pages", Field::integer())
            .field("first_page", Field::integer())
            .field("last_page", Field::integer())
            .field("page", Field::integer())
            .field("previous_page", Field::integer())
            .field("next_page", Field::integer());
        crate::schema::Schema::json_schema(&fields)
    }
}

/// Slices a collection returned by a view.
pub trait Pager: Send + Sync + 'static {
    /// Return the requested page of `data`, recording the total item count
    /// in `params`.
    fn paginate(&self, data: Value, params: &mut PaginationParameters) -> Result<Value, ApiError>;
}

/// Default pager: slices JSON arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page;

impl Pager for Page {
    fn paginate(&self, data: Value, params: &mut PaginationParameters) -> Result<Value, ApiError> {
        let Value::Array(items) = data else {
            return Err(ApiError::internal("paginated view did not return a list"));
        };
        params.item_count = Some(items.len() as u64);
        let first = match usize::try_from(params.first_item()) {
            Ok(first) if first < items.len() => first,
            _ => return Ok(Value::Array(Vec::new())),
        };
        let size = usize::try_from(params.page_size).unwrap_or(usize::MAX);
        Ok(Value::Array(items.into_iter().skip(first).take(size).collect()))
    }
}

/// Pager configuration of a paginated view.
#[derive(Clone, Default)]
pub struct Pagination {
    pub options: PaginateOptions,
    pub pager: Option<Arc<dyn Pager>>,
}

impl Pagination {
    /// The view slices its data and reports the item count itself.
    pub fn new(options: PaginateOptions) -> Self {
        Self {
            options,
            pager: None,
        }
    }

    /// Slice the returned collection with `pager`.
    pub fn with_pager(mut self, pager: impl Pager) -> Self {
        self.pager = Some(Arc::new(pager));
        self
    }

    /// Load `page` / `page_size` from the raw query data.
    pub fn load_parameters(&self, query: Value) -> Result<PaginationParameters, ApiError> {
        use crate::schema::{Schema, Unknown};

        let loaded = self
            .options
            .parameters_schema()
            .load(query, Unknown::Exclude)
            .map_err(|errors| ApiError::unprocessable("query", errors))?;
        let read = |key: &str, default: u64| loaded.get(key).and_then(Value::as_u64).unwrap_or(default);
        Ok(PaginationParameters::new(
            read("page", self.options.page),
            read("page_size", self.options.page_size),
        ))
    }
}

impl std::fmt::Debug for Pagination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pagination")
            .field("options", &self.options)
            .field("pager", &self.pager.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_for_empty_collection() {
        let meta = PaginationMetadata::compute(1, 10, 0);
        assert_eq!(serde_json::to_value(&meta).unwrap(), json!({"total": 0, "total_pages": 0}));
    }

    #[test]
    fn metadata_bounds() {
        let first = PaginationMetadata::compute(1, 10, 30);
        assert_eq!(first.previous_page, None);
        assert_eq!(first.next_page, Some(2));
        let last = PaginationMetadata::compute(3, 10, 30);
        assert_eq!(last.next_page, None);
        assert_eq!(last.previous_page, Some(2));
        let beyond = PaginationMetadata::compute(4, 10, 30);
        assert_eq!(beyond.page, None);
        assert_eq!(beyond.last_page, Some(3));
        assert_eq!(
            beyond.header_value().unwrap(),
            r#"{"total":30,"total_pages":3,"first_page":1,"last_page":3}"#
        );
    }

    #[test]
    fn parameters_items() {
        let params = PaginationParameters::new(3, 20);
        assert_eq!(params.first_item(), 40);
        assert_eq!(params.last_item(), 59);
    }

    #[test]
    fn page_slices_arrays() {
        let mut params = PaginationParameters::new(2, 2);
        let page = Page.paginate(json!([1, 2, 3, 4, 5]), &mut params).unwrap();
        assert_eq!(page, json!([3, 4]));
        assert_eq!(params.item_count, Some(5));
        assert!(Page.paginate(json!({}), &mut params).is_err());
    }

    #[test]
    fn huge_page_number_gives_an_empty_page() {
        let mut params = PaginationParameters::new(1_000_000_000_000_000_000, 100);
        assert_eq!(params.first_item(), u64::MAX);
        assert_eq!(params.last_item(), u64::MAX);
        let page = Page.paginate(json!([1, 2, 3]), &mut params).unwrap();
        assert_eq!(page, json!([]));
        assert_eq!(params.item_count, Some(3));

        let meta = PaginationMetadata::compute(params.page, params.page_size, 3);
        assert_eq!(meta.page, None);
        assert_eq!(meta.last_page, Some(1));
    }

    #[test]
    fn parameters_are_bounded() {
        let pagination = Pagination::new(PaginateOptions::default().max_page_size(50));
        let params = pagination.load_parameters(json!({"page": "2"})).unwrap();
        assert_eq!(params, PaginationParameters::new(2, 10));
        let err = pagination
            .load_parameters(json!({"page_size": "51"}))
            .unwrap_err();
        assert_eq!(
            err.errors().unwrap(),
            &json!({"query": {"page_size": [
                "Must be greater than or equal to 1 and less than or equal to 50."
            ]}})
        );
        assert!(pagination.load_parameters(json!({"page": "0"})).is_err());
    }
}
