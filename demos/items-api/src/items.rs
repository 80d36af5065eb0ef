//! The `items` resource.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use apiary::prelude::*;

/// In-memory item storage.
#[derive(Debug, Default)]
pub struct ItemStore {
    items: Mutex<BTreeMap<u64, Value>>,
}

impl ItemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<u64, Value>>, ApiError> {
        self.items
            .lock()
            .map_err(|_| ApiError::internal("item store poisoned"))
    }

    pub fn list(&self, field: Option<i64>) -> Result<Vec<Value>, ApiError> {
        Ok(self
            .lock()?
            .values()
            .filter(|item| field.map_or(true, |f| item["field"] == f))
            .cloned()
            .collect())
    }

    pub fn get(&self, item_id: u64) -> Result<Value, ApiError> {
        self.lock()?
            .get(&item_id)
            .cloned()
            .ok_or_else(|| abort(StatusCode::NOT_FOUND))
    }

    pub fn create(&self, mut item: Value) -> Result<Value, ApiError> {
        let mut items = self.lock()?;
        let item_id = items.keys().next_back().map_or(1, |last| last + 1);
        item["item_id"] = json!(item_id);
        items.insert(item_id, item.clone());
        tracing::debug!(item_id, "item created");
        Ok(item)
    }

    pub fn update(&self, item_id: u64, mut item: Value) -> Result<Value, ApiError> {
        let mut items = self.lock()?;
        let slot = items
            .get_mut(&item_id)
            .ok_or_else(|| abort(StatusCode::NOT_FOUND))?;
        item["item_id"] = json!(item_id);
        *slot = item.clone();
        Ok(item)
    }

    pub fn delete(&self, item_id: u64) -> Result<(), ApiError> {
        self.lock()?
            .remove(&item_id)
            .map(|_| ())
            .ok_or_else(|| abort(StatusCode::NOT_FOUND))
    }
}

pub fn item_schema() -> Fields {
    Fields::new()
        .named("Item")
        .field("item_id", Field::integer().dump_only().description("Item ID"))
        .field("field", Field::integer().required())
}

fn item_query_schema() -> Fields {
    Fields::new()
        .named("ItemQueryArgs")
        .field("field", Field::integer().description("Filter on field value"))
}

fn attachment_schema() -> Fields {
    Fields::new()
        .named("Attachment")
        .field("file", Field::upload().required())
}

#[derive(Debug, Deserialize)]
struct ItemQuery {
    field: Option<i64>,
}

/// Views capture the store they serve.
fn with_store<F, Fut, R>(store: &Arc<ItemStore>, f: F) -> View
where
    F: Fn(Arc<ItemStore>, Call) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<R, ApiError>> + Send + 'static,
    R: IntoReply,
{
    let store = store.clone();
    View::new(move |call: Call| f(store.clone(), call))
}

async fn list_items(store: Arc<ItemStore>, call: Call) -> Result<Value, ApiError> {
    let query: ItemQuery = call.query()?;
    Ok(Value::Array(store.list(query.field)?))
}

async fn create_item(store: Arc<ItemStore>, call: Call) -> Result<Value, ApiError> {
    store.create(call.json()?)
}

async fn get_item(store: Arc<ItemStore>, call: Call) -> Result<Value, ApiError> {
    store.get(call.path_as("item_id")?)
}

async fn update_item(store: Arc<ItemStore>, call: Call) -> Result<Value, ApiError> {
    let item_id: u64 = call.path_as("item_id")?;
    let current = store.get(item_id)?;
    call.check_etag(&current, Some(&SchemaRef::new(item_schema())))?;
    store.update(item_id, call.json()?)
}

async fn delete_item(store: Arc<ItemStore>, call: Call) -> Result<(), ApiError> {
    let item_id: u64 = call.path_as("item_id")?;
    let current = store.get(item_id)?;
    call.check_etag(&current, Some(&SchemaRef::new(item_schema())))?;
    store.delete(item_id)
}

async fn upload_attachment(store: Arc<ItemStore>, call: Call) -> Result<Value, ApiError> {
    let item_id: u64 = call.path_as("item_id")?;
    store.get(item_id)?;
    let file = call
        .file("file")
        .ok_or_else(|| ApiError::bad_request("missing file"))?;
    Ok(json!({
        "item_id": item_id,
        "file_name": file.file_name,
        "size": file.len(),
    }))
}

/// The `items` blueprint, mounted under `/items`.
pub fn blueprint(store: &Arc<ItemStore>) -> Result<Blueprint, DeclarationError> {
    let mut blp = Blueprint::new("items", "/items").description("Operations on items");

    let collection = MethodView::new()
        .get(
            with_store(store, list_items)
                .docstring("List items\n\nReturn all items, optionally filtered by `field`.")
                .arguments(item_query_schema(), ArgOptions::query())
                .paginate(Pagination::new(PaginateOptions::default()).with_pager(Page))
                .response(ResponseOptions::new(StatusCode::OK).schema(SchemaRef::new(item_schema()).many()))
                .etag(),
        )
        .post(
            with_store(store, create_item)
                .docstring("Add a new item")
                .arguments(item_schema(), ArgOptions::json().description("Item to create"))
                .response(ResponseOptions::new(StatusCode::CREATED).schema(item_schema()))
                .etag(),
        );
    blp.route("/", "items", collection)?;

    let item = MethodView::new()
        .get(
            with_store(store, get_item)
                .docstring("Get item by ID")
                .response(ResponseOptions::new(StatusCode::OK).schema(item_schema()))
                .etag(),
        )
        .put(
            with_store(store, update_item)
                .docstring("Update an existing item")
                .arguments(item_schema(), ArgOptions::json())
                .response(ResponseOptions::new(StatusCode::OK).schema(item_schema()))
                .etag(),
        )
        .delete(
            with_store(store, delete_item)
                .docstring("Delete an item")
                .response(ResponseOptions::new(StatusCode::NO_CONTENT))
                .etag(),
        )
        .alt_response(AltResponse::status(StatusCode::NOT_FOUND));
    blp.route("/<int:item_id>", "item", item)?;

    let attachment = with_store(store, upload_attachment)
        .docstring("Attach a file to an item")
        .arguments(attachment_schema(), ArgOptions::files())
        .response(StatusCode::CREATED)
        .alt_response(AltResponse::status(StatusCode::NOT_FOUND))
        .doc(json!({"responses": {"201": {"description": "Attachment stored"}}}));
    blp.route(
        "/<int:item_id>/attachment",
        RouteOptions::new()
            .endpoint("attachment")
            .methods([Method::POST]),
        attachment,
    )?;

    Ok(blp)
}
