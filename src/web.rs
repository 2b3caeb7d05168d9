//! REST API over the inventory database
//!
//! Read endpoints for items, locations, consigners, search and statistics, a
//! validated item update and a webhook sink. All responses are JSON and CORS is
//! open to every origin.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Local;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;

use crate::consignment::list_all_consigners;
use crate::database::items::{
    count_items, get_item_by_sku, inventory_stats, search_items, update_item, ItemFilter,
    ItemRecord,
};
use crate::database::locations::{get_location, list_locations, location_counts};
use crate::error::{InventoryError, Result};
use crate::models::ItemStatus;
use crate::photos::PhotoManager;
use crate::validation::{parse_condition, parse_item_status, parse_ownership_type, validate_price};

pub const API_NAME: &str = "Streetwear Inventory API";
pub const API_VERSION: &str = "1.0.0";

/// Shared application state (thread-safe database connection + photo storage)
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    photos: Arc<PhotoManager>,
}

impl AppState {
    pub fn new(db: Arc<Mutex<Connection>>, photos: Arc<PhotoManager>) -> Self {
        Self { db, photos }
    }

    fn db(&self) -> std::result::Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError(InventoryError::Config("database lock poisoned".to_string())))
    }
}

/// Error response: `{"error": message}` with a status derived from the error kind
pub struct ApiError(InventoryError);

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError(err)
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InventoryError::Validation(_) => StatusCode::BAD_REQUEST,
            InventoryError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("API error: {}", self.0);
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct ItemsParams {
    brand: Option<String>,
    condition: Option<String>,
    /// Defaults to `available`; an empty value lists every status
    #[serde(default = "default_status")]
    status: String,
    location_id: Option<i64>,
    ownership_type: Option<String>,
    #[serde(default = "default_items_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_status() -> String {
    ItemStatus::Available.as_str().to_string()
}

fn default_items_limit() -> usize {
    100
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    50
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// JSON shape of an item as served by the API
fn item_json(record: &ItemRecord) -> Map<String, Value> {
    let item = &record.item;
    let location = match (item.location_id, &record.location_code) {
        (Some(id), Some(code)) => json!({
            "id": id,
            "code": code,
            "name": record.location_description,
        }),
        _ => Value::Null,
    };
    let consigner = match (item.consigner_id, &record.consigner_name) {
        (Some(id), Some(name)) => json!({
            "id": id,
            "name": name,
            "phone": record.consigner_phone,
        }),
        _ => Value::Null,
    };

    match json!({
        "sku": item.sku,
        "variant_id": item.variant_id,
        "brand": item.brand,
        "model": item.model,
        "size": item.size,
        "color": item.color,
        "condition": item.condition,
        "box_status": item.box_status,
        "current_price": item.current_price,
        "purchase_price": item.purchase_price,
        "sold_price": item.sold_price,
        "sold_platform": item.sold_platform,
        "platform_fee": item.platform_fee,
        "location": location,
        "status": item.status,
        "ownership_type": item.ownership_type,
        "notes": item.notes,
        "date_added": item.date_added,
        "sold_date": item.sold_date,
        "consigner": consigner,
        "split_percentage": item.split_percentage,
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// GET /
async fn index_handler() -> Json<Value> {
    Json(json!({
        "name": API_NAME,
        "version": API_VERSION,
        "endpoints": {
            "items": "/api/items",
            "locations": "/api/locations",
            "consigners": "/api/consigners",
            "search": "/api/search",
            "stats": "/api/stats",
        }
    }))
}

/// GET /api/items?brand=&condition=&status=available&location_id=&ownership_type=&limit=100&offset=0
async fn list_items_handler(
    State(state): State<AppState>,
    Query(params): Query<ItemsParams>,
) -> ApiResult<Json<Value>> {
    let mut filter = ItemFilter {
        brand: non_empty(&params.brand).map(str::to_string),
        location_id: params.location_id,
        limit: Some(params.limit),
        offset: params.offset,
        ..Default::default()
    };
    if let Some(condition) = non_empty(&params.condition) {
        filter.condition = Some(parse_condition(condition)?);
    }
    if let Some(ownership) = non_empty(&params.ownership_type) {
        filter.ownership = Some(parse_ownership_type(ownership)?);
    }
    match params.status.trim() {
        "" => filter.include_deleted = true,
        status => filter.status = Some(parse_item_status(status)?),
    }

    let conn = state.db()?;
    let total = count_items(&conn, &filter)?;
    let mut items = Vec::new();
    for record in search_items(&conn, &filter)? {
        let mut item = item_json(&record);
        let photos = state.photos.photo_filenames(&record.item.sku)?;
        item.insert("primary_photo".into(), json!(photos.first()));
        item.insert("photos".into(), json!(photos));
        items.push(Value::Object(item));
    }

    Ok(Json(json!({
        "items": items,
        "total": total,
        "limit": params.limit,
        "offset": params.offset,
    })))
}

fn find_item(conn: &Connection, sku: &str) -> ApiResult<ItemRecord> {
    get_item_by_sku(conn, sku)?
        .ok_or_else(|| ApiError(InventoryError::not_found("Resource not found")))
}

/// GET /api/items/{sku}
async fn get_item_handler(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> ApiResult<Json<Value>> {
    let conn = state.db()?;
    let record = find_item(&conn, &sku)?;
    let mut item = item_json(&record);
    item.insert(
        "photos".into(),
        json!(state.photos.list_photos(&record.item.sku)?),
    );
    Ok(Json(Value::Object(item)))
}

fn price_field(body: &Map<String, Value>, field: &str) -> Result<Option<Option<rust_decimal::Decimal>>> {
    match body.get(field) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::Number(n)) => validate_price(&n.to_string()).map(|p| Some(Some(p))),
        Some(Value::String(s)) => validate_price(s).map(|p| Some(Some(p))),
        Some(other) => Err(InventoryError::validation(format!(
            "Invalid {}: {}",
            field, other
        ))),
    }
}

fn string_field<'a>(body: &'a Map<String, Value>, field: &str) -> Result<Option<Option<&'a str>>> {
    match body.get(field) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(Some(s.as_str()))),
        Some(other) => Err(InventoryError::validation(format!(
            "Invalid {}: {}",
            field, other
        ))),
    }
}

/// PUT /api/items/{sku}
///
/// Accepts `current_price`, `status`, `notes`, `condition`, `location_id` and
/// `sold_price`; other fields are ignored. Sale fields stay consistent with the
/// status: a sold item needs a sold price, and leaving `sold` clears them.
async fn update_item_handler(
    State(state): State<AppState>,
    Path(sku): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<Json<Value>> {
    let conn = state.db()?;
    let record = find_item(&conn, &sku)?;
    let mut item = record.item.clone();

    match price_field(&body, "current_price")? {
        Some(Some(price)) => item.current_price = price,
        Some(None) => return Err(InventoryError::validation("current_price cannot be null").into()),
        None => {}
    }
    if let Some(notes) = string_field(&body, "notes")? {
        item.notes = notes.map(str::to_string);
    }
    match string_field(&body, "condition")? {
        Some(Some(condition)) => item.condition = parse_condition(condition)?,
        Some(None) => return Err(InventoryError::validation("condition cannot be null").into()),
        None => {}
    }
    match body.get("location_id") {
        None => {}
        Some(Value::Null) => item.location_id = None,
        Some(value) => {
            let id = value.as_i64().ok_or_else(|| {
                InventoryError::validation(format!("Invalid location_id: {}", value))
            })?;
            if get_location(&conn, id)?.is_none() {
                return Err(InventoryError::validation(format!("Location {} not found", id)).into());
            }
            item.location_id = Some(id);
        }
    }

    let status = match string_field(&body, "status")? {
        Some(Some(status)) => parse_item_status(status)?,
        Some(None) => return Err(InventoryError::validation("status cannot be null").into()),
        None => item.status,
    };
    let sold_price = price_field(&body, "sold_price")?;

    if status == ItemStatus::Sold {
        let price = match sold_price {
            Some(price) => price,
            None => item.sold_price,
        }
        .ok_or_else(|| InventoryError::validation("sold_price is required when status is sold"))?;
        if item.status == ItemStatus::Sold {
            item.sold_price = Some(price);
        } else {
            let platform = item.sold_platform.take();
            let fee = item.platform_fee.take();
            item.mark_sold(price, platform, fee, Local::now().naive_local());
        }
    } else {
        if matches!(sold_price, Some(Some(_))) {
            return Err(
                InventoryError::validation("sold_price can only be set on sold items").into(),
            );
        }
        item.status = status;
        item.clear_sale();
    }

    update_item(&conn, &item)?;
    log::info!("API updated item {}", item.sku);
    let updated = find_item(&conn, &item.sku)?;
    Ok(Json(Value::Object(item_json(&updated))))
}

/// GET /api/locations
async fn locations_handler(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let conn = state.db()?;
    let available: HashMap<i64, i64> = location_counts(&conn, true)?
        .into_iter()
        .map(|c| (c.id, c.available_count))
        .collect();

    let locations: Vec<Value> = list_locations(&conn, true)?
        .into_iter()
        .map(|location| {
            json!({
                "id": location.id,
                "code": location.code,
                "type": location.location_type,
                "name": location.description,
                "is_active": location.is_active,
                "created_date": location.created_date,
                "item_count": available.get(&location.id).copied().unwrap_or(0),
            })
        })
        .collect();

    Ok(Json(json!({ "locations": locations })))
}

/// GET /api/consigners
async fn consigners_handler(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let conn = state.db()?;
    let consigners = list_all_consigners(&conn, true)?;
    Ok(Json(json!({ "consigners": consigners })))
}

/// GET /api/search?q={query}&limit={limit}
async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Value>> {
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Json(json!({ "items": [], "total": 0 })));
    }

    let filter = ItemFilter {
        text: Some(query.to_string()),
        limit: Some(params.limit),
        ..Default::default()
    };
    let conn = state.db()?;
    let mut items = Vec::new();
    for record in search_items(&conn, &filter)? {
        let mut item = item_json(&record);
        item.insert(
            "primary_photo".into(),
            json!(state.photos.primary_photo(&record.item.sku)?),
        );
        items.push(Value::Object(item));
    }

    Ok(Json(json!({
        "total": items.len(),
        "items": items,
        "query": query,
    })))
}

/// GET /api/stats
async fn stats_handler(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = {
        let conn = state.db()?;
        inventory_stats(&conn)?
    };
    let photos = state.photos.storage_stats()?;

    Ok(Json(json!({
        "inventory": {
            "total_items": stats.total_items,
            "available_items": stats.available_items,
            "sold_items": stats.sold_items,
            "held_items": stats.held_items,
            "owned_items": stats.owned_items,
            "consignment_items": stats.consignment_items,
        },
        "values": {
            "available_value": stats.available_value,
            "sold_value": stats.sold_value,
        },
        "brands": stats.brands,
        "photos": {
            "storage_path": photos.storage_path,
            "total_files": photos.total_files,
            "total_size_bytes": photos.total_size_bytes,
            "total_size_mb": photos.total_size_mb(),
            "directories": photos.directories,
        },
        "generated_at": Local::now().naive_local(),
    })))
}

/// POST /api/webhook/item-updated
async fn webhook_handler(body: Bytes) -> Json<Value> {
    let received_at = Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => log::info!("Webhook item_updated: {}", payload),
        Err(_) => log::info!("Webhook item_updated with {} byte non-JSON body", body.len()),
    }
    Json(json!({ "status": "received", "webhook_id": received_at }))
}

async fn not_found_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Resource not found" })),
    )
}

/// Build the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/items", get(list_items_handler))
        .route(
            "/api/items/{sku}",
            get(get_item_handler).put(update_item_handler),
        )
        .route("/api/locations", get(locations_handler))
        .route("/api/consigners", get(consigners_handler))
        .route("/api/search", get(search_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/webhook/item-updated", post(webhook_handler))
        .fallback(not_found_handler)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {}", e);
    }
    log::info!("Shutting down API server");
}

/// Start the API server and run until Ctrl-C
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
