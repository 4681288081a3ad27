//! Deal publishing for signed-in stores and the public nearby search.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AuthenticatedStore;
use crate::models::{Deal, NewDeal};
use crate::state::AppState;
use crate::store::StoreError;
use crate::utils::http_helpers::HTTPError;

const DEFAULT_RADIUS_KM: f64 = 5.0;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/add-deal", post(add_deal))
        .route("/my-deals", get(my_deals))
        .route("/search", get(search))
}

#[derive(Deserialize, Debug, Default)]
struct AddDealBody {
    title: Option<String>,
    description: Option<String>,
    price: Option<PriceInput>,
    image_url: Option<String>,
    expiry_date: Option<String>,
}

/// Form posts send the price as a string, JSON clients as a number.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
enum PriceInput {
    Number(f64),
    Text(String),
}

impl PriceInput {
    fn amount(&self) -> Option<f64> {
        match self {
            PriceInput::Number(n) => Some(*n),
            PriceInput::Text(s) => s.trim().parse::<f64>().ok(),
        }
        .filter(|p| p.is_finite() && *p != 0.0)
    }
}

impl AddDealBody {
    /// A blank title or a missing, zero or non-numeric price is not a deal.
    fn validate(self) -> Result<NewDeal, HTTPError> {
        let title = self.title.filter(|t| !t.is_empty());
        let price = self.price.as_ref().and_then(PriceInput::amount);
        let (Some(title), Some(price)) = (title, price) else {
            return Err(HTTPError::bad_request("Title and price are required."));
        };

        Ok(NewDeal {
            title,
            description: self.description,
            price,
            image_url: self.image_url.filter(|u| !u.is_empty()),
            expiry_date: self.expiry_date.filter(|d| !d.is_empty()),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
struct SearchParams {
    lat: Option<String>,
    lng: Option<String>,
    radius: Option<String>,
}

fn parse_coordinate(value: Option<&str>) -> Option<f64> {
    value
        .filter(|v| !v.is_empty())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn storage_failure(err: StoreError) -> HTTPError {
    error!("Deal storage failed: {}", err);
    HTTPError::internal()
}

async fn add_deal(
    store: AuthenticatedStore,
    State(state): State<AppState>,
    body: Result<Json<AddDealBody>, JsonRejection>,
) -> Result<impl IntoResponse, HTTPError> {
    let Json(body) = body?;
    let new_deal = body.validate()?;

    let deal = Deal {
        id: Uuid::new_v4().to_string(),
        store_id: store.id,
        title: new_deal.title,
        description: new_deal.description,
        price: new_deal.price,
        image_url: new_deal.image_url,
        expiry_date: new_deal.expiry_date,
        created_at: state.clock.now(),
    };
    state.store.add_deal(&deal).await.map_err(storage_failure)?;
    info!(store_id = %deal.store_id, deal_id = %deal.id, "Deal added");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Deal added successfully.", "deal": deal })),
    ))
}

async fn my_deals(
    store: AuthenticatedStore,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, HTTPError> {
    let deals = state
        .store
        .deals_for_store(&store.id)
        .await
        .map_err(storage_failure)?;
    Ok(Json(deals))
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, HTTPError> {
    let (Some(lat), Some(lng)) = (
        parse_coordinate(params.lat.as_deref()),
        parse_coordinate(params.lng.as_deref()),
    ) else {
        return Err(HTTPError::bad_request("Latitude and longitude required"));
    };

    let radius = match params.radius.as_deref().filter(|r| !r.is_empty()) {
        None => DEFAULT_RADIUS_KM,
        Some(raw) => parse_coordinate(Some(raw))
            .filter(|r| *r > 0.0)
            .ok_or_else(|| HTTPError::bad_request("Invalid radius"))?,
    };

    let hits = state
        .store
        .deals_near(lat, lng, radius)
        .await
        .map_err(storage_failure)?;
    Ok(Json(hits))
}
