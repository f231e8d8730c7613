// HTTP request handlers for API endpoints

use crate::api::models::*;
use crate::database_ops::db::Db;
use crate::database_ops::search::{self, ListingFilter};
use actix_web::{web, HttpResponse, Result};
use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::time::SystemTime;

/// Health check endpoint
pub async fn health_check(db: web::Data<Db>) -> Result<HttpResponse> {
    // Quick database connectivity check
    let db_status = match sqlx::query_scalar::<_, bool>("SELECT true")
        .fetch_one(&db.pool)
        .await
    {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let uptime = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        uptime_seconds: uptime,
    });

    Ok(HttpResponse::Ok().json(response))
}

fn parse_price(raw: Option<&str>) -> Option<BigDecimal> {
    raw.and_then(|s| BigDecimal::from_str(s.trim()).ok())
}

/// Search listings by free text + structured filters, newest first
pub async fn search_properties(
    query: web::Query<PropertyQuery>,
    db: web::Data<Db>,
) -> Result<HttpResponse> {
    let filter = ListingFilter {
        q: query.q.clone(),
        category_id: query.category_id,
        region_id: query.region_id,
        listing_type_id: query.listing_type_id,
        min_price: parse_price(query.min_price.as_deref()),
        max_price: parse_price(query.max_price.as_deref()),
        bedrooms: query.bedrooms,
        bathrooms: query.bathrooms,
        limit: query.limit.unwrap_or(20),
        offset: query.offset.unwrap_or(0),
    };

    match search::search_listings(&db, &filter).await {
        Ok(listings) => Ok(HttpResponse::Ok().json(ApiResponse::success(listings))),
        Err(e) => {
            tracing::error!(error = %e, "listing search failed");
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("search failed")))
        }
    }
}

/// Fetch a single listing with all lookup labels resolved
pub async fn get_property(path: web::Path<i64>, db: web::Data<Db>) -> Result<HttpResponse> {
    let id = path.into_inner();
    match search::listing_by_id(&db, id).await {
        Ok(Some(listing)) => Ok(HttpResponse::Ok().json(ApiResponse::success(listing))),
        Ok(None) => Ok(HttpResponse::NotFound()
            .json(ApiResponse::<()>::error(format!("listing {id} not found")))),
        Err(e) => {
            tracing::error!(listing_id = id, error = %e, "listing fetch failed");
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("fetch failed")))
        }
    }
}

/// Per-category listing counts and price aggregates
pub async fn get_stats(db: web::Data<Db>) -> Result<HttpResponse> {
    match search::category_stats(&db).await {
        Ok(stats) => Ok(HttpResponse::Ok().json(ApiResponse::success(stats))),
        Err(e) => {
            tracing::error!(error = %e, "stats query failed");
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("stats failed")))
        }
    }
}
