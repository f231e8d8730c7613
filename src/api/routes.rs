// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        .service(
            web::scope("/api/v1")
                .route("/properties", web::get().to(handlers::search_properties))
                .route("/properties/{id}", web::get().to(handlers::get_property))
                .route("/stats", web::get().to(handlers::get_stats)),
        );
}
