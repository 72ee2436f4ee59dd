use actix_web::{web, HttpResponse};
use serde::Deserialize;
use vellum::query::{QueryDocument, Variables};
use vellum::VellumError;

use crate::AppState;

/// Configure all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/status", web::get().to(status))
            .route("/routes", web::get().to(routes))
            .route("/query", web::post().to(query)),
    );
}

fn err_response(e: VellumError) -> HttpResponse {
    match &e {
        VellumError::NotFound { .. } | VellumError::UnknownType(_) => {
            HttpResponse::NotFound().json(serde_json::json!({ "error": e.to_string() }))
        }
        VellumError::DuplicateId { .. } | VellumError::DuplicateType(_) => {
            HttpResponse::Conflict().json(serde_json::json!({ "error": e.to_string() }))
        }
        VellumError::Schema(_) | VellumError::Query(_) => {
            HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() }))
        }
        _ => {
            log::error!("Internal error: {e}");
            HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": "Internal server error" }))
        }
    }
}

async fn status(state: web::Data<AppState>) -> HttpResponse {
    let mut collections = serde_json::Map::new();
    for collection in state.service.store().collections() {
        collections.insert(
            collection.type_name().to_string(),
            serde_json::json!({ "count": collection.len() }),
        );
    }

    HttpResponse::Ok().json(serde_json::json!({
        "collections": collections,
        "routes": state.service.routes().len(),
        "schemaCompiled": state.service.graph().is_some(),
    }))
}

async fn routes(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.service.routes())
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: QueryDocument,
    #[serde(default)]
    variables: Variables,
}

async fn query(state: web::Data<AppState>, body: web::Json<QueryRequest>) -> HttpResponse {
    match state.service.query(&body.query, &body.variables) {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => err_response(e),
    }
}
