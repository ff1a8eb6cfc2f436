//! HTTP routes over the query service.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, get, web};
use log::error;
use serde_json::json;

use crate::error::QueryError;
use crate::query::QueryService;

impl ResponseError for QueryError {
    fn status_code(&self) -> StatusCode {
        match self {
            QueryError::UnsupportedCurrency { .. } | QueryError::SameCurrency(_) => {
                StatusCode::BAD_REQUEST
            }
            QueryError::NotFound(_) => StatusCode::NOT_FOUND,
            QueryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            QueryError::Store(e) => {
                error!("Rate query failed: {e}");
                "exchange rates are temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/exchangerates")
            .service(all_latest)
            .service(latest)
            .service(history),
    );
}

#[get("/latest")]
async fn all_latest(service: web::Data<QueryService>) -> Result<HttpResponse, QueryError> {
    Ok(HttpResponse::Ok().json(service.get_all_latest().await?))
}

#[get("/latest/{base}/{target}")]
async fn latest(
    service: web::Data<QueryService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, QueryError> {
    let (base, target) = path.into_inner();
    let record = service
        .get_latest(&base.to_ascii_uppercase(), &target.to_ascii_uppercase())
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

#[get("/history/{base}/{target}")]
async fn history(
    service: web::Data<QueryService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, QueryError> {
    let (base, target) = path.into_inner();
    let records = service
        .get_history(&base.to_ascii_uppercase(), &target.to_ascii_uppercase())
        .await?;
    Ok(HttpResponse::Ok().json(records))
}
