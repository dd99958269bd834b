//! HTTP adapter mapping for domain errors.
//!
//! The pipeline turns its own failures into full pages; this covers what
//! goes wrong at the edge (unreadable bodies, session cookie failures) with a
//! minimal HTML page. Internal messages are never shown to the client.

use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use tracing::error;

use crate::domain::{Error, ErrorCode, TRACE_ID_HEADER, escape};

/// Convenient result alias for HTTP handlers.
pub type HttpResult<T> = Result<T, Error>;

const MSG_INTERNAL: &str = "The server was unable to complete your request.";

fn client_message(error: &Error) -> String {
    match error.code() {
        ErrorCode::InternalError => match error.trace_id() {
            Some(id) => format!("{MSG_INTERNAL} Reference: {id}"),
            None => MSG_INTERNAL.to_owned(),
        },
        _ => error.message().to_owned(),
    }
}

fn error_page(error: &Error) -> String {
    let title = escape(error.code().title());
    format!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{}</p></body></html>\n",
        escape(&client_message(error))
    )
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code().status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(id) = self.trace_id() {
            builder.insert_header((TRACE_ID_HEADER, id.to_owned()));
        }
        builder
            .content_type(ContentType::html())
            .body(error_page(self))
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        error!(error = %err, "actix error promoted to domain error");
        Self::internal(err.to_string())
    }
}
