//! Catch-all handler bridging Actix and the dispatch core.
//!
//! Every URI goes through [`dispatch`]: the Actix request is translated into
//! a domain [`Request`], the pipeline produces a [`Reply`], and the reply is
//! written back with its cookies. Flash messages travel in the private cookie
//! session between a redirect and the next rendered page.

use actix_web::cookie::{Cookie, time::Duration};
use actix_web::http::StatusCode;
use actix_web::http::header::{self, ContentType};
use actix_web::{HttpRequest, HttpResponse, web};
use tracing::{debug, warn};

use crate::domain::{CookieUpdate, Method, Params, Reply, ReplyBody, Request};

use super::error::HttpResult;
use super::flash::FlashMessages;
use super::state::HttpState;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

fn is_form(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// Build the domain request from the Actix one.
///
/// Query parameters come first; a URL-encoded body of a `POST` adds to them.
pub fn translate(req: &HttpRequest, body: &[u8]) -> Request {
    let method = Method::from_name(req.method().as_str());
    let mut params =
        Params::from_pairs(url::form_urlencoded::parse(req.query_string().as_bytes()));
    if method == Method::Post && is_form(req) {
        for (name, value) in url::form_urlencoded::parse(body) {
            params.insert(name, value);
        }
    }
    let conn = req.connection_info();
    let mut request = Request::new(method, req.path())
        .with_params(params)
        .with_server_uri(&format!("{}://{}", conn.scheme(), conn.host()));
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    if let Ok(cookies) = req.cookies() {
        for cookie in cookies.iter() {
            request = request.with_cookie(cookie.name(), cookie.value());
        }
    }
    request
}

/// RFC 6265 `cookie-octet`: printable ASCII except `"`, `,`, `;` and the
/// backslash.
fn is_cookie_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_graphic() && !matches!(b, b'"' | b',' | b';' | b'\\'))
}

fn cookie(update: CookieUpdate) -> Cookie<'static> {
    let mut cookie = Cookie::build(update.name, update.value.clone().unwrap_or_default())
        .path("/")
        .http_only(true)
        .finish();
    match (update.value, update.max_age) {
        (None, _) => cookie.make_removal(),
        (Some(_), Some(seconds)) => cookie.set_max_age(Duration::seconds(seconds)),
        (Some(_), None) => {}
    }
    cookie
}

/// Write a pipeline reply as an Actix response.
pub fn respond(reply: Reply) -> HttpResponse {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);
    for update in reply.cookies {
        if update.value.as_deref().is_some_and(|value| !is_cookie_value(value)) {
            warn!(cookie = %update.name, "dropping cookie with an unsafe value");
            continue;
        }
        builder.cookie(cookie(update));
    }
    match reply.body {
        ReplyBody::Html(html) => builder.content_type(ContentType::html()).body(html),
        ReplyBody::Redirect(location) => builder
            .insert_header((header::LOCATION, location))
            .finish(),
        ReplyBody::Data {
            content_type,
            bytes,
        } => builder
            .insert_header((header::CONTENT_TYPE, content_type))
            .body(bytes),
    }
}

/// Serve any URI through the dispatch core.
///
/// # Errors
/// Fails only when the flash messages cannot be stored in the session.
pub async fn dispatch(
    req: HttpRequest,
    body: web::Bytes,
    flash: FlashMessages,
    state: web::Data<HttpState>,
) -> HttpResult<HttpResponse> {
    let mut request = translate(&req, &body);
    let pending = flash.take();
    for message in pending {
        request.message(message.kind, message.text);
    }
    let reply = state.application.handle(request).await;
    debug!(status = reply.status, flash = reply.flash.len(), "request dispatched");
    flash.store(&reply.flash)?;
    Ok(respond(reply))
}
