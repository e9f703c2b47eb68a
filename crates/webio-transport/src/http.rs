//! HTTP asset handler.
//!
//! Resolution order for every non-WebSocket request:
//! 1. the embedding application's [`PageHandler`] (may claim any path)
//! 2. the [`AssetLookup`], serving raw file bytes
//! 3. a 404 with [`NOT_FOUND_BODY`]

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::assets::AssetLookup;

/// Body of the response for a path nobody claims.
pub const NOT_FOUND_BODY: &str = "not found";

/// The parts of an HTTP request a page handler may inspect.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl PageRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

/// Application hook consulted before asset lookup.
///
/// Returning `Some` short-circuits the request with that response verbatim.
pub trait PageHandler: Send + Sync + 'static {
    fn handle(
        &self,
        request: &PageRequest,
    ) -> impl std::future::Future<Output = Option<Response>> + Send;
}

/// Page handler that never claims a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPages;

impl PageHandler for NoPages {
    async fn handle(&self, _request: &PageRequest) -> Option<Response> {
        None
    }
}

impl<F> PageHandler for F
where
    F: Fn(&PageRequest) -> Option<Response> + Send + Sync + 'static,
{
    fn handle(
        &self,
        request: &PageRequest,
    ) -> impl std::future::Future<Output = Option<Response>> + Send {
        std::future::ready(self(request))
    }
}

/// Serve one request through page handler, asset lookup, then not-found.
pub async fn handle_request<P, A>(pages: &P, assets: &A, request: PageRequest) -> Response
where
    P: PageHandler,
    A: AssetLookup + ?Sized,
{
    if let Some(response) = pages.handle(&request).await {
        return response;
    }

    let path = request.path();
    if let Some(file) = assets.resolve(path) {
        // A registered path whose file has vanished is just "not found".
        match tokio::fs::read(&file).await {
            Ok(bytes) => return asset_response(bytes),
            Err(e) => debug!("Asset {path} maps to unreadable {}: {e}", file.display()),
        }
    }

    debug!("No page or asset for {} {path}", request.method);
    not_found()
}

fn asset_response(bytes: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(bytes));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    response
}

pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}
