//! Local HTTP site for exercising the fetch client and crawler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub etag: Option<&'static str>,
}

impl Route {
    pub fn html(body: &str) -> Self {
        Self { status: 200, content_type: "text/html; charset=utf-8", body: body.as_bytes().to_vec(), etag: None }
    }

    pub fn asset(content_type: &'static str, body: &str) -> Self {
        Self { content_type, ..Self::html(body) }
    }

    pub fn status(status: u16) -> Self {
        Self { status, content_type: "text/plain", body: Vec::new(), etag: None }
    }

    pub fn with_etag(mut self, etag: &'static str) -> Self {
        self.etag = Some(etag);
        self
    }
}

#[derive(Clone, Default)]
struct Site {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<Vec<String>>>,
}

/// Answer every request from the route table, counting hits per path.
async fn serve_route(State(site): State<Site>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().to_string();
    site.hits.lock().unwrap().push(path.clone());
    let route = site.routes.lock().unwrap().get(&path).cloned().unwrap_or_else(|| Route::status(404));

    let if_none_match = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok());
    let not_modified = route.etag.is_some() && if_none_match == route.etag;

    let mut response = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        let status = StatusCode::from_u16(route.status).unwrap();
        (status, [(header::CONTENT_TYPE, route.content_type)], route.body).into_response()
    };
    if let Some(etag) = route.etag {
        response.headers_mut().insert(header::ETAG, HeaderValue::from_static(etag));
    }
    response
}

pub struct TestServer {
    base: String,
    site: Site,
}

impl TestServer {
    pub async fn start(routes: Vec<(&str, Route)>) -> Self {
        let site = Site::default();
        site.routes
            .lock()
            .unwrap()
            .extend(routes.into_iter().map(|(path, route)| (path.to_string(), route)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let router = Router::new().fallback(serve_route).with_state(site.clone());
        tokio::spawn(async move { axum::serve(listener, router).await });

        Self { base, site }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn set(&self, path: &str, route: Route) {
        self.site.routes.lock().unwrap().insert(path.to_string(), route);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.site.hits.lock().unwrap().iter().filter(|hit| *hit == path).count()
    }
}
