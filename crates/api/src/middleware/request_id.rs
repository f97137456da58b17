use axum::{body::Body, http::Request, middleware::Next, response::Response};
use nanoid::nanoid;
use tracing::info;

pub fn new_request_id() -> String {
    format!("req_{}", nanoid!(16))
}

/// Tag every request with a generated id: echoed back in the
/// `X-Request-Id` header and attached to the request log line, so a
/// client-reported id can be matched to the server side.
pub async fn request_id(req: Request<Body>, next: Next) -> Response {
    let id = new_request_id();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut resp = next.run(req).await;
    if let Ok(value) = id.parse() {
        resp.headers_mut().insert("X-Request-Id", value);
    }

    info!(
        request_id = %id,
        %method,
        path,
        status = resp.status().as_u16(),
        "request"
    );
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_prefixed_and_unique() {
        let a = new_request_id();
        let b = new_request_id();
        assert!(a.starts_with("req_"));
        assert_eq!(a.len(), "req_".len() + 16);
        assert_ne!(a, b);
    }
}
