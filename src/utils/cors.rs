#![forbid(unsafe_code)]

use poem::http::{header, HeaderValue, Method, StatusCode};
use poem::{Endpoint, IntoResponse, Middleware, Request, Response, Result};

// ***************************************************************************
//                                Constants
// ***************************************************************************
const ALLOW_ORIGIN  : &str = "*";
const ALLOW_METHODS : &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS : &str = "Content-Type";

// ***************************************************************************
//                              Cors Middleware
// ***************************************************************************
/// Permissive CORS.  Every response carries the allow headers and every
/// OPTIONS request is answered with an empty 200 without reaching the routes.
pub struct PermissiveCors;

impl<E: Endpoint> Middleware<E> for PermissiveCors {
    type Output = PermissiveCorsEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        PermissiveCorsEndpoint { inner: ep }
    }
}

pub struct PermissiveCorsEndpoint<E> {
    inner: E,
}

impl<E: Endpoint> Endpoint for PermissiveCorsEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> Result<Self::Output> {
        let mut resp = if req.method() == Method::OPTIONS {
            Response::builder().status(StatusCode::OK).finish()
        } else {
            // Errors are rendered here so that they carry the headers too.
            match self.inner.call(req).await {
                Ok(r) => r.into_response(),
                Err(e) => e.into_response(),
            }
        };

        add_cors_headers(&mut resp);
        Ok(resp)
    }
}

// ---------------------------------------------------------------------------
// add_cors_headers:
// ---------------------------------------------------------------------------
fn add_cors_headers(resp: &mut Response) {
    let headers = resp.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
}
