#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::{Endpoint, EndpointExt, Route};
use poem_openapi::{Object, OpenApiService};

use crate::acrostic::generator::TextGenerator;
use crate::utils::cors::PermissiveCors;
use crate::utils::static_files::StaticAssets;

pub mod format;
pub mod generate;
pub mod version;

use format::FormatApi;
use generate::GenerateApi;
use version::VersionApi;

// ***************************************************************************
//                               Shared Types
// ***************************************************************************
/// Body of every non-200 API response.
#[derive(Object, Debug)]
pub struct RespError
{
    error: String,
}

impl RespError {
    pub fn new(error: String) -> Self {
        Self { error }
    }
}

// ---------------------------------------------------------------------------
// build_app:
// ---------------------------------------------------------------------------
/** Assemble the api service under /api, its openapi documents, and the
 * static front end at the root, all wrapped in permissive CORS.  The title
 * names the service in the openapi documents.
 */
pub fn build_app(generator: Arc<dyn TextGenerator>, title: &str, public_dir: &str, server_url: &str)
-> impl Endpoint {
    let endpoints = (GenerateApi::new(generator), FormatApi, VersionApi);
    let api_service =
        OpenApiService::new(endpoints, title, env!("CARGO_PKG_VERSION")).server(server_url);

    // Allow the generated openapi specs to be retrieved from the server.
    let spec = api_service.spec_endpoint();
    let spec_yaml = api_service.spec_endpoint_yaml();
    let ui = api_service.swagger_ui();

    Route::new()
        .nest("/api", api_service)
        .nest("/docs", ui)
        .at("/spec", spec)
        .at("/spec_yaml", spec_yaml)
        .nest("/", StaticAssets::new(public_dir))
        .with(PermissiveCors)
}
