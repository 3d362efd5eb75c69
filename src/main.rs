#![forbid(unsafe_code)]

use std::sync::Arc;

use lazy_static::lazy_static;
use log::info;
use poem::listener::{Listener, RustlsCertificate, RustlsConfig, TcpListener};

// Server Utilities
use crate::acrostic::generator::AnthropicGenerator;
use crate::api::build_app;
use crate::utils::config::{init_log, init_runtime_context, RuntimeCtx};
use crate::utils::errors::Errors;

// Modules
mod acrostic;
mod api;
mod utils;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "AcrosticServer"; // for poem logging

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the parameters variable so that is has a 'static lifetime.
// We exit if we can't read our parameters.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    // --------------- Initialize Server --------------
    // Announce ourselves.
    println!("Starting acrostic_server!");

    // Initialize the server.
    server_init();

    // --------------- Main Loop Set Up ---------------
    let config = &RUNTIME_CTX.parms.config;
    let server_url = format!("{}:{}{}", config.http_addr, config.http_port, "/api");

    // The generator is built once and shared by all requests.
    let generator = Arc::new(AnthropicGenerator::new(config.generator.clone(),
                                                     RUNTIME_CTX.api_key.clone()));
    let app = build_app(generator, &config.title, &RUNTIME_CTX.public_dir, &server_url);

    // ------------------ Main Loop -------------------
    let addr = format!("{}{}", "0.0.0.0:", config.http_port);
    info!("Listening on {}, serving static files from {}", addr, RUNTIME_CTX.public_dir);
    match (&config.tls_key, &config.tls_cert) {
        (Some(key), Some(cert)) => {
            poem::Server::new(
                TcpListener::bind(addr).rustls(
                    RustlsConfig::new().fallback(
                        RustlsCertificate::new()
                            .key(std::fs::read(key)?)
                            .cert(std::fs::read(cert)?),
                    ),
                ),
            )
            .name(SERVER_NAME)
            .run(app)
            .await
        },
        _ => {
            poem::Server::new(TcpListener::bind(addr))
                .name(SERVER_NAME)
                .run(app)
                .await
        },
    }
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// server_init:
// ---------------------------------------------------------------------------
/** Initialize logging and force the reading of the configuration. */
fn server_init() {
    // Configure out log.
    init_log();

    // Force the reading of input parameters and initialization of runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));

    // Log build info.
    print_version_info();
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    info!("{}.", format!("\n*** Running ACROSTIC={}, BRANCH={}, COMMIT={}, DIRTY={}, SRC_TS={}, RUSTC={}",
                        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
                        env!("GIT_BRANCH"),
                        env!("GIT_COMMIT_SHORT"),
                        env!("GIT_DIRTY"),
                        env!("SOURCE_TIMESTAMP"),
                        env!("RUSTC_VERSION")),
    );
}
