#![forbid(unsafe_code)]

use poem::Request;
use poem_openapi::{ OpenApi, payload::Json, Object, ApiResponse };

use crate::acrostic::formatter::{format_result, DisplayUnit};
use crate::api::RespError;
use crate::utils::server_utils::{self, RequestDebug};

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct FormatApi;

#[derive(Object)]
struct ReqFormat
{
    word: String,
    result: String,
}

#[derive(Object, Debug)]
pub struct RespFormat
{
    lines: Vec<RespLine>,
}

/// Either `char` and `sentence`, or `raw_line` alone.
#[derive(Object, Debug)]
pub struct RespLine
{
    #[oai(rename = "char", skip_serializing_if_is_none)]
    character: Option<String>,
    #[oai(skip_serializing_if_is_none)]
    sentence: Option<String>,
    #[oai(skip_serializing_if_is_none)]
    raw_line: Option<String>,
}

impl From<DisplayUnit> for RespLine {
    fn from(unit: DisplayUnit) -> Self {
        match unit {
            DisplayUnit::Labeled { character, sentence } =>
                Self { character: Some(character), sentence: Some(sentence), raw_line: None },
            DisplayUnit::Raw { line } =>
                Self { character: None, sentence: None, raw_line: Some(line) },
        }
    }
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqFormat {
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request body:");
        s.push_str("\n    word: ");
        s.push_str(&self.word);
        s.push_str("\n    result: ");
        s.push_str(&self.result);
        s
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
#[oai(bad_request_handler = "bad_request_handler")]
enum FormatResponse {
    #[oai(status = 200)]
    Http200(Json<RespFormat>),
    #[oai(status = 400)]
    Http400(Json<RespError>),
}

fn bad_request_handler(err: poem::Error) -> FormatResponse {
    FormatResponse::Http400(Json(RespError::new(err.to_string())))
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl FormatApi {
    /// Split generated text into display lines labeled with the word's
    /// characters.  Never fails on malformed text.
    #[oai(path = "/format", method = "post")]
    async fn format_api(&self, http_req: &Request, req: Json<ReqFormat>) -> FormatResponse {
        server_utils::debug_request(http_req, &req.0);

        let lines = format_result(&req.0.result, &req.0.word)
            .into_iter()
            .map(RespLine::from)
            .collect();
        FormatResponse::Http200(Json(RespFormat { lines }))
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use crate::api::build_app;
    use crate::acrostic::generator::TextGenerator;
    use crate::acrostic::generator::AnthropicGenerator;
    use crate::utils::config::GeneratorConfig;
    use poem::test::TestClient;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn labeled_and_raw_lines() {
        let dir = tempfile::tempdir().unwrap();
        let generator: Arc<dyn TextGenerator> =
            Arc::new(AnthropicGenerator::new(GeneratorConfig::default(), None));
        let cli = TestClient::new(build_app(generator, "Acrostic Server", dir.path().to_str().unwrap(), "/api"));

        let resp = cli.post("/api/format")
            .body_json(&json!({"word": "봄여름", "result": "봄: 봄이 왔어요\n\n안녕하세요\n름: 름름"}))
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({"lines": [
            {"char": "봄", "sentence": "봄이 왔어요"},
            {"raw_line": "안녕하세요"},
            {"char": "름", "sentence": "름름"},
        ]})).await;
    }
}
