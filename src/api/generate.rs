#![forbid(unsafe_code)]

use std::sync::Arc;

use log::{error, info};
use poem::Request;
use poem_openapi::{ OpenApi, payload::{Json, PlainText}, Object, ApiRequest, ApiResponse };
use serde_json::Value;

use crate::acrostic::generator::TextGenerator;
use crate::acrostic::prompt::build_prompt;
use crate::api::RespError;
use crate::utils::server_utils::{self, RequestDebug};

// Generic message for every generator failure.  Details stay in the log.
pub const GENERATION_FAILED_MSG: &str = "삼행시 생성 중 오류가 발생했습니다.";

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct GenerateApi {
    generator: Arc<dyn TextGenerator>,
}

impl GenerateApi {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[derive(Object)]
struct ReqGenerate
{
    word: Option<String>,
}

#[derive(Object, Debug)]
pub struct RespGenerate
{
    result: String,
}

impl ReqGenerate {
    /// Anything that isn't a JSON object with a string word leaves the word
    /// missing, which validation then rejects.
    fn from_text(text: &str) -> Self {
        let word = serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|v| v.get("word").and_then(Value::as_str).map(str::to_string));
        Self { word }
    }
}

/// The body is JSON either way.  Cross-origin pages can post text/plain
/// without a preflight, so that content type is parsed too.
#[derive(ApiRequest)]
enum GenerateBody {
    Json(Json<ReqGenerate>),
    Text(PlainText<String>),
}

impl GenerateBody {
    fn into_request(self) -> ReqGenerate {
        match self {
            GenerateBody::Json(Json(req)) => req,
            GenerateBody::Text(PlainText(text)) => ReqGenerate::from_text(&text),
        }
    }
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqGenerate {
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request body:");
        s.push_str("\n    word: ");
        s.push_str(self.word.as_deref().unwrap_or("<missing>"));
        s
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
#[oai(bad_request_handler = "bad_request_handler")]
enum GenerateResponse {
    #[oai(status = 200)]
    Http200(Json<RespGenerate>),
    #[oai(status = 400)]
    Http400(Json<RespError>),
    #[oai(status = 500)]
    Http500(Json<RespError>),
}

fn make_http_200(result: String) -> GenerateResponse {
    GenerateResponse::Http200(Json(RespGenerate { result }))
}
fn make_http_400(msg: String) -> GenerateResponse {
    GenerateResponse::Http400(Json(RespError::new(msg)))
}
fn make_http_500(msg: String) -> GenerateResponse {
    GenerateResponse::Http500(Json(RespError::new(msg)))
}

// Bodies that don't parse as {"word": string} are client errors.
fn bad_request_handler(err: poem::Error) -> GenerateResponse {
    make_http_400(err.to_string())
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl GenerateApi {
    #[oai(path = "/generate", method = "post")]
    async fn generate_api(&self, http_req: &Request, body: GenerateBody) -> GenerateResponse {
        let req = body.into_request();

        // Conditional logging depending on log level.
        server_utils::debug_request(http_req, &req);

        // Reject bad words before anything goes over the network.
        let word = req.word.unwrap_or_default();
        let prompt = match build_prompt(&word) {
            Ok(p) => p,
            Err(e) => return make_http_400(e.to_string()),
        };

        match self.generator.generate(&prompt).await {
            Ok(result) => {
                info!("Generated acrostic for: {}", word);
                make_http_200(result)
            },
            Err(e) => {
                error!("API Error: {}", e);
                make_http_500(GENERATION_FAILED_MSG.to_string())
            }
        }
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use crate::acrostic::prompt::{PromptSpec, INVALID_WORD_MSG, SYSTEM_PROMPT};
    use crate::api::build_app;
    use crate::utils::errors::GenerationError;
    use async_trait::async_trait;
    use poem::http::StatusCode;
    use poem::test::TestClient;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const POEM: &str = "하: 하늘을 보니\n늘: 늘 웃음이 나요\n가: 가슴이 두근두근";

    struct MockGenerator {
        reply: Option<String>,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<PromptSpec>>,
    }

    impl MockGenerator {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self { reply: Some(text.to_string()), calls: AtomicUsize::new(0),
                            last_prompt: Mutex::new(None) })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { reply: None, calls: AtomicUsize::new(0),
                            last_prompt: Mutex::new(None) })
        }
    }

    #[async_trait]
    impl TextGenerator for MockGenerator {
        async fn generate(&self, prompt: &PromptSpec) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.clone());
            match &self.reply {
                Some(text) => Ok(text.clone()),
                None => Err(GenerationError::Api("HTTP 529: overloaded".to_string())),
            }
        }
    }

    fn client(generator: Arc<MockGenerator>) -> (TestClient<impl poem::Endpoint>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(generator, "Acrostic Server", dir.path().to_str().unwrap(), "/api");
        (TestClient::new(app), dir)
    }

    #[tokio::test]
    async fn two_characters_is_400() {
        let mock = MockGenerator::replying(POEM);
        let (cli, _dir) = client(mock.clone());

        let resp = cli.post("/api/generate").body_json(&json!({"word": "하늘"})).send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.assert_header("access-control-allow-origin", "*");
        let body = resp.json().await;
        body.value().object().get("error").assert_string(INVALID_WORD_MSG);
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_word_is_400() {
        let mock = MockGenerator::replying(POEM);
        let (cli, _dir) = client(mock.clone());

        let resp = cli.post("/api/generate").body_json(&json!({})).send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.json().await.value().object().get("error").assert_string(INVALID_WORD_MSG);

        let resp = cli.post("/api/generate").body_json(&json!({"word": ""})).send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unparseable_body_is_400() {
        let mock = MockGenerator::replying(POEM);
        let (cli, _dir) = client(mock.clone());

        let resp = cli.post("/api/generate")
            .content_type("application/json")
            .body("{not json")
            .send()
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn text_plain_body_is_parsed_as_json() {
        let mock = MockGenerator::replying(POEM);
        let (cli, _dir) = client(mock.clone());

        let resp = cli.post("/api/generate")
            .content_type("text/plain")
            .body("{\"word\":\"하늘가\"}")
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.json().await.value().object().get("result").assert_string(POEM);
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);

        let resp = cli.post("/api/generate")
            .content_type("text/plain;charset=UTF-8")
            .body("{\"word\":\"하늘\"}")
            .send()
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.json().await.value().object().get("error").assert_string(INVALID_WORD_MSG);

        let resp = cli.post("/api/generate")
            .content_type("text/plain")
            .body("word=하늘가")
            .send()
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn text_body_word_extraction() {
        assert_eq!(ReqGenerate::from_text("{\"word\":\"봄여름\"}").word.as_deref(), Some("봄여름"));
        assert!(ReqGenerate::from_text("{\"word\":3}").word.is_none());
        assert!(ReqGenerate::from_text("not json").word.is_none());
    }

    #[tokio::test]
    async fn three_characters_returns_raw_text() {
        let mock = MockGenerator::replying(POEM);
        let (cli, _dir) = client(mock.clone());

        let resp = cli.post("/api/generate").body_json(&json!({"word": "하늘가"})).send().await;
        resp.assert_status_is_ok();
        resp.assert_header("access-control-allow-origin", "*");
        resp.json().await.value().object().get("result").assert_string(POEM);

        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
        let prompt = mock.last_prompt.lock().unwrap().clone().unwrap();
        assert_eq!(prompt.user, "하늘가");
        assert_eq!(prompt.system, SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn generator_failure_is_generic_500() {
        let mock = MockGenerator::failing();
        let (cli, _dir) = client(mock.clone());

        let resp = cli.post("/api/generate").body_json(&json!({"word": "하늘가"})).send().await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        resp.json().await.value().object().get("error").assert_string(GENERATION_FAILED_MSG);
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    }
}
