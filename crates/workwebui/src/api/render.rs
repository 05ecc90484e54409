use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::api::models::ErrorBody;
use crate::error::{ApiError, ErrorStatusMode};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Serialize with one tab per nesting level.
pub fn to_indented_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::with_capacity(256);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Turns handler outcomes into the API's JSON envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    mode: ErrorStatusMode,
}

impl Renderer {
    pub fn new(mode: ErrorStatusMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ErrorStatusMode {
        self.mode
    }

    /// 200 with the indented value, or the error envelope.
    pub fn render<T: Serialize>(&self, result: Result<T, ApiError>) -> Response {
        let value = match result {
            Ok(value) => value,
            Err(e) => return self.render_error(&e),
        };

        match to_indented_json(&value) {
            Ok(body) => json_response(StatusCode::OK, body),
            Err(e) => self.render_error(&ApiError::Render(e)),
        }
    }

    pub fn render_error(&self, err: &ApiError) -> Response {
        error_response(err.status(self.mode), err.to_string())
    }
}

/// `{"error": "<message>"}` with the given status.
pub fn error_response(status: StatusCode, message: String) -> Response {
    // ErrorBody holds a single string; serializing it cannot fail.
    let body = serde_json::to_vec(&ErrorBody { error: message }).unwrap_or_default();
    json_response(status, body)
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::StatusAck;
    use crate::error::EngineError;
    use axum::body::to_bytes;
    use serde_json::json;

    async fn body_string(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn indents_with_tabs() {
        let out = to_indented_json(&json!({"count": 1, "jobs": [1]})).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\n\t\"count\": 1,\n\t\"jobs\": [\n\t\t1\n\t]\n}");
    }

    #[tokio::test]
    async fn success_is_200_json() {
        let res = Renderer::default().render(Ok(StatusAck::OK));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            JSON_CONTENT_TYPE
        );
        assert_eq!(body_string(res).await, "{\n\t\"status\": \"ok\"\n}");
    }

    #[tokio::test]
    async fn errors_render_envelope_with_mode_status() {
        let err = || Err::<StatusAck, _>(ApiError::Engine(EngineError::Backend("dial tcp: refused".into())));

        let res = Renderer::new(ErrorStatusMode::Legacy).render(err());
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v: serde_json::Value = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(v, json!({"error": "dial tcp: refused"}));

        let res = Renderer::new(ErrorStatusMode::Classified).render(Err::<StatusAck, _>(
            ApiError::InvalidQuery("bad".into()),
        ));
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn messages_with_quotes_stay_valid_json() {
        let res = error_response(StatusCode::INTERNAL_SERVER_ERROR, r#"bad "thing""#.into());
        let v: serde_json::Value = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(v["error"], r#"bad "thing""#);
    }
}
