//! Digit service client — the single request/response boundary to the remote
//! model.
//!
//! Two calls are made: a prediction (POST a flat sample, receive a label) and a
//! generation (GET with a label, receive a flat sample). Every failure mode,
//! whether the transport, an HTTP error status, an explicit `error` field or an
//! unreadable body, ends up as one [`ServiceError`] whose `Display` is the
//! message shown to the user.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const PREDICT_FALLBACK: &str = "Failed to predict digit.";
pub const GENERATE_FALLBACK: &str = "Failed to generate digit.";

/// Highest label the model knows about.
pub const MAX_LABEL: u8 = 9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The request never produced a response.
    #[error("{0}")]
    Transport(String),
    /// The service answered with an `error` message.
    #[error("{0}")]
    Remote(String),
    /// The service answered with something that is neither a result nor an error.
    #[error("Unexpected response from digit service: {0}")]
    Malformed(String),
    #[error("Label has to be a number between 0 and 9, not {0}")]
    InvalidLabel(i64),
    #[error("Sample length must be {expected} ({actual} given).")]
    InvalidSample { expected: usize, actual: usize },
}

/// Which generation endpoint to call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GenerateMode {
    /// A random draw for the label.
    #[default]
    Sample,
    /// The class mean for the label.
    Mean,
}

impl GenerateMode {
    pub fn label(&self) -> &'static str {
        match self {
            GenerateMode::Sample => "sample",
            GenerateMode::Mean => "mean",
        }
    }
}

/// The remote model, as seen by the pipeline orchestrator.
pub trait DigitService {
    /// Send a serialized flat sample, get back the predicted digit.
    fn predict(&self, payload: &str) -> Result<u8, ServiceError>;

    /// Ask for a generated sample of `label`, as raw (unclamped) intensities.
    fn generate(&self, label: u8, mode: GenerateMode) -> Result<Vec<f32>, ServiceError>;
}

// ============================================================================
// VALIDATION
// ============================================================================

pub fn validate_label(label: i64) -> Result<u8, ServiceError> {
    if !(0..=MAX_LABEL as i64).contains(&label) {
        return Err(ServiceError::InvalidLabel(label));
    }
    Ok(label as u8)
}

pub fn validate_sample<T>(sample: &[T], dim: usize) -> Result<(), ServiceError> {
    if sample.len() != dim * dim {
        return Err(ServiceError::InvalidSample {
            expected: dim * dim,
            actual: sample.len(),
        });
    }
    Ok(())
}

// ============================================================================
// REPLY PARSING
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum PredictReply {
    Prediction { prediction: i64 },
    Error { error: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateReply {
    Pixels(Vec<f32>),
    Error { error: String },
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

/// Interpret a prediction reply body.
pub fn parse_prediction(body: &str) -> Result<u8, ServiceError> {
    match serde_json::from_str::<PredictReply>(body) {
        Ok(PredictReply::Prediction { prediction }) => {
            validate_label(prediction).map_err(|_| {
                ServiceError::Malformed(format!("prediction {prediction} is not a digit"))
            })
        }
        Ok(PredictReply::Error { error }) => Err(ServiceError::Remote(error)),
        Err(e) => Err(ServiceError::Malformed(e.to_string())),
    }
}

/// Interpret a generation reply body.
pub fn parse_generated(body: &str) -> Result<Vec<f32>, ServiceError> {
    match serde_json::from_str::<GenerateReply>(body) {
        Ok(GenerateReply::Pixels(pixels)) => Ok(pixels),
        Ok(GenerateReply::Error { error }) => Err(ServiceError::Remote(error)),
        Err(e) => Err(ServiceError::Malformed(e.to_string())),
    }
}

/// Message for a non-success HTTP status: the body's `error` field when it has
/// one, otherwise the per-call fallback.
pub fn status_error(body: &str, fallback: &str) -> ServiceError {
    match serde_json::from_str::<ErrorReply>(body) {
        Ok(reply) => ServiceError::Remote(reply.error),
        Err(_) => ServiceError::Remote(fallback.to_string()),
    }
}

// ============================================================================
// HTTP CLIENT
// ============================================================================

/// Endpoints of a running digit service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub predict: String,
    pub generate: String,
    pub generate_mean: String,
}

/// [`DigitService`] over blocking HTTP.
pub struct HttpDigitService {
    agent: ureq::Agent,
    endpoints: Endpoints,
}

impl HttpDigitService {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Self {
        // Error statuses still carry a JSON body we want to read.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent, endpoints }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Turn a response into its body, or into the error the user should see.
    fn finish(
        result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
        fallback: &str,
    ) -> Result<String, ServiceError> {
        let mut response = result.map_err(|e| {
            log::warn!("digit service: transport failure: {}", e);
            ServiceError::Transport(fallback.to_string())
        })?;
        let ok = response.status().is_success();
        let body = response.body_mut().read_to_string().map_err(|e| {
            log::warn!("digit service: unreadable body: {}", e);
            ServiceError::Transport(fallback.to_string())
        })?;
        if ok {
            Ok(body)
        } else {
            log::warn!("digit service: HTTP {}", response.status());
            Err(status_error(&body, fallback))
        }
    }
}

impl DigitService for HttpDigitService {
    fn predict(&self, payload: &str) -> Result<u8, ServiceError> {
        log::debug!("POST {} ({} bytes)", self.endpoints.predict, payload.len());
        let result = self
            .agent
            .post(&self.endpoints.predict)
            .header("Content-Type", "application/json")
            .send(payload);
        let body = Self::finish(result, PREDICT_FALLBACK)?;
        parse_prediction(&body)
    }

    fn generate(&self, label: u8, mode: GenerateMode) -> Result<Vec<f32>, ServiceError> {
        let url = match mode {
            GenerateMode::Sample => &self.endpoints.generate,
            GenerateMode::Mean => &self.endpoints.generate_mean,
        };
        log::debug!("GET {}?label={}", url, label);
        let result = self
            .agent
            .get(url)
            .header("Content-Type", "application/json")
            .query("label", label.to_string())
            .call();
        let body = Self::finish(result, GENERATE_FALLBACK)?;
        parse_generated(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serve one canned HTTP response on a local port. The join handle yields
    /// the request line that was received.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();

            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();
            request_line.trim_end().to_string()
        });
        (base, handle)
    }

    fn http_service(base: &str) -> HttpDigitService {
        HttpDigitService::new(
            Endpoints {
                predict: format!("{base}/predict"),
                generate: format!("{base}/sample"),
                generate_mean: format!("{base}/sample_mean"),
            },
            Duration::from_secs(5),
        )
    }

    #[test]
    fn labels_outside_zero_to_nine_are_rejected() {
        assert_eq!(validate_label(0), Ok(0));
        assert_eq!(validate_label(9), Ok(9));
        assert_eq!(validate_label(10), Err(ServiceError::InvalidLabel(10)));
        assert_eq!(
            validate_label(-1).unwrap_err().to_string(),
            "Label has to be a number between 0 and 9, not -1"
        );
    }

    #[test]
    fn sample_length_is_checked() {
        assert!(validate_sample(&[0u8; 784], 28).is_ok());
        assert_eq!(
            validate_sample(&[0u8; 783], 28).unwrap_err().to_string(),
            "Sample length must be 784 (783 given)."
        );
    }

    #[test]
    fn prediction_reply() {
        assert_eq!(parse_prediction(r#"{"prediction": 7}"#), Ok(7));
        assert_eq!(
            parse_prediction(r#"{"error": "Server failed to process request"}"#),
            Err(ServiceError::Remote("Server failed to process request".into()))
        );
    }

    #[test]
    fn prediction_reply_must_be_a_digit() {
        assert!(matches!(parse_prediction(r#"{"prediction": 12}"#), Err(ServiceError::Malformed(_))));
        assert!(matches!(parse_prediction(r#"{"prediction": "7"}"#), Err(ServiceError::Malformed(_))));
        assert!(matches!(parse_prediction("<html>"), Err(ServiceError::Malformed(_))));
    }

    #[test]
    fn generated_reply() {
        assert_eq!(parse_generated("[0, 12.5, 300]"), Ok(vec![0.0, 12.5, 300.0]));
        assert_eq!(
            parse_generated(r#"{"error": "nope"}"#),
            Err(ServiceError::Remote("nope".into()))
        );
        assert!(matches!(parse_generated(r#"{"pixels": []}"#), Err(ServiceError::Malformed(_))));
    }

    #[test]
    fn status_error_prefers_body_message() {
        assert_eq!(
            status_error(r#"{"error": "Sample length must be 784 (3 given)."}"#, PREDICT_FALLBACK).to_string(),
            "Sample length must be 784 (3 given)."
        );
        assert_eq!(status_error("Bad Gateway", GENERATE_FALLBACK).to_string(), GENERATE_FALLBACK);
    }

    #[test]
    fn error_status_uses_body_message() {
        let (base, server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#);
        let err = http_service(&base).predict("[0]").unwrap_err();
        assert_eq!(err, ServiceError::Remote("boom".into()));
        assert_eq!(server.join().unwrap(), "POST /predict HTTP/1.1");
    }

    #[test]
    fn error_status_without_message_uses_fallback() {
        let (base, server) = serve_once("500 Internal Server Error", "<html>oops</html>");
        let err = http_service(&base).predict("[0]").unwrap_err();
        assert_eq!(err, ServiceError::Remote(PREDICT_FALLBACK.into()));
        server.join().unwrap();

        let (base, server) = serve_once("404 Not Found", "{}");
        let err = http_service(&base).generate(3, GenerateMode::Mean).unwrap_err();
        assert_eq!(err, ServiceError::Remote(GENERATE_FALLBACK.into()));
        assert_eq!(server.join().unwrap(), "GET /sample_mean?label=3 HTTP/1.1");
    }

    #[test]
    fn success_status_is_parsed() {
        let (base, server) = serve_once("200 OK", r#"{"prediction": 4}"#);
        assert_eq!(http_service(&base).predict("[0]"), Ok(4));
        server.join().unwrap();
    }

    #[test]
    fn unreachable_service_is_a_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = http_service(&base).predict("[0]").unwrap_err();
        assert_eq!(err, ServiceError::Transport(PREDICT_FALLBACK.into()));
        assert_eq!(err.to_string(), PREDICT_FALLBACK);
    }
}
