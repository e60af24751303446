use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;

pub(crate) const CONNECTIVITY_MESSAGE: &str =
    "Unable to reach the server. Check your connection and try again.";
pub(crate) const WAKING_MESSAGE: &str =
    "The server is taking too long to respond. It may be waking up, please try again in a moment.";
pub(crate) const UNAVAILABLE_MESSAGE: &str =
    "The server may be sleeping or unavailable. Please wait a minute and try again.";
pub(crate) const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Reqwest(reqwest::Error),
    /// Non-success HTTP response with the raw body.
    Http(StatusCode, String),
    Timeout(Duration),
    Config(String),
    /// A 2xx body carrying `success: false`.
    Api(String),
    /// The wake-and-retry cycle ran out of options.
    Unavailable {
        base_url: String,
        source: Box<Error>,
    },
}

/// Coarse classification driving retry decisions and user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NameResolution,
    Network,
    Timeout,
    Http,
    Other,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Reqwest(err) => classify_reqwest(err),
            Error::Timeout(_) => ErrorClass::Timeout,
            Error::Http(_, _) => ErrorClass::Http,
            Error::Unavailable { source, .. } => source.class(),
            Error::Io(_) | Error::Json(_) | Error::Config(_) | Error::Api(_) => ErrorClass::Other,
        }
    }

    /// Name resolution, connect/network and timeout failures.
    pub fn is_transport(&self) -> bool {
        if matches!(self, Error::Unavailable { .. }) {
            return false;
        }
        matches!(
            self.class(),
            ErrorClass::NameResolution | ErrorClass::Network | ErrorClass::Timeout
        )
    }

    /// Plain message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Error::Unavailable { .. } => UNAVAILABLE_MESSAGE.to_string(),
            Error::Api(message) if !message.trim().is_empty() => message.clone(),
            Error::Http(_, body) => {
                server_message(body).unwrap_or_else(|| GENERIC_MESSAGE.to_string())
            }
            other => match other.class() {
                ErrorClass::NameResolution | ErrorClass::Network => CONNECTIVITY_MESSAGE.to_string(),
                ErrorClass::Timeout => WAKING_MESSAGE.to_string(),
                ErrorClass::Http | ErrorClass::Other => GENERIC_MESSAGE.to_string(),
            },
        }
    }
}

fn classify_reqwest(err: &reqwest::Error) -> ErrorClass {
    if err.is_timeout() {
        return ErrorClass::Timeout;
    }
    if err.is_status() {
        return ErrorClass::Http;
    }
    if err.is_connect() {
        if is_name_resolution(err) {
            return ErrorClass::NameResolution;
        }
        return ErrorClass::Network;
    }
    if err.is_request() {
        return ErrorClass::Network;
    }
    ErrorClass::Other
}

// hyper-util reports resolver failures as a connect error wrapping a "dns error".
fn is_name_resolution(err: &reqwest::Error) -> bool {
    let mut source: Option<&dyn std::error::Error> = Some(err);
    while let Some(current) = source {
        let text = current.to_string().to_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
        {
            return true;
        }
        source = current.source();
    }
    false
}

fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Json(err) => write!(f, "json error: {err}"),
            Error::Reqwest(err) => write!(f, "http transport error: {err}"),
            Error::Http(status, body) => write!(f, "http status {status}: {body}"),
            Error::Timeout(after) => write!(f, "timed out after {}ms", after.as_millis()),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Api(msg) => write!(f, "api reported failure: {msg}"),
            Error::Unavailable { base_url, source } => {
                write!(f, "server at {base_url} unavailable after wake-up: {source}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Reqwest(err) => Some(err),
            Error::Unavailable { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Reqwest(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_prefers_server_message() {
        let err = Error::Http(
            StatusCode::BAD_REQUEST,
            r#"{"success":false,"error":"File type not supported"}"#.into(),
        );
        assert_eq!(err.user_message(), "File type not supported");
        assert_eq!(err.class(), ErrorClass::Http);
        assert!(!err.is_transport());
    }

    #[test]
    fn http_error_without_json_falls_back() {
        let err = Error::Http(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>".into());
        assert_eq!(err.user_message(), GENERIC_MESSAGE);
    }

    #[test]
    fn timeout_is_transport_with_waking_message() {
        let err = Error::Timeout(Duration::from_secs(5));
        assert!(err.is_transport());
        assert_eq!(err.user_message(), WAKING_MESSAGE);
    }

    #[test]
    fn unavailable_wraps_but_is_not_retriable() {
        let err = Error::Unavailable {
            base_url: "http://localhost:5000".into(),
            source: Box::new(Error::Timeout(Duration::from_secs(1))),
        };
        assert!(!err.is_transport());
        assert_eq!(err.class(), ErrorClass::Timeout);
        assert_eq!(err.user_message(), UNAVAILABLE_MESSAGE);
    }

    #[test]
    fn api_failure_surfaces_its_message() {
        let err = Error::Api("Result not found".into());
        assert_eq!(err.user_message(), "Result not found");
        assert_eq!(Error::Api(" ".into()).user_message(), GENERIC_MESSAGE);
    }
}
