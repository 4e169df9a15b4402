//! CLI output mode and the JSON envelope

use serde::Serialize;
use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// Suppresses spinners and summaries when `SHAKEPACK_QUIET` is set.
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("SHAKEPACK_QUIET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json { OutputMode::Json } else { OutputMode::Human }
    }

    pub fn is_human(&self) -> bool {
        *self == OutputMode::Human
    }

    /// Human mode with decoration enabled
    pub fn is_decorated(&self) -> bool {
        self.is_human() && !is_quiet()
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub ok: bool,
    pub command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

#[derive(Debug, Serialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
}

pub fn success_envelope<T: Serialize>(command: &'static str, data: T) -> Envelope<T> {
    Envelope {
        ok: true,
        command,
        data: Some(data),
        error: None,
    }
}

pub fn error_envelope(command: &'static str, code: &str, message: &str) -> Envelope<()> {
    Envelope {
        ok: false,
        command,
        data: None,
        error: Some(EnvelopeError {
            code: code.to_string(),
            message: message.to_string(),
        }),
    }
}

/// Print a success envelope in JSON mode; human mode prints its own output.
pub fn emit_success<T: Serialize>(mode: OutputMode, command: &'static str, data: T) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(&success_envelope(command, data))?);
    }
    Ok(())
}

/// Machine code for a top-level failure: the library's code when the
/// error came from a build, `ERROR` otherwise.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<crate::Error>().map(crate::Error::code).unwrap_or("ERROR")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let value = serde_json::to_value(success_envelope("bundle", serde_json::json!({ "modules": 2 }))).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["command"], "bundle");
        assert_eq!(value["data"]["modules"], 2);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_error_envelope_uses_library_code() {
        let err = anyhow::Error::new(crate::Error::MissingDestination);
        let code = error_code(&err);
        let value = serde_json::to_value(error_envelope("bundle", code, &err.to_string())).unwrap();
        assert_eq!(value["ok"], false);
        assert_eq!(value["error"]["code"], crate::Error::MissingDestination.code());
        assert_eq!(error_code(&anyhow::anyhow!("other")), "ERROR");
    }
}
