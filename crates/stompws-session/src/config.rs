use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::handshake;

/// Session settings applied to the CONNECT frame and to outgoing SENDs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Value of the `accept-version` header, e.g. `1.2` or `1.1,1.2`.
    pub accept_version: String,
    /// Virtual host for the `host` header. Defaults to the transport host.
    pub host: Option<String>,
    pub login: Option<String>,
    /// Sent in the CONNECT frame only. Redacted in debug output.
    pub passcode: Option<String>,
    /// Heart-beat offer `(cx, cy)` in milliseconds. Heart-beats are not scheduled.
    pub heart_beat: Option<(u32, u32)>,
    /// Bound on the wait for CONNECTED in `connect_and_wait`. `None` waits forever.
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Option<Duration>,
    /// Headers added to every SEND frame. Per-call headers take precedence.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            accept_version: "1.2".to_string(),
            host: None,
            login: None,
            passcode: None,
            heart_beat: None,
            connect_timeout: Some(Duration::from_secs(5)),
            default_headers: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    /// Parse a JSON document. Absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the accepted versions are well formed.
    pub fn validate(&self) -> Result<()> {
        handshake::accepted_versions(&self.accept_version).map(|_| ())
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("SessionConfig");
        dbg.field("accept_version", &self.accept_version)
            .field("host", &self.host)
            .field("login", &self.login);
        if let Some(passcode) = &self.passcode {
            dbg.field(
                "passcode",
                &format_args!("<redacted:{} bytes>", passcode.len()),
            );
        } else {
            dbg.field("passcode", &Option::<String>::None);
        }
        dbg.field("heart_beat", &self.heart_beat)
            .field("connect_timeout", &self.connect_timeout)
            .field("default_headers", &self.default_headers)
            .finish()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => {
                let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                serializer.serialize_some(&millis)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.accept_version, "1.2");
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(5)));
        assert!(config.default_headers.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let config = SessionConfig::from_json(
            r#"{"login":"guest","passcode":"secret","connect_timeout_ms":250}"#,
        )
        .unwrap();
        assert_eq!(config.login.as_deref(), Some("guest"));
        assert_eq!(config.connect_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.accept_version, "1.2");
    }

    #[test]
    fn from_json_null_timeout_waits_forever() {
        let config = SessionConfig::from_json(r#"{"connect_timeout_ms":null}"#).unwrap();
        assert_eq!(config.connect_timeout, None);
    }

    #[test]
    fn from_json_reads_heart_beat_and_headers() {
        let config = SessionConfig::from_json(
            r#"{"heart_beat":[10000,10000],"default_headers":{"content-type":"text/plain"}}"#,
        )
        .unwrap();
        assert_eq!(config.heart_beat, Some((10_000, 10_000)));
        assert_eq!(
            config.default_headers.get("content-type").map(String::as_str),
            Some("text/plain")
        );
    }

    #[test]
    fn from_json_rejects_bad_input() {
        assert!(matches!(
            SessionConfig::from_json("{not json"),
            Err(SessionError::Config(_))
        ));
        assert!(SessionConfig::from_json(r#"{"accept_version":"two"}"#).is_err());
    }

    #[test]
    fn serializes_timeout_in_millis() {
        let json = serde_json::to_value(SessionConfig::default()).unwrap();
        assert_eq!(json["connect_timeout_ms"], 5000);
    }

    #[test]
    fn debug_redacts_passcode() {
        let config = SessionConfig {
            passcode: Some("hunter2".to_string()),
            ..SessionConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted:7 bytes>"));
    }
}
