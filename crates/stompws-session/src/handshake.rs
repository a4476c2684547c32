//! CONNECT frame construction and CONNECTED validation.

use stompws_frame::{header, Command, Frame};
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// Build the CONNECT frame for `config`.
///
/// `transport_host` fills the `host` header unless the config overrides it.
pub fn connect_frame(config: &SessionConfig, transport_host: &str) -> Frame {
    let host = config.host.as_deref().unwrap_or(transport_host);
    let mut frame = Frame::connect(&config.accept_version, host);
    if let Some(login) = &config.login {
        frame = frame.with_header(header::LOGIN, login.as_str());
    }
    if let Some(passcode) = &config.passcode {
        frame = frame.with_header(header::PASSCODE, passcode.as_str());
    }
    if let Some((cx, cy)) = config.heart_beat {
        frame = frame.with_header(header::HEART_BEAT, format!("{cx},{cy}"));
    }
    frame
}

/// Validate a CONNECTED frame against the versions `config` accepts.
///
/// Returns the version the server reported. A frame without a `version`
/// header is accepted and yields `None`.
pub fn validate_connected(config: &SessionConfig, frame: &Frame) -> Result<Option<String>> {
    if frame.command() != Command::Connected {
        return Err(SessionError::HandshakeFailed(format!(
            "expected CONNECTED, got {}",
            frame.command()
        )));
    }

    let Some(server_version) = frame.header(header::VERSION) else {
        debug!("CONNECTED frame carries no version header");
        return Ok(None);
    };

    let accepted = accepted_versions(&config.accept_version)?;
    let server = parse_version(server_version).map_err(SessionError::HandshakeFailed)?;
    let compatible = accepted
        .iter()
        .any(|client| is_version_compatible(*client, server));
    if !compatible {
        return Err(SessionError::HandshakeFailed(format!(
            "server version {server_version} is not compatible with accept-version {}",
            config.accept_version
        )));
    }

    debug!(
        version = server_version,
        server = ?frame.header(header::SERVER),
        session = ?frame.header(header::SESSION),
        "CONNECTED frame accepted"
    );
    Ok(Some(server_version.to_string()))
}

/// Parse a comma-separated `accept-version` value.
pub fn accepted_versions(accept_version: &str) -> Result<Vec<(u16, u16)>> {
    accept_version
        .split(',')
        .map(|version| parse_version(version.trim()).map_err(SessionError::InvalidConfig))
        .collect()
}

fn is_version_compatible(client: (u16, u16), server: (u16, u16)) -> bool {
    client.0 == server.0 && client.1 >= server.1
}

fn parse_version(version: &str) -> std::result::Result<(u16, u16), String> {
    let mut parts = version.split('.');

    let major = parts
        .next()
        .filter(|part| !part.is_empty())
        .ok_or_else(|| format!("invalid version '{version}': missing major"))?;
    let minor = parts
        .next()
        .ok_or_else(|| format!("invalid version '{version}': missing minor"))?;

    if parts.next().is_some() {
        return Err(format!(
            "invalid version '{version}': expected '<major>.<minor>'"
        ));
    }

    let major = major
        .parse::<u16>()
        .map_err(|_| format!("invalid version '{version}': non-numeric major"))?;
    let minor = minor
        .parse::<u16>()
        .map_err(|_| format!("invalid version '{version}': non-numeric minor"))?;

    Ok((major, minor))
}
