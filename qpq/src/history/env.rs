use super::HistoryError;
use super::dedupe::dedupe;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Environment variable the shell wrapper fills before launching us.
pub const HISTORY_ENV_VAR: &str = "QPQ_SHELL_HISTORY";

/// Decode the wrapper's hand-off: base64 of `|`-joined commands, oldest-first.
///
/// Returns `None` when the variable is absent, empty, undecodable, or holds no
/// commands, so the caller moves on to the next source.
pub fn history_from_env_var(value: Option<&str>) -> Option<Vec<String>> {
    let value = value?;
    match decode_payload(value) {
        Ok(commands) if !commands.is_empty() => Some(commands),
        Ok(_) => {
            tracing::debug!("{HISTORY_ENV_VAR} holds no commands");
            None
        }
        Err(e) => {
            tracing::debug!("ignoring {HISTORY_ENV_VAR}: {e}");
            None
        }
    }
}

fn decode_payload(value: &str) -> Result<Vec<String>, HistoryError> {
    // base64(1) wraps its output; the wrapper strips newlines but be lenient.
    let compact: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return Ok(Vec::new());
    }

    let bytes = BASE64.decode(compact.as_bytes())?;
    let decoded = String::from_utf8_lossy(&bytes);

    let oldest_first: Vec<&str> = decoded.split('|').filter(|s| !s.is_empty()).collect();
    Ok(dedupe(&oldest_first, true))
}
