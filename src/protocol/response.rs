use crate::constant::SqlState;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use simdutf8::basic::from_utf8;

/// Error or notice reported by the server
///
/// Payload is a sequence of `{code: u8, value: cstring}` pairs terminated by a zero byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}: {} (SQLSTATE {})", self.severity, self.message, self.sql_state)]
pub struct ServerError {
    pub severity: String,
    pub sql_state: String,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub position: Option<u32>,
    pub where_: Option<String>,
}

/// Warnings share the error payload layout
pub type Notice = ServerError;

impl ServerError {
    pub fn new(sql_state: &SqlState, message: impl Into<String>) -> Self {
        Self {
            severity: "ERROR".to_string(),
            sql_state: sql_state.code().to_string(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn state(&self) -> SqlState {
        SqlState::from_code(&self.sql_state)
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut err = ServerError::default();
        let mut localized_severity = None;
        let mut data = payload;
        loop {
            let (code, rest) = read_int_1(data)?;
            if code == 0 {
                break;
            }
            let (value, rest) = read_string_null(rest)?;
            data = rest;
            let value = String::from_utf8_lossy(value).into_owned();
            match code {
                b'S' => localized_severity = Some(value),
                b'V' => err.severity = value,
                b'C' => err.sql_state = value,
                b'M' => err.message = value,
                b'D' => err.detail = Some(value),
                b'H' => err.hint = Some(value),
                b'P' => err.position = value.parse().ok(),
                b'W' => err.where_ = Some(value),
                _ => {}
            }
        }
        if err.severity.is_empty() {
            err.severity = localized_severity.unwrap_or_default();
        }
        Ok(err)
    }
}

/// Decoded command-complete status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatus {
    pub status: String,
    pub update_count: u64,
    pub insert_oid: u64,
}

impl CommandStatus {
    /// Status reported for an empty query string
    pub fn empty() -> Self {
        Self {
            status: "EMPTY".to_string(),
            update_count: 0,
            insert_oid: 0,
        }
    }

    /// Interpret a status tag such as `INSERT 0 1` or `UPDATE 3`
    pub fn parse(status: &str) -> Result<Self> {
        let mut update_count = 0;
        let mut insert_oid = 0;
        let counted = ["INSERT", "UPDATE", "DELETE", "MOVE", "SELECT", "FETCH", "COPY", "MERGE"];
        let command = status.split(' ').next().unwrap_or_default();
        if counted.contains(&command) && status.contains(' ') {
            let bad = || {
                Error::ProtocolViolation(format!(
                    "Unable to interpret the update count in command completion tag: {status}"
                ))
            };
            let count = status.rsplit(' ').next().unwrap_or_default();
            update_count = count.parse().map_err(|_| bad())?;
            if command == "INSERT" {
                let mut parts = status.split(' ').skip(1);
                let oid = parts.next().ok_or_else(bad)?;
                insert_oid = oid.parse().map_err(|_| bad())?;
            }
        }
        Ok(Self {
            status: status.to_string(),
            update_count,
            insert_oid,
        })
    }
}

/// Decode the null-terminated status text of a command-complete payload
pub fn read_command_status(payload: &[u8]) -> Result<&str> {
    let (text, _rest) = read_string_null(payload)?;
    from_utf8(text)
        .map_err(|e| Error::ProtocolViolation(format!("Invalid UTF-8 in command status: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(u8, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (code, value) in pairs {
            out.push(*code);
            write_string_null(&mut out, value);
        }
        out.push(0);
        out
    }

    #[test]
    fn parse_error_fields() {
        let payload = fields(&[
            (b'S', "FEHLER"),
            (b'V', "ERROR"),
            (b'C', "42P01"),
            (b'M', "relation \"t\" does not exist"),
            (b'P', "15"),
            (b'Z', "ignored"),
        ]);
        let err = ServerError::parse(&payload).unwrap();
        assert_eq!(err.severity, "ERROR");
        assert_eq!(err.sql_state, "42P01");
        assert_eq!(err.message, "relation \"t\" does not exist");
        assert_eq!(err.position, Some(15));
        assert!(err.detail.is_none());
        assert_eq!(
            err.to_string(),
            "ERROR: relation \"t\" does not exist (SQLSTATE 42P01)"
        );
    }

    #[test]
    fn localized_severity_fallback() {
        let payload = fields(&[(b'S', "WARNING"), (b'C', "01000"), (b'M', "careful")]);
        let notice = ServerError::parse(&payload).unwrap();
        assert_eq!(notice.severity, "WARNING");
    }

    #[test]
    fn truncated_payload() {
        assert!(matches!(
            ServerError::parse(b"Cabc"),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn command_status_counts() {
        let insert = CommandStatus::parse("INSERT 17 2").unwrap();
        assert_eq!(insert.update_count, 2);
        assert_eq!(insert.insert_oid, 17);

        let update = CommandStatus::parse("UPDATE 5").unwrap();
        assert_eq!(update.update_count, 5);
        assert_eq!(update.insert_oid, 0);

        let create = CommandStatus::parse("CREATE TABLE").unwrap();
        assert_eq!(create.update_count, 0);

        let bare = CommandStatus::parse("SELECT").unwrap();
        assert_eq!(bare.update_count, 0);

        assert!(CommandStatus::parse("DELETE many").is_err());
    }
}
