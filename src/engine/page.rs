use crate::view::ValidationError;

/// Position within an evaluation, bound to one revision of a view.
///
/// Encoded as 32 hex digits: the row offset then the view fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageToken {
    pub offset: u64,
    pub fingerprint: u64,
}

impl PageToken {
    pub fn new(offset: u64, fingerprint: u64) -> Self {
        Self { offset, fingerprint }
    }

    pub fn encode(&self) -> String {
        format!("{:016x}{:016x}", self.offset, self.fingerprint)
    }

    pub fn decode(token: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidPageToken(token.to_string());
        if token.len() != 32 || !token.is_ascii() {
            return Err(invalid());
        }
        let offset = u64::from_str_radix(&token[..16], 16).map_err(|_| invalid())?;
        let fingerprint = u64::from_str_radix(&token[16..], 16).map_err(|_| invalid())?;
        Ok(Self { offset, fingerprint })
    }

    /// Offset to resume from, checking the token belongs to this revision
    pub fn resume(token: Option<&str>, fingerprint: u64) -> Result<u64, ValidationError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(0);
        };
        let decoded = Self::decode(token)?;
        if decoded.fingerprint != fingerprint {
            return Err(ValidationError::InvalidPageToken(token.to_string()));
        }
        Ok(decoded.offset)
    }
}
