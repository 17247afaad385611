//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use tripdesk_domain::{NormalizedError, TripdeskError};

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the transport error shape.
#[derive(Debug)]
pub struct InfraError(pub NormalizedError);

impl From<InfraError> for NormalizedError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<NormalizedError> for InfraError {
    fn from(value: NormalizedError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoNormalizedError {
    fn into_normalized(self) -> NormalizedError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → NormalizedError */
/* -------------------------------------------------------------------------- */

impl IntoNormalizedError for HttpError {
    fn into_normalized(self) -> NormalizedError {
        if self.is_timeout() {
            return NormalizedError::timeout("HTTP request timed out");
        }

        // A connection dropped mid-body never produced a usable response.
        if self.is_connect() || self.is_request() || self.is_body() || self.is_decode() {
            return NormalizedError::network(format!("Network error: {self}"));
        }

        let status = self.status().map_or(0, |status| status.as_u16());
        NormalizedError::unknown(self.to_string(), status)
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_normalized())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → TripdeskError */
/* -------------------------------------------------------------------------- */

/// Storage failures stay on the non-transport error type.
pub(crate) fn storage_error(context: &str, err: impl std::fmt::Display) -> TripdeskError {
    TripdeskError::Storage(format!("{context}: {err}"))
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
