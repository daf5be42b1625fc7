use thiserror::Error;

use crate::core::messages;
use crate::download::source::ExtractError;

/// Error taxonomy for a single relay request.
///
/// Every failure that crosses a component boundary (classifier, limiter,
/// gate, acquisition engine, remediation, delivery) is converted into one of
/// these variants. The pipeline is the only place that turns them into
/// user-visible text, through [`RelayError::user_message`].
#[derive(Error, Debug)]
pub enum RelayError {
    /// The text is not a link to a supported platform
    #[error("unsupported link")]
    UnsupportedUrl,

    /// Per-user sliding window is full
    #[error("rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Every attempt (and remediation, where it applied) stayed above the ceiling
    #[error("file exceeds size limit of {limit} bytes")]
    Oversize { limit: u64 },

    /// The extraction backend could not retrieve the media
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    /// Every encoding profile failed or timed out
    #[error("remediation failed: {0}")]
    Remediation(String),

    /// The format ladder ran out without producing a file or an error
    #[error("acquisition produced no file")]
    AcquisitionFailed,

    /// Waited too long for a download slot
    #[error("all download slots are busy")]
    Busy,

    /// The transport refused the final file
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything uncategorized, including panics caught at the pipeline boundary
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Type alias for Result with RelayError
pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::UnsupportedUrl => "unsupported_url",
            RelayError::RateLimited { .. } => "rate_limited",
            RelayError::Oversize { .. } => "oversize",
            RelayError::Extraction(e) => e.subcategory(),
            RelayError::Remediation(_) => "remediation",
            RelayError::AcquisitionFailed => "acquisition_failed",
            RelayError::Busy => "busy",
            RelayError::Delivery(_) => "delivery",
            RelayError::Io(_) => "io",
            RelayError::Unexpected(_) => "unexpected",
        }
    }

    /// Whether this outcome increments the aggregate error counter.
    pub fn counts_as_error(&self) -> bool {
        !matches!(self, RelayError::UnsupportedUrl | RelayError::RateLimited { .. })
    }

    /// Whether the failure deserves a full server-side report.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, RelayError::Io(_) | RelayError::Unexpected(_))
    }

    /// Text shown to the requester.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::UnsupportedUrl => messages::UNSUPPORTED_HINT.to_string(),
            RelayError::RateLimited { retry_after_secs } => messages::rate_limited(*retry_after_secs),
            RelayError::Oversize { limit } => messages::oversize(*limit),
            RelayError::Extraction(e) => match e {
                ExtractError::Private(_) => messages::PRIVATE_CONTENT.to_string(),
                ExtractError::Unavailable(_) => messages::CONTENT_UNAVAILABLE.to_string(),
                ExtractError::NoVideo(_) => messages::NO_VIDEO.to_string(),
                _ => messages::GENERIC_FAILURE.to_string(),
            },
            RelayError::Remediation(_) => messages::PROCESSING_FAILED.to_string(),
            RelayError::AcquisitionFailed => messages::DOWNLOAD_FAILED.to_string(),
            RelayError::Busy => messages::BUSY.to_string(),
            RelayError::Delivery(_) => messages::DELIVERY_FAILED.to_string(),
            RelayError::Io(_) | RelayError::Unexpected(_) => messages::GENERIC_FAILURE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_errors_are_not_counted() {
        assert!(!RelayError::UnsupportedUrl.counts_as_error());
        assert!(!RelayError::RateLimited { retry_after_secs: 3 }.counts_as_error());
        assert!(RelayError::Oversize { limit: 1 }.counts_as_error());
        assert!(RelayError::Busy.counts_as_error());
        assert!(RelayError::Unexpected("boom".into()).counts_as_error());
    }

    #[test]
    fn test_extraction_sub_cases_have_distinct_messages() {
        let private = RelayError::from(ExtractError::Private("login required".into())).user_message();
        let gone = RelayError::from(ExtractError::Unavailable("404".into())).user_message();
        let novideo = RelayError::from(ExtractError::NoVideo("no video".into())).user_message();
        let network = RelayError::from(ExtractError::Network("reset".into())).user_message();

        assert_ne!(private, gone);
        assert_ne!(gone, novideo);
        assert_ne!(novideo, network);
        assert_eq!(network, messages::GENERIC_FAILURE);
    }

    #[test]
    fn test_rate_limited_message_mentions_wait() {
        let msg = RelayError::RateLimited { retry_after_secs: 42 }.user_message();
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(RelayError::Oversize { limit: 10 }.kind(), "oversize");
        assert_eq!(RelayError::from(ExtractError::Timeout(5)).kind(), "timeout");
        assert!(RelayError::Io(std::io::Error::other("disk")).is_unexpected());
    }
}
