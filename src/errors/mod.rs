//! Error types and published status codes for the extraction crate.
//!
//! This module provides:
//! - [`ErrorCode`]: The stable integer codes carried on every snapshot
//! - [`ExtractError`]: The main error enum for load and extraction failures

use thiserror::Error;

/// Stable integer codes published on every snapshot.
///
/// Positive codes are lifecycle notifications, zero is the neutral resting
/// value and negative codes abort the run. The numeric values are part of
/// the public contract and must not change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// The run completed and its results are final.
    Finished = 8,
    /// Extraction produced all values, final bookkeeping pending.
    SearchFinished = 7,
    /// Extraction is advancing through rules or rows.
    SearchRunning = 6,
    /// Extraction has begun on the loaded content.
    SearchStarted = 5,
    /// Content is fully available for extraction.
    ContentLoadFinished = 4,
    /// The download phase has begun.
    ContentLoadStarted = 3,
    /// The worker picked the run up.
    Started = 2,
    /// `start()` accepted the request.
    Starting = 1,
    /// Resting value before any run.
    #[default]
    NoError = 0,
    /// `start()` was called on an unconfigured controller.
    StartFailed = -1,
    /// `start()` was called while a run was active.
    BusyFailed = -2,
    /// The configured source URL failed validation.
    InvalidWebSiteGiven = -3,
    /// A rule-based run was started without any rules.
    NoRegexListGiven = -4,
    /// The source produced no content.
    NoWebContentLoaded = -5,
    /// A required value could not be extracted.
    ParsingFailed = -6,
    /// The run was cancelled cooperatively.
    CancelThread = -7,
    /// The HTTP request itself failed.
    WebExceptionOccurred = -8,
    /// Reading the response body failed.
    FileExceptionOccurred = -9,
    /// The provider payload was not valid JSON.
    JsonExceptionOccurred = -10,
    /// Any other failure.
    ExceptionOccurred = -11,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Negative codes abort the run they belong to.
    pub fn is_failure(self) -> bool {
        (self as i32) < 0
    }

    /// A terminal code returns the controller to idle.
    pub fn is_terminal(self) -> bool {
        self == ErrorCode::Finished || self.is_failure()
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> i32 {
        code as i32
    }
}

/// Failure raised while loading or extracting content.
///
/// Each variant maps onto exactly one negative [`ErrorCode`] via
/// [`code`](Self::code), so subscribers can react to the published
/// integer without matching on the error itself.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The run observed its cancellation flag at a checkpoint.
    #[error("run cancelled")]
    Cancelled,

    /// The source yielded no usable content.
    #[error("no content loaded")]
    NoContent,

    /// A required value was absent from the content.
    #[error("extraction failed: {0}")]
    ParsingFailed(String),

    /// The HTTP request failed.
    #[error("network failure: {0}")]
    Web(#[from] reqwest::Error),

    /// Reading the response body failed.
    #[error("content read failure: {0}")]
    Io(#[from] std::io::Error),

    /// The provider payload was not valid JSON.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A rule pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Anything else that aborted the run.
    #[error("{0}")]
    Internal(String),
}

impl ExtractError {
    /// The wire code this failure publishes as.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Cancelled => ErrorCode::CancelThread,
            Self::NoContent => ErrorCode::NoWebContentLoaded,
            Self::ParsingFailed(_) => ErrorCode::ParsingFailed,
            Self::Web(_) => ErrorCode::WebExceptionOccurred,
            Self::Io(_) => ErrorCode::FileExceptionOccurred,
            Self::Json(_) => ErrorCode::JsonExceptionOccurred,
            Self::Pattern(_) | Self::Internal(_) => ErrorCode::ExceptionOccurred,
        }
    }

    /// Whether the failure carries an underlying cause worth retaining
    /// on the snapshot for diagnostics.
    pub fn is_exceptional(&self) -> bool {
        matches!(
            self,
            Self::Web(_) | Self::Io(_) | Self::Json(_) | Self::Pattern(_) | Self::Internal(_)
        )
    }
}
