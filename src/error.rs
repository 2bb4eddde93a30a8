use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GrabError {
    #[error("invalid record id: {0}")]
    InvalidRecordId(String),

    #[error("invalid group code: {0}")]
    InvalidGroupCode(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("site request failed: {0}")]
    SiteHttp(String),

    #[error("site returned status {status}: {message}")]
    SiteStatus { status: u16, message: String },

    #[error("malformed listing page: {0}")]
    MalformedPage(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("record not found locally: {0}")]
    RecordNotFound(String),

    #[error("malformed record header: {0}")]
    HeaderParse(String),

    #[error("unsupported signal storage format: {0}")]
    UnsupportedFormat(u32),

    #[error("channel {channel} not found in record {record}")]
    ChannelNotFound { record: String, channel: String },

    #[error("plot rendering failed: {0}")]
    Plot(String),
}
