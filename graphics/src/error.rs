//! Graphics error types.

use std::fmt;

use crate::types::ShaderStage;

/// Recoverable errors in the graphics system.
///
/// Programming errors (out-of-bounds writes, bad attachment indices) are not
/// represented here; they panic at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    InitializationFailed(String),
    /// Failed to create a resource.
    ResourceCreationFailed(String),
    /// A shader stage failed to compile.
    ShaderCompilationFailed {
        /// Stage that failed.
        stage: ShaderStage,
        /// Driver info log.
        log: String,
    },
    /// Program linking failed.
    ShaderLinkFailed(String),
    /// An image could not be decoded.
    ImageDecode(String),
    /// A file could not be read.
    Io(String),
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// A framebuffer failed its completeness check.
    IncompleteFramebuffer(String),
    /// A requested feature is not supported.
    FeatureNotSupported(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::ShaderCompilationFailed { stage, log } => {
                write!(f, "failed to compile {stage} shader: {log}")
            }
            Self::ShaderLinkFailed(msg) => write!(f, "shader link failed: {msg}"),
            Self::ImageDecode(msg) => write!(f, "image decode error: {msg}"),
            Self::Io(msg) => write!(f, "io error: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::IncompleteFramebuffer(msg) => write!(f, "framebuffer incomplete: {msg}"),
            Self::FeatureNotSupported(msg) => write!(f, "feature not supported: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}

impl From<std::io::Error> for GraphicsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<image::ImageError> for GraphicsError {
    fn from(e: image::ImageError) -> Self {
        Self::ImageDecode(e.to_string())
    }
}
