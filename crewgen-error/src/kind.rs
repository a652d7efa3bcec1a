//! Error kinds for crewgen operations

use std::fmt;

/// The kind of error that occurred.
///
/// Users can match on ErrorKind to decide how to handle specific error cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// Invalid configuration or parameters
    ConfigInvalid,

    /// Invalid argument passed to function
    InvalidArgument,

    // =========================================================================
    // Prompt errors
    // =========================================================================
    /// A template placeholder had no value
    TemplateVariableMissing,

    // =========================================================================
    // Inference/LLM errors
    // =========================================================================
    /// LLM inference failed
    InferenceFailed,

    /// The model answered, but not with something we can accept
    InvalidResponse,

    /// Rate limit exceeded
    RateLimited,

    /// Provider rejected the credentials
    AuthenticationFailed,

    // =========================================================================
    // Crew config errors
    // =========================================================================
    /// A roster references agents it does not declare
    RosterInvalid,

    /// A task names an agent that is not part of the config
    AgentNotFound,

    /// A tool name is not registered
    ToolNotFound,

    /// A tool invocation failed
    ToolFailed,

    // =========================================================================
    // Review errors
    // =========================================================================
    /// The review step could not complete (editor failed, file unreadable)
    ReviewFailed,

    // =========================================================================
    // Database errors
    // =========================================================================
    /// Could not open or use the database
    DatabaseFailed,

    /// A SQL statement failed
    QueryFailed,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Network error
    NetworkFailed,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse input
    ParseFailed,

    /// Serialization/deserialization failed
    SerializationFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // Prompt
            ErrorKind::TemplateVariableMissing => "TemplateVariableMissing",

            // Inference
            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::InvalidResponse => "InvalidResponse",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",

            // Crew config
            ErrorKind::RosterInvalid => "RosterInvalid",
            ErrorKind::AgentNotFound => "AgentNotFound",
            ErrorKind::ToolNotFound => "ToolNotFound",
            ErrorKind::ToolFailed => "ToolFailed",

            // Review
            ErrorKind::ReviewFailed => "ReviewFailed",

            // Database
            ErrorKind::DatabaseFailed => "DatabaseFailed",
            ErrorKind::QueryFailed => "QueryFailed",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",

            // Parse
            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InferenceFailed
                | ErrorKind::InvalidResponse
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::AgentNotFound.to_string(), "AgentNotFound");
        assert_eq!(ErrorKind::InferenceFailed.to_string(), "InferenceFailed");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::NetworkFailed.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::InvalidResponse.is_retryable());
        assert!(!ErrorKind::AgentNotFound.is_retryable());
        assert!(!ErrorKind::TemplateVariableMissing.is_retryable());
    }
}
