//! Connection error values and the known-code table.
//!
//! Every failure a [`Connection`](crate::connection::Connection) can observe
//! is carried as an [`Error`]: a `(domain, code, description)` triple. Errors
//! raised by this crate (and by transports that speak its vocabulary) use
//! [`ERROR_DOMAIN`] together with a [`KnownCode`].

/// Error domain used by this crate and by transports reporting known codes.
pub const ERROR_DOMAIN: &str = "URLClient";

/// Codes reserved in [`ERROR_DOMAIN`].
///
/// Codes are split into two bands. The `*Min`/`*Max` members are sentinels
/// that delimit a band and are never themselves reported as known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum KnownCode {
    // basic band, reported by transports
    BasicErrorMin = 0,
    Unknown = 1,
    Allocation = 2,
    InitConnection = 3,
    UnsupportedProtocol = 4,
    TooManyRedirects = 5,
    UnacceptableStatusCode = 6,
    InvalidResumeOffset = 7,
    OpenSourceFile = 8,
    OpenDestinationFile = 9,
    CreateDestinationFile = 10,
    HostLookupError = 11,
    CannotConnectToHostError = 12,
    CannotConnectToInternetError = 13,
    ConnectionLostError = 14,
    ConnectionTimeoutError = 15,
    BasicErrorMax = 16,

    // extended band, raised by the client itself
    ExtendedErrorMin = 100,
    ClientAlreadyDisposedError = 101,
    RequestNotSetError = 102,
    RequestURLInvalid = 103,
    RequestHandlerDidNotStart = 104,
    ResponseHandlerDidNotStart = 105,
    ResponseHandlingError = 106,
    ExtendedErrorMax = 107,
}

impl KnownCode {
    /// Returns the numeric value of this code.
    #[must_use]
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Returns the canonical description for this code.
    ///
    /// Band sentinels have no description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::BasicErrorMin
            | Self::BasicErrorMax
            | Self::ExtendedErrorMin
            | Self::ExtendedErrorMax => "",
            Self::Unknown => "Unknown error",
            Self::Allocation => "Could not allocate resource/memory",
            Self::InitConnection => "Could not initialize connection",
            Self::UnsupportedProtocol => "Unsupported protocol detected",
            Self::TooManyRedirects => "Too many redirects",
            Self::UnacceptableStatusCode => "Unacceptable status code error received.",
            Self::InvalidResumeOffset => "Attempt to use invalid resume offset",
            Self::OpenSourceFile => "Could not open source file for reading",
            Self::OpenDestinationFile => "Could not open destination file for writing",
            Self::CreateDestinationFile => "Could not create destination file",
            Self::HostLookupError => "Could not lookup hostname",
            Self::CannotConnectToHostError => "Cannot connect to host",
            Self::CannotConnectToInternetError => "Cannot connect to internet",
            Self::ConnectionLostError => "Connection to host was lost",
            Self::ConnectionTimeoutError => "Connection timed out",
            Self::ClientAlreadyDisposedError => "Client is already disposed",
            Self::RequestNotSetError => "Request is not set",
            Self::RequestURLInvalid => "Request URL is invalid or not set",
            Self::RequestHandlerDidNotStart => "Request handler did not start",
            Self::ResponseHandlerDidNotStart => "Response handler did not start",
            Self::ResponseHandlingError => "Response handling error",
        }
    }
}

/// An error attached to a connection.
///
/// Immutable once built. The domain is arbitrary: transports may report
/// errors from their own domains, which are carried verbatim but are never
/// [known](Error::is_known).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{domain} error {code}: {description}")]
pub struct Error {
    domain: String,
    code: i64,
    description: String,
}

impl Error {
    /// Creates an error from its raw parts.
    #[must_use]
    pub fn new(domain: impl Into<String>, code: i64, description: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            description: description.into(),
        }
    }

    /// Creates an error in [`ERROR_DOMAIN`] with the code's canonical description.
    #[must_use]
    pub fn known(code: KnownCode) -> Self {
        Self::new(ERROR_DOMAIN, code.code(), code.description())
    }

    /// Creates an error in [`ERROR_DOMAIN`] with a custom description.
    #[must_use]
    pub fn known_with(code: KnownCode, description: impl Into<String>) -> Self {
        Self::new(ERROR_DOMAIN, code.code(), description)
    }

    /// Returns the error domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        self.code
    }

    /// Returns the human readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns true if this error belongs to [`ERROR_DOMAIN`] and its code
    /// lies strictly inside one of the reserved bands.
    #[must_use]
    pub fn is_known(&self) -> bool {
        if self.domain != ERROR_DOMAIN {
            return false;
        }

        let basic = self.code > KnownCode::BasicErrorMin.code()
            && self.code < KnownCode::BasicErrorMax.code();
        let extended = self.code > KnownCode::ExtendedErrorMin.code()
            && self.code < KnownCode::ExtendedErrorMax.code();

        basic || extended
    }

    /// Returns true if this error is exactly `code` in [`ERROR_DOMAIN`].
    #[must_use]
    pub fn is_known_code(&self, code: KnownCode) -> bool {
        self.domain == ERROR_DOMAIN && self.code == code.code()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
