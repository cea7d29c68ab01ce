//! Errors raised by media sources and other external collaborators
//!
//! A source error is either transient (network, timeout: the item is skipped
//! and retried on the next cycle) or fatal (bad credentials, misconfiguration:
//! the whole cycle for the organization is aborted).

use std::fmt;

#[derive(Debug)]
pub struct SourceError {
    inner: anyhow::Error,
    fatal: bool,
}

impl SourceError {
    /// Organization-wide failure that aborts the cycle.
    ///
    /// Use this for:
    /// - Missing or invalid credentials
    /// - Misconfigured endpoints
    /// - Responses that can never be parsed
    pub fn fatal(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            fatal: true,
        }
    }

    /// Failure limited to the current item or page, retried next cycle.
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            fatal: false,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for SourceError {
    /// Errors are transient unless marked otherwise
    fn from(err: anyhow::Error) -> Self {
        Self::transient(err)
    }
}

/// Extension trait to mark a result's error as fatal
pub trait SourceResultExt<T> {
    fn fatal(self) -> Result<T, SourceError>;
}

impl<T, E: Into<anyhow::Error>> SourceResultExt<T> for Result<T, E> {
    fn fatal(self) -> Result<T, SourceError> {
        self.map_err(|e| SourceError::fatal(e.into()))
    }
}
