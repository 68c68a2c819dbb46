// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the connector.
//!
//! Setup-time failures ([`StartupError`], [`ResourceError`], [`ConfigError`])
//! are fatal and propagate to the caller. Runtime failures reported by the
//! cloud client are not errors in the Rust sense: they are classified as a
//! [`ConnectorErrorKind`], logged, and left to the client's own reconnection
//! policy.

use std::fmt;

use thiserror::Error;

use crate::resource::ResourceCoord;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The connector could not be started.
    #[error("startup error: {0}")]
    Startup(#[from] StartupError),

    /// A resource or group could not be registered or addressed.
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    /// The configuration is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A control operation was called in a loop state that does not allow it.
    #[error("cannot {operation} while connector is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// Name of the loop state at the time of the call.
        state: &'static str,
    },
}

/// Failures that prevent the connector from starting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// Device provisioning or credential bootstrap failed.
    #[error("provisioning failed: {0}")]
    Provisioning(String),

    /// The underlying cloud connection could not be initialized.
    #[error("connection setup failed: {0}")]
    Connection(String),

    /// The broker address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The client's worker thread or runtime could not be created.
    #[error("worker setup failed: {0}")]
    Worker(String),

    /// A client setting is outside the range the transport accepts.
    #[error("invalid client setting: {0}")]
    InvalidConfig(String),
}

/// Errors raised while registering or addressing resources.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The same coordinate was registered twice.
    #[error("resource {0} is already registered")]
    Duplicate(ResourceCoord),

    /// The resource is already a member of another group.
    #[error("resource {0} already belongs to a group")]
    AlreadyGrouped(ResourceCoord),

    /// No resource is registered at this coordinate.
    #[error("no resource registered at {0}")]
    Unknown(ResourceCoord),

    /// A handle did not come from this bridge.
    #[error("invalid resource handle {0}")]
    InvalidHandle(usize),

    /// A write arrived for an execute resource, or the other way round.
    #[error("resource {coord} does not allow {operation}")]
    ModeMismatch {
        /// The addressed resource.
        coord: ResourceCoord,
        /// The rejected operation (`write` or `execute`).
        operation: &'static str,
    },

    /// A group was declared without members.
    #[error("group {0} has no members")]
    EmptyGroup(String),

    /// A coordinate string is not `object/instance/resource`.
    #[error("invalid resource coordinate {input:?}: {reason}")]
    InvalidCoord {
        /// The rejected text.
        input: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors related to configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field holds a value outside its allowed domain.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// The offending field.
        field: String,
        /// Description of the problem.
        message: String,
    },
}

/// Classification of the runtime errors a cloud client can report.
///
/// These are never fatal: the tracker logs them and leaves recovery to the
/// client. Each variant carries the numeric code used on the
/// [`ClientEvents::on_error`](crate::client::ClientEvents::on_error) path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorErrorKind {
    /// No error.
    None,
    /// A connection already exists.
    AlreadyExists,
    /// Bootstrap with the server failed.
    BootstrapFailed,
    /// The connection parameters were rejected.
    InvalidParameters,
    /// The device is not registered.
    NotRegistered,
    /// The connection timed out.
    Timeout,
    /// Generic network failure.
    NetworkError,
    /// The server response could not be parsed.
    ResponseParseFailed,
    /// The client reported an unknown error.
    UnknownError,
    /// Memory allocation failed while connecting.
    MemoryFailure,
    /// The operation is not allowed.
    NotAllowed,
    /// TLS/DTLS handshake failed.
    SecureConnectionFailed,
    /// The server name could not be resolved.
    DnsResolvingFailed,
    /// Update: certificate not found.
    UpdateCertificateNotFound,
    /// Update: identity not found.
    UpdateIdentityNotFound,
    /// Update: certificate invalid.
    UpdateCertificateInvalid,
    /// Update: signature invalid.
    UpdateSignatureInvalid,
    /// Update: vendor id mismatch.
    UpdateVendorMismatch,
    /// Update: class id mismatch.
    UpdateClassMismatch,
    /// Update: device id mismatch.
    UpdateDeviceMismatch,
    /// Update: firmware URI not found.
    UpdateUriNotFound,
    /// Update: rollback protection triggered.
    UpdateRollbackProtection,
    /// Update: unknown warning.
    UpdateUnknown,
    /// Update: writing the image to storage failed.
    UpdateWriteToStorage,
    /// Update: image hash mismatch.
    UpdateInvalidHash,
    /// A code outside the known table.
    Unrecognized,
}

/// First code of the update-subsystem range.
const UPDATE_CODE_BASE: i32 = 0x0400;

impl ConnectorErrorKind {
    /// Every known kind, in code order.
    pub const ALL: [Self; 25] = [
        Self::None,
        Self::AlreadyExists,
        Self::BootstrapFailed,
        Self::InvalidParameters,
        Self::NotRegistered,
        Self::Timeout,
        Self::NetworkError,
        Self::ResponseParseFailed,
        Self::UnknownError,
        Self::MemoryFailure,
        Self::NotAllowed,
        Self::SecureConnectionFailed,
        Self::DnsResolvingFailed,
        Self::UpdateCertificateNotFound,
        Self::UpdateIdentityNotFound,
        Self::UpdateCertificateInvalid,
        Self::UpdateSignatureInvalid,
        Self::UpdateVendorMismatch,
        Self::UpdateClassMismatch,
        Self::UpdateDeviceMismatch,
        Self::UpdateUriNotFound,
        Self::UpdateRollbackProtection,
        Self::UpdateUnknown,
        Self::UpdateWriteToStorage,
        Self::UpdateInvalidHash,
    ];

    /// Maps a client error code to its kind.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .unwrap_or(Self::Unrecognized)
    }

    /// Returns the numeric code for this kind.
    ///
    /// Connection errors use `0..=12`, update errors start at `0x0401`.
    /// [`Unrecognized`](Self::Unrecognized) returns `-1`.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::AlreadyExists => 1,
            Self::BootstrapFailed => 2,
            Self::InvalidParameters => 3,
            Self::NotRegistered => 4,
            Self::Timeout => 5,
            Self::NetworkError => 6,
            Self::ResponseParseFailed => 7,
            Self::UnknownError => 8,
            Self::MemoryFailure => 9,
            Self::NotAllowed => 10,
            Self::SecureConnectionFailed => 11,
            Self::DnsResolvingFailed => 12,
            Self::UpdateCertificateNotFound => UPDATE_CODE_BASE + 1,
            Self::UpdateIdentityNotFound => UPDATE_CODE_BASE + 2,
            Self::UpdateCertificateInvalid => UPDATE_CODE_BASE + 3,
            Self::UpdateSignatureInvalid => UPDATE_CODE_BASE + 4,
            Self::UpdateVendorMismatch => UPDATE_CODE_BASE + 5,
            Self::UpdateClassMismatch => UPDATE_CODE_BASE + 6,
            Self::UpdateDeviceMismatch => UPDATE_CODE_BASE + 7,
            Self::UpdateUriNotFound => UPDATE_CODE_BASE + 8,
            Self::UpdateRollbackProtection => UPDATE_CODE_BASE + 9,
            Self::UpdateUnknown => UPDATE_CODE_BASE + 10,
            Self::UpdateWriteToStorage => UPDATE_CODE_BASE + 11,
            Self::UpdateInvalidHash => UPDATE_CODE_BASE + 12,
            Self::Unrecognized => -1,
        }
    }

    /// Returns the name used in log lines.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "ConnectErrorNone",
            Self::AlreadyExists => "ConnectAlreadyExists",
            Self::BootstrapFailed => "ConnectBootstrapFailed",
            Self::InvalidParameters => "ConnectInvalidParameters",
            Self::NotRegistered => "ConnectNotRegistered",
            Self::Timeout => "ConnectTimeout",
            Self::NetworkError => "ConnectNetworkError",
            Self::ResponseParseFailed => "ConnectResponseParseFailed",
            Self::UnknownError => "ConnectUnknownError",
            Self::MemoryFailure => "ConnectMemoryConnectFail",
            Self::NotAllowed => "ConnectNotAllowed",
            Self::SecureConnectionFailed => "ConnectSecureConnectionFailed",
            Self::DnsResolvingFailed => "ConnectDnsResolvingFailed",
            Self::UpdateCertificateNotFound => "UpdateWarningCertificateNotFound",
            Self::UpdateIdentityNotFound => "UpdateWarningIdentityNotFound",
            Self::UpdateCertificateInvalid => "UpdateWarningCertificateInvalid",
            Self::UpdateSignatureInvalid => "UpdateWarningSignatureInvalid",
            Self::UpdateVendorMismatch => "UpdateWarningVendorMismatch",
            Self::UpdateClassMismatch => "UpdateWarningClassMismatch",
            Self::UpdateDeviceMismatch => "UpdateWarningDeviceMismatch",
            Self::UpdateUriNotFound => "UpdateWarningURINotFound",
            Self::UpdateRollbackProtection => "UpdateWarningRollbackProtection",
            Self::UpdateUnknown => "UpdateWarningUnknown",
            Self::UpdateWriteToStorage => "UpdateErrorWriteToStorage",
            Self::UpdateInvalidHash => "UpdateErrorInvalidHash",
            Self::Unrecognized => "UNKNOWN",
        }
    }

    /// Returns `true` for kinds raised by the firmware update subsystem.
    #[must_use]
    pub fn is_update(self) -> bool {
        self.code() > UPDATE_CODE_BASE
    }
}

impl fmt::Display for ConnectorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_resource_display() {
        let err = ResourceError::Duplicate(ResourceCoord::new(26243, 0, 26241));
        assert_eq!(err.to_string(), "resource 26243/0/26241 is already registered");
    }

    #[test]
    fn error_from_startup_error() {
        let err: Error = StartupError::Provisioning("no credentials".to_string()).into();
        assert!(matches!(err, Error::Startup(StartupError::Provisioning(_))));
        assert_eq!(
            err.to_string(),
            "startup error: provisioning failed: no credentials"
        );
    }

    #[test]
    fn invalid_state_display() {
        let err = Error::InvalidState {
            operation: "shutdown",
            state: "running",
        };
        assert_eq!(err.to_string(), "cannot shutdown while connector is running");
    }

    #[test]
    fn error_kind_code_roundtrip() {
        for kind in ConnectorErrorKind::ALL {
            assert_eq!(ConnectorErrorKind::from_code(kind.code()), kind);
        }
    }

    #[test]
    fn unknown_code_is_unrecognized() {
        let kind = ConnectorErrorKind::from_code(999);
        assert_eq!(kind, ConnectorErrorKind::Unrecognized);
        assert_eq!(kind.to_string(), "UNKNOWN");
    }

    #[test]
    fn error_kind_names_match_client_log_names() {
        assert_eq!(
            ConnectorErrorKind::from_code(6).as_str(),
            "ConnectNetworkError"
        );
        assert_eq!(
            ConnectorErrorKind::DnsResolvingFailed.as_str(),
            "ConnectDnsResolvingFailed"
        );
        assert_eq!(
            ConnectorErrorKind::UpdateInvalidHash.as_str(),
            "UpdateErrorInvalidHash"
        );
    }

    #[test]
    fn update_kinds_are_flagged() {
        assert!(ConnectorErrorKind::UpdateUriNotFound.is_update());
        assert!(!ConnectorErrorKind::Timeout.is_update());
        assert!(!ConnectorErrorKind::Unrecognized.is_update());
    }
}
