use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::error::CoreError;

/// Identifiers at or below this value are reserved by the host.
pub const MIN_VM_ID_EXCLUSIVE: u32 = 100;

/// Largest identifier the control tool accepts (32-bit, found by trial).
pub const DEFAULT_MAX_VM_ID: u32 = 2_147_483_644;

/// Numeric handle distinguishing one VM from another on a host.
///
/// A `VmId` can only be obtained through [`IdentifierValidator`], so every
/// value that reaches a privileged invocation has passed the range check
/// against the configured maximum. It serializes as a string and is never
/// deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct VmId(u32);

impl VmId {
    /// Returns the numeric value.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<VmId> for String {
    fn from(id: VmId) -> Self {
        id.to_string()
    }
}

/// The single gate every identifier passes before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierValidator {
    max_id: u32,
}

impl IdentifierValidator {
    /// Create a validator accepting identifiers in `(100, max_id]`.
    #[must_use]
    pub const fn new(max_id: u32) -> Self {
        Self { max_id }
    }

    /// Upper bound accepted by this validator.
    #[must_use]
    pub const fn max_id(&self) -> u32 {
        self.max_id
    }

    /// Parse and range-check a candidate identifier.
    ///
    /// Surrounding whitespace is ignored; anything else that is not an ASCII
    /// digit is rejected. Leading zeros are accepted and dropped from the
    /// canonical form.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidIdentifier`] if the input is not numeric,
    /// is at most 100, or exceeds the configured maximum.
    pub fn validate(&self, raw: &str) -> Result<VmId, CoreError> {
        let trimmed = raw.trim();
        let invalid = |reason: &str| CoreError::InvalidIdentifier {
            raw: raw.to_owned(),
            reason: reason.to_owned(),
        };

        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("VM id must be numeric"));
        }

        // Digit-only strings only fail to parse on overflow.
        let value: u64 = trimmed
            .parse()
            .map_err(|_| invalid("specify a smaller VM id"))?;

        if value <= u64::from(MIN_VM_ID_EXCLUSIVE) {
            return Err(invalid("VM id must be greater than 100"));
        }
        if value > u64::from(self.max_id) {
            return Err(invalid("specify a smaller VM id"));
        }

        let id = u32::try_from(value).map_err(|_| invalid("specify a smaller VM id"))?;
        Ok(VmId(id))
    }

    /// Derive an identifier from an allocated address and validate it.
    ///
    /// The identifier is the third and fourth octets written one after the
    /// other, so `10.1.100.5` becomes `1005`.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidIdentifier`] when the derived value is out
    /// of range (for example `10.1.1.2` derives `12`).
    pub fn derive_from_address(&self, address: Ipv4Addr) -> Result<VmId, CoreError> {
        let [_, _, third, fourth] = address.octets();
        self.validate(&format!("{third}{fourth}"))
    }
}

impl Default for IdentifierValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VM_ID)
    }
}
