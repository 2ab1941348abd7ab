use ipnetwork::Ipv4Network;

/// Errors produced by the `labvz-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A VM identifier was malformed or outside `(100, max]`.
    #[error("invalid VM id '{raw}': {reason}")]
    InvalidIdentifier { raw: String, reason: String },

    /// Every address in every configured subnet is taken.
    #[error("no available address in subnets {}", format_subnets(.subnets))]
    NoAddressAvailable { subnets: Vec<Ipv4Network> },

    /// The requested OS/version pair has no template.
    #[error("unsupported OS template: os '{os}' version '{version}'")]
    UnsupportedTemplate { os: String, version: String },

    /// A provisioning configuration field failed validation.
    #[error("invalid configuration field '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },
}

fn format_subnets(subnets: &[Ipv4Network]) -> String {
    subnets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
