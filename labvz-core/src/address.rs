//! Address allocation over the configured subnets.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::error::CoreError;

/// Return the first free host address across `subnets`.
///
/// Subnets are scanned in the given order and each one in ascending numeric
/// order. Network and broadcast addresses are never returned, nor is any
/// address in `used`. The result depends only on the inputs, so `used` must be
/// a snapshot taken under whatever lock guards the address space.
///
/// # Errors
/// Returns [`CoreError::NoAddressAvailable`] if every candidate is taken.
///
/// # Complexity
/// O(n) in the total number of addresses in `subnets`.
pub fn find_available_address(
    subnets: &[Ipv4Network],
    used: &HashSet<Ipv4Addr>,
) -> Result<Ipv4Addr, CoreError> {
    subnets
        .iter()
        .flat_map(|subnet| {
            let (network, broadcast) = (subnet.network(), subnet.broadcast());
            subnet
                .iter()
                .filter(move |ip| *ip != network && *ip != broadcast)
        })
        .find(|ip| !used.contains(ip))
        .ok_or_else(|| CoreError::NoAddressAvailable {
            subnets: subnets.to_vec(),
        })
}
