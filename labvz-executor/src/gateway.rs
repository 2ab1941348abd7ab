//! Serialized access to the live listing and the address space.
//!
//! Reading the listing and claiming an address happen under one lock, and a
//! claimed address stays reserved until its [`Claim`] is dropped. Two
//! concurrent requests therefore never see the same address as free, even
//! while the first VM is still being created and is not yet listed.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use ipnetwork::Ipv4Network;
use labvz_core::{find_available_address, IdentifierValidator, VmId};
use tokio::sync::Mutex;

use crate::backend::ControlTool;
use crate::listing::Listing;
use crate::ExecutorError;

#[derive(Debug, Default)]
struct Reservations {
    addresses: HashSet<Ipv4Addr>,
    ids: HashSet<VmId>,
}

/// An address and identifier held for one in-flight create.
///
/// Dropping the claim releases both.
#[derive(Debug)]
pub struct Claim {
    id: VmId,
    address: Ipv4Addr,
    table: Arc<StdMutex<Reservations>>,
}

impl Claim {
    /// Identifier reserved for the new VM.
    #[must_use]
    pub fn id(&self) -> VmId {
        self.id
    }

    /// Address reserved for the new VM.
    #[must_use]
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.addresses.remove(&self.address);
        table.ids.remove(&self.id);
        tracing::debug!(vm_id = %self.id, address = %self.address, "released claim");
    }
}

/// Single owner of listing reads and address claims.
#[derive(Debug, Default)]
pub struct AllocationGateway {
    lock: Mutex<()>,
    reservations: Arc<StdMutex<Reservations>>,
}

impl AllocationGateway {
    /// Create a gateway with no reservations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the live listing.
    ///
    /// # Errors
    /// Propagates listing tool failures.
    pub async fn snapshot<T: ControlTool + ?Sized>(
        &self,
        tool: &T,
    ) -> Result<Listing, ExecutorError> {
        let _guard = self.lock.lock().await;
        Ok(Listing::parse(&tool.list().await?))
    }

    /// Choose and reserve an address and identifier for a new VM.
    ///
    /// With `requested` unset, the identifier is derived from the chosen
    /// address and validated like any caller-supplied identifier. An address
    /// whose derived identifier is already listed or reserved is skipped.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Core`] wrapping `NoAddressAvailable` or
    /// `InvalidIdentifier`, [`ExecutorError::IdentifierInUse`] if the
    /// requested identifier is listed or already reserved, and propagates
    /// listing tool failures.
    pub async fn claim<T: ControlTool + ?Sized>(
        &self,
        tool: &T,
        subnets: &[Ipv4Network],
        validator: &IdentifierValidator,
        requested: Option<VmId>,
    ) -> Result<Claim, ExecutorError> {
        let _guard = self.lock.lock().await;
        let listing = Listing::parse(&tool.list().await?);

        let mut table = self.reservations.lock().unwrap_or_else(PoisonError::into_inner);
        let held = |id: VmId| listing.contains(id) || table.ids.contains(&id);

        if let Some(id) = requested {
            if held(id) {
                return Err(ExecutorError::IdentifierInUse(id));
            }
        }

        let mut used = listing.used_addresses();
        used.extend(table.addresses.iter().copied());
        let (id, address) = loop {
            let address = find_available_address(subnets, &used)?;
            let id = match requested {
                Some(id) => id,
                None => validator.derive_from_address(address)?,
            };
            if requested.is_none() && held(id) {
                tracing::debug!(vm_id = %id, %address, "derived id taken");
                used.insert(address);
                continue;
            }
            break (id, address);
        };

        table.addresses.insert(address);
        table.ids.insert(id);
        tracing::debug!(vm_id = %id, %address, "claimed");

        Ok(Claim {
            id,
            address,
            table: Arc::clone(&self.reservations),
        })
    }

    /// Number of claims currently held.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.reservations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .len()
    }
}
