//! FrontServer client registry (spec §4.2, §5): a many-readers /
//! exclusive-writer map keyed by long-term public key, following the peer
//! map in the relay server this was adapted from
//! (`Arc<RwLock<HashMap<String, RelayPeerSession>>>`), generalized to the
//! client record this protocol needs and generic over the address type so
//! the registry doesn't care whether "address" is a socket or, as in the
//! in-process simulation harness, a channel handle.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::crypto::PublicKeyBytes;

#[derive(Debug, Clone)]
pub struct ClientRegistration<Addr> {
    pub public_key: PublicKeyBytes,
    pub address: Addr,
    pub display_name: String,
}

/// Outcome of a registration attempt (spec §7 `RegistrationCollision`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// No prior entry for this public key.
    New,
    /// An entry existed; its address was refreshed, its key retained.
    AddressUpdated,
    /// An entry existed with an identical address; nothing changed.
    Unchanged,
}

pub struct Registry<Addr> {
    entries: RwLock<HashMap<PublicKeyBytes, ClientRegistration<Addr>>>,
}

impl<Addr: Clone + PartialEq> Registry<Addr> {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Register or update a client. Duplicate registrations are
    /// de-duplicated by public key (spec §4.2); an address change for an
    /// already-known key is a `RegistrationCollision` per §7 — handled
    /// here by updating the address and retaining the key.
    pub fn register(
        &self,
        public_key: PublicKeyBytes,
        address: Addr,
        display_name: String,
    ) -> RegistrationOutcome {
        let mut entries = self.entries.write();
        match entries.get_mut(&public_key) {
            None => {
                entries.insert(public_key, ClientRegistration { public_key, address, display_name });
                RegistrationOutcome::New
            }
            Some(existing) => {
                if existing.address == address {
                    RegistrationOutcome::Unchanged
                } else {
                    existing.address = address;
                    existing.display_name = display_name;
                    RegistrationOutcome::AddressUpdated
                }
            }
        }
    }

    pub fn get(&self, public_key: &PublicKeyBytes) -> Option<ClientRegistration<Addr>> {
        self.entries.read().get(public_key).cloned()
    }

    pub fn contains(&self, public_key: &PublicKeyBytes) -> bool {
        self.entries.read().contains_key(public_key)
    }

    /// Snapshot of every registered client, e.g. for the round-start
    /// broadcast.
    pub fn all(&self) -> Vec<ClientRegistration<Addr>> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<Addr: Clone + PartialEq> Default for Registry<Addr> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(byte: u8) -> PublicKeyBytes {
        PublicKeyBytes([byte; 32])
    }

    #[test]
    fn first_registration_is_new() {
        let reg: Registry<u32> = Registry::new();
        assert_eq!(reg.register(pk(1), 100, "alice".into()), RegistrationOutcome::New);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn same_key_same_address_is_unchanged() {
        let reg: Registry<u32> = Registry::new();
        reg.register(pk(1), 100, "alice".into());
        assert_eq!(
            reg.register(pk(1), 100, "alice".into()),
            RegistrationOutcome::Unchanged
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn same_key_new_address_updates_in_place() {
        let reg: Registry<u32> = Registry::new();
        reg.register(pk(1), 100, "alice".into());
        assert_eq!(
            reg.register(pk(1), 200, "alice".into()),
            RegistrationOutcome::AddressUpdated
        );
        assert_eq!(reg.get(&pk(1)).unwrap().address, 200);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn distinct_keys_are_distinct_entries() {
        let reg: Registry<u32> = Registry::new();
        reg.register(pk(1), 100, "alice".into());
        reg.register(pk(2), 101, "bob".into());
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.all().len(), 2);
    }
}
