use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Identity of one session participant. Id zero is reserved for the
/// system/fallback owner every entity starts out with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantId(pub u32);

impl ParticipantId {
    pub const SYSTEM: ParticipantId = ParticipantId(0);

    pub fn is_system(self) -> bool {
        self == Self::SYSTEM
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_system() {
            write!(f, "system")
        } else {
            write!(f, "participant-{}", self.0)
        }
    }
}

/// Stable network identifier of a replicated entity, distinct from any
/// session-local entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId(Uuid);

impl NetworkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NetworkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Ownership capability of the external replication layer.
///
/// `claim` is a request, not a guarantee: a concurrent claim from another
/// participant may win, and the authoritative outcome arrives later through
/// `apply_owner`. The arbitration core stays correct either way.
pub trait Replication {
    fn local_participant(&self) -> ParticipantId;
    fn owner_of(&self, id: NetworkId) -> ParticipantId;
    /// Best-effort ownership transfer to the local participant.
    fn claim(&mut self, id: NetworkId);
    /// Soft takeover: claims only while the owner is still the system
    /// identity, so it never competes with a real participant.
    fn force_claim(&mut self, id: NetworkId);
    /// Host-applied authoritative update, e.g. a remote claim that won.
    fn apply_owner(&mut self, id: NetworkId, owner: ParticipantId);

    fn is_local(&self, id: NetworkId) -> bool {
        self.owner_of(id) == self.local_participant()
    }
}

/// Last-writer-wins ownership table. Serves as the single-process binding of
/// [`Replication`]; a networked deployment replaces it with an adapter over
/// the real transport.
pub struct SessionReplication {
    local: ParticipantId,
    owners: HashMap<NetworkId, ParticipantId>,
}

impl SessionReplication {
    pub fn new(local: ParticipantId) -> Self {
        Self { local, owners: HashMap::new() }
    }
}

impl Replication for SessionReplication {
    fn local_participant(&self) -> ParticipantId {
        self.local
    }

    fn owner_of(&self, id: NetworkId) -> ParticipantId {
        self.owners.get(&id).copied().unwrap_or(ParticipantId::SYSTEM)
    }

    fn claim(&mut self, id: NetworkId) {
        self.owners.insert(id, self.local);
    }

    fn force_claim(&mut self, id: NetworkId) {
        if self.owner_of(id).is_system() {
            self.owners.insert(id, self.local);
        }
    }

    fn apply_owner(&mut self, id: NetworkId, owner: ParticipantId) {
        self.owners.insert(id, owner);
    }
}
