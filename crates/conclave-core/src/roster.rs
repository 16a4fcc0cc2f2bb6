//! Room-wide user roster.
//!
//! Users appear in the roster when the engine sees them in the room and
//! disappear when they leave it. Channels consult the roster for public keys
//! when inviting.

use std::collections::BTreeMap;

use crate::{error::ProtocolViolation, identity::PublicKey, participant::Participant};

/// Users currently present in the room, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    users: BTreeMap<String, Participant>,
}

impl Roster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with their key.
    pub fn add(&mut self, name: &str, public_key: PublicKey) -> Result<&Participant, ProtocolViolation> {
        if self.users.contains_key(name) {
            return Err(ProtocolViolation::UserExists { name: name.to_owned() });
        }
        let user = self
            .users
            .entry(name.to_owned())
            .or_insert_with(|| Participant::new(name).with_public_key(public_key));
        Ok(user)
    }

    /// Remove a user.
    pub fn remove(&mut self, name: &str) -> Result<Participant, ProtocolViolation> {
        self.users.remove(name).ok_or_else(|| ProtocolViolation::UnknownUser { name: name.to_owned() })
    }

    /// Look up a user.
    pub fn get(&self, name: &str) -> Option<&Participant> {
        self.users.get(name)
    }

    /// True if the user is present.
    pub fn contains(&self, name: &str) -> bool {
        self.users.contains_key(name)
    }

    /// Key of a present user.
    pub fn public_key(&self, name: &str) -> Option<&PublicKey> {
        self.users.get(name).and_then(Participant::public_key)
    }

    /// Present users in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.users.values()
    }

    /// Names of present users in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Number of present users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True if nobody is present.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Forget everyone.
    pub fn clear(&mut self) {
        self.users.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> PublicKey {
        PublicKey::from_bytes(vec![byte; 32])
    }

    #[test]
    fn duplicate_user_is_violation() {
        let mut roster = Roster::new();
        assert!(roster.add("bob", key(1)).is_ok());
        assert_eq!(
            roster.add("bob", key(2)).map(|_| ()),
            Err(ProtocolViolation::UserExists { name: "bob".into() })
        );
        assert_eq!(roster.public_key("bob"), Some(&key(1)));
    }

    #[test]
    fn removing_absent_user_is_violation() {
        let mut roster = Roster::new();
        assert_eq!(
            roster.remove("ghost").map(|_| ()),
            Err(ProtocolViolation::UnknownUser { name: "ghost".into() })
        );
    }

    #[test]
    fn names_are_sorted() {
        let mut roster = Roster::new();
        roster.add("carol", key(3)).ok();
        roster.add("alice", key(1)).ok();
        assert_eq!(roster.names().collect::<Vec<_>>(), vec!["alice", "carol"]);
    }
}
