//! Per-user record, used both in the room roster and inside each channel.
//!
//! A participant's channel membership moves through
//! `Known → Invited → Joined → InChat`. Leaving is not a state: the record is
//! removed from its container. The set of users that have authorized this
//! participant always contains the participant's own name.

use std::collections::BTreeSet;

use crate::{error::ProtocolViolation, identity::PublicKey};

/// Membership stage of a participant within a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MembershipState {
    /// Present without any channel relationship (room roster entries).
    Known,
    /// Invited but not yet a member.
    Invited,
    /// Member of the channel.
    Joined,
    /// Member taking part in the channel's chat.
    InChat,
}

/// A user as seen by the local client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    name: String,
    public_key: Option<PublicKey>,
    key_conflict: bool,
    invited: bool,
    joined: bool,
    in_chat: bool,
    ever_joined: bool,
    promoted: bool,
    authentication_failed: bool,
    authorized_by: BTreeSet<String>,
}

impl Participant {
    /// Create a participant that has authorized only itself.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let authorized_by = BTreeSet::from([name.clone()]);
        Self {
            name,
            public_key: None,
            key_conflict: false,
            invited: false,
            joined: false,
            in_chat: false,
            ever_joined: false,
            promoted: false,
            authentication_failed: false,
            authorized_by,
        }
    }

    /// Attach a known public key at construction.
    pub fn with_public_key(mut self, key: PublicKey) -> Self {
        self.public_key = Some(key);
        self
    }

    /// Username.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First public key reported for this user, if any.
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    /// Record the user's public key.
    ///
    /// The first key wins. A later, different key is rejected and flags the
    /// participant as having presented conflicting keys.
    pub fn set_public_key(&mut self, key: PublicKey) -> Result<(), ProtocolViolation> {
        match &self.public_key {
            None => {
                self.public_key = Some(key);
                Ok(())
            },
            Some(existing) if *existing == key => Ok(()),
            Some(_) => {
                self.key_conflict = true;
                Err(ProtocolViolation::KeyMismatch { name: self.name.clone() })
            },
        }
    }

    /// True once a second, different key has been seen.
    pub fn has_key_conflict(&self) -> bool {
        self.key_conflict
    }

    /// Record a pending invitation.
    pub fn mark_invited(&mut self) {
        self.invited = true;
    }

    /// Withdraw a pending invitation. No-op for full members.
    pub fn mark_not_invited(&mut self) {
        if !self.joined {
            self.invited = false;
        }
    }

    /// Become a member. Clears any pending invitation.
    pub fn mark_joined(&mut self) {
        self.joined = true;
        self.ever_joined = true;
        self.invited = false;
    }

    /// Leave membership and chat.
    pub fn mark_not_joined(&mut self) {
        self.joined = false;
        self.in_chat = false;
    }

    /// Chat membership implies channel membership.
    pub fn mark_in_chat(&mut self) {
        self.mark_joined();
        self.in_chat = true;
    }

    /// Invitation pending.
    pub fn is_invited(&self) -> bool {
        self.invited
    }

    /// Channel member.
    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Taking part in the chat.
    pub fn is_in_chat(&self) -> bool {
        self.in_chat
    }

    /// True if this participant never became a member, not even briefly.
    pub fn never_started_joining(&self) -> bool {
        !self.ever_joined
    }

    /// Set the promotion flag.
    pub fn set_promoted(&mut self, promoted: bool) {
        self.promoted = promoted;
    }

    /// Promotion flag.
    pub fn is_promoted(&self) -> bool {
        self.promoted
    }

    /// Record a failed key authentication.
    pub fn mark_authentication_failed(&mut self) {
        self.authentication_failed = true;
    }

    /// True if key authentication failed.
    pub fn authentication_failed(&self) -> bool {
        self.authentication_failed
    }

    /// Record that `authorizer` vouched for this participant.
    ///
    /// Returns false if the authorization was already recorded.
    pub fn authorized_by(&mut self, authorizer: impl Into<String>) -> bool {
        self.authorized_by.insert(authorizer.into())
    }

    /// Drop an authorization, typically because the authorizer left.
    ///
    /// Self-authorization cannot be revoked.
    pub fn revoke_authorization(&mut self, authorizer: &str) -> bool {
        if authorizer == self.name {
            return false;
        }
        self.authorized_by.remove(authorizer)
    }

    /// True if `authorizer` vouched for this participant.
    pub fn was_authorized_by(&self, authorizer: &str) -> bool {
        self.authorized_by.contains(authorizer)
    }

    /// Users that have authorized this participant, including itself.
    pub fn authorizers(&self) -> &BTreeSet<String> {
        &self.authorized_by
    }

    /// True if every user in `everyone` has authorized this participant.
    pub fn is_fully_authorized<'a>(&self, everyone: impl IntoIterator<Item = &'a str>) -> bool {
        everyone.into_iter().all(|name| self.authorized_by.contains(name))
    }

    /// Current membership stage.
    pub fn state(&self) -> MembershipState {
        if self.in_chat {
            MembershipState::InChat
        } else if self.joined {
            MembershipState::Joined
        } else if self.invited {
            MembershipState::Invited
        } else {
            MembershipState::Known
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_participant_authorizes_itself() {
        let p = Participant::new("alice");
        assert!(p.was_authorized_by("alice"));
        assert_eq!(p.authorizers().len(), 1);
        assert_eq!(p.state(), MembershipState::Known);
        assert!(p.never_started_joining());
    }

    #[test]
    fn self_authorization_survives_revocation() {
        let mut p = Participant::new("alice");
        assert!(p.authorized_by("bob"));
        assert!(!p.authorized_by("bob"));
        assert!(!p.revoke_authorization("alice"));
        assert!(p.revoke_authorization("bob"));
        assert!(p.was_authorized_by("alice"));
    }

    #[test]
    fn first_public_key_wins() {
        let mut p = Participant::new("alice");
        let first = PublicKey::from_bytes(vec![1; 32]);
        let second = PublicKey::from_bytes(vec![2; 32]);

        assert!(p.set_public_key(first.clone()).is_ok());
        assert!(p.set_public_key(first.clone()).is_ok());
        assert!(!p.has_key_conflict());

        assert_eq!(
            p.set_public_key(second),
            Err(ProtocolViolation::KeyMismatch { name: "alice".into() })
        );
        assert_eq!(p.public_key(), Some(&first));
        assert!(p.has_key_conflict());
    }

    #[test]
    fn lifecycle_progresses_through_states() {
        let mut p = Participant::new("bob");
        p.mark_invited();
        assert_eq!(p.state(), MembershipState::Invited);

        p.mark_joined();
        assert_eq!(p.state(), MembershipState::Joined);
        assert!(!p.is_invited());
        assert!(!p.never_started_joining());

        p.mark_in_chat();
        assert_eq!(p.state(), MembershipState::InChat);

        p.mark_not_joined();
        assert_eq!(p.state(), MembershipState::Known);
        assert!(!p.never_started_joining());
    }

    #[test]
    fn cancelling_invitation_of_member_is_noop() {
        let mut p = Participant::new("bob");
        p.mark_joined();
        p.mark_invited();
        p.mark_not_invited();
        assert!(p.is_invited());
        assert!(p.is_joined());
    }

    #[test]
    fn full_authorization_requires_every_member() {
        let mut p = Participant::new("carol");
        let everyone = ["alice", "bob", "carol"];
        assert!(!p.is_fully_authorized(everyone));
        p.authorized_by("alice");
        assert!(!p.is_fully_authorized(everyone));
        p.authorized_by("bob");
        assert!(p.is_fully_authorized(everyone));
    }
}
