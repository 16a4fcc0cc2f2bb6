//! A multiparty encrypted sub-conversation inside a room.
//!
//! # Responsibilities
//!
//! - Own the channel's membership and each member's trust state
//! - Apply channel-scoped engine callbacks in delivery order
//! - Validate local channel commands before they reach the engine
//!
//! # Self-destruct
//!
//! A channel with no members, or one the local user has left, has no reason
//! to exist. The channel only flags itself as destroyed; the owning
//! [`crate::Room`] erases it once the current dispatch is finished, so a
//! callback that iterates members never observes its container vanishing.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::{
    action::{EngineCommand, RoomAction, Scope},
    config::RoomConfig,
    error::{CommandError, ProtocolViolation},
    event::ChannelEvent,
    identity::PublicKey,
    ids::ChannelId,
    participant::{MembershipState, Participant},
};

/// Channel state owned by a room.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Engine handle.
    id: ChannelId,
    /// Sanitized local username.
    local_user: String,
    /// Members and invitees, keyed by name.
    participants: BTreeMap<String, Participant>,
    /// Votes to kick, keyed by victim.
    votekicks: BTreeMap<String, BTreeSet<String>>,
    /// Reset promotion whenever membership grows.
    demote_on_join: bool,
    /// Set once the channel should be erased by its room.
    destroyed: bool,
}

impl Channel {
    /// Create an empty channel for an engine handle.
    pub fn new(id: ChannelId, local_user: impl Into<String>, config: &RoomConfig) -> Self {
        Self {
            id,
            local_user: local_user.into(),
            participants: BTreeMap::new(),
            votekicks: BTreeMap::new(),
            demote_on_join: config.demote_on_join,
            destroyed: false,
        }
    }

    /// Engine handle.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Display name derived from the handle.
    pub fn name(&self) -> String {
        format!("channel {}", self.id)
    }

    /// Sanitized local username.
    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    /// Look up a participant.
    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.get(name)
    }

    /// Participants in name order.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Participants that are channel members, invitees excluded.
    pub fn members(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values().filter(|participant| participant.is_joined())
    }

    /// Participant names in order.
    pub fn participant_names(&self) -> impl Iterator<Item = &str> {
        self.participants.keys().map(String::as_str)
    }

    /// Number of participants, invitees included.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// True if nobody is left.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// True if `name` is a participant or invitee.
    pub fn contains(&self, name: &str) -> bool {
        self.participants.contains_key(name)
    }

    /// True if the local user is a member.
    pub fn is_joined(&self) -> bool {
        self.participant(&self.local_user).is_some_and(Participant::is_joined)
    }

    /// True once the room should erase this channel.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Users currently voting to kick `victim`.
    pub fn votekicks_against(&self, victim: &str) -> Option<&BTreeSet<String>> {
        self.votekicks.get(victim)
    }

    /// Add a participant that is not yet present.
    pub fn add_participant(
        &mut self,
        name: &str,
        public_key: Option<PublicKey>,
    ) -> Result<&mut Participant, ProtocolViolation> {
        if self.participants.contains_key(name) {
            return Err(ProtocolViolation::ParticipantExists { channel: self.id, name: name.to_owned() });
        }
        let mut participant = Participant::new(name);
        if let Some(key) = public_key {
            participant = participant.with_public_key(key);
        }
        Ok(self.participants.entry(name.to_owned()).or_insert(participant))
    }

    /// Flag this channel for removal by its room.
    pub fn self_destruct(&mut self) {
        if !self.destroyed {
            debug!(channel = %self.id, "channel self-destructing");
        }
        self.destroyed = true;
    }

    /// Apply an engine callback. On error nothing has been mutated.
    pub fn apply(&mut self, event: ChannelEvent) -> Result<Vec<RoomAction>, ProtocolViolation> {
        match event {
            ChannelEvent::UserJoined { name } => self.user_joined(&name),
            ChannelEvent::UserLeft { name } => self.user_left(&name),
            ChannelEvent::UserAuthenticated { name, public_key } => {
                self.user_authenticated(&name, public_key)
            },
            ChannelEvent::UserAuthenticationFailed { name } => self.user_authentication_failed(&name),
            ChannelEvent::UserAuthorizedBy { authorizer, target } => {
                self.user_authorized_by(&authorizer, &target)
            },
            ChannelEvent::UserPromoted { name } => self.user_promoted(&name),
            ChannelEvent::UserInvited { inviter, invitee } => Ok(self.user_invited(&inviter, &invitee)),
            ChannelEvent::InvitationCancelled { inviter, invitee, still_invited } => {
                self.invitation_cancelled(&inviter, &invitee, still_invited)
            },
            ChannelEvent::MessageReceived { sender, text } => Ok(self.message_received(sender, text)),
            ChannelEvent::Joined => Ok(self.joined()),
            ChannelEvent::Authorized => self.authorized(),
            ChannelEvent::JoinedChat => Ok(self.joined_chat()),
            ChannelEvent::UserJoinedChat { name } => self.user_joined_chat(&name),
            ChannelEvent::Left => Ok(self.left()),
            ChannelEvent::VotekickRegistered { kicker, victim, kicked } => {
                self.votekick_registered(&kicker, &victim, kicked)
            },
        }
    }

    /// A user became a member.
    ///
    /// An invitee is upgraded in place. With `demote_on_join` every existing
    /// participant loses its promotion, since the new member has not vouched
    /// for anyone yet.
    pub fn user_joined(&mut self, name: &str) -> Result<Vec<RoomAction>, ProtocolViolation> {
        if self.participant(name).is_some_and(Participant::is_joined) {
            return Err(ProtocolViolation::ParticipantExists { channel: self.id, name: name.to_owned() });
        }

        if self.demote_on_join {
            for participant in self.participants.values_mut() {
                participant.set_promoted(false);
            }
        }

        let participant =
            self.participants.entry(name.to_owned()).or_insert_with(|| Participant::new(name));
        participant.set_promoted(false);
        participant.mark_joined();

        debug!(channel = %self.id, user = name, "user joined channel");
        Ok(vec![
            RoomAction::info(Some(self.id), format!("{name} joined the channel")),
            RoomAction::Changed(Scope::Channel(self.id)),
        ])
    }

    /// A user left. Empties trigger self-destruct.
    pub fn user_left(&mut self, name: &str) -> Result<Vec<RoomAction>, ProtocolViolation> {
        if !self.contains(name) {
            return Err(self.unknown(name));
        }
        Ok(self.remove_participant(name))
    }

    /// Remove a participant if present, with the same effects as
    /// [`Self::user_left`]. Used when a user leaves the whole room.
    pub fn remove_participant(&mut self, name: &str) -> Vec<RoomAction> {
        if !self.purge(name) {
            return Vec::new();
        }
        debug!(channel = %self.id, user = name, "user left channel");
        vec![
            RoomAction::info(Some(self.id), format!("{name} left the channel")),
            RoomAction::Changed(Scope::Channel(self.id)),
        ]
    }

    /// Record a user's authenticated key.
    ///
    /// A key different from the one on record is not an error for the
    /// caller: the first key stays, the participant is flagged with a key
    /// conflict and a warning is shown alongside the change.
    pub fn user_authenticated(
        &mut self,
        name: &str,
        public_key: PublicKey,
    ) -> Result<Vec<RoomAction>, ProtocolViolation> {
        let id = self.id;
        let mut actions = Vec::new();
        if let Err(violation) = self.participant_mut(name)?.set_public_key(public_key) {
            warn!(channel = %id, user = name, %violation, "conflicting public key");
            actions.push(RoomAction::warning(Some(id), format!("protocol violation: {violation}")));
        }
        actions.push(RoomAction::participant_changed(Some(id), name));
        Ok(actions)
    }

    /// Record a failed key authentication.
    pub fn user_authentication_failed(&mut self, name: &str) -> Result<Vec<RoomAction>, ProtocolViolation> {
        let id = self.id;
        self.participant_mut(name)?.mark_authentication_failed();
        Ok(vec![
            RoomAction::error(Some(id), format!("authentication of {name} failed")),
            RoomAction::participant_changed(Some(id), name),
        ])
    }

    /// `authorizer` vouched for `target`. Both must be present.
    pub fn user_authorized_by(
        &mut self,
        authorizer: &str,
        target: &str,
    ) -> Result<Vec<RoomAction>, ProtocolViolation> {
        if !self.contains(authorizer) {
            return Err(self.unknown(authorizer));
        }
        let id = self.id;
        self.participant_mut(target)?.authorized_by(authorizer);
        Ok(vec![RoomAction::participant_changed(Some(id), target)])
    }

    /// A participant became fully trusted.
    pub fn user_promoted(&mut self, name: &str) -> Result<Vec<RoomAction>, ProtocolViolation> {
        let id = self.id;
        self.participant_mut(name)?.set_promoted(true);
        Ok(vec![
            RoomAction::info(Some(id), format!("{name} is now a full participant")),
            RoomAction::participant_changed(Some(id), name),
        ])
    }

    /// The local user became fully trusted.
    pub fn authorized(&mut self) -> Result<Vec<RoomAction>, ProtocolViolation> {
        let id = self.id;
        let local = self.local_user.clone();
        self.participant_mut(&local)?.set_promoted(true);
        Ok(vec![
            RoomAction::info(Some(id), "you are now a full participant"),
            RoomAction::participant_changed(Some(id), local),
        ])
    }

    /// `inviter` invited `invitee`, who is added if unknown.
    pub fn user_invited(&mut self, inviter: &str, invitee: &str) -> Vec<RoomAction> {
        self.participants
            .entry(invitee.to_owned())
            .or_insert_with(|| Participant::new(invitee))
            .mark_invited();

        debug!(channel = %self.id, inviter, invitee, "user invited");
        vec![
            RoomAction::info(Some(self.id), format!("{inviter} invited {invitee}")),
            RoomAction::Changed(Scope::Channel(self.id)),
        ]
    }

    /// An invitation was withdrawn.
    ///
    /// If the engine still lists `invitee` as invited, a newer invitation
    /// raced the cancellation and nothing changes. Otherwise the invitee
    /// loses its invited flag and, having no other relationship with the
    /// channel, is removed.
    pub fn invitation_cancelled(
        &mut self,
        inviter: &str,
        invitee: &str,
        still_invited: bool,
    ) -> Result<Vec<RoomAction>, ProtocolViolation> {
        let id = self.id;
        let participant = self.participant_mut(invitee)?;
        if still_invited {
            debug!(channel = %id, invitee, "invitation cancelled but re-invited since");
            return Ok(Vec::new());
        }

        participant.mark_not_invited();
        if participant.state() == MembershipState::Known {
            self.purge(invitee);
        }

        Ok(vec![
            RoomAction::info(Some(id), format!("{inviter} cancelled the invitation of {invitee}")),
            RoomAction::Changed(Scope::Channel(id)),
        ])
    }

    /// Pass a decrypted message to presentation.
    pub fn message_received(&self, sender: String, text: String) -> Vec<RoomAction> {
        vec![RoomAction::Display { channel: Some(self.id), sender, text }]
    }

    /// The local user became a member.
    pub fn joined(&mut self) -> Vec<RoomAction> {
        self.local_mut().mark_joined();
        debug!(channel = %self.id, "joined channel");
        vec![
            RoomAction::info(Some(self.id), format!("you joined {}", self.name())),
            RoomAction::Changed(Scope::Channel(self.id)),
        ]
    }

    /// The local user entered the chat.
    pub fn joined_chat(&mut self) -> Vec<RoomAction> {
        self.local_mut().mark_in_chat();
        let local = self.local_user.clone();
        vec![RoomAction::participant_changed(Some(self.id), local)]
    }

    /// Another participant entered the chat.
    pub fn user_joined_chat(&mut self, name: &str) -> Result<Vec<RoomAction>, ProtocolViolation> {
        let id = self.id;
        self.participant_mut(name)?.mark_in_chat();
        Ok(vec![RoomAction::participant_changed(Some(id), name)])
    }

    /// The engine confirmed the local user's departure.
    ///
    /// Always self-destructs. If the local user never got as far as joining,
    /// the view is closed as well.
    pub fn left(&mut self) -> Vec<RoomAction> {
        let local = self.local_user.clone();
        let never_joined = self.participant(&local).is_none_or(Participant::never_started_joining);
        if let Some(participant) = self.participants.get_mut(&local) {
            participant.mark_not_joined();
        }

        let mut actions = Vec::new();
        if never_joined {
            actions.push(RoomAction::CloseView { channel: self.id });
        }
        actions.push(RoomAction::info(Some(self.id), format!("you left {}", self.name())));
        self.self_destruct();
        actions
    }

    /// Track a vote to kick `victim`, or its withdrawal.
    pub fn votekick_registered(
        &mut self,
        kicker: &str,
        victim: &str,
        kicked: bool,
    ) -> Result<Vec<RoomAction>, ProtocolViolation> {
        if !self.contains(kicker) {
            return Err(self.unknown(kicker));
        }
        if !self.contains(victim) {
            return Err(self.unknown(victim));
        }

        let message = if kicked {
            self.votekicks.entry(victim.to_owned()).or_default().insert(kicker.to_owned());
            format!("{kicker} voted to kick {victim}")
        } else {
            if let Some(kickers) = self.votekicks.get_mut(victim) {
                kickers.remove(kicker);
                if kickers.is_empty() {
                    self.votekicks.remove(victim);
                }
            }
            format!("{kicker} withdrew the vote to kick {victim}")
        };

        Ok(vec![
            RoomAction::info(Some(self.id), message),
            RoomAction::participant_changed(Some(self.id), victim),
        ])
    }

    /// True iff every member has been authorized by every member.
    ///
    /// Invitees are not members yet and neither count nor vote here.
    pub fn everyone_promoted_everyone(&self) -> bool {
        let members: BTreeSet<&str> = self.members().map(Participant::name).collect();
        self.members().all(|participant| {
            participant.authorizers().iter().filter(|name| members.contains(name.as_str())).count() == members.len()
                && participant.is_fully_authorized(members.iter().copied())
        })
    }

    /// Validate an outgoing chat line.
    pub fn send_chat_message(&self, text: String) -> Result<Vec<RoomAction>, CommandError> {
        if !self.is_joined() {
            return Err(CommandError::NotJoined);
        }
        Ok(vec![RoomAction::Engine(EngineCommand::SendChat { channel: Some(self.id), text })])
    }

    /// Validate an invitation into this channel.
    ///
    /// `public_key` is the invitee's key as known to the room roster.
    pub fn invite(&self, name: &str, public_key: Option<&PublicKey>) -> Result<Vec<RoomAction>, CommandError> {
        if name == self.local_user {
            return Err(CommandError::SelfTarget { operation: "invite" });
        }
        if !self.is_joined() {
            return Err(CommandError::NotJoined);
        }
        if self.participant(name).is_some_and(Participant::is_joined) {
            return Err(CommandError::AlreadyParticipant { name: name.to_owned() });
        }
        let public_key = public_key.ok_or_else(|| CommandError::UnknownUser { name: name.to_owned() })?;

        Ok(vec![RoomAction::Engine(EngineCommand::Invite {
            channel: self.id,
            name: name.to_owned(),
            public_key: public_key.clone(),
        })])
    }

    /// Validate a request to join this channel.
    pub fn join(&self) -> Result<Vec<RoomAction>, CommandError> {
        if self.is_joined() {
            return Err(CommandError::AlreadyJoined { channel: self.id });
        }
        Ok(vec![RoomAction::Engine(EngineCommand::JoinChannel { channel: self.id })])
    }

    /// Validate vouching for a participant.
    pub fn authorize(&self, name: &str) -> Result<Vec<RoomAction>, CommandError> {
        if name == self.local_user {
            return Err(CommandError::SelfTarget { operation: "authorize" });
        }
        if !self.contains(name) {
            return Err(CommandError::UnknownUser { name: name.to_owned() });
        }
        if !self.is_joined() {
            return Err(CommandError::NotJoined);
        }
        Ok(vec![RoomAction::Engine(EngineCommand::Authorize {
            channel: Some(self.id),
            name: name.to_owned(),
        })])
    }

    /// One line per joined participant, with its trust markers.
    pub fn list_participants(&self) -> Vec<String> {
        self.participants
            .values()
            .filter(|participant| participant.is_joined())
            .map(|participant| self.describe(participant))
            .collect()
    }

    fn describe(&self, participant: &Participant) -> String {
        let mut line = participant.name().to_owned();
        if participant.name() == self.local_user {
            line.push_str(" (you)");
        }
        if participant.is_in_chat() {
            line.push_str(" [in chat]");
        }
        if participant.is_promoted() {
            line.push_str(" [promoted]");
        }
        if participant.authentication_failed() {
            line.push_str(" [authentication failed]");
        }
        if participant.has_key_conflict() {
            line.push_str(" [key conflict]");
        }
        line
    }

    fn participant_mut(&mut self, name: &str) -> Result<&mut Participant, ProtocolViolation> {
        let id = self.id;
        self.participants
            .get_mut(name)
            .ok_or_else(|| ProtocolViolation::UnknownParticipant { channel: id, name: name.to_owned() })
    }

    fn local_mut(&mut self) -> &mut Participant {
        let local = self.local_user.clone();
        self.participants.entry(local.clone()).or_insert_with(|| Participant::new(local))
    }

    fn unknown(&self, name: &str) -> ProtocolViolation {
        ProtocolViolation::UnknownParticipant { channel: self.id, name: name.to_owned() }
    }

    /// Remove `name` and every trace of it. Returns false if absent.
    fn purge(&mut self, name: &str) -> bool {
        if self.participants.remove(name).is_none() {
            return false;
        }
        for participant in self.participants.values_mut() {
            participant.revoke_authorization(name);
        }
        self.votekicks.remove(name);
        for kickers in self.votekicks.values_mut() {
            kickers.remove(name);
        }
        self.votekicks.retain(|_, kickers| !kickers.is_empty());

        if self.participants.is_empty() {
            self.self_destruct();
        }
        true
    }
}
