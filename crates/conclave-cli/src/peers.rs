//! In-process peers for trying the console without a host chat.
//!
//! Each peer is a full session over the loopback engine. Peers accept every
//! invitation they receive and otherwise stay quiet; what they see is
//! logged at debug level.

use std::collections::BTreeMap;

use conclave_app::{Presentation, Session, SystemEnv};
use conclave_core::{Channel, ChannelId, Environment, Level, MembershipState, Room, RoomConfig};
use conclave_harness::LoopbackFactory;

/// Relay rounds after which peer traffic is dropped.
const MAX_RELAY_ROUNDS: usize = 32;

/// Presentation for a peer: everything goes to the log.
#[derive(Debug)]
pub struct PeerLog {
    name: String,
}

impl Presentation for PeerLog {
    fn display(&mut self, channel: Option<ChannelId>, sender: &str, text: &str) {
        tracing::debug!(peer = %self.name, ?channel, sender, text, "peer saw message");
    }

    fn inform(&mut self, channel: Option<ChannelId>, level: Level, message: &str) {
        tracing::debug!(peer = %self.name, ?channel, ?level, message, "peer status");
    }
}

/// Session type run by each peer.
pub type PeerSession = Session<LoopbackFactory, PeerLog, SystemEnv>;

/// Simulated users sharing the transport with the local user.
pub struct PeerGroup {
    local: String,
    peers: BTreeMap<String, PeerSession>,
}

impl PeerGroup {
    /// No peers.
    pub fn empty(local: impl Into<String>) -> Self {
        Self { local: local.into(), peers: BTreeMap::new() }
    }

    /// Start one peer per name. Channel origins start at 2; the local
    /// session uses origin 1.
    ///
    /// Returns the group and the payloads the peers sent while starting,
    /// addressed to the local user.
    pub fn start(
        local: impl Into<String>,
        names: &[String],
        config: &RoomConfig,
    ) -> (Self, Vec<(String, String)>) {
        let mut group = Self::empty(local);
        for (origin, account) in (2..).zip(names) {
            let room = Room::new(SystemEnv::new(), account, config.clone());
            let name = room.username().to_owned();
            if name.is_empty() || name == group.local || group.peers.contains_key(&name) {
                tracing::warn!(account = %account, "skipping peer");
                continue;
            }
            let mut session = Session::new(room, LoopbackFactory::new(origin), PeerLog { name: name.clone() });
            session.chat_joined();
            session.start();
            tracing::info!(peer = %name, "peer started");
            group.peers.insert(name, session);
        }
        let greetings = group.settle();
        (group, greetings)
    }

    /// Whether there are any peers.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Peer usernames.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.peers.keys().map(String::as_str)
    }

    /// A peer's session.
    pub fn get(&self, name: &str) -> Option<&PeerSession> {
        self.peers.get(name)
    }

    /// Deliver a local payload to every peer.
    ///
    /// Returns what the peers sent in response, addressed to the local user.
    pub fn relay(&mut self, payload: &str) -> Vec<(String, String)> {
        for session in self.peers.values_mut() {
            session.received(self.local.as_str(), payload);
        }
        self.settle()
    }

    /// Fire due peer timers.
    pub fn tick(&mut self, now: <SystemEnv as Environment>::Instant) -> Vec<(String, String)> {
        for session in self.peers.values_mut() {
            session.tick(now);
        }
        self.settle()
    }

    /// Stop every peer. Returns their farewells.
    pub fn close(&mut self) -> Vec<(String, String)> {
        let mut farewells = Vec::new();
        for (name, session) in &mut self.peers {
            session.close();
            farewells.extend(session.take_outgoing().into_iter().map(|payload| (name.clone(), payload)));
        }
        self.peers.clear();
        farewells
    }

    /// Relay peer traffic among peers until quiet, accepting invitations
    /// along the way.
    fn settle(&mut self) -> Vec<(String, String)> {
        let mut to_local = Vec::new();
        for _ in 0..MAX_RELAY_ROUNDS {
            self.accept_invitations();
            let outgoing: Vec<(String, String)> = self
                .peers
                .iter_mut()
                .flat_map(|(name, session)| {
                    session.take_outgoing().into_iter().map(|payload| (name.clone(), payload)).collect::<Vec<_>>()
                })
                .collect();
            if outgoing.is_empty() {
                return to_local;
            }
            for (sender, payload) in outgoing {
                for (name, session) in &mut self.peers {
                    if *name != sender {
                        session.received(sender.as_str(), payload.as_str());
                    }
                }
                to_local.push((sender, payload));
            }
        }
        tracing::warn!(rounds = MAX_RELAY_ROUNDS, "peer traffic did not settle");
        to_local
    }

    fn accept_invitations(&mut self) {
        for (name, session) in &mut self.peers {
            let invited: Vec<ChannelId> = session
                .room()
                .channels()
                .filter(|channel| {
                    channel.participant(name).is_some_and(|me| me.state() == MembershipState::Invited)
                })
                .map(Channel::id)
                .collect();
            for channel in invited {
                tracing::debug!(peer = %name, %channel, "peer accepting invitation");
                session.with_room(|room| room.join_channel(channel));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn peers_meet_each_other() {
        let (group, greetings) = PeerGroup::start("me", &names(&["bob", "carol"]), &RoomConfig::default());

        assert_eq!(group.names().collect::<Vec<_>>(), ["bob", "carol"]);
        let bob = group.get("bob").unwrap().room();
        assert!(bob.roster().contains("carol"));
        assert!(greetings.iter().any(|(sender, payload)| sender == "bob" && payload.starts_with("#np1sec hello")));
    }

    #[test]
    fn duplicates_and_local_name_are_skipped() {
        let (group, _) = PeerGroup::start("me", &names(&["bob", "bob@elsewhere", "me"]), &RoomConfig::default());
        assert_eq!(group.names().collect::<Vec<_>>(), ["bob"]);
    }

    #[test]
    fn invitations_are_accepted() {
        let (mut group, _) = PeerGroup::start("me", &names(&["bob"]), &RoomConfig::default());
        let channel = ChannelId::new(1_000_001);

        group.relay("#np1sec hello 0101");
        group.relay(&format!("#np1sec created {channel}"));
        let replies = group.relay(&format!("#np1sec invite {channel} bob"));

        assert!(replies.iter().any(|(_, payload)| payload == &format!("#np1sec join {channel}")));
        let bob = group.get("bob").unwrap().room();
        assert!(bob.channel(channel).unwrap().is_joined());
    }

    #[test]
    fn close_says_goodbye() {
        let (mut group, _) = PeerGroup::start("me", &names(&["bob"]), &RoomConfig::default());
        let farewells = group.close();
        assert_eq!(farewells, [("bob".to_owned(), "#np1sec bye".to_owned())]);
        assert!(group.is_empty());
    }
}
