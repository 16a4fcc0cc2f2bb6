//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture what a room exposes at a point in time. Invariants
//! operate on snapshots rather than live rooms so a check sees one
//! consistent state.

use std::collections::{BTreeMap, BTreeSet};

use conclave_core::{ChannelId, Environment, MAX_PENDING_INVITES, MembershipState, Room};

/// Snapshot of every session in a simulation.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-session snapshots.
    pub rooms: Vec<RoomSnapshot>,
}

impl SystemSnapshot {
    /// Snapshot with no sessions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot of a single room.
    pub fn single(room: RoomSnapshot) -> Self {
        Self { rooms: vec![room] }
    }

    /// Add a room snapshot.
    pub fn add_room(&mut self, room: RoomSnapshot) {
        self.rooms.push(room);
    }
}

/// Snapshot of one user's room.
#[derive(Debug, Clone, Default)]
pub struct RoomSnapshot {
    /// Local username.
    pub user: String,
    /// Whether the engine session is open.
    pub started: bool,
    /// Focused channel.
    pub focused: Option<ChannelId>,
    /// Users in the roster.
    pub roster: BTreeSet<String>,
    /// Channels by handle.
    pub channels: BTreeMap<ChannelId, ChannelSnapshot>,
    /// Queued invitation batches.
    pub pending_invites: usize,
    /// Upper bound on queued batches.
    pub invite_limit: usize,
}

impl RoomSnapshot {
    /// Capture the observable state of `room`.
    pub fn from_room<E: Environment>(room: &Room<E>) -> Self {
        let channels = room
            .channels()
            .map(|channel| {
                let participants = channel
                    .participants()
                    .map(|participant| {
                        (participant.name().to_owned(), ParticipantSnapshot {
                            state: participant.state(),
                            authorizers: participant.authorizers().clone(),
                            promoted: participant.is_promoted(),
                        })
                    })
                    .collect();
                (channel.id(), ChannelSnapshot { participants, destroyed: channel.is_destroyed() })
            })
            .collect();

        Self {
            user: room.username().to_owned(),
            started: room.is_started(),
            focused: room.focused(),
            roster: room.roster().names().map(str::to_owned).collect(),
            channels,
            pending_invites: room.pending_invites().count(),
            invite_limit: MAX_PENDING_INVITES,
        }
    }
}

/// Snapshot of one channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelSnapshot {
    /// Participants by name.
    pub participants: BTreeMap<String, ParticipantSnapshot>,
    /// Whether the channel flagged itself for removal.
    pub destroyed: bool,
}

/// Snapshot of one participant.
#[derive(Debug, Clone)]
pub struct ParticipantSnapshot {
    /// Lifecycle stage.
    pub state: MembershipState,
    /// Who has vouched for this participant.
    pub authorizers: BTreeSet<String>,
    /// Whether promoted.
    pub promoted: bool,
}
