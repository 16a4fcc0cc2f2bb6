//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold
//! between events, whatever the engine reports.

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// Channels in a room are never empty and never left flagged for removal.
///
/// A channel destroys itself when its last participant leaves; the room
/// must have erased it by the time control returns.
pub struct ChannelsNonEmpty;

impl Invariant for ChannelsNonEmpty {
    fn name(&self) -> &'static str {
        "channels_non_empty"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            for (id, channel) in &room.channels {
                if channel.participants.is_empty() {
                    return Err(self.violation(format!("{}: channel {id} has no participants", room.user)));
                }
                if channel.destroyed {
                    return Err(self.violation(format!("{}: channel {id} was not reaped", room.user)));
                }
            }
        }
        Ok(())
    }
}

/// Every authorizer recorded on a participant is a member of the channel.
///
/// Departures must revoke the authorizations the departed user granted.
pub struct AuthorizersArePresent;

impl Invariant for AuthorizersArePresent {
    fn name(&self) -> &'static str {
        "authorizers_are_present"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            for (id, channel) in &room.channels {
                for (name, participant) in &channel.participants {
                    if let Some(missing) =
                        participant.authorizers.iter().find(|a| !channel.participants.contains_key(*a))
                    {
                        return Err(self.violation(format!(
                            "{}: channel {id}: {name} still authorized by departed {missing}",
                            room.user
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Every participant vouches for itself.
pub struct SelfAuthorized;

impl Invariant for SelfAuthorized {
    fn name(&self) -> &'static str {
        "self_authorized"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            for (id, channel) in &room.channels {
                for (name, participant) in &channel.participants {
                    if !participant.authorizers.contains(name) {
                        return Err(self.violation(format!(
                            "{}: channel {id}: {name} is not in its own authorizer set",
                            room.user
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Focus, when set, names an existing channel.
pub struct FocusIsValid;

impl Invariant for FocusIsValid {
    fn name(&self) -> &'static str {
        "focus_is_valid"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            if let Some(focused) = room.focused
                && !room.channels.contains_key(&focused)
            {
                return Err(self.violation(format!("{}: focus on missing channel {focused}", room.user)));
            }
        }
        Ok(())
    }
}

/// The invitation queue stays within its bound, and is empty while the
/// session is closed.
pub struct QueueBounded;

impl Invariant for QueueBounded {
    fn name(&self) -> &'static str {
        "queue_bounded"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            if room.pending_invites > room.invite_limit {
                return Err(self.violation(format!(
                    "{}: {} queued invitation batches exceed limit {}",
                    room.user, room.pending_invites, room.invite_limit
                )));
            }
            if !room.started && room.pending_invites > 0 {
                return Err(self.violation(format!(
                    "{}: {} invitation batches queued without a session",
                    room.user, room.pending_invites
                )));
            }
        }
        Ok(())
    }
}

trait ViolationExt: Invariant {
    fn violation(&self, message: String) -> Violation {
        Violation::new(self.name(), message)
    }
}

impl<T: Invariant + ?Sized> ViolationExt for T {}
