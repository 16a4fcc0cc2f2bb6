//! Snapshot of what users see during a complete invite-and-chat scenario.

use conclave_core::{ChannelId, MembershipState};
use conclave_harness::SimNetwork;
use insta::assert_json_snapshot;
use serde::Serialize;

const CHANNEL: ChannelId = ChannelId::new(1_000_001);

#[derive(Serialize)]
struct Member {
    name: String,
    state: &'static str,
    promoted: bool,
    key: Option<String>,
}

fn state_name(state: MembershipState) -> &'static str {
    match state {
        MembershipState::Known => "known",
        MembershipState::Invited => "invited",
        MembershipState::Joined => "joined",
        MembershipState::InChat => "in_chat",
    }
}

fn invite_and_chat() -> SimNetwork {
    let mut network = SimNetwork::new(7);
    network.join("alice@example.org");
    network.join("bob@example.org");
    network.type_line("alice", ".invite bob");
    network.with_session("bob", |bob| bob.focus(CHANNEL));
    network.type_line("bob", ".join");
    network.type_line("bob", "hi");
    network
}

#[test]
fn invite_and_chat_as_seen_by_inviter() {
    let network = invite_and_chat();
    let alice = network.session("alice").unwrap();

    assert_json_snapshot!("invite_and_chat_alice", alice.presentation().shown());
}

#[test]
fn invite_and_chat_channel_members() {
    let network = invite_and_chat();
    let channel = network.session("bob").unwrap().room().channel(CHANNEL).unwrap();
    let members: Vec<Member> = channel
        .participants()
        .map(|participant| Member {
            name: participant.name().to_owned(),
            state: state_name(participant.state()),
            promoted: participant.is_promoted(),
            key: participant.public_key().map(ToString::to_string),
        })
        .collect();

    assert_json_snapshot!("invite_and_chat_members", members, {
        "[].key" => "[key]",
    });
}
