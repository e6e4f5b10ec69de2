use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The `net_info` discriminant of a wire frame (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NetInfo {
    /// Client/server setup handshake.
    Setup = 0,
    /// Forward direction: client towards the dead drop.
    ClientToDeadDrop = 1,
    /// Return direction: dead drop towards the client.
    DeadDropToClient = 2,
    /// Out-of-band dialing request (external collaborator, interface only).
    Dial = 3,
    /// Round-count announce: upstream tells downstream how many messages
    /// to expect this round.
    RoundCountAnnounce = 4,
    /// Round-start broadcast: coordinator tells clients to send.
    RoundStartBroadcast = 5,
    /// Poll for pending invitations (external collaborator).
    PollInvitations = 6,
    /// Peer-join broadcast (external collaborator).
    PeerJoinBroadcast = 10,
    /// Invitation delivery (external collaborator).
    InvitationDelivery = 11,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized net_info byte: {0}")]
pub struct UnknownNetInfo(pub u8);

impl TryFrom<u8> for NetInfo {
    type Error = UnknownNetInfo;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(NetInfo::Setup),
            1 => Ok(NetInfo::ClientToDeadDrop),
            2 => Ok(NetInfo::DeadDropToClient),
            3 => Ok(NetInfo::Dial),
            4 => Ok(NetInfo::RoundCountAnnounce),
            5 => Ok(NetInfo::RoundStartBroadcast),
            6 => Ok(NetInfo::PollInvitations),
            10 => Ok(NetInfo::PeerJoinBroadcast),
            11 => Ok(NetInfo::InvitationDelivery),
            other => Err(UnknownNetInfo(other)),
        }
    }
}

impl From<NetInfo> for u8 {
    fn from(n: NetInfo) -> u8 {
        n as u8
    }
}
