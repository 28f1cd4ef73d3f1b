//! Message kind enumeration.

/// Wire message kinds.
///
/// This is a closed set: the protocol state machines on both sides and the
/// relay dispatch purely on the kind byte. An unrecognized byte on the wire
/// is a protocol error, never a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Sender asks the relay to register a session under a share code
    CreateSession = 0x01,
    /// Relay acknowledges session creation
    CreateSuccess = 0x02,
    /// Relay rejects session creation (empty or already-used code)
    CreateFailed = 0x03,
    /// Receiver asks the relay to join a session by share code
    JoinSession = 0x04,
    /// Relay acknowledges the join; the session is now paired
    JoinSuccess = 0x05,
    /// Relay rejects the join (empty code)
    JoinFailed = 0x06,
    /// No session registered under the requested share code
    ChannelNotFound = 0x07,
    /// The session already has a visitor
    ChannelFull = 0x08,
    /// Receiver requests the sender's file-set statistics
    GetFileSetStats = 0x09,
    /// Sender's reply: total size, file count, folder count
    FileSetStats = 0x0A,
    /// Per-file metadata announcement
    FileInfo = 0x0B,
    /// Receiver is ready to receive the announced file
    ReadyForReceive = 0x0C,
    /// Receiver skips the announced file
    SkipFile = 0x0D,
    /// One chunk of file bytes
    FileData = 0x0E,
    /// No more files follow
    FileFinish = 0x0F,
    /// Receiver accepts the transfer
    AgreeReceive = 0x10,
    /// Receiver declines the transfer
    RefuseReceive = 0x11,
    /// Liveness probe
    Ping = 0x12,
    /// Peer was interrupted locally
    Interrupt = 0x13,
    /// Session torn down
    Cancel = 0x14,
    /// Forwarding failed on the other side of the pipe
    Failed = 0x15,
    /// Receiver reached the sender directly on the local network
    LocalNetworkMode = 0x16,
}

impl MessageKind {
    /// Map a wire byte back to a kind, `None` for unknown bytes.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::CreateSession),
            0x02 => Some(Self::CreateSuccess),
            0x03 => Some(Self::CreateFailed),
            0x04 => Some(Self::JoinSession),
            0x05 => Some(Self::JoinSuccess),
            0x06 => Some(Self::JoinFailed),
            0x07 => Some(Self::ChannelNotFound),
            0x08 => Some(Self::ChannelFull),
            0x09 => Some(Self::GetFileSetStats),
            0x0A => Some(Self::FileSetStats),
            0x0B => Some(Self::FileInfo),
            0x0C => Some(Self::ReadyForReceive),
            0x0D => Some(Self::SkipFile),
            0x0E => Some(Self::FileData),
            0x0F => Some(Self::FileFinish),
            0x10 => Some(Self::AgreeReceive),
            0x11 => Some(Self::RefuseReceive),
            0x12 => Some(Self::Ping),
            0x13 => Some(Self::Interrupt),
            0x14 => Some(Self::Cancel),
            0x15 => Some(Self::Failed),
            0x16 => Some(Self::LocalNetworkMode),
            _ => None,
        }
    }

    /// Kind name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateSession => "create-session",
            Self::CreateSuccess => "create-success",
            Self::CreateFailed => "create-failed",
            Self::JoinSession => "join-session",
            Self::JoinSuccess => "join-success",
            Self::JoinFailed => "join-failed",
            Self::ChannelNotFound => "channel-not-found",
            Self::ChannelFull => "channel-full",
            Self::GetFileSetStats => "get-file-set-stats",
            Self::FileSetStats => "file-set-stats",
            Self::FileInfo => "file-info",
            Self::ReadyForReceive => "ready-for-receive",
            Self::SkipFile => "skip-file",
            Self::FileData => "file-data",
            Self::FileFinish => "file-finish",
            Self::AgreeReceive => "agree-receive",
            Self::RefuseReceive => "refuse-receive",
            Self::Ping => "ping",
            Self::Interrupt => "interrupt",
            Self::Cancel => "cancel",
            Self::Failed => "failed",
            Self::LocalNetworkMode => "local-network-mode",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_byte_round_trip() {
        for b in 0x01..=0x16u8 {
            let kind = MessageKind::from_u8(b).expect("kind in closed set");
            assert_eq!(kind as u8, b);
        }
    }

    #[test]
    fn test_unknown_bytes_rejected() {
        assert_eq!(MessageKind::from_u8(0x00), None);
        assert_eq!(MessageKind::from_u8(0x17), None);
        assert_eq!(MessageKind::from_u8(0xFF), None);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(MessageKind::CreateSession.as_str(), "create-session");
        assert_eq!(MessageKind::FileData.to_string(), "file-data");
    }
}
