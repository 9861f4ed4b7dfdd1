use bitmask_enum::bitmask;

/// Discord permission bits, as carried in role and overwrite payloads.
#[bitmask(u64)]
pub enum Permissions {
    Administrator = 1 << 3,
    ManageChannels = 1 << 4,
    ManageGuild = 1 << 5,
    ViewChannel = 1 << 10,
    SendMessages = 1 << 11,
    ReadMessageHistory = 1 << 16,
}

impl Default for Permissions {
    fn default() -> Self {
        Self::none()
    }
}

impl Permissions {
    /// What the bot needs on a channel before it posts there.
    pub fn postable() -> Self {
        Self::ViewChannel | Self::SendMessages | Self::ReadMessageHistory
    }

    /// Administrator implies every other permission.
    pub fn has_permission(&self, other: Self) -> bool {
        self.contains(Self::Administrator) || self.contains(other)
    }

    /// Whether the holder may change subscriptions on a server.
    pub fn can_manage_feeds(&self) -> bool {
        self.has_permission(Self::ManageGuild) || self.has_permission(Self::ManageChannels)
    }

    /// Parses the decimal string form Discord uses on the wire.
    pub fn from_wire(raw: &str) -> Self {
        raw.parse::<u64>().map(Self::from).unwrap_or_default()
    }
}
