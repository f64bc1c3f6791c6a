/// Default accept backlog, the common `SOMAXCONN` value on Linux.
pub const DEFAULT_BACKLOG: i32 = 1024;

/// Configuration for listening sockets.
///
/// Use `ListenerConfig::builder()` for ergonomic construction.
///
/// ## Socket Options
///
/// - no_delay: When enabled (default), accepted TCP peers get TCP_NODELAY
/// - only_v6: When enabled (default), IPv6 listeners set IPV6_V6ONLY so an
///   IPv4 listener can share the port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Pending connection queue length passed to listen(2)
    pub backlog: i32,
    /// Enable TCP_NODELAY on accepted TCP connections
    pub no_delay: bool,
    /// IPV6_V6ONLY setting for IPv6 listeners
    pub only_v6: bool,
}

impl ListenerConfig {
    /// Create a new builder for ListenerConfig
    pub fn builder() -> ListenerConfigBuilder {
        ListenerConfigBuilder::new()
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            backlog: DEFAULT_BACKLOG,
            no_delay: true,
            only_v6: true,
        }
    }
}

/// Builder for ListenerConfig.
///
/// Fields left unset fall back to ListenerConfig::default().
#[derive(Debug, Default)]
pub struct ListenerConfigBuilder {
    backlog: Option<i32>,
    no_delay: Option<bool>,
    only_v6: Option<bool>,
}

impl ListenerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the accept backlog
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = Some(backlog);
        self
    }

    /// Enable or disable TCP_NODELAY on accepted peers
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = Some(enabled);
        self
    }

    /// Enable or disable IPV6_V6ONLY
    pub fn only_v6(mut self, enabled: bool) -> Self {
        self.only_v6 = Some(enabled);
        self
    }

    pub fn build(self) -> ListenerConfig {
        let default = ListenerConfig::default();
        ListenerConfig {
            backlog: self.backlog.unwrap_or(default.backlog),
            no_delay: self.no_delay.unwrap_or(default.no_delay),
            only_v6: self.only_v6.unwrap_or(default.only_v6),
        }
    }
}
