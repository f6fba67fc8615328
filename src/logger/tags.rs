/// Log tags, one per subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Cache,
    Health,
    Api,
    Provider,
    Aggregator,
    Stream,
}

impl LogTag {
    /// Key used by `--debug-<key>` / `--verbose-<key>` flags
    pub fn to_debug_key(&self) -> String {
        self.to_plain_string().to_lowercase()
    }

    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Cache => "CACHE",
            LogTag::Health => "HEALTH",
            LogTag::Api => "API",
            LogTag::Provider => "PROVIDER",
            LogTag::Aggregator => "AGGREGATOR",
            LogTag::Stream => "STREAM",
        }
    }

    pub fn all() -> &'static [LogTag] {
        &[
            LogTag::System,
            LogTag::Config,
            LogTag::Cache,
            LogTag::Health,
            LogTag::Api,
            LogTag::Provider,
            LogTag::Aggregator,
            LogTag::Stream,
        ]
    }

    pub fn from_debug_key(key: &str) -> Option<LogTag> {
        let key = key.to_lowercase();
        LogTag::all().iter().copied().find(|t| t.to_debug_key() == key)
    }
}
