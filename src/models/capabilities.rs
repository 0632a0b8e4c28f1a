//! Advisory backend capability flags.
//!
//! These describe how result sets, cursors and row identifiers behave on a
//! backend. They are logged after a successful connect and never influence
//! control flow.

/// What happens to open cursors when a transaction commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorHoldability {
    HoldCursorsOverCommit,
    CloseCursorsAtCommit,
}

/// How long a row identifier stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowIdLifetime {
    Unsupported,
    ValidForever,
    ValidOther,
    ValidSession,
    ValidTransaction,
}

impl RowIdLifetime {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unsupported => "ROWID type not supported",
            Self::ValidForever => "ROWID has unlimited lifetime",
            Self::ValidOther => "ROWID has indeterminate lifetime",
            Self::ValidSession => {
                "ROWID type has lifetime that is valid for at least the containing session"
            }
            Self::ValidTransaction => {
                "ROWID type has lifetime that is valid for at least the containing transaction"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Supports forward-only result sets.
    pub forward_only: bool,

    /// Supports scrollable result sets that do not see concurrent changes.
    pub scroll_insensitive: bool,

    /// Supports scrollable result sets that see concurrent changes.
    pub scroll_sensitive: bool,

    /// Read-only concurrency on scroll-insensitive result sets.
    pub scroll_insensitive_read_only: bool,

    /// Updatable concurrency on scroll-insensitive result sets.
    pub scroll_insensitive_updatable: bool,

    pub default_holdability: CursorHoldability,
    pub supports_hold_over_commit: bool,
    pub supports_close_at_commit: bool,

    pub row_id_lifetime: RowIdLifetime,

    /// Filled in from the live connection when the version query succeeds.
    pub server_version: Option<String>,
}

impl Capabilities {
    /// MySQL and MariaDB capabilities.
    pub const MYSQL: Self = Self {
        forward_only: true,
        scroll_insensitive: true,
        scroll_sensitive: false,
        scroll_insensitive_read_only: true,
        scroll_insensitive_updatable: true,
        default_holdability: CursorHoldability::HoldCursorsOverCommit,
        supports_hold_over_commit: true,
        supports_close_at_commit: false,
        row_id_lifetime: RowIdLifetime::Unsupported,
        server_version: None,
    };

    /// SQLite capabilities.
    pub const SQLITE: Self = Self {
        scroll_insensitive: false,
        scroll_insensitive_read_only: false,
        scroll_insensitive_updatable: false,
        default_holdability: CursorHoldability::CloseCursorsAtCommit,
        supports_hold_over_commit: false,
        supports_close_at_commit: true,
        // The implicit rowid survives until the row is deleted or VACUUM
        // renumbers it.
        row_id_lifetime: RowIdLifetime::ValidOther,
        ..Self::MYSQL
    };

    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = Some(version.into());
        self
    }
}
