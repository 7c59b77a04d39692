use std::fmt;

/// Convenience alias for results carrying a [`PresetError`].
pub type Result<T, E = PresetError> = std::result::Result<T, E>;

/// Machine-readable error codes for callers that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    PresetNotFound,
    DuplicatePresetId,
    UnknownGroupSource,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::PresetNotFound => "E2001",
            Self::DuplicatePresetId => "E2002",
            Self::UnknownGroupSource => "E2101",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::PresetNotFound => Some("Check `has_id` before addressing a preset by id."),
            Self::DuplicatePresetId => Some("Create presets through the collection factory."),
            Self::UnknownGroupSource => {
                Some("Register every named source before applying group data.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Precondition violations raised by collection and group operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresetError {
    #[error("preset not found: {id}")]
    NotFound { id: String },

    #[error("preset id already present: {id}")]
    DuplicateId { id: String },

    #[error("group source not registered: {name}")]
    UnknownSource { name: String },
}

impl PresetError {
    pub(crate) fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// The machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::PresetNotFound,
            Self::DuplicateId { .. } => ErrorCode::DuplicatePresetId,
            Self::UnknownSource { .. } => ErrorCode::UnknownGroupSource,
        }
    }
}
