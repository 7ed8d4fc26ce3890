use std::fmt;

/// Where a candidate version currently comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    Local,
    /// Identified by the source's stable identifier.
    Remote(String),
}

impl Origin {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }

    pub fn source_id(&self) -> Option<&str> {
        match self {
            Self::Local => None,
            Self::Remote(id) => Some(id),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote(id) => write!(f, "{}", id),
        }
    }
}
