use std::fmt;

/// Addressing unit for container access.
///
/// `Empty` addresses the node itself rather than one of its items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Index {
    #[default]
    Empty,
    Position(usize),
    Key(String),
}

impl Index {
    pub fn is_empty(&self) -> bool {
        matches!(self, Index::Empty)
    }

    pub fn position(&self) -> Option<usize> {
        match self {
            Index::Position(p) => Some(*p),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Index::Key(k) => Some(k),
            _ => None,
        }
    }
}

impl From<usize> for Index {
    fn from(value: usize) -> Self {
        Index::Position(value)
    }
}

impl From<&str> for Index {
    fn from(value: &str) -> Self {
        Index::Key(value.to_string())
    }
}

impl From<String> for Index {
    fn from(value: String) -> Self {
        Index::Key(value)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Empty => f.write_str("<empty>"),
            Index::Position(p) => write!(f, "[{p}]"),
            Index::Key(k) => write!(f, "[{k:?}]"),
        }
    }
}
