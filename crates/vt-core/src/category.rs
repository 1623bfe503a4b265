use std::fmt;

/// Garment category sent with a try-on request.
///
/// The service is the authority on which labels are valid, so anything
/// outside the four known values is kept as [`Category::Other`] and
/// forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Category {
    #[default]
    Auto,
    Tops,
    Bottoms,
    OnePieces,
    Other(String),
}

impl Category {
    /// Label used on the wire
    pub fn as_str(&self) -> &str {
        match self {
            Self::Auto => "auto",
            Self::Tops => "tops",
            Self::Bottoms => "bottoms",
            Self::OnePieces => "one-pieces",
            Self::Other(label) => label,
        }
    }

    /// Name for display
    pub fn name(&self) -> &str {
        match self {
            Self::Auto => "Auto-detect",
            Self::Tops => "Tops",
            Self::Bottoms => "Bottoms",
            Self::OnePieces => "One-pieces",
            Self::Other(label) => label,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// All recognized categories
    pub fn all() -> [Category; 4] {
        [Self::Auto, Self::Tops, Self::Bottoms, Self::OnePieces]
    }
}

impl From<&str> for Category {
    fn from(label: &str) -> Self {
        match label {
            "auto" => Self::Auto,
            "tops" => Self::Tops,
            "bottoms" => Self::Bottoms,
            "one-pieces" => Self::OnePieces,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
