use std::{fmt, str::FromStr};

use super::DomainError;

/// The fixed set of temple sites that accept pulse submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Temple {
    Somnath,
    Dwarka,
    Ambaji,
    Pavagadh,
}

impl Temple {
    /// All sites, in the order they are offered to submitters.
    pub const ALL: [Temple; 4] = [Temple::Somnath, Temple::Dwarka, Temple::Ambaji, Temple::Pavagadh];

    pub fn as_str(&self) -> &'static str {
        match self {
            Temple::Somnath => "Somnath",
            Temple::Dwarka => "Dwarka",
            Temple::Ambaji => "Ambaji",
            Temple::Pavagadh => "Pavagadh",
        }
    }
}

impl fmt::Display for Temple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Temple {
    type Err = DomainError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Temple::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DomainError::UnknownTemple(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("dwarka".parse::<Temple>(), Ok(Temple::Dwarka));
        assert_eq!(" PAVAGADH ".parse::<Temple>(), Ok(Temple::Pavagadh));
    }

    #[test]
    fn rejects_unknown_site() {
        assert_eq!(
            "Kedarnath".parse::<Temple>(),
            Err(DomainError::UnknownTemple("Kedarnath".to_string()))
        );
    }

    #[test]
    fn display_matches_stored_name() {
        for t in Temple::ALL {
            assert_eq!(t.to_string().parse::<Temple>(), Ok(t));
        }
    }
}
