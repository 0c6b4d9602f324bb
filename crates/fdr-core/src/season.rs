use serde::{Deserialize, Serialize};

/// The three reference days every candidate is simulated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Summer,
    Winter,
    Spring,
}

impl Season {
    pub const ALL: [Season; 3] = [Season::Summer, Season::Winter, Season::Spring];

    pub fn as_str(self) -> &'static str {
        match self {
            Season::Summer => "summer",
            Season::Winter => "winter",
            Season::Spring => "spring",
        }
    }

    /// Row index in 3×5 weight and error matrices.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Season {
    type Err = crate::FdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summer" => Ok(Season::Summer),
            "winter" => Ok(Season::Winter),
            "spring" | "shoulder" => Ok(Season::Spring),
            other => Err(crate::FdrError::Parse(format!("unknown season '{other}'"))),
        }
    }
}
