use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of study material. Stored by label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Notes")]
    Notes,
    #[serde(rename = "Lab Manual")]
    LabManual,
    #[serde(rename = "Book")]
    Book,
    #[serde(rename = "Practical File")]
    PracticalFile,
    #[serde(rename = "Notification")]
    Notification,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Notes,
        Category::LabManual,
        Category::Book,
        Category::PracticalFile,
        Category::Notification,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Notes => "Notes",
            Category::LabManual => "Lab Manual",
            Category::Book => "Book",
            Category::PracticalFile => "Practical File",
            Category::Notification => "Notification",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts labels case-insensitively, with `-`/`_` for spaces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_'], " ").to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.label().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown category: {:?}", s))
    }
}
