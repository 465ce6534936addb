/// Lifecycle state of a subscriber row.
///
/// Stored as lowercase text; `active` is the column default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriberStatus {
    #[default]
    Active,
    Inactive,
}

impl SubscriberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberStatus::Active => "active",
            SubscriberStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for SubscriberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubscriberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("{} is not a known subscriber status.", other)),
        }
    }
}
