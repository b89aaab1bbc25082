/// The identity resolved by a successful confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub display_name: String,

    /// Whether the identity was read from the extended user profile API.
    pub extended_profile: bool,
}

impl Identity {
    /// Builds an identity, defaulting the display name to the username.
    pub fn new(
        username: impl Into<String>,
        display_name: Option<String>,
        extended_profile: bool,
    ) -> Self {
        let username = username.into();
        let display_name = display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| username.clone());
        Self {
            username,
            display_name,
            extended_profile,
        }
    }
}
