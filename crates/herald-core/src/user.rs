//! User identity.

use serde::{Deserialize, Serialize};

/// A chat participant as seen by the adapter.
///
/// Adapters fill in whatever identity fields the protocol offers. The
/// `room` is the channel the user was last seen in; messages derive their
/// room from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Protocol-level unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// The room this user is speaking from, if known.
    pub room: Option<String>,
}

impl User {
    /// Creates a user with the given id, reusing it as the display name.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            room: None,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the room.
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }
}
