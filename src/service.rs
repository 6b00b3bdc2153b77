use serde::Serialize;

/// A service unit as seen by a listing.
///
/// `running` is a snapshot taken while listing; nothing is locked between the
/// listing and any later action on the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitService {
    pub name: String,
    pub running: bool,
}

impl InitService {
    pub fn new(name: impl Into<String>, running: bool) -> Self {
        Self {
            name: name.into(),
            running,
        }
    }
}
