use std::{
    collections::HashMap,
    fmt::{self, Display},
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::token;

/// A verified external identity, e.g. the email a user logged in with.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(identity: impl Into<String>) -> Self {
        Identity(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps session tokens to the identities they were issued for.
///
/// Sessions live as long as the process does. A restart logs everyone out.
#[derive(Default)]
pub struct Sessions {
    tokens: Mutex<HashMap<String, Identity>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock still holds a consistent map: every critical section is
    // a single insert, lookup or removal.
    fn tokens(&self) -> MutexGuard<'_, HashMap<String, Identity>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a new session token for `identity`.
    pub fn create(&self, identity: Identity) -> String {
        let token = token::session_token();
        self.tokens().insert(token.clone(), identity);
        token
    }

    /// The identity bound to `token`, if the session exists.
    pub fn resolve(&self, token: &str) -> Option<Identity> {
        self.tokens().get(token).cloned()
    }

    /// End the session for `token`. Revoking an unknown token does nothing.
    pub fn revoke(&self, token: &str) {
        self.tokens().remove(token);
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use super::*;

    #[test]
    fn create_resolve_revoke() {
        let sessions = Sessions::new();
        let token = sessions.create(Identity::new("a@x.com"));

        assert_eq!(sessions.resolve(&token), Some(Identity::new("a@x.com")));
        assert_eq!(sessions.resolve("not-a-token"), None);

        sessions.revoke(&token);
        assert_eq!(sessions.resolve(&token), None);

        // Revoking again is a no-op.
        sessions.revoke(&token);
        assert_eq!(sessions.resolve(&token), None);
    }

    #[test]
    fn tokens_are_never_shared() {
        let sessions = Sessions::new();
        let a = sessions.create(Identity::new("a@x.com"));
        let b = sessions.create(Identity::new("a@x.com"));
        assert_ne!(a, b);

        sessions.revoke(&a);
        assert_eq!(sessions.resolve(&b), Some(Identity::new("a@x.com")));
    }

    #[test]
    fn concurrent_creates() {
        let sessions = Arc::new(Sessions::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let sessions = sessions.clone();
                thread::spawn(move || {
                    let identity = Identity::new(format!("user{i}@x.com"));
                    let token = sessions.create(identity.clone());
                    assert_eq!(sessions.resolve(&token), Some(identity));
                    token
                })
            })
            .collect();

        let tokens: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(tokens.len(), 16);
    }
}
