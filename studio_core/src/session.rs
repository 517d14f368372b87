// Session identity and host capabilities.
// The session is established once at startup and passed to whatever needs it;
// host features like API-key selection are injected, never read from globals.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::store::{Collection, Store, StoreError};
use crate::types::UserId;

/// The anonymous user this studio instance works for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "id")]
    pub user_id: UserId,
    pub created_at_ms: u64,
}

impl Session {
    /// Resume the remembered user if its record still exists, otherwise
    /// create and persist a new anonymous user.
    pub async fn establish<S>(
        store: &S,
        remembered: Option<&UserId>,
        now_ms: u64,
    ) -> Result<Session, StoreError>
    where
        S: Store + ?Sized,
    {
        if let Some(id) = remembered {
            if let Some(record) = store.get(Collection::Users, id.as_str()).await? {
                let session: Session = serde_json::from_value(record)?;
                log::info!("Resumed session for user {}", session.user_id.as_str());
                return Ok(session);
            }
            log::warn!("Remembered user {} not found; starting fresh", id.as_str());
        }

        let session = Session {
            user_id: UserId::generate(),
            created_at_ms: now_ms,
        };
        store
            .put(Collection::Users, serde_json::to_value(&session)?)
            .await?;
        log::info!("Created session for user {}", session.user_id.as_str());
        Ok(session)
    }
}

/// Capabilities the hosting page provides.
pub trait HostCapabilities {
    /// Whether the user already picked an API key.
    fn has_selected_api_key(&self) -> Pin<Box<dyn Future<Output = bool> + '_>>;

    /// Open the host's key picker. Resolves when the picker closes.
    fn open_key_selector(&self) -> Pin<Box<dyn Future<Output = ()> + '_>>;
}

/// Make sure an API key is selected before generating.
///
/// Opens the selector when no key is selected and proceeds without
/// re-checking, since the host may report the new key late. Returns whether
/// the selector was shown. Run it again after an auth-class service error.
pub async fn ensure_api_key<H>(host: &H) -> bool
where
    H: HostCapabilities + ?Sized,
{
    if host.has_selected_api_key().await {
        return false;
    }
    log::info!("No API key selected; opening key selector");
    host.open_key_selector().await;
    true
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use futures::executor::block_on;

    use super::*;
    use crate::store::MemoryStore;

    struct FakeHost {
        selected: Cell<bool>,
        opened: Cell<u32>,
    }

    impl FakeHost {
        fn new(selected: bool) -> Self {
            FakeHost {
                selected: Cell::new(selected),
                opened: Cell::new(0),
            }
        }
    }

    impl HostCapabilities for FakeHost {
        fn has_selected_api_key(&self) -> Pin<Box<dyn Future<Output = bool> + '_>> {
            let selected = self.selected.get();
            Box::pin(async move { selected })
        }

        fn open_key_selector(&self) -> Pin<Box<dyn Future<Output = ()> + '_>> {
            self.opened.set(self.opened.get() + 1);
            self.selected.set(true);
            Box::pin(async {})
        }
    }

    #[test]
    fn new_user_is_created_and_persisted() {
        let store = MemoryStore::new();
        let session = block_on(Session::establish(&store, None, 42)).unwrap();
        assert_eq!(session.created_at_ms, 42);
        assert_eq!(store.count(Collection::Users), 1);

        let record = block_on(store.get(Collection::Users, session.user_id.as_str()))
            .unwrap()
            .unwrap();
        assert_eq!(record["id"], session.user_id.as_str());
    }

    #[test]
    fn remembered_user_is_resumed() {
        let store = MemoryStore::new();
        let first = block_on(Session::establish(&store, None, 1)).unwrap();
        let resumed = block_on(Session::establish(&store, Some(&first.user_id), 99)).unwrap();
        assert_eq!(resumed, first);
        assert_eq!(store.count(Collection::Users), 1);
    }

    #[test]
    fn unknown_remembered_user_starts_fresh() {
        let store = MemoryStore::new();
        let ghost = UserId::new("ghost");
        let session = block_on(Session::establish(&store, Some(&ghost), 7)).unwrap();
        assert_ne!(session.user_id, ghost);
        assert_eq!(store.count(Collection::Users), 1);
    }

    #[test]
    fn key_selector_opens_only_when_needed() {
        let host = FakeHost::new(false);
        assert!(block_on(ensure_api_key(&host)));
        assert!(!block_on(ensure_api_key(&host)));
        assert_eq!(host.opened.get(), 1);
    }

    #[test]
    fn selected_key_skips_selector() {
        let host = FakeHost::new(true);
        assert!(!block_on(ensure_api_key(&host)));
        assert_eq!(host.opened.get(), 0);
    }
}
