use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::data::{AccountService, MarkRequest};
use crate::listing::Listing;
use crate::notify::Notification;
use crate::session::{Manager as SessionManager, SessionError};
use crate::tmdb::{CollectionKind, MediaItem, MediaType, MutationOutcome, Page};

/// Key for an account-scoped list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionQuery {
    pub kind: CollectionKind,
    pub media_type: MediaType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    pub media_type: MediaType,
    pub id: u64,
    pub title: &'a str,
}

impl<'a> Target<'a> {
    pub fn from_item(item: &'a MediaItem, fallback: MediaType) -> Self {
        Self {
            media_type: item.kind_or(fallback),
            id: item.id,
            title: item.display_title(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub kind: CollectionKind,
    pub action: Action,
    pub media_type: MediaType,
    pub item_id: u64,
    pub notification: Notification,
}

impl MutationReport {
    pub fn succeeded(&self) -> bool {
        !self.notification.is_error()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Reported(MutationReport),
    /// Signed out; no request was sent.
    NeedsSession,
}

pub struct Collections {
    account: Arc<dyn AccountService>,
    session: Arc<SessionManager>,
}

impl Collections {
    pub fn new(account: Arc<dyn AccountService>, session: Arc<SessionManager>) -> Self {
        Self { account, session }
    }

    pub fn add_to_watchlist(&self, target: Target<'_>) -> Mutation {
        self.mutate(CollectionKind::Watchlist, Action::Add, target)
    }

    pub fn add_to_favorites(&self, target: Target<'_>) -> Mutation {
        self.mutate(CollectionKind::Favorites, Action::Add, target)
    }

    pub fn remove_from_watchlist(&self, target: Target<'_>) -> Mutation {
        self.mutate(CollectionKind::Watchlist, Action::Remove, target)
    }

    pub fn remove_from_favorites(&self, target: Target<'_>) -> Mutation {
        self.mutate(CollectionKind::Favorites, Action::Remove, target)
    }

    pub fn mutate(&self, kind: CollectionKind, action: Action, target: Target<'_>) -> Mutation {
        let active = match self.session.active() {
            Ok(Some(active)) => active,
            Ok(None) => return Mutation::NeedsSession,
            Err(err) => {
                warn!(error = ?err, "collections: account unavailable");
                return Mutation::Reported(report(kind, action, &target, None));
            }
        };

        let request = MarkRequest {
            kind,
            account: active.account_ref(),
            media_type: target.media_type,
            media_id: target.id,
            flag: action == Action::Add,
        };
        let outcome = match self.account.mark(&request) {
            Ok(status) => {
                info!(
                    kind = kind.display_name(),
                    id = target.id,
                    status = %status,
                    "collections: mark response"
                );
                match (action, status.outcome()) {
                    (Action::Add, outcome @ (MutationOutcome::Added | MutationOutcome::AlreadyPresent)) => {
                        Some(outcome)
                    }
                    (Action::Add, _) => None,
                    (Action::Remove, MutationOutcome::Removed) => Some(MutationOutcome::Removed),
                    (Action::Remove, _) if status.success == Some(true) => Some(MutationOutcome::Removed),
                    (Action::Remove, _) => None,
                }
            }
            Err(err) => {
                warn!(error = ?err, kind = kind.display_name(), id = target.id, "collections: mark failed");
                None
            }
        };
        Mutation::Reported(report(kind, action, &target, outcome))
    }

    pub fn list_page(
        &self,
        kind: CollectionKind,
        media_type: MediaType,
        page: u32,
    ) -> Result<Page<MediaItem>> {
        let active = self.session.active()?.ok_or(SessionError::NotAuthenticated)?;
        self.account
            .list(kind, &active.account_ref(), media_type, page)
    }
}

fn report(
    kind: CollectionKind,
    action: Action,
    target: &Target<'_>,
    outcome: Option<MutationOutcome>,
) -> MutationReport {
    let list = kind.display_name();
    let label = format!("\"{}\" ({})", target.title, target.media_type.noun());
    let notification = match (action, outcome) {
        (Action::Add, Some(MutationOutcome::AlreadyPresent)) => {
            Notification::success(format!("{label} is already in your {list}."))
        }
        (Action::Add, Some(_)) => Notification::success(format!("{label} added to your {list}.")),
        (Action::Remove, Some(_)) => {
            Notification::success(format!("{label} removed from your {list}."))
        }
        (Action::Add, None) => {
            Notification::error(format!("Error adding {label} to your {list}."))
        }
        (Action::Remove, None) => {
            Notification::error(format!("Error removing {label} from your {list}."))
        }
    };
    MutationReport {
        kind,
        action,
        media_type: target.media_type,
        item_id: target.id,
        notification,
    }
}

/// Applies a confirmed removal to the locally held list.
pub fn reconcile(listing: &mut Listing<CollectionQuery>, report: &MutationReport) -> usize {
    if report.action != Action::Remove || !report.succeeded() {
        return 0;
    }
    let key = listing.key();
    if key.kind != report.kind || key.media_type != report.media_type {
        return 0;
    }
    listing.remove_by_id(report.item_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Config as AuthConfig, Flow};
    use crate::storage::MemorySessionStore;
    use crate::test_support::{FakeAccount, FakeAuth};
    use crate::tmdb::StatusResponse;

    fn build(session: Option<&str>, account: Arc<FakeAccount>) -> Collections {
        let store = Arc::new(match session {
            Some(id) => MemorySessionStore::with_session(id),
            None => MemorySessionStore::new(),
        });
        let auth = Arc::new(FakeAuth::new("tok", Ok("s".into())));
        let flow = Arc::new(Flow::new(auth.clone(), AuthConfig::default()));
        let manager = Arc::new(SessionManager::new(store, flow, auth, Some(42)));
        Collections::new(account, manager)
    }

    fn heat() -> Target<'static> {
        Target {
            media_type: MediaType::Movie,
            id: 949,
            title: "Heat",
        }
    }

    fn status(code: i64) -> StatusResponse {
        StatusResponse {
            status_code: code,
            ..Default::default()
        }
    }

    fn notification(mutation: Mutation) -> Notification {
        match mutation {
            Mutation::Reported(report) => report.notification,
            Mutation::NeedsSession => panic!("expected a report"),
        }
    }

    #[test]
    fn added_status_names_title_and_type() {
        let account = Arc::new(FakeAccount::replying(Ok(status(1))));
        let collections = build(Some("abc"), account.clone());

        let note = notification(collections.add_to_watchlist(heat()));
        assert!(!note.is_error());
        assert!(note.message.contains("Heat"));
        assert!(note.message.contains("movie"));

        let calls = account.marks();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].account_id, 42);
        assert_eq!(calls[0].session_id, "abc");
        assert!(calls[0].flag);
    }

    #[test]
    fn duplicate_status_is_success_styled() {
        let account = Arc::new(FakeAccount::replying(Ok(status(12))));
        let collections = build(Some("abc"), account);
        let note = notification(collections.add_to_favorites(heat()));
        assert!(!note.is_error());
        assert!(note.message.contains("already in your favorites"));
    }

    #[test]
    fn failures_are_error_notifications() {
        let account = Arc::new(FakeAccount::replying(Err("connection reset".into())));
        let collections = build(Some("abc"), account);
        let note = notification(collections.add_to_watchlist(heat()));
        assert!(note.is_error());
        assert!(note.message.contains("Heat"));

        let rejected = Arc::new(FakeAccount::replying(Ok(status(3))));
        let collections = build(Some("abc"), rejected);
        assert!(notification(collections.add_to_watchlist(heat())).is_error());
    }

    #[test]
    fn add_answered_with_deletion_code_is_an_error() {
        let account = Arc::new(FakeAccount::replying(Ok(status(13))));
        let collections = build(Some("abc"), account);
        let note = notification(collections.add_to_watchlist(heat()));
        assert!(note.is_error());
        assert!(note.message.contains("Error adding"));

        let bare_success = Arc::new(FakeAccount::replying(Ok(StatusResponse {
            success: Some(true),
            ..Default::default()
        })));
        let collections = build(Some("abc"), bare_success);
        assert!(notification(collections.add_to_favorites(heat())).is_error());
    }

    #[test]
    fn signing_out_blocks_further_mutations() {
        let account = Arc::new(FakeAccount::replying(Ok(status(1))));
        let collections = build(Some("abc"), account.clone());
        assert!(!notification(collections.add_to_watchlist(heat())).is_error());
        assert_eq!(account.marks().len(), 1);

        collections.session.clear_session();
        assert_eq!(collections.add_to_favorites(heat()), Mutation::NeedsSession);
        assert_eq!(collections.add_to_watchlist(heat()), Mutation::NeedsSession);
        assert_eq!(account.marks().len(), 1);
    }

    #[test]
    fn signed_out_mutations_send_nothing() {
        let account = Arc::new(FakeAccount::replying(Ok(status(1))));
        let collections = build(None, account.clone());
        assert_eq!(collections.add_to_favorites(heat()), Mutation::NeedsSession);
        assert_eq!(collections.add_to_watchlist(heat()), Mutation::NeedsSession);
        assert!(account.marks().is_empty());
        assert!(collections
            .list_page(CollectionKind::Watchlist, MediaType::Movie, 1)
            .is_err());
    }

    #[test]
    fn removal_reconciles_only_after_success() {
        let query = CollectionQuery {
            kind: CollectionKind::Watchlist,
            media_type: MediaType::Movie,
        };
        let mut listing = Listing::new(query);
        let ticket = listing.start_first_page();
        listing.apply(
            ticket,
            Page {
                page: 1,
                results: vec![
                    MediaItem {
                        id: 949,
                        ..Default::default()
                    },
                    MediaItem {
                        id: 1,
                        ..Default::default()
                    },
                ],
                total_pages: 1,
                total_results: 2,
            },
        );

        let failing = build(Some("abc"), Arc::new(FakeAccount::replying(Ok(status(34)))));
        let Mutation::Reported(report) = failing.remove_from_watchlist(heat()) else {
            panic!("expected a report");
        };
        assert!(!report.succeeded());
        assert_eq!(reconcile(&mut listing, &report), 0);
        assert_eq!(listing.items().len(), 2);

        let account = Arc::new(FakeAccount::replying(Ok(status(13))));
        let working = build(Some("abc"), account.clone());
        let Mutation::Reported(report) = working.remove_from_watchlist(heat()) else {
            panic!("expected a report");
        };
        assert!(report.succeeded());
        assert!(!account.marks()[0].flag);
        assert_eq!(reconcile(&mut listing, &report), 1);
        assert_eq!(listing.items()[0].id, 1);
    }
}
