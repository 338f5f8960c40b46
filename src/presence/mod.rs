use thiserror::Error;

use crate::track::TrackSnapshot;

mod activity;
mod client;
mod ipc;

pub use activity::Activity;
pub use client::DiscordIpc;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("no presence endpoint is listening")]
    NoEndpoint,

    #[error("connection already closed: {0}")]
    ConnectionClosed(String),

    #[error("call rejected ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Opens connections to the presence service
pub trait PresenceConnector {
    type Connection: PresenceConnection;

    fn connect(&self) -> Result<Self::Connection, PresenceError>;
}

/// A live presence session
pub trait PresenceConnection {
    fn set_activity(&mut self, activity: &Activity) -> Result<(), PresenceError>;

    /// Consumes the session. An error still means the session is gone.
    fn close(self) -> Result<(), PresenceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// The service had already dropped us; we are now disconnected
    ConnectionLost,
    /// Connect or update failed; try again next tick
    Failed,
    /// Nothing complete enough to publish
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    Disconnected,
    /// Nothing was connected
    AlreadyDown,
    /// Disconnect raised; the session is considered closed anyway
    ForcedDown,
}

/// Owns the (optional) presence session; connects on first publish.
pub struct PresencePublisher<C: PresenceConnector> {
    connector: C,
    connection: Option<C::Connection>,
}

impl<C: PresenceConnector> PresencePublisher<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn publish(&mut self, snapshot: &TrackSnapshot) -> PublishOutcome {
        let mut connection = match self.connection.take() {
            Some(connection) => connection,
            None => match self.connector.connect() {
                Ok(connection) => {
                    tracing::info!("[Presence] Connected");
                    connection
                }
                Err(e) => {
                    tracing::warn!("[Presence] Connect failed: {}", e);
                    return PublishOutcome::Failed;
                }
            },
        };

        let activity = Activity::from_snapshot(snapshot);
        match connection.set_activity(&activity) {
            Ok(()) => {
                self.connection = Some(connection);
                PublishOutcome::Published
            }
            Err(PresenceError::ConnectionClosed(reason)) => {
                tracing::info!("[Presence] Connection already closed ({}), treating as disconnected", reason);
                PublishOutcome::ConnectionLost
            }
            Err(e @ PresenceError::Rejected { .. }) => {
                tracing::warn!("[Presence] Activity update rejected: {}", e);
                self.connection = Some(connection);
                PublishOutcome::Failed
            }
            Err(e) => {
                tracing::warn!("[Presence] Activity update failed, dropping connection: {}", e);
                PublishOutcome::Failed
            }
        }
    }

    /// Idempotent: with nothing connected this is a no-op.
    pub fn disconnect(&mut self) -> TeardownOutcome {
        let Some(connection) = self.connection.take() else {
            return TeardownOutcome::AlreadyDown;
        };

        match connection.close() {
            Ok(()) => TeardownOutcome::Disconnected,
            Err(e) => {
                tracing::warn!("[Presence] Disconnect raised, treating as closed: {}", e);
                TeardownOutcome::ForcedDown
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory presence service that records every call.

    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Connect,
        Update(Activity),
        Close,
    }

    #[derive(Clone, Default)]
    pub struct FakeService {
        pub calls: Rc<RefCell<Vec<Call>>>,
        pub refuse_connect: Rc<Cell<bool>>,
        pub close_on_update: Rc<Cell<bool>>,
        pub reject_update: Rc<Cell<bool>>,
        pub fail_close: Rc<Cell<bool>>,
    }

    impl FakeService {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        pub fn updates(&self) -> Vec<Activity> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Update(activity) => Some(activity),
                    _ => None,
                })
                .collect()
        }
    }

    pub struct FakeConnection {
        service: FakeService,
    }

    impl PresenceConnector for FakeService {
        type Connection = FakeConnection;

        fn connect(&self) -> Result<FakeConnection, PresenceError> {
            if self.refuse_connect.get() {
                return Err(PresenceError::NoEndpoint);
            }
            self.calls.borrow_mut().push(Call::Connect);
            Ok(FakeConnection { service: self.clone() })
        }
    }

    impl PresenceConnection for FakeConnection {
        fn set_activity(&mut self, activity: &Activity) -> Result<(), PresenceError> {
            if self.service.close_on_update.get() {
                return Err(PresenceError::ConnectionClosed("pipe closed".into()));
            }
            if self.service.reject_update.get() {
                return Err(PresenceError::Rejected {
                    code: 4000,
                    message: "invalid payload".into(),
                });
            }
            self.service.calls.borrow_mut().push(Call::Update(activity.clone()));
            Ok(())
        }

        fn close(self) -> Result<(), PresenceError> {
            self.service.calls.borrow_mut().push(Call::Close);
            if self.service.fail_close.get() {
                return Err(PresenceError::Protocol("process exit during disconnect".into()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Call, FakeService};
    use super::*;

    fn snapshot() -> TrackSnapshot {
        TrackSnapshot {
            title: Some("Song".into()),
            artist: Some("Band".into()),
            album: Some("Record".into()),
            is_playing: true,
            ..TrackSnapshot::default()
        }
    }

    #[test]
    fn publish_connects_on_first_use() {
        let service = FakeService::default();
        let mut publisher = PresencePublisher::new(service.clone());
        assert!(!publisher.is_connected());

        assert_eq!(publisher.publish(&snapshot()), PublishOutcome::Published);
        assert_eq!(publisher.publish(&snapshot()), PublishOutcome::Published);
        assert!(publisher.is_connected());

        let calls = service.calls();
        assert_eq!(calls.iter().filter(|c| **c == Call::Connect).count(), 1);
        assert_eq!(service.updates().len(), 2);
    }

    #[test]
    fn connect_failure_leaves_publisher_disconnected() {
        let service = FakeService::default();
        service.refuse_connect.set(true);
        let mut publisher = PresencePublisher::new(service.clone());

        assert_eq!(publisher.publish(&snapshot()), PublishOutcome::Failed);
        assert!(!publisher.is_connected());
        assert!(service.calls().is_empty());
    }

    #[test]
    fn closed_connection_is_treated_as_disconnected() {
        let service = FakeService::default();
        let mut publisher = PresencePublisher::new(service.clone());
        publisher.publish(&snapshot());

        service.close_on_update.set(true);
        assert_eq!(publisher.publish(&snapshot()), PublishOutcome::ConnectionLost);
        assert!(!publisher.is_connected());

        // Next publish reconnects
        service.close_on_update.set(false);
        assert_eq!(publisher.publish(&snapshot()), PublishOutcome::Published);
        assert_eq!(service.calls().iter().filter(|c| **c == Call::Connect).count(), 2);
    }

    #[test]
    fn rejected_update_keeps_connection() {
        let service = FakeService::default();
        let mut publisher = PresencePublisher::new(service.clone());
        publisher.publish(&snapshot());

        service.reject_update.set(true);
        assert_eq!(publisher.publish(&snapshot()), PublishOutcome::Failed);
        assert!(publisher.is_connected());

        // Same session is reused once the service accepts again
        service.reject_update.set(false);
        assert_eq!(publisher.publish(&snapshot()), PublishOutcome::Published);
        assert_eq!(service.calls().iter().filter(|c| **c == Call::Connect).count(), 1);
        assert_eq!(service.updates().len(), 2);
    }

    #[test]
    fn disconnect_twice_is_harmless() {
        let service = FakeService::default();
        let mut publisher = PresencePublisher::new(service.clone());
        publisher.publish(&snapshot());

        assert_eq!(publisher.disconnect(), TeardownOutcome::Disconnected);
        assert!(!publisher.is_connected());
        assert_eq!(publisher.disconnect(), TeardownOutcome::AlreadyDown);
        assert!(!publisher.is_connected());
        assert_eq!(service.calls().iter().filter(|c| **c == Call::Close).count(), 1);
    }

    #[test]
    fn failing_disconnect_still_disconnects() {
        let service = FakeService::default();
        service.fail_close.set(true);
        let mut publisher = PresencePublisher::new(service);
        publisher.publish(&snapshot());

        assert_eq!(publisher.disconnect(), TeardownOutcome::ForcedDown);
        assert!(!publisher.is_connected());
    }
}
