//! A connected, authenticated participant.

use chrono::{DateTime, Utc};
use roomcast_protocol::{Account, Id};
use roomcast_session::ClientConnection;
use roomcast_transport::Connection;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::Keyed;

/// Which room a client is in and since when.
#[derive(Debug, Clone)]
struct Membership {
    room_id: Id,
    joined_at: DateTime<Utc>,
}

/// One participant: an account bound to a live connection.
///
/// Shared as `Arc<Client<C>>` between the client's own task, the room it
/// is in, and whoever is broadcasting into that room.
pub struct Client<C: Connection> {
    account: Account,
    connection: ClientConnection<C>,
    membership: RwLock<Membership>,
    /// Held for the whole of a room move so two moves of the same client
    /// cannot interleave their leave and join halves.
    move_lock: Mutex<()>,
}

impl<C: Connection> Client<C> {
    pub fn new(account: Account, connection: ClientConnection<C>) -> Self {
        Self {
            account,
            connection,
            membership: RwLock::new(Membership {
                room_id: Id::default(),
                joined_at: Utc::now(),
            }),
            move_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &Id {
        &self.account.id
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn username(&self) -> &str {
        &self.account.username
    }

    pub fn connection(&self) -> &ClientConnection<C> {
        &self.connection
    }

    /// The room this client was last added to. Empty before the first
    /// join.
    pub async fn room_id(&self) -> Id {
        self.membership.read().await.room_id.clone()
    }

    /// When the client entered its current room.
    pub async fn joined_at(&self) -> DateTime<Utc> {
        self.membership.read().await.joined_at
    }

    /// Serializes room moves for this client. Hold the guard from before
    /// leaving the old room until after joining the new one.
    pub async fn lock_membership(&self) -> MutexGuard<'_, ()> {
        self.move_lock.lock().await
    }

    pub(crate) async fn enter_room(&self, room_id: Id) {
        *self.membership.write().await = Membership {
            room_id,
            joined_at: Utc::now(),
        };
    }
}

impl<C: Connection> Keyed for Client<C> {
    fn key(&self) -> &Id {
        self.id()
    }
}
