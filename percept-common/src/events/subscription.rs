//! Per-table view over the change bus

use tokio::sync::broadcast::{self, error::RecvError};

use super::{ChangeEvent, Table};

/// Receiver that only yields events of one table
///
/// Dropping the subscription unsubscribes it.
pub struct ChangeSubscription {
    table: Table,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ChangeSubscription {
    pub fn new(table: Table, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { table, rx }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// Wait for the next event of this subscription's table
    ///
    /// Returns `RecvError::Lagged` when events were dropped for this
    /// receiver, and `RecvError::Closed` once the publisher is gone.
    pub async fn recv(&mut self) -> Result<ChangeEvent, RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if event.table == self.table {
                return Ok(event);
            }
        }
    }
}
