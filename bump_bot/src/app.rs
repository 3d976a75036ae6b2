use std::sync::Arc;

use crate::{backfill::HistoryScan, database::Database};

/// State handed to every event handler and command.
pub struct App {
    pub database: Arc<Database>,
    pub history_scan: HistoryScan,
}

impl App {
    pub fn new(database: Arc<Database>) -> Self {
        App {
            database,
            history_scan: HistoryScan::new(),
        }
    }
}
