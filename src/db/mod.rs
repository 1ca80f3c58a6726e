pub mod event_repository;
pub mod user_repository;

use sled::Db;

#[derive(Clone)]
pub struct Database {
    pub db: Db,
}

impl Database {
    pub fn new(path: &str) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Database { db })
    }

    /// Temporary store for tests; removed when dropped.
    #[allow(dead_code)]
    pub fn in_memory() -> Result<Self, sled::Error> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Database { db })
    }
}
