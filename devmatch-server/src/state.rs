use std::sync::Arc;

use sled::Db;

use crate::config::Config;
use crate::error::Result;
use crate::users::Users;

/// Everything a handler needs, handed to the router through an `Extension` layer.
#[derive(Clone)]
pub struct State {
    pub db: Db,
    pub users: Users,
    pub config: Arc<Config>,
}

impl State {
    pub fn new(config: Config) -> Result<Self> {
        let db = sled::open(&config.db_path)?;
        Self::with_db(db, config)
    }

    /// In-memory store removed on drop, for tests and throwaway runs.
    pub fn temporary(config: Config) -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db, config)
    }

    fn with_db(db: Db, config: Config) -> Result<Self> {
        Ok(Self {
            users: Users::open(&db)?,
            db,
            config: Arc::new(config),
        })
    }
}
