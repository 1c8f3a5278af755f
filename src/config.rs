use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::engine::Engine;
use crate::model::mongodb::ensure_indexes_exist;
use crate::store::{MemoryStore, MongoStore};

/// Which persistence backend the engine runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Mongodb,
    /// Process-local tables, lost on shutdown. For development and mock mode.
    Memory,
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default)]
    store: StoreKind,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Secret key bearer tokens are verified with.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    pub fn store(&self) -> StoreKind {
        self.store
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    db_name: Option<String>,
    // secrets
    db_uri: String,
}

/// A fairing that builds the store named by the config, performs any setup
/// necessary, and places an [`Engine`] over it into managed state.
///
/// Must be attached after [`ConfigFairing`].
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let kind = match rocket.state::<Config>() {
            Some(config) => config.store(),
            None => {
                error!("Store fairing attached before the config was loaded");
                return Err(rocket);
            }
        };

        match kind {
            StoreKind::Memory => {
                warn!("Using the in-memory store, nothing will persist past shutdown");
                Ok(rocket.manage(Engine::new(MemoryStore::new())))
            }
            StoreKind::Mongodb => connect_mongodb(rocket).await,
        }
    }
}

async fn connect_mongodb(rocket: Rocket<Build>) -> rocket::fairing::Result {
    // Load the config.
    let config = match rocket.figment().extract::<DbConfig>() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load database config");
            rocket::config::pretty_print_error(e);
            return Err(rocket);
        }
    };
    info!("Loaded database config, connecting...");
    // Construct the connection.
    let client = match MongoClient::with_uri_str(config.db_uri).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
    };
    let db = client.database(&get_database_name(config.db_name));

    // Ensure the required indexes exist.
    if let Err(e) = ensure_indexes_exist(&db).await {
        error!("Failed to connect to database: {e}");
        return Err(rocket);
    }
    info!("...database connection online!");

    // Manage the state.
    Ok(rocket.manage(Engine::new(MongoStore::new(client, db))))
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
pub(crate) fn get_database_name(configured: Option<String>) -> String {
    configured.unwrap_or_else(|| "emeeting".to_string())
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn get_database_name(_configured: Option<String>) -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}
