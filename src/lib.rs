#[macro_use]
extern crate rocket;
#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;

pub use config::Config;

use config::{ConfigFairing, StoreFairing};
use logging::LoggerFairing;

/// Assemble the server. The store and engine are set up at ignition from the
/// loaded config.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
}

/// A server over the given store, with the example config.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: impl store::Store + 'static) -> Rocket<Build> {
    rocket::build()
        .manage(Config::example())
        .manage(engine::Engine::new(store))
        .attach(LoggerFairing)
        .mount("/", api::routes())
}

/// A MongoDB store over a fresh, randomly named database on the configured `db_uri`.
#[cfg(test)]
pub(crate) async fn mongo_store() -> (store::MongoStore, mongodb::Database) {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    let client = mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|e| panic!("Could not connect to database with `db_uri` \"{db_uri}\": {e}"));
    let db = client.database(&config::get_database_name(None));
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    (store::MongoStore::new(client, db.clone()), db)
}

/// Route test logging through log4rs, once per test binary.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    log4rs_test_utils::test_logging::init_logging_once_for(["emeeting_backend"], None, None);
}
