#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::clock::{ClockFairing, SharedClock};
use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::store::SharedStore;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;
pub mod voting;

/// The production server: MongoDB-backed store and the system clock.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build())
}

/// A server over the given store and clock, e.g. a [`store::MemoryStore`]
/// for local runs without a database.
pub fn rocket_with(store: SharedStore, clock: SharedClock) -> Rocket<Build> {
    assemble(rocket::build().manage(store).manage(clock))
}

fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(ClockFairing)
}

/// A client for the test database, at the configured `db_uri`.
#[cfg(test)]
async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .expect("Could not connect to the test database")
}

/// A fresh database name for one test.
#[cfg(test)]
fn database() -> String {
    config::get_database_name()
}
