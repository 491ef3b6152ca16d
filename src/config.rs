use std::sync::Arc;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    common::{audit::AuditAction, election::DEFAULT_UNSET_BALLOT_ORDER},
    mongodb::{ensure_indexes_exist, MongoStore},
};
use crate::store::SharedStore;
use crate::voting::TokenHasher;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Clone, Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_unset_ballot_order")]
    unset_ballot_order: i32,
    #[serde(default = "default_security_event_limit")]
    security_event_limit: usize,
    #[serde(default = "default_max_security_event_limit")]
    max_security_event_limit: usize,
    #[serde(default = "default_audit_checkpoint_action")]
    audit_checkpoint_action: AuditAction,
    // secrets
    fingerprint_secret: String,
    access_token_secret: String,
}

fn default_unset_ballot_order() -> i32 {
    DEFAULT_UNSET_BALLOT_ORDER
}

fn default_security_event_limit() -> usize {
    50
}

fn default_max_security_event_limit() -> usize {
    500
}

fn default_audit_checkpoint_action() -> AuditAction {
    AuditAction::SystemBackup
}

impl Config {
    /// Ballot order assumed for portfolios that don't specify one.
    pub fn unset_ballot_order(&self) -> i32 {
        self.unset_ballot_order
    }

    /// Number of security events returned when the caller gives no limit.
    pub fn security_event_limit(&self) -> usize {
        self.security_event_limit
    }

    /// Upper bound on any requested number of security events.
    pub fn max_security_event_limit(&self) -> usize {
        self.max_security_event_limit
    }

    /// The audit action that counts as an integrity checkpoint.
    pub fn audit_checkpoint_action(&self) -> AuditAction {
        self.audit_checkpoint_action
    }

    /// Secret key for voter fingerprints.
    pub fn fingerprint_secret(&self) -> &[u8] {
        self.fingerprint_secret.as_bytes()
    }

    /// Secret key the authentication service signs access tokens with.
    pub fn access_token_secret(&self) -> &[u8] {
        self.access_token_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it, along with the
/// voter fingerprint hasher derived from it, in managed state.
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
        if config.security_event_limit > config.max_security_event_limit {
            warn!(
                "security_event_limit ({}) exceeds max_security_event_limit ({}), it will be capped",
                config.security_event_limit, config.max_security_event_limit
            );
        }

        // Manage the state.
        let hasher = TokenHasher::new(config.fingerprint_secret());
        rocket = rocket.manage(config).manage(hasher);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database, ensures
/// the indexes the ballot path relies on, and places a MongoDB-backed store
/// into managed state. Does nothing if a store is already managed.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        if rocket.state::<SharedStore>().is_some() {
            debug!("Using pre-configured store");
            return Ok(rocket);
        }

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
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let store: SharedStore = Arc::new(MongoStore::new(client, db));
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
pub(crate) fn get_database_name() -> String {
    "tally".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self::example_with_secret("access token secret")
        }

        pub fn example_with_secret(access_token_secret: &str) -> Self {
            Self {
                unset_ballot_order: DEFAULT_UNSET_BALLOT_ORDER,
                security_event_limit: default_security_event_limit(),
                max_security_event_limit: default_max_security_event_limit(),
                audit_checkpoint_action: default_audit_checkpoint_action(),
                fingerprint_secret: "fingerprint secret".to_string(),
                access_token_secret: access_token_secret.to_string(),
            }
        }

        pub fn with_security_event_limits(mut self, default: usize, max: usize) -> Self {
            self.security_event_limit = default;
            self.max_security_event_limit = max;
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::{
        providers::{Format, Toml},
        Figment,
    };

    use super::*;

    #[test]
    fn secrets_are_required() {
        let figment = Figment::new().merge(Toml::string("fingerprint_secret = \"abc\""));
        assert!(figment.extract::<Config>().is_err());
    }

    #[test]
    fn defaults_apply() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            fingerprint_secret = "abc"
            access_token_secret = "def"
            "#,
        ));
        let config = figment.extract::<Config>().unwrap();
        assert_eq!(config.unset_ballot_order(), 0);
        assert_eq!(config.security_event_limit(), 50);
        assert_eq!(config.max_security_event_limit(), 500);
        assert_eq!(config.audit_checkpoint_action(), AuditAction::SystemBackup);
        assert_eq!(config.fingerprint_secret(), b"abc");
    }

    #[test]
    fn checkpoint_action_is_configurable() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            fingerprint_secret = "abc"
            access_token_secret = "def"
            audit_checkpoint_action = "ELECTION_APPROVED"
            unset_ballot_order = 99
            "#,
        ));
        let config = figment.extract::<Config>().unwrap();
        assert_eq!(config.audit_checkpoint_action(), AuditAction::ElectionApproved);
        assert_eq!(config.unset_ballot_order(), 99);
    }
}
