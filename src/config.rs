use std::path::{Path, PathBuf};

use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    fs::FileServer,
    Build, Rocket,
};
use serde::Deserialize;

use crate::store::{self, StorageKind};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    storage: StorageKind,
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default = "default_seed_questions")]
    seed_questions: bool,
    #[serde(default)]
    static_dir: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_seed_questions() -> bool {
    true
}

impl Config {
    /// Which backend persists questions and votes.
    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    /// Directory holding the JSON files or the SQLite database.
    /// Created on launch if missing.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Whether a fresh store is populated with the default questions.
    pub fn seed_questions(&self) -> bool {
        self.seed_questions
    }

    /// Directory of frontend files to serve at `/`, if any.
    pub fn static_dir(&self) -> Option<&Path> {
        self.static_dir.as_deref()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        Ok(rocket.manage(config))
    }
}

/// A fairing that opens the configured store, seeding it if needed, and
/// places the resulting [`store::Store`] into managed state.
///
/// Must be attached after [`ConfigFairing`].
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Poll store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = rocket.state::<Config>().cloned() else {
            error!("Store fairing ran before the config was loaded");
            return Err(rocket);
        };
        info!(
            "Opening {} store in {}...",
            config.storage(),
            config.data_dir().display()
        );

        let store = match store::open(
            config.storage(),
            config.data_dir(),
            config.seed_questions(),
        ) {
            Ok(store) => store,
            Err(e) => {
                error!("Failed to open store: {e}");
                return Err(rocket);
            }
        };
        info!("...store online!");

        Ok(rocket.manage(store))
    }
}

/// A fairing that serves the frontend from `static_dir`, if configured.
///
/// File server routes rank below every API route.
pub struct StaticFilesFairing;

#[rocket::async_trait]
impl Fairing for StaticFilesFairing {
    fn info(&self) -> Info {
        Info {
            name: "Static files",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(dir) = rocket
            .state::<Config>()
            .and_then(|config| config.static_dir())
            .map(Path::to_path_buf)
        else {
            return Ok(rocket);
        };

        if !dir.is_dir() {
            warn!(
                "Static directory {} does not exist, not serving a frontend",
                dir.display()
            );
            return Ok(rocket);
        }

        info!("Serving frontend from {}", dir.display());
        Ok(rocket.mount("/", FileServer::from(dir)))
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use super::*;

    #[test]
    fn defaults() {
        let config: Config = Figment::new().extract().unwrap();
        assert_eq!(config.storage(), StorageKind::Json);
        assert_eq!(config.data_dir(), Path::new("data"));
        assert!(config.seed_questions());
        assert_eq!(config.static_dir(), None);
    }

    #[test]
    fn overrides() {
        let config: Config = Figment::new()
            .merge(("storage", "sqlite"))
            .merge(("data_dir", "/var/lib/poll"))
            .merge(("seed_questions", false))
            .merge(("static_dir", "static"))
            .extract()
            .unwrap();
        assert_eq!(config.storage(), StorageKind::Sqlite);
        assert_eq!(config.data_dir(), Path::new("/var/lib/poll"));
        assert!(!config.seed_questions());
        assert_eq!(config.static_dir(), Some(Path::new("static")));
    }

    #[test]
    fn unknown_storage() {
        let result = Figment::new()
            .merge(("storage", "mongodb"))
            .extract::<Config>();
        assert!(result.is_err());
    }
}
