pub mod catalog;
pub mod config;
pub mod pick;
pub mod quota;
pub mod streak;

use std::error::Error;
use std::path::Path;

use dailypick_core::storage::{data_dir, KvBackend, UnavailableBackend};
use dailypick_core::{
    Catalog, Config, DateKeyProvider, Engine, PoolQuery, SqliteBackend, Store, TracingSink,
};
use serde::Serialize;

/// Everything a command needs to build an [`Engine`].
pub struct Session {
    pub store: Store,
    pub catalog: Catalog,
    pub dates: DateKeyProvider,
    pub config: Config,
}

impl Session {
    /// Load config, open the database and resolve the catalog.
    ///
    /// A database that cannot be opened is not fatal: the session runs
    /// without persistence and every pick is recomputed.
    ///
    /// The catalog is `catalog_path` if given, else `<data_dir>/catalog.json`
    /// if present, else the built-in one.
    pub fn open(catalog_path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let backend: Box<dyn KvBackend> = match SqliteBackend::open() {
            Ok(db) => Box::new(db),
            Err(e) => {
                tracing::warn!(error = %e, "storage unavailable, running without persistence");
                Box::new(UnavailableBackend)
            }
        };
        let store = Store::new(backend, config.storage.namespace.clone());
        let catalog = match catalog_path {
            Some(path) => Catalog::load(path)?,
            None => {
                let default_path = data_dir()?.join("catalog.json");
                if default_path.exists() {
                    Catalog::load(&default_path)?
                } else {
                    Catalog::builtin()
                }
            }
        };
        tracing::debug!(
            bands = catalog.bands.len(),
            items = catalog.items.len(),
            "catalog loaded"
        );
        let dates = DateKeyProvider::system(config.timezone.utc_offset_minutes);
        Ok(Self {
            store,
            catalog,
            dates,
            config,
        })
    }

    pub fn engine(&self) -> Engine<'_> {
        Engine::new(&self.store, &self.catalog, &self.dates, &self.config).with_sink(TracingSink)
    }

    /// Query from command-line filters; falls back to the configured band.
    pub fn query(&self, band: Option<String>, tags: &[String]) -> PoolQuery {
        let band = band.unwrap_or_else(|| self.config.selection.default_band.clone());
        tags.iter()
            .fold(PoolQuery::new().band(&band), |query, tag| query.tag(tag))
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
