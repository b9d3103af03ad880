//! Layered configuration resolution
//!
//! Precedence (lowest to highest):
//! 1. Defaults of bound flags (only for keys without a compiled default)
//! 2. Compiled defaults: `Resolver::set_default`
//! 3. Config file: path given by the config flag, else `$HOME/.cobra.yaml`
//! 4. Environment variables named after the key: `author` -> `AUTHOR`,
//!    `server.port` -> `SERVER__PORT`
//! 5. Bound flags that were supplied on the command line
//!
//! A missing or broken config file is reported through [`LoadOutcome`] and
//! never stops the command from running.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, Value, ValueKind};
use tracing::{debug, instrument, warn};

use crate::errors::ConfigLoadError;
use crate::flags::FlagSet;

/// File searched in the home directory when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = ".cobra.yaml";

/// Replaces `.` of nested keys in environment variable names.
pub const ENV_SEPARATOR: &str = "__";

/// Snapshot of the process surroundings the resolver reads from.
#[derive(Debug, Clone, Default)]
pub struct ProcessEnv {
    pub home_dir: Option<PathBuf>,
    pub vars: HashMap<String, String>,
}

impl ProcessEnv {
    pub fn capture() -> Self {
        Self {
            home_dir: directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
            vars: std::env::vars().collect(),
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

/// What happened to the config file during initialization.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(PathBuf),
    Skipped(ConfigLoadError),
}

#[derive(Debug, Default)]
pub struct Resolver {
    defaults: BTreeMap<String, String>,
    bindings: BTreeMap<String, String>,
    config_flag: Option<String>,
    /// Flag defaults and compiled defaults, as assembled at initialization.
    baseline: BTreeMap<String, String>,
    store: Config,
    outcome: Option<LoadOutcome>,
}

fn normalize(key: &str) -> String {
    key.to_lowercase()
}

/// Environment variable consulted for `key`.
pub fn env_var_name(key: &str) -> String {
    normalize(key).replace('.', ENV_SEPARATOR).to_uppercase()
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default(&mut self, key: &str, value: impl Into<String>) {
        self.defaults.insert(normalize(key), value.into());
    }

    /// Let the command-line value of `flag` override `key` when supplied.
    pub fn bind_flag(&mut self, key: &str, flag: impl Into<String>) {
        self.bindings.insert(normalize(key), flag.into());
    }

    /// Flag whose value, when non-empty, is the config file path.
    pub fn use_config_flag(&mut self, flag: impl Into<String>) {
        self.config_flag = Some(flag.into());
    }

    /// Every key with a default or a flag binding.
    pub fn keys(&self) -> BTreeSet<String> {
        self.defaults
            .keys()
            .chain(self.bindings.keys())
            .cloned()
            .collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn config_file_used(&self) -> Option<&Path> {
        match &self.outcome {
            Some(LoadOutcome::Loaded(path)) => Some(path),
            _ => None,
        }
    }

    /// Value of `key` from the highest-precedence layer defining it.
    ///
    /// Before initialization only compiled defaults are visible. A key the
    /// config file leaves empty (`author:`) counts as undefined there.
    pub fn get(&self, key: &str) -> Option<String> {
        let key = normalize(key);
        if self.outcome.is_none() {
            return self.defaults.get(&key).cloned();
        }
        match self.store.get::<Value>(&key) {
            Ok(value) if !matches!(value.kind, ValueKind::Nil) => value.into_string().ok(),
            _ => self.baseline.get(&key).cloned(),
        }
    }

    /// Like [`Resolver::get`], empty when the key is absent.
    pub fn get_string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }

    /// Assemble all layers. Runs once; later calls return `None`.
    #[instrument(level = "debug", skip_all)]
    pub fn initialize(&mut self, env: &ProcessEnv, flags: &FlagSet) -> Option<&LoadOutcome> {
        if self.outcome.is_some() {
            debug!("configuration already initialized");
            return None;
        }

        let (file, mut outcome) = match self.locate(env, flags).and_then(load_file) {
            Ok((path, file)) => (Some(file), LoadOutcome::Loaded(path)),
            Err(e) => {
                debug!("config file skipped: {e}");
                (None, LoadOutcome::Skipped(e))
            }
        };

        self.baseline = self.default_layer(flags);
        self.store = match self.assemble(file, env, flags) {
            Ok(store) => store,
            Err(e) => {
                warn!("cannot assemble configuration: {e}");
                outcome = LoadOutcome::Skipped(ConfigLoadError::Build(e));
                Config::default()
            }
        };
        self.outcome = Some(outcome);
        self.outcome.as_ref()
    }

    fn locate(&self, env: &ProcessEnv, flags: &FlagSet) -> Result<PathBuf, ConfigLoadError> {
        let explicit = self
            .config_flag
            .as_deref()
            .and_then(|name| flags.lookup(name).ok())
            .map(|flag| flag.value().to_string())
            .filter(|path| !path.is_empty());

        let path = match explicit {
            Some(raw) => {
                let expanded = shellexpand::tilde_with_context(&raw, || {
                    env.home_dir.as_deref().and_then(Path::to_str)
                });
                PathBuf::from(expanded.as_ref())
            }
            None => env
                .home_dir
                .as_ref()
                .ok_or(ConfigLoadError::NoHomeDir)?
                .join(CONFIG_FILE_NAME),
        };
        debug!(path = %path.display(), "config file candidate");

        if !path.is_file() {
            return Err(ConfigLoadError::NotFound(path));
        }
        Ok(path)
    }

    fn assemble(
        &self,
        file: Option<Config>,
        env: &ProcessEnv,
        flags: &FlagSet,
    ) -> Result<Config, ConfigError> {
        let mut builder = Config::builder();
        for (key, value) in &self.baseline {
            builder = builder.set_default(key, value.as_str())?;
        }

        if let Some(file) = file {
            builder = builder.add_source(file);
        }

        builder = builder.add_source(
            Environment::default()
                .separator(ENV_SEPARATOR)
                .source(Some(self.env_overlay(env))),
        );

        for (key, flag_name) in &self.bindings {
            match flags.lookup(flag_name) {
                Ok(flag) if flag.changed() => {
                    debug!(key = key.as_str(), flag = flag_name.as_str(), "flag overrides config");
                    builder = builder.set_override(key, flag.value().to_string())?;
                }
                Ok(_) => {}
                Err(e) => warn!(key = key.as_str(), "bound flag unavailable: {e}"),
            }
        }

        builder.build()
    }

    /// Bound flag defaults under compiled defaults; a compiled default wins.
    fn default_layer(&self, flags: &FlagSet) -> BTreeMap<String, String> {
        let mut layer: BTreeMap<String, String> = self
            .bindings
            .iter()
            .filter_map(|(key, flag_name)| {
                let flag = flags.lookup(flag_name).ok()?;
                Some((key.clone(), flag.spec().default_value().to_string()))
            })
            .collect();
        layer.extend(self.defaults.clone());
        layer
    }

    /// Non-empty environment variables matching declared keys.
    fn env_overlay(&self, env: &ProcessEnv) -> config::Map<String, String> {
        self.keys()
            .into_iter()
            .filter_map(|key| {
                let name = env_var_name(&key);
                env.vars
                    .get(&name)
                    .filter(|value| !value.is_empty())
                    .map(|value| (name, value.clone()))
            })
            .collect()
    }
}

fn load_file(path: PathBuf) -> Result<(PathBuf, Config), ConfigLoadError> {
    match Config::builder()
        .add_source(File::from(path.as_path()).required(true))
        .build()
    {
        Ok(file) => Ok((path, file)),
        Err(source) => Err(ConfigLoadError::Parse { path, source }),
    }
}
