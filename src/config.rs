//! Configuration of the enrollment authority.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt, fs, io};

use log::{LevelFilter, info};
use serde::de;
use serde::{Deserialize, Deserializer};

use crate::commons::util::ext_serde;
use crate::constants::*;
use crate::signing::{KeyAlgorithm, SignerError};


//------------ ConfigDefaults ------------------------------------------------

pub struct ConfigDefaults;

impl ConfigDefaults {
    fn data_dir() -> PathBuf {
        PathBuf::from("./data")
    }

    fn log_level() -> LevelFilter {
        match env::var(CERTENROLL_ENV_LOG_LEVEL) {
            Ok(level) => match LevelFilter::from_str(&level) {
                Ok(level) => level,
                Err(_) => {
                    eprintln!(
                        "Unrecognized value for log level in env var {}, using 'info'",
                        CERTENROLL_ENV_LOG_LEVEL
                    );
                    LevelFilter::Info
                }
            },
            _ => LevelFilter::Info,
        }
    }

    fn log_type() -> LogType {
        match env::var(CERTENROLL_ENV_LOG_TYPE) {
            Ok(log_type) => match log_type.as_str() {
                "file" => LogType::File,
                "syslog" => LogType::Syslog,
                _ => LogType::Stderr,
            },
            _ => LogType::Stderr,
        }
    }

    fn log_file() -> PathBuf {
        PathBuf::from("./certenroll.log")
    }

    fn syslog_facility() -> String {
        "daemon".to_string()
    }

    fn call_timeout_seconds() -> u64 {
        30
    }

    fn default_profile() -> String {
        "default".to_string()
    }

    fn ca_mode() -> CaMode {
        CaMode::Generate
    }

    fn subject_continuity() -> bool {
        true
    }

    fn server_keygen_algorithm() -> KeyAlgorithm {
        KeyAlgorithm::EcP256
    }

    fn validity_days() -> u32 {
        365
    }

    fn min_rsa_bits() -> u32 {
        2048
    }

    fn min_ec_bits() -> u32 {
        256
    }

    fn require_common_name() -> bool {
        true
    }
}


//------------ Config --------------------------------------------------------

/// Global configuration for the enrollment authority.
///
/// This will parse the config file at `/etc/certenroll.conf` unless another
/// file is explicitly specified.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "ConfigDefaults::data_dir")]
    pub data_dir: PathBuf,

    #[serde(
        default = "ConfigDefaults::log_level",
        deserialize_with = "ext_serde::de_level_filter"
    )]
    pub log_level: LevelFilter,

    #[serde(default = "ConfigDefaults::log_type")]
    pub log_type: LogType,

    #[serde(default = "ConfigDefaults::log_file")]
    pub log_file: PathBuf,

    #[serde(default = "ConfigDefaults::syslog_facility")]
    pub syslog_facility: String,

    /// Applies to calls whose context does not carry a deadline yet.
    ///
    /// Zero disables the timeout.
    #[serde(default = "ConfigDefaults::call_timeout_seconds")]
    pub call_timeout_seconds: u64,

    /// The profile used for requests with an empty profile name.
    #[serde(default = "ConfigDefaults::default_profile")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

impl Config {
    /// Returns the call timeout, if any.
    pub fn call_timeout(&self) -> Option<Duration> {
        if self.call_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.call_timeout_seconds))
        }
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// A config with a single generated profile under `data_dir`.
    pub fn test(data_dir: &Path) -> Self {
        Config {
            data_dir: data_dir.to_path_buf(),
            log_level: LevelFilter::Debug,
            log_type: LogType::Stderr,
            log_file: ConfigDefaults::log_file(),
            syslog_facility: ConfigDefaults::syslog_facility(),
            call_timeout_seconds: ConfigDefaults::call_timeout_seconds(),
            default_profile: ConfigDefaults::default_profile(),
            profiles: vec![ProfileConfig::generated("default")],
        }
    }
}

impl Config {
    /// Creates the config from the given file, starts logging and verifies.
    pub fn create(config_file: &str) -> Result<Self, ConfigError> {
        let config = match Self::read_config(config_file) {
            Err(e) => {
                if config_file == CERTENROLL_DEFAULT_CONFIG_FILE {
                    Err(ConfigError::other(
                        "Cannot find config file. Please use --config to specify its location.",
                    ))
                } else {
                    Err(ConfigError::Other(format!(
                        "Error parsing config file: {}, error: {}",
                        config_file, e
                    )))
                }
            }
            Ok(config) => {
                config.init_logging()?;
                info!("{} uses configuration file: {}", CERTENROLL_APP, config_file);
                Ok(config)
            }
        }?;
        config.verify().map_err(|e| {
            ConfigError::Other(format!(
                "Error parsing config file: {}, error: {}",
                config_file, e
            ))
        })?;
        Ok(config)
    }

    pub fn verify(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for profile in &self.profiles {
            if profile.name.is_empty() {
                return Err(ConfigError::other("profile name must not be empty"));
            }
            if !names.insert(profile.name.as_str()) {
                return Err(ConfigError::Other(format!(
                    "duplicate profile name '{}'",
                    profile.name
                )));
            }
            profile.verify()?;
        }

        if !self.default_profile.is_empty() && self.profile(&self.default_profile).is_none() {
            return Err(ConfigError::Other(format!(
                "default_profile '{}' is not a configured profile",
                self.default_profile
            )));
        }

        Ok(())
    }

    pub fn read_config(file: &str) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(file)?;
        let c: Config = toml::from_str(&s)?;
        Ok(c)
    }

    /// Installs the global logger for the configured log target.
    ///
    /// Fails if the target cannot be opened, or when called a second time.
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        let output: fern::Output = match self.log_type {
            LogType::Stderr => io::stderr().into(),
            LogType::File => fern::log_file(&self.log_file)
                .map_err(|e| {
                    ConfigError::Other(format!(
                        "Failed to open log file '{}': {}",
                        self.log_file.display(),
                        e
                    ))
                })?
                .into(),
            #[cfg(unix)]
            LogType::Syslog => self.syslog_output()?,
            #[cfg(not(unix))]
            LogType::Syslog => {
                return Err(ConfigError::other(
                    "syslog is not supported on this platform",
                ));
            }
        };
        self.fern_logger()
            .chain(output)
            .apply()
            .map_err(|e| {
                ConfigError::Other(format!("Failed to init {} logging: {}", self.log_type, e))
            })
    }

    /// Connects to the local syslog, trying unix socket, TCP and UDP.
    #[cfg(unix)]
    fn syslog_output(&self) -> Result<fern::Output, ConfigError> {
        let facility = syslog::Facility::from_str(&self.syslog_facility)
            .map_err(|_| ConfigError::other("Invalid syslog_facility"))?;
        let process = env::current_exe()
            .ok()
            .as_deref()
            .and_then(Path::file_name)
            .and_then(std::ffi::OsStr::to_str)
            .unwrap_or("certenroll")
            .to_string();
        let formatter = syslog::Formatter3164 {
            facility,
            hostname: None,
            process,
            pid: std::process::id(),
        };
        let logger = syslog::unix(formatter.clone())
            .or_else(|_| syslog::tcp(formatter.clone(), ("127.0.0.1", 601)))
            .or_else(|_| syslog::udp(formatter, ("127.0.0.1", 0), ("127.0.0.1", 514)))
            .map_err(|e| ConfigError::Other(format!("Cannot connect to syslog: {}", e)))?;
        Ok(logger.into())
    }

    /// Creates and returns a fern logger with log level tweaks
    fn fern_logger(&self) -> fern::Dispatch {
        // suppress overly noisy logging
        let framework_level = self.log_level.min(LevelFilter::Warn);
        let file_level = self.log_level.min(LevelFilter::Debug);

        let show_target =
            self.log_level == LevelFilter::Trace || self.log_level == LevelFilter::Debug;
        fern::Dispatch::new()
            .format(move |out, message, record| {
                if show_target {
                    out.finish(format_args!(
                        "{} [{}] [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        record.target(),
                        message
                    ))
                } else {
                    out.finish(format_args!(
                        "{} [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        message
                    ))
                }
            })
            .level(self.log_level)
            .level_for("mio", framework_level)
            .level_for("tokio_util", framework_level)
            .level_for("tracing::span::active", framework_level)
            .level_for("certenroll::commons::util::file", file_level)
    }
}


//------------ ProfileConfig -------------------------------------------------

/// The configuration of a single enrollment profile.
#[derive(Clone, Debug, Deserialize)]
pub struct ProfileConfig {
    pub name: String,

    #[serde(default = "ConfigDefaults::ca_mode")]
    pub ca_mode: CaMode,

    /// The issuing CA certificate, PEM.
    pub ca_cert: Option<PathBuf>,

    /// The issuing CA private key, PEM.
    pub ca_key: Option<PathBuf>,

    /// Further CA certificates up to the trust anchor, PEM.
    #[serde(default)]
    pub ca_chain: Vec<PathBuf>,

    /// Extra trust anchors for validating presented certificates, PEM.
    #[serde(default)]
    pub trust_anchors: Vec<PathBuf>,

    #[serde(default)]
    pub require_credential: bool,

    #[serde(default = "ConfigDefaults::subject_continuity")]
    pub subject_continuity: bool,

    #[serde(default)]
    pub allow_server_keygen: bool,

    #[serde(default = "ConfigDefaults::server_keygen_algorithm")]
    pub server_keygen_algorithm: KeyAlgorithm,

    #[serde(default = "ConfigDefaults::validity_days")]
    pub validity_days: u32,

    #[serde(default = "ConfigDefaults::min_rsa_bits")]
    pub min_rsa_bits: u32,

    #[serde(default = "ConfigDefaults::min_ec_bits")]
    pub min_ec_bits: u32,

    #[serde(default = "ConfigDefaults::require_common_name")]
    pub require_common_name: bool,
}

impl ProfileConfig {
    /// A profile with a generated CA and default settings.
    pub fn generated(name: &str) -> Self {
        ProfileConfig {
            name: name.to_string(),
            ca_mode: CaMode::Generate,
            ca_cert: None,
            ca_key: None,
            ca_chain: vec![],
            trust_anchors: vec![],
            require_credential: false,
            subject_continuity: ConfigDefaults::subject_continuity(),
            allow_server_keygen: false,
            server_keygen_algorithm: ConfigDefaults::server_keygen_algorithm(),
            validity_days: ConfigDefaults::validity_days(),
            min_rsa_bits: ConfigDefaults::min_rsa_bits(),
            min_ec_bits: ConfigDefaults::min_ec_bits(),
            require_common_name: ConfigDefaults::require_common_name(),
        }
    }

    fn verify(&self) -> Result<(), ConfigError> {
        if self.validity_days == 0 {
            return Err(ConfigError::Other(format!(
                "profile '{}': validity_days must be at least 1",
                self.name
            )));
        }
        if self.ca_mode == CaMode::Existing && (self.ca_cert.is_none() || self.ca_key.is_none())
        {
            return Err(ConfigError::Other(format!(
                "profile '{}': ca_mode \"existing\" requires ca_cert and ca_key",
                self.name
            )));
        }
        Ok(())
    }
}


//------------ ConfigError ---------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    TomlError(toml::de::Error),
    SignerError(SignerError),
    Other(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => e.fmt(f),
            ConfigError::TomlError(e) => e.fmt(f),
            ConfigError::SignerError(e) => e.fmt(f),
            ConfigError::Other(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn other(s: &str) -> ConfigError {
        ConfigError::Other(s.to_string())
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::IoError(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::TomlError(e)
    }
}

impl From<SignerError> for ConfigError {
    fn from(e: SignerError) -> Self {
        ConfigError::SignerError(e)
    }
}


//------------ LogType -------------------------------------------------------

/// The target to log to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogType {
    Stderr,
    File,
    Syslog,
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D>(d: D) -> Result<LogType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        match string.as_str() {
            "stderr" => Ok(LogType::Stderr),
            "file" => Ok(LogType::File),
            "syslog" => Ok(LogType::Syslog),
            _ => Err(de::Error::custom(format!(
                "expected \"stderr\", \"file\" or \"syslog\", found: \"{}\"",
                string
            ))),
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            LogType::Stderr => "stderr",
            LogType::File => "file",
            LogType::Syslog => "syslog",
        })
    }
}


//------------ CaMode --------------------------------------------------------

/// Where the CA key and certificate of a profile come from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaMode {
    /// Load them from the configured files.
    Existing,

    /// Generate them under the data directory if they don't exist yet.
    Generate,
}

impl<'de> Deserialize<'de> for CaMode {
    fn deserialize<D>(d: D) -> Result<CaMode, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        match string.as_str() {
            "existing" => Ok(CaMode::Existing),
            "generate" => Ok(CaMode::Generate),
            _ => Err(de::Error::custom(format!(
                "expected \"existing\", or \"generate\", \
                 found: \"{}\"",
                string
            ))),
        }
    }
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Config {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn should_parse_default_config_file() {
        let c = Config::read_config("./defaults/certenroll.conf").unwrap();
        c.verify().unwrap();
        assert_eq!(c.default_profile, "default");
        assert_eq!(c.call_timeout(), Some(Duration::from_secs(30)));

        let profile = c.profile("default").unwrap();
        assert_eq!(profile.ca_mode, CaMode::Generate);
        assert!(profile.subject_continuity);
        assert!(!profile.allow_server_keygen);
        assert_eq!(profile.validity_days, 365);
    }

    #[test]
    fn should_apply_profile_defaults() {
        let c = parse(
            r#"
            [[profiles]]
            name = "devices"
            allow_server_keygen = true
            server_keygen_algorithm = "rsa3072"
            "#,
        );
        let p = c.profile("devices").unwrap();
        assert_eq!(p.server_keygen_algorithm, KeyAlgorithm::Rsa3072);
        assert_eq!(p.min_rsa_bits, 2048);
        assert_eq!(p.min_ec_bits, 256);
        assert!(p.require_common_name);
        assert!(!p.require_credential);
    }

    #[test]
    fn should_reject_unknown_modes() {
        let res: Result<Config, _> = toml::from_str(
            r#"
            [[profiles]]
            name = "x"
            ca_mode = "borrow"
            "#,
        );
        assert!(res.unwrap_err().to_string().contains("expected \"existing\""));

        let res: Result<Config, _> = toml::from_str(r#"log_type = "journal""#);
        assert!(res.is_err());
    }

    #[test]
    fn should_report_unusable_log_file() {
        let mut c = Config::test(Path::new("/tmp"));
        c.log_type = LogType::File;
        c.log_file = PathBuf::from("/nonexistent/dir/certenroll.log");

        let err = c.init_logging().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dir/certenroll.log"));
    }

    #[test]
    fn should_reject_inconsistent_profiles() {
        let duplicate = parse(
            r#"
            [[profiles]]
            name = "default"
            [[profiles]]
            name = "default"
            "#,
        );
        assert!(duplicate.verify().is_err());

        let dangling = parse(
            r#"
            default_profile = "missing"
            [[profiles]]
            name = "default"
            "#,
        );
        assert!(dangling.verify().is_err());

        let no_validity = parse(
            r#"
            [[profiles]]
            name = "default"
            validity_days = 0
            "#,
        );
        assert!(no_validity.verify().is_err());

        let no_paths = parse(
            r#"
            [[profiles]]
            name = "default"
            ca_mode = "existing"
            ca_cert = "/tmp/cert.pem"
            "#,
        );
        assert!(no_paths.verify().is_err());
    }

    #[test]
    fn should_set_correct_log_levels() {
        use log::Level as LL;

        fn void_logger(config: &str) -> Box<dyn log::Log> {
            let c: Config = toml::from_str(config).unwrap();
            let void_output = fern::Output::writer(Box::new(io::sink()), "");
            let (_, void_logger) = c.fern_logger().chain(void_output).into_log();
            void_logger
        }

        fn for_target_at_level(target: &str, level: LL) -> log::Metadata<'_> {
            log::Metadata::builder().target(target).level(level).build()
        }

        let log = void_logger(r#"log_level = "trace""#);
        assert!(log.enabled(&for_target_at_level("certenroll", LL::Trace)));
        assert!(log.enabled(&for_target_at_level("certenroll::commons::util::file", LL::Debug)));
        assert!(!log.enabled(&for_target_at_level("certenroll::commons::util::file", LL::Trace)));
        assert!(!log.enabled(&for_target_at_level("mio", LL::Info)));
        assert!(log.enabled(&for_target_at_level("mio", LL::Warn)));

        let log = void_logger(r#"log_level = "warn""#);
        assert!(!log.enabled(&for_target_at_level("certenroll", LL::Info)));
        assert!(log.enabled(&for_target_at_level("certenroll", LL::Warn)));
    }
}
