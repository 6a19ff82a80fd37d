//! Various crate-wide constants.

//------------ Binary Names -------------------------------------------------

/// The friendly name of the `certenroll` binary.
pub const CERTENROLL_APP: &str = "Certenroll";


//------------ Config Files Paths -------------------------------------------

/// The default path to the config file.
pub const CERTENROLL_DEFAULT_CONFIG_FILE: &str = "/etc/certenroll.conf";


//------------ Environment Variables ----------------------------------------

/// The environment variable with the path to the config file.
pub const CERTENROLL_ENV_CONFIG: &str = "CERTENROLL_CONFIG";

/// The environment variable with the log level.
///
/// The variable should contain the name of a [`log::LevelFilter`]. It will
/// be overwritten by the config file. The default is “info.”
pub const CERTENROLL_ENV_LOG_LEVEL: &str = "CERTENROLL_LOG_LEVEL";

/// The environment variable with the log target.
///
/// The variable should contain the name of a
/// [`LogType`][crate::config::LogType]. It will be overwritten by the
/// config file. The default is “stderr.”
pub const CERTENROLL_ENV_LOG_TYPE: &str = "CERTENROLL_LOG_TYPE";


//------------ Directories --------------------------------------------------

/// The sub directory of the data dir holding generated CA keys.
pub const CA_KEYS_DIR: &str = "ca";

/// The file name of a generated CA private key, per profile.
pub const CA_KEY_FILE: &str = "key.pem";

/// The file name of a generated CA certificate, per profile.
pub const CA_CERT_FILE: &str = "cert.pem";


//------------ Issuance -----------------------------------------------------

/// The key size for generated RSA CA keys.
pub const CA_RSA_KEY_SIZE: u32 = 2048;

/// The validity of a generated self-signed CA certificate, in days.
pub const CA_VALIDITY_DAYS: u32 = 10 * 365;

/// How far issued certificates are back-dated, to allow for clock skew.
pub const ISSUANCE_BACKDATE_SECONDS: i64 = 5 * 60;

/// The size of issued certificate serial numbers, in bits.
pub const SERIAL_NUMBER_BITS: i32 = 128;
