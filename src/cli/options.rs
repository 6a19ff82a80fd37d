//! The command line options for the enrollment authority.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::debug;

use crate::api::requests::{Operation, RequestParts};
use crate::commons::util::file;
use crate::config::Config;
use crate::constants::{CERTENROLL_DEFAULT_CONFIG_FILE, CERTENROLL_ENV_CONFIG};
use crate::dispatch::Endpoints;
use crate::service::{CallContext, CertAuthority};

use super::report::{Report, ReportFormat};
use super::CliError;


//------------ Options -------------------------------------------------------

/// The command line options for the enrollment authority.
#[derive(clap::Parser)]
#[command(
    version,
    about = "Runs enrollment requests against the local certificate authority.",
)]
pub struct Options {
    #[command(flatten)]
    pub general: GeneralOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Options {
    /// Creates the options from the process arguments.
    ///
    /// If the arguments won't result in usable options, exits the process.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Processes the command and returns its report.
    ///
    /// The call is cancelled when `ctx` is.
    pub async fn run(self, ctx: &CallContext) -> Result<Report, CliError> {
        let config = Config::create(&self.general.config)?;
        let authority = CertAuthority::from_config(&config)?;
        let endpoints = Endpoints::new(Arc::new(authority), config.call_timeout());

        let parts = self.command.into_parts()?;
        debug!("Processing {} request", parts.operation);
        let response = endpoints.handle(ctx, parts).await?;
        Ok(Report::new(response.to_report()?, self.general.format))
    }
}


//------------ GeneralOptions ------------------------------------------------

/// The options common to all commands.
#[derive(clap::Args)]
pub struct GeneralOptions {
    /// Path to the config file.
    #[arg(
        short, long,
        env = CERTENROLL_ENV_CONFIG,
        default_value = CERTENROLL_DEFAULT_CONFIG_FILE,
    )]
    pub config: String,

    /// Report format, "pem" or "json".
    #[arg(short, long, default_value = "pem")]
    pub format: ReportFormat,
}


//------------ Command -------------------------------------------------------

#[derive(clap::Subcommand)]
pub enum Command {
    /// Check whether all issuing CAs are currently valid.
    Health(Health),

    /// Show the CA certificates of a profile, trust anchor first.
    #[command(name = "cacerts")]
    CaCerts(CaCerts),

    /// Issue a certificate for a CSR.
    Enroll(Enroll),

    /// Reissue a certificate, authenticated by the current one.
    Reenroll(Reenroll),

    /// Generate a key and issue a certificate for it.
    #[command(name = "serverkeygen")]
    ServerKeyGen(ServerKeyGen),
}

impl Command {
    /// Reads the files named by the command into request parts.
    pub fn into_parts(self) -> Result<RequestParts, CliError> {
        match self {
            Self::Health(_) => Ok(RequestParts::new(Operation::Health)),
            Self::CaCerts(cmd) => {
                let parts = RequestParts::new(Operation::GetCas).with_aps(cmd.profile);
                with_optional_cert(parts, cmd.cert)
            }
            Self::Enroll(cmd) => {
                let parts = RequestParts::new(Operation::Enroll)
                    .with_aps(cmd.profile)
                    .with_csr(file::read(&cmd.csr)?);
                with_optional_cert(parts, cmd.cert)
            }
            Self::Reenroll(cmd) => Ok(RequestParts::new(Operation::Reenroll)
                .with_aps(cmd.profile)
                .with_csr(file::read(&cmd.csr)?)
                .with_crt(file::read(&cmd.cert)?)),
            Self::ServerKeyGen(cmd) => Ok(RequestParts::new(Operation::ServerKeyGen)
                .with_aps(cmd.profile)
                .with_csr(file::read(&cmd.csr)?)),
        }
    }
}

fn with_optional_cert(
    parts: RequestParts,
    cert: Option<PathBuf>,
) -> Result<RequestParts, CliError> {
    match cert {
        Some(path) => Ok(parts.with_crt(file::read(&path)?)),
        None => Ok(parts),
    }
}


//------------ Health --------------------------------------------------------

#[derive(clap::Parser)]
pub struct Health;


//------------ CaCerts -------------------------------------------------------

#[derive(clap::Parser)]
pub struct CaCerts {
    /// The enrollment profile, empty for the default
    #[arg(short, long, default_value = "")]
    pub profile: String,

    /// The authenticating certificate, PEM or DER
    #[arg(long, value_name = "FILE")]
    pub cert: Option<PathBuf>,
}


//------------ Enroll --------------------------------------------------------

#[derive(clap::Parser)]
pub struct Enroll {
    /// The certificate signing request, PEM or DER
    #[arg(long, value_name = "FILE")]
    pub csr: PathBuf,

    /// The enrollment profile, empty for the default
    #[arg(short, long, default_value = "")]
    pub profile: String,

    /// The authenticating certificate, PEM or DER
    #[arg(long, value_name = "FILE")]
    pub cert: Option<PathBuf>,
}


//------------ Reenroll ------------------------------------------------------

#[derive(clap::Parser)]
pub struct Reenroll {
    /// The current certificate, PEM or DER
    #[arg(long, value_name = "FILE")]
    pub cert: PathBuf,

    /// The certificate signing request, PEM or DER
    #[arg(long, value_name = "FILE")]
    pub csr: PathBuf,

    /// The enrollment profile, empty for the default
    #[arg(short, long, default_value = "")]
    pub profile: String,
}


//------------ ServerKeyGen --------------------------------------------------

#[derive(clap::Parser)]
pub struct ServerKeyGen {
    /// The certificate signing request, PEM or DER
    #[arg(long, value_name = "FILE")]
    pub csr: PathBuf,

    /// The enrollment profile, empty for the default
    #[arg(short, long, default_value = "")]
    pub profile: String,
}


//------------ Tests ---------------------------------------------------------
