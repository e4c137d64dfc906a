// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SCEP CA Command-Line Tool
//!
//! Bootstraps and inspects the CA material used by the SCEP engine.
//!
//! # Usage
//!
//! ```text
//! scep-ca [OPTIONS] <COMMAND>
//!
//! Commands:
//!   init  Generate a self-signed CA certificate and key
//!   caps  Print the GetCACaps capability list
//!   show  Display the configured CA
//!
//! Options:
//!   -c, --config <PATH>   Path to configuration file
//!   -v, --verbose         Enable verbose output
//!   -h, --help            Print help
//!   -V, --version         Print version
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Create a CA valid for five years
//! scep-ca init --subject "CN=Example SCEP CA,O=Example" --years 5 \
//!     --cert-out ca.pem --key-out ca.key
//!
//! # Show the CA named in a configuration file
//! scep-ca show --config /etc/scep/config.toml
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use scep_server::operations::getcacert::{ca_fingerprint, format_fingerprint};
use scep_server::x509::serial_hex;
use scep_server::logging::{init_logging, LogConfig};
use scep_server::{CaConfig, CaMaterial, ScepConfig};

/// SCEP CA Command-Line Tool
#[derive(Parser)]
#[command(name = "scep-ca")]
#[command(author = "U.S. Federal Government")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CA management for the SCEP (RFC 8894) engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a self-signed CA certificate and key
    Init {
        /// CA subject DN
        #[arg(long, value_name = "DN", default_value = "CN=SCEP CA")]
        subject: String,

        /// Validity in years
        #[arg(long, default_value_t = 5)]
        years: u32,

        /// RSA key size in bits
        #[arg(long, default_value_t = 2048)]
        key_bits: usize,

        /// Output path for the certificate (PEM)
        #[arg(long, value_name = "PATH", default_value = "ca.pem")]
        cert_out: PathBuf,

        /// Output path for the private key (PKCS#8 PEM)
        #[arg(long, value_name = "PATH", default_value = "ca.key")]
        key_out: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Print the GetCACaps capability list
    Caps,

    /// Display the configured CA
    Show {
        /// CA certificate (PEM), instead of the configuration file
        #[arg(long, value_name = "PATH", requires = "key")]
        cert: Option<PathBuf>,

        /// CA private key (PEM), instead of the configuration file
        #[arg(long, value_name = "PATH", requires = "cert")]
        key: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli
        .config
        .as_deref()
        .map(|path| ScepConfig::from_file(path))
        .transpose() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    if let Err(e) = init_logging(&log_config(config.as_ref(), cli.verbose)) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run_command(&cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logging from the configuration file when given, `--verbose` raising the
/// level to debug.
fn log_config(config: Option<&ScepConfig>, verbose: bool) -> LogConfig {
    let mut logging = config
        .map(|config| config.logging.clone())
        .unwrap_or_else(|| LogConfig::with_level("info"));
    if verbose {
        logging.level = "debug".to_string();
    }
    logging
}

fn run_command(cli: &Cli, config: Option<ScepConfig>) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Init {
            subject,
            years,
            key_bits,
            cert_out,
            key_out,
            force,
        } => cmd_init(subject, *years, *key_bits, cert_out, key_out, *force),
        Commands::Caps => {
            for capability in scep_server::operations::CAPABILITIES {
                println!("{}", capability);
            }
            Ok(())
        }
        Commands::Show { cert, key } => {
            let ca_config = match (cert, key) {
                (Some(cert), Some(key)) => CaConfig::from_files(cert, key),
                _ => {
                    config
                        .ok_or("No CA given: pass --config, or --cert and --key")?
                        .ca
                }
            };
            cmd_show(&ca_config)
        }
    }
}

fn cmd_init(
    subject: &str,
    years: u32,
    key_bits: usize,
    cert_out: &Path,
    key_out: &Path,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    for path in [cert_out, key_out] {
        if path.exists() && !force {
            return Err(format!("{} exists (use --force to overwrite)", path.display()).into());
        }
    }

    println!("Generating {}-bit RSA CA key...", key_bits);
    let ca = CaMaterial::generate(subject, years, key_bits)?;
    let (certificate_pem, key_pem) = ca.to_pem()?;

    std::fs::write(cert_out, certificate_pem)?;
    write_private(key_out, key_pem.as_bytes())?;

    println!("Subject:     {}", ca.subject());
    println!("Fingerprint: {}", format_fingerprint(&ca_fingerprint(&ca)));
    println!("Certificate: {}", cert_out.display());
    println!("Private key: {}", key_out.display());
    Ok(())
}

fn cmd_show(config: &CaConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ca = CaMaterial::from_config(config)?;
    let tbs = &ca.certificate().tbs_certificate;

    println!("Subject:        {}", tbs.subject);
    println!("Issuer:         {}", tbs.issuer);
    println!("Serial:         {}", serial_hex(&tbs.serial_number));
    println!("Not before:     {}", tbs.validity.not_before);
    println!("Not after:      {}", tbs.validity.not_after);
    println!("Algorithm:      {}", ca.signature_algorithm()?);
    println!("Fingerprint:    {}", format_fingerprint(&ca_fingerprint(&ca)));
    println!("GetCACert size: {} certificate(s)", ca.total_certificates());
    for extra in ca.additional_certificates() {
        println!("  chain:        {}", extra.tbs_certificate.subject);
    }
    Ok(())
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
