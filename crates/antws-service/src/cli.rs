//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// ANT+ to WebSocket bridge.
///
/// Serves a Bayeux-style pub/sub endpoint at `/` and publishes telemetry from
/// ANT+ sensors on `/<category>` channels (`/hr`, `/bike_power`, ...).
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "antws")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Port to listen on [default: 8000, or 4430 with --ssl].
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Serve over TLS with a self-signed certificate.
    #[arg(long, visible_alias = "secure")]
    pub ssl: bool,

    /// Verbose ANT+ message logging (one line per field).
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Interface to bind (overrides config).
    #[arg(long)]
    pub bind: Option<String>,

    /// Use simulated sticks and sensors instead of USB hardware.
    #[arg(long)]
    pub simulate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["antws"]).unwrap();
        assert_eq!(args.port, None);
        assert!(!args.ssl);
        assert!(!args.verbose);
        assert!(!args.simulate);
    }

    #[test]
    fn test_short_and_long_flags() {
        let args = Args::try_parse_from(["antws", "-p", "9000", "-v"]).unwrap();
        assert_eq!(args.port, Some(9000));
        assert!(args.verbose);

        let args = Args::try_parse_from(["antws", "--port", "9001", "--verbose"]).unwrap();
        assert_eq!(args.port, Some(9001));
        assert!(args.verbose);
    }

    #[test]
    fn test_secure_is_alias_for_ssl() {
        let args = Args::try_parse_from(["antws", "--secure"]).unwrap();
        assert!(args.ssl);
        let args = Args::try_parse_from(["antws", "--ssl"]).unwrap();
        assert!(args.ssl);
    }

    #[test]
    fn test_help_short_circuits() {
        for flag in ["-h", "--help"] {
            let err = Args::try_parse_from(["antws", flag, "-p", "9000"]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Args::try_parse_from(["antws", "-p", "not-a-port"]).is_err());
        assert!(Args::try_parse_from(["antws", "-p", "70000"]).is_err());
    }

    #[test]
    fn test_command_is_consistent() {
        Args::command().debug_assert();
    }
}
