use anyhow::bail;
use clap::Parser;
use gdid::{AuthorityConfig, MAX_COUNTER};
use std::path::PathBuf;

/// Runtime configuration for the `gdid-tonic-server` binary.
///
/// These settings control the shard identity, block sizing policy, and the
/// redundant durable locations of the authority. All values are parsed from
/// CLI arguments or environment variables, with reasonable defaults
/// suitable for production.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "gdid-tonic-server",
    version,
    about = "A gRPC authority service granting durable GDID counter blocks"
)]
pub struct CliArgs {
    /// Authority shard identifier embedded in every issued GDID.
    ///
    /// Each shard is an independent counter namespace; no two live servers
    /// may claim the same shard id over the same locations.
    ///
    /// Environment variable: `SHARD_ID`
    #[arg(long, env = "SHARD_ID", default_value_t = 0)]
    pub shard_id: u16,

    /// Smallest counter block the authority will grant.
    ///
    /// Requests below this are rounded up, which amortizes one durable
    /// write across many issued IDs. Larger values cost bigger gaps when a
    /// client discards an unused block.
    ///
    /// Environment variable: `MIN_BLOCK_SIZE`
    #[arg(long, env = "MIN_BLOCK_SIZE", default_value_t = 1024)]
    pub min_block_size: u64,

    /// Largest counter block a single request may reserve.
    ///
    /// Bounds the counter space a misbehaving client can burn per call.
    /// Oversized requests are rejected, not clamped, since clients rely on
    /// receiving at least what they asked for.
    ///
    /// Environment variable: `MAX_BLOCK_SIZE`
    #[arg(long, env = "MAX_BLOCK_SIZE", default_value_t = 1 << 20)]
    pub max_block_size: u64,

    /// Directory of one redundant sequence-state location. Repeatable;
    /// argument order is priority order (first is read first).
    ///
    /// Environment variable: `LOCATIONS` (comma-separated)
    #[arg(long = "location", env = "LOCATIONS", value_delimiter = ',', required = true)]
    pub locations: Vec<PathBuf>,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50061" or "/tmp/gdid-uds.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50061"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub authority: AuthorityConfig,
    pub locations: Vec<PathBuf>,
    pub server_addr: String,
    pub uds: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.locations.is_empty() {
            bail!("At least one --location is required");
        }

        if args.min_block_size == 0 {
            bail!("MIN_BLOCK_SIZE must be greater than 0");
        }

        if args.min_block_size > args.max_block_size {
            bail!(
                "MIN_BLOCK_SIZE ({}) exceeds MAX_BLOCK_SIZE ({})",
                args.min_block_size,
                args.max_block_size
            );
        }

        let authority = AuthorityConfig {
            shard_id: args.shard_id,
            min_block_size: args.min_block_size,
            max_block_size: args.max_block_size,
            counter_limit: MAX_COUNTER,
        };

        Ok(Self {
            authority,
            locations: args.locations,
            server_addr: args.server_addr,
            uds: args.uds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["gdid-tonic-server", "--location", "/tmp/gdid-a"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn defaults_validate() {
        let config = ServerConfig::try_from(args(&[])).unwrap();
        assert_eq!(config.authority.shard_id, 0);
        assert_eq!(config.authority.min_block_size, 1024);
        assert_eq!(config.locations.len(), 1);
    }

    #[test]
    fn rejects_inverted_block_bounds() {
        let parsed = args(&["--min-block-size", "4096", "--max-block-size", "16"]);
        assert!(ServerConfig::try_from(parsed).is_err());
    }
}
