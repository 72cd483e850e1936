use crate::server::ProxySettings;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version = env!("APP_VERSION"), about, long_about = None)]
pub struct Cli {
    #[cfg(unix)]
    #[arg(short, long, help = "Run as a daemon process.")]
    pub daemon: bool,

    #[cfg(unix)]
    #[arg(long, requires = "daemon", help = "Write the daemon's pid to this file.")]
    pub pid_file: Option<PathBuf>,

    #[cfg(unix)]
    #[arg(
        long,
        requires = "daemon",
        help = "Append the daemon's log output to this file. Without it, logs are discarded."
    )]
    pub log_file: Option<PathBuf>,

    #[arg(
        short = 'l',
        long,
        default_value = "0.0.0.0:9000",
        help = "Listen address for the proxy."
    )]
    pub listen_addr: String,

    #[arg(short = 'r', long, help = "Path to the routing configuration file.")]
    pub route_config: PathBuf,

    #[arg(
        short = 'c',
        long,
        default_value = "./cache",
        help = "Directory holding cached responses."
    )]
    pub cache_dir: PathBuf,

    #[arg(long, value_name = "SECS", help = "Timeout for a single origin fetch.")]
    pub origin_timeout: Option<u64>,

    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 60,
        help = "Interval between stats log lines, 0 disables them."
    )]
    pub stats_interval: u64,
}

impl Cli {
    pub fn proxy_settings(&self) -> ProxySettings {
        ProxySettings {
            route_config: self.route_config.clone(),
            cache_dir: self.cache_dir.clone(),
            origin_timeout: self.origin_timeout.map(Duration::from_secs),
            stats_interval: (self.stats_interval > 0)
                .then_some(Duration::from_secs(self.stats_interval)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["origin-cache-proxy", "-r", "routes.yaml"]).unwrap();
        assert_eq!(cli.listen_addr, "0.0.0.0:9000");

        let settings = cli.proxy_settings();
        assert_eq!(settings.route_config, PathBuf::from("routes.yaml"));
        assert_eq!(settings.cache_dir, PathBuf::from("./cache"));
        assert_eq!(settings.origin_timeout, None);
        assert_eq!(settings.stats_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn zero_stats_interval_disables_reporting() {
        let cli = Cli::try_parse_from([
            "origin-cache-proxy",
            "--route-config",
            "routes.yaml",
            "--stats-interval",
            "0",
            "--origin-timeout",
            "5",
            "--cache-dir",
            "/var/cache/proxy",
        ])
        .unwrap();

        let settings = cli.proxy_settings();
        assert_eq!(settings.stats_interval, None);
        assert_eq!(settings.origin_timeout, Some(Duration::from_secs(5)));
        assert_eq!(settings.cache_dir, PathBuf::from("/var/cache/proxy"));
    }

    #[test]
    fn route_config_is_required() {
        assert!(Cli::try_parse_from(["origin-cache-proxy"]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn log_file_requires_daemon() {
        assert!(Cli::try_parse_from([
            "origin-cache-proxy",
            "-r",
            "routes.yaml",
            "--log-file",
            "proxy.log",
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "origin-cache-proxy",
            "-r",
            "routes.yaml",
            "-d",
            "--log-file",
            "proxy.log",
        ])
        .unwrap();
        assert!(cli.daemon);
        assert_eq!(cli.log_file, Some(PathBuf::from("proxy.log")));
    }
}
