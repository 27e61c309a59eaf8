use crate::{validate_config, Config};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "tweet-capture-api")]
#[command(about = "HTTP API that renders posts to PNG screenshots")]
#[command(version)]
pub struct Cli {
    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "PORT", help = "Listening port")]
    pub port: Option<u16>,

    #[arg(long, help = "Bind address")]
    pub bind: Option<String>,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Capture timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Browser pool size")]
    pub pool_size: Option<usize>,

    #[arg(long, help = "Maximum concurrent captures")]
    pub max_concurrent: Option<usize>,

    #[arg(long, help = "Directory for temporary capture files")]
    pub temp_dir: Option<PathBuf>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Include error tracebacks in 500 responses")]
    pub debug: bool,
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;

    Ok(())
}

/// Defaults, then the `--config` file, then command-line overrides
pub async fn load_config(args: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content = tokio::fs::read_to_string(config_path).await?;
        serde_json::from_str(&config_content)?
    } else {
        Config::default()
    };

    apply_overrides(&mut config, args);
    validate_config(&config)?;

    info!("Configuration loaded successfully");
    info!("Browser pool size: {}", config.browser_pool_size);
    info!("Max concurrent captures: {}", config.max_concurrent_captures);
    info!("Capture timeout: {:?}", config.capture_timeout);

    Ok(config)
}

fn apply_overrides(config: &mut Config, args: &Cli) {
    if let Some(port) = args.port {
        config.port = port;
    }

    if let Some(bind) = &args.bind {
        config.bind_address = bind.clone();
    }

    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    if let Some(timeout) = args.timeout {
        config.capture_timeout = Duration::from_secs(timeout);
    }

    if let Some(pool_size) = args.pool_size {
        config.browser_pool_size = pool_size;
    }

    if let Some(max_concurrent) = args.max_concurrent {
        config.max_concurrent_captures = max_concurrent;
    }

    if let Some(temp_dir) = &args.temp_dir {
        config.temp_dir = temp_dir.clone();
    }

    if args.debug {
        config.debug = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let args = Cli::try_parse_from([
            "tweet-capture-api",
            "--port",
            "9000",
            "--timeout",
            "15",
            "--pool-size",
            "2",
            "--chrome-path",
            "/usr/bin/chromium",
            "--debug",
        ])
        .unwrap();

        let mut config = Config::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.port, 9000);
        assert_eq!(config.capture_timeout, Duration::from_secs(15));
        assert_eq!(config.browser_pool_size, 2);
        assert_eq!(config.chrome_path.as_deref(), Some("/usr/bin/chromium"));
        assert!(config.debug);
        assert_eq!(config.max_concurrent_captures, Config::default().max_concurrent_captures);
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("{}.json", crate::capture_file_name()));
        tokio::fs::write(&path, r#"{"port": 7000, "max_concurrent_captures": 3}"#)
            .await
            .unwrap();

        let args = Cli::try_parse_from([
            "tweet-capture-api",
            "--config",
            path.to_str().unwrap(),
            "--max-concurrent",
            "5",
        ])
        .unwrap();
        let loaded = load_config(&args).await;
        let _ = std::fs::remove_file(&path);
        let config = loaded.unwrap();

        // File sets the port unless PORT is exported in the environment
        if std::env::var_os("PORT").is_none() {
            assert_eq!(config.port, 7000);
        }
        assert_eq!(config.max_concurrent_captures, 5);
        assert_eq!(config.viewport.width, 1920);
    }

    #[tokio::test]
    async fn test_load_config_rejects_invalid() {
        let args = Cli::try_parse_from(["tweet-capture-api", "--pool-size", "0"]).unwrap();
        assert!(load_config(&args).await.is_err());
    }
}
