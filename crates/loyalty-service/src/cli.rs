//! 命令行参数
//!
//! 参数与对应环境变量的优先级高于配置文件。

use clap::Parser;
use loyalty_shared::config::AppConfig;

/// 积分服务
#[derive(Parser, Debug, Default)]
#[command(name = "loyalty")]
#[command(version, about = "积分服务")]
pub struct Cli {
    /// 服务监听地址，如 `:8081` 或 `127.0.0.1:8081`
    #[arg(short = 'a', long, env = "RUN_ADDRESS")]
    pub address: Option<String>,

    /// PostgreSQL 连接地址
    #[arg(short = 'd', long, env = "DATABASE_URI")]
    pub database_uri: Option<String>,

    /// 积分计算系统地址
    #[arg(short = 'r', long, env = "ACCRUAL_SYSTEM_ADDRESS")]
    pub accrual_address: Option<String>,
}

impl Cli {
    /// 将命令行参数覆盖到已加载的配置上
    pub fn apply(&self, config: &mut AppConfig) -> Result<(), config::ConfigError> {
        if let Some(address) = &self.address {
            config.server.set_run_address(address)?;
        }
        if let Some(uri) = &self.database_uri {
            config.database.url = uri.clone();
        }
        if let Some(address) = &self.accrual_address {
            config.accrual.set_address(address);
        }
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "loyalty",
            "-a",
            ":9000",
            "-d",
            "postgres://u:p@db:5432/loyalty",
            "-r",
            "accrual:8080",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config).unwrap();

        assert_eq!(config.server_addr(), "0.0.0.0:9000");
        assert_eq!(config.database.url, "postgres://u:p@db:5432/loyalty");
        assert_eq!(config.accrual.address, "http://accrual:8080");
    }

    #[test]
    fn test_missing_flags_keep_config() {
        let mut config = AppConfig::default();
        Cli::default().apply(&mut config).unwrap();
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let cli = Cli {
            address: Some("nowhere".to_string()),
            ..Default::default()
        };
        assert!(cli.apply(&mut AppConfig::default()).is_err());
    }
}
