//! 命令行参数

use clap::Parser;

/// 积分计算系统模拟服务
#[derive(Parser, Debug)]
#[command(name = "mock-accrual")]
#[command(version, about = "积分计算系统模拟服务")]
pub struct Cli {
    /// 监听地址
    #[arg(short = 'a', long, env = "RUN_ADDRESS", default_value = "127.0.0.1:8080")]
    pub address: String,

    /// 每分钟允许的查询次数，0 表示不限
    #[arg(short = 'r', long, env = "ACCRUAL_MAX_REQUESTS", default_value = "0")]
    pub max_requests_per_minute: u32,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// 日志格式 (pretty, json)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}
