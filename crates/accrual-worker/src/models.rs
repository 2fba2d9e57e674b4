//! 轮询任务、结果与订单状态模型

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 订单号
pub type OrderNumber = i64;

// ---------------------------------------------------------------------------
// Points
// ---------------------------------------------------------------------------

/// 积分金额，内部以百分之一为单位的整数存储
///
/// JSON 中以十进制小数表示（`729.98`），避免浮点累加误差进入余额。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Points(i64);

impl Points {
    pub const ZERO: Points = Points(0);

    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    /// 由十进制数值构造，四舍五入到百分位
    pub fn from_decimal(value: f64) -> Self {
        Self((value * 100.0).round() as i64)
    }

    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub fn as_decimal(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_sub(self, other: Points) -> Option<Points> {
        self.0.checked_sub(other.0).map(Points)
    }
}

impl Add for Points {
    type Output = Points;

    fn add(self, rhs: Points) -> Points {
        Points(self.0 + rhs.0)
    }
}

impl AddAssign for Points {
    fn add_assign(&mut self, rhs: Points) {
        self.0 += rhs.0;
    }
}

impl Sub for Points {
    type Output = Points;

    fn sub(self, rhs: Points) -> Points {
        Points(self.0 - rhs.0)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Points {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Points {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("积分金额必须是有限数值"));
        }
        Ok(Points::from_decimal(value))
    }
}

// ---------------------------------------------------------------------------
// 订单状态
// ---------------------------------------------------------------------------

/// 本系统中的订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 已上传，尚未被积分计算系统受理
    New,
    /// 积分计算中
    Processing,
    /// 积分计算系统拒绝计算，终态
    Invalid,
    /// 计算完成，终态
    Processed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }

    /// 终态订单不再轮询，也不会被覆盖
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    /// 仍需向积分计算系统查询
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            other => Err(format!("未知的订单状态: {other}")),
        }
    }
}

/// 积分计算系统返回的订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    Registered,
    Invalid,
    Processing,
    Processed,
}

impl AccrualStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    /// 映射为本系统的订单状态，REGISTERED 视为计算中
    pub fn to_order_status(self) -> OrderStatus {
        match self {
            Self::Registered | Self::Processing => OrderStatus::Processing,
            Self::Invalid => OrderStatus::Invalid,
            Self::Processed => OrderStatus::Processed,
        }
    }
}

// ---------------------------------------------------------------------------
// 任务与结果
// ---------------------------------------------------------------------------

/// 单个订单的积分查询任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTask {
    pub user_key: String,
    pub order_number: OrderNumber,
}

impl PollTask {
    pub fn new(user_key: impl Into<String>, order_number: OrderNumber) -> Self {
        Self {
            user_key: user_key.into(),
            order_number,
        }
    }
}

/// 失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// 网络不可达或积分计算系统返回约定之外的状态码
    GatewayUnreachable,
    /// 200 响应但响应体无法解析
    UnexpectedResponse,
    /// 多次 429 后重新入队次数耗尽
    RateLimited,
    /// 订单仍在计算中或未登记，重新入队次数耗尽
    NotYetAvailable,
    /// 入账或状态更新事务失败，未提交任何修改
    LedgerUpdateFailed,
    /// Worker 未发布结果即丢弃了任务
    Abandoned,
}

impl FailureKind {
    /// 致命失败会让整个列表请求失败
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RateLimited | Self::NotYetAvailable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GatewayUnreachable => "gateway_unreachable",
            Self::UnexpectedResponse => "unexpected_response",
            Self::RateLimited => "rate_limited",
            Self::NotYetAvailable => "not_yet_available",
            Self::LedgerUpdateFailed => "ledger_update_failed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个任务的最终结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        order_number: OrderNumber,
        status: OrderStatus,
        accrual: Points,
    },
    Failure {
        order_number: OrderNumber,
        kind: FailureKind,
        detail: String,
    },
}

impl Outcome {
    pub fn failure(order_number: OrderNumber, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failure {
            order_number,
            kind,
            detail: detail.into(),
        }
    }

    pub fn order_number(&self) -> OrderNumber {
        match self {
            Self::Success { order_number, .. } | Self::Failure { order_number, .. } => {
                *order_number
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failure { kind, .. } if kind.is_fatal())
    }

    /// 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failure { kind, .. } => kind.as_str(),
        }
    }
}
