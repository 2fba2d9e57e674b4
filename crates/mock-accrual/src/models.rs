//! 模拟积分计算系统的数据模型

use serde::{Deserialize, Serialize};

/// 奖励类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardType {
    /// 按商品价格百分比
    #[serde(rename = "%")]
    Percent,
    /// 固定积分
    #[serde(rename = "pt")]
    Points,
}

/// 奖励规则：商品描述包含 `match` 时给予奖励
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRule {
    #[serde(rename = "match")]
    pub match_key: String,
    pub reward: f64,
    pub reward_type: RewardType,
}

impl RewardRule {
    pub fn matches(&self, goods: &Goods) -> bool {
        goods.description.contains(&self.match_key)
    }

    pub fn reward_for(&self, goods: &Goods) -> f64 {
        match self.reward_type {
            RewardType::Percent => goods.price * self.reward / 100.0,
            RewardType::Points => self.reward,
        }
    }
}

/// 订单中的商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goods {
    pub description: String,
    pub price: f64,
}

/// 登记订单请求
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterOrderRequest {
    pub order: String,
    pub goods: Vec<Goods>,
}

/// 订单计算状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationStatus {
    Registered,
    Invalid,
    Processing,
    Processed,
}

/// 已登记的订单
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredOrder {
    pub order: String,
    pub goods: Vec<Goods>,
    pub status: CalculationStatus,
    pub accrual: Option<f64>,
}

impl RegisteredOrder {
    pub fn new(order: String, goods: Vec<Goods>) -> Self {
        Self {
            order,
            goods,
            status: CalculationStatus::Registered,
            accrual: None,
        }
    }

    /// 推进一步计算
    ///
    /// 最终状态由匹配到的规则决定：没有任何商品命中规则时为 INVALID。
    pub fn advance(&mut self, rules: &[RewardRule]) {
        self.status = match self.status {
            CalculationStatus::Registered => CalculationStatus::Processing,
            CalculationStatus::Processing => match calculate_accrual(&self.goods, rules) {
                Some(accrual) => {
                    self.accrual = Some(accrual);
                    CalculationStatus::Processed
                }
                None => CalculationStatus::Invalid,
            },
            terminal => terminal,
        };
    }

    pub fn to_response(&self) -> OrderAccrualResponse {
        OrderAccrualResponse {
            order: self.order.clone(),
            status: self.status,
            accrual: self.accrual,
        }
    }
}

/// 按规则计算订单积分，保留两位小数；没有商品命中规则时返回 None
pub fn calculate_accrual(goods: &[Goods], rules: &[RewardRule]) -> Option<f64> {
    let mut matched = false;
    let mut total = 0.0;
    for item in goods {
        for rule in rules.iter().filter(|rule| rule.matches(item)) {
            matched = true;
            total += rule.reward_for(item);
        }
    }
    matched.then(|| (total * 100.0).round() / 100.0)
}

/// `GET /api/orders/{number}` 的响应体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAccrualResponse {
    pub order: String,
    pub status: CalculationStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accrual: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<RewardRule> {
        vec![
            RewardRule {
                match_key: "Bork".to_string(),
                reward: 10.0,
                reward_type: RewardType::Percent,
            },
            RewardRule {
                match_key: "LG".to_string(),
                reward: 500.0,
                reward_type: RewardType::Points,
            },
        ]
    }

    #[test]
    fn test_calculate_accrual() {
        let goods = vec![
            Goods {
                description: "Чайник Bork".to_string(),
                price: 7000.0,
            },
            Goods {
                description: "Стиральная машинка LG".to_string(),
                price: 47399.99,
            },
        ];
        assert_eq!(calculate_accrual(&goods, &rules()), Some(1200.0));
    }

    #[test]
    fn test_unmatched_goods_are_invalid() {
        let mut order = RegisteredOrder::new(
            "18".to_string(),
            vec![Goods {
                description: "Samsung".to_string(),
                price: 100.0,
            }],
        );
        order.advance(&rules());
        assert_eq!(order.status, CalculationStatus::Processing);
        order.advance(&rules());
        assert_eq!(order.status, CalculationStatus::Invalid);
        assert_eq!(order.accrual, None);
    }

    #[test]
    fn test_reward_type_wire_format() {
        let rule: RewardRule =
            serde_json::from_str(r#"{"match":"Bork","reward":10,"reward_type":"%"}"#).unwrap();
        assert_eq!(rule.reward_type, RewardType::Percent);
        assert_eq!(rule.match_key, "Bork");
    }
}
