//! 订单号 Luhn 校验

use accrual_worker::OrderNumber;

use crate::error::ApiError;

/// 判断数字串是否通过 Luhn 校验
pub fn is_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();

    sum % 10 == 0
}

/// 解析并校验订单号
///
/// 空白会被裁掉；非数字、校验位错误或超出范围均视为格式错误。
pub fn parse_order_number(raw: &str) -> Result<OrderNumber, ApiError> {
    let number = raw.trim();
    if !is_valid(number) {
        return Err(ApiError::InvalidOrderNumber(number.to_string()));
    }
    number
        .parse::<OrderNumber>()
        .map_err(|_| ApiError::InvalidOrderNumber(number.to_string()))
}
