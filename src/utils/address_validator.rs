//! 地址验证
//!
//! 当前支持的链均为 EVM 链：`0x` + 40 位十六进制。大小写混合的地址不做
//! EIP-55 校验和验证，由出金签名端负责。

use crate::error::CoreError;

pub struct AddressValidator;

impl AddressValidator {
    pub fn validate_evm(address: &str) -> Result<(), CoreError> {
        let Some(hex_part) = address.strip_prefix("0x") else {
            return Err(CoreError::InvalidAddress("address must start with 0x".into()));
        };

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidAddress(
                "address must be 0x followed by 40 hex characters".into(),
            ));
        }

        // 零地址转出即销毁
        if hex_part.chars().all(|c| c == '0') {
            return Err(CoreError::InvalidAddress("zero address is not allowed".into()));
        }

        Ok(())
    }
}
