//! 日志脱敏：地址与交易哈希只显示首尾

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() < 10 {
        return "*".repeat(chars.len());
    }

    let prefix: String = chars[..6].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

/// 脱敏交易哈希（前后各 show_chars 位）
pub fn redact_tx_hash(hash: &str, show_chars: usize) -> String {
    let chars: Vec<char> = hash.chars().collect();
    if chars.len() <= show_chars * 2 {
        return "*".repeat(chars.len());
    }

    let prefix: String = chars[..show_chars].iter().collect();
    let suffix: String = chars[chars.len() - show_chars..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_address() {
        let addr = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb";
        assert_eq!(redact_address(addr), "0x742d...0bEb");
        assert_eq!(redact_address("short"), "*****");
    }

    #[test]
    fn test_redact_tx_hash() {
        assert_eq!(redact_tx_hash("0xabcdef0123456789", 4), "0xab...6789");
        assert_eq!(redact_tx_hash("0xab", 4), "****");
    }
}
