use alloy::primitives::{B256, U256};
use bigdecimal::{BigDecimal, ToPrimitive};
use std::str::FromStr;

const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Converts an ETH amount to wei as a `U256`.
/// Returns an error if the value is negative or too large to fit in a `u128`.
pub fn eth_to_wei(eth: BigDecimal) -> anyhow::Result<U256> {
    let wei = (eth * BigDecimal::from(WEI_PER_ETH))
        .to_u128()
        .ok_or_else(|| anyhow::anyhow!("Value out of range"))?;
    Ok(U256::from(wei))
}

/// Converts a wei amount (`U256`) to ETH as a `BigDecimal`.
pub fn wei_to_eth(wei: U256) -> BigDecimal {
    // The decimal rendering of a U256 is always a valid BigDecimal literal.
    BigDecimal::from_str(&wei.to_string()).unwrap_or_default() / BigDecimal::from(WEI_PER_ETH)
}

/// Checks that `address` is `0x` followed by exactly 40 hex digits.
/// Checksum casing is not verified.
pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Packs a string into a fixed 32-byte word, right padded with zeros.
/// Fails if the string is longer than 32 bytes.
pub fn string_to_bytes32(value: &str) -> anyhow::Result<B256> {
    let bytes = value.as_bytes();
    if bytes.len() > 32 {
        anyhow::bail!("'{value}' is {} bytes long, at most 32 fit", bytes.len());
    }
    let mut word = [0u8; 32];
    word[..bytes.len()].copy_from_slice(bytes);
    Ok(B256::from(word))
}

/// Unpacks a 32-byte word produced by [`string_to_bytes32`].
/// Trailing zero padding is dropped and invalid UTF-8 is replaced.
pub fn bytes32_to_string(word: &B256) -> String {
    let end = word
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&word[..end]).into_owned()
}

