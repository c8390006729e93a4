use std::str::FromStr;

use bigdecimal::BigDecimal;
use ethwatch_sdk::utils::{
    bytes32_to_string, eth_to_wei, is_valid_address, string_to_bytes32, wei_to_eth,
};
use ethwatch_sdk::{B256, U256};

const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

#[test]
fn test_eth_wei_conversion() {
    let wei = eth_to_wei(BigDecimal::from(1)).unwrap();
    assert_eq!(wei, U256::from(WEI_PER_ETH));
    assert_eq!(wei_to_eth(wei), BigDecimal::from(1));

    let quarter = eth_to_wei(BigDecimal::from_str("0.25").unwrap()).unwrap();
    assert_eq!(quarter, U256::from(WEI_PER_ETH / 4));
}

#[test]
fn test_negative_eth_rejected() {
    assert!(eth_to_wei(BigDecimal::from(-1)).is_err());
}

#[test]
fn test_address_validation() {
    assert!(is_valid_address("0x323b5d4c32345ced77393b3530b1eed0f346429d"));
    assert!(!is_valid_address("0xZYXb5d4c32345ced77393b3530b1eed0f346429d"));
    assert!(!is_valid_address("323b5d4c32345ced77393b3530b1eed0f346429d"));
    assert!(!is_valid_address("0x323b5d4c32345ced77393b3530b1eed0f34642"));
}

#[test]
fn test_bytes32_packing() {
    let word = string_to_bytes32("key3").unwrap();
    assert_eq!(&word[..4], b"key3");
    assert!(word[4..].iter().all(|&b| b == 0));
    assert_eq!(bytes32_to_string(&word), "key3");

    assert_eq!(bytes32_to_string(&B256::ZERO), "");
    assert!(string_to_bytes32(&"x".repeat(33)).is_err());

    let full = "x".repeat(32);
    assert_eq!(bytes32_to_string(&string_to_bytes32(&full).unwrap()), full);
}
