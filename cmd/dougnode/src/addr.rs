//! Parsing helpers for the CLI's address/balance and secret-key flags.
//! Kept out of `cli.rs` so clap's derive attributes stay declarative.

use ethereum_types::{Address, U256};
use secp256k1::SecretKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0:?} is not a 20-byte hex address")]
    BadAddress(String),
    #[error("{0:?} is not a valid ADDR:BALANCE pair")]
    BadAccount(String),
    #[error("{0:?} is not a 32-byte hex secret key")]
    BadSecretKey(String),
}

pub fn parse_address(s: &str) -> Result<Address, ParseError> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|_| ParseError::BadAddress(s.to_string()))?;
    if bytes.len() != 20 {
        return Err(ParseError::BadAddress(s.to_string()));
    }
    Ok(Address::from_slice(&bytes))
}

/// Parses `ADDR` or `ADDR:BALANCE`; a bare address defaults to a zero
/// starting balance.
pub fn parse_account(s: &str) -> Result<(Address, U256), ParseError> {
    match s.split_once(':') {
        Some((addr, balance)) => {
            let addr = parse_address(addr)?;
            let balance = U256::from_dec_str(balance).map_err(|_| ParseError::BadAccount(s.to_string()))?;
            Ok((addr, balance))
        }
        None => Ok((parse_address(s)?, U256::zero())),
    }
}

pub fn parse_secret_key(s: &str) -> Result<SecretKey, ParseError> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|_| ParseError::BadSecretKey(s.to_string()))?;
    SecretKey::from_slice(&bytes).map_err(|_| ParseError::BadSecretKey(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_address_with_zero_balance() {
        let (addr, balance) = parse_account("0x0101010101010101010101010101010101010101").unwrap();
        assert_eq!(addr, Address::repeat_byte(0x01));
        assert_eq!(balance, U256::zero());
    }

    #[test]
    fn parses_an_address_balance_pair() {
        let (addr, balance) = parse_account("0x0202020202020202020202020202020202020202:1000").unwrap();
        assert_eq!(addr, Address::repeat_byte(0x02));
        assert_eq!(balance, U256::from(1000u64));
    }

    #[test]
    fn rejects_a_malformed_address() {
        assert!(parse_account("not-hex").is_err());
        assert!(parse_account("0x0102").is_err());
    }

    #[test]
    fn parses_a_secret_key_with_or_without_0x_prefix() {
        let hex64 = "11".repeat(32);
        assert!(parse_secret_key(&hex64).is_ok());
        assert!(parse_secret_key(&format!("0x{hex64}")).is_ok());
    }

    #[test]
    fn rejects_a_secret_key_of_the_wrong_length() {
        assert!(parse_secret_key("1234").is_err());
    }
}
