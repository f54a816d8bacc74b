//! Pure checks shared by the chain readers and the verification pipeline.

/// Relative comparison with `delta` as the margin of error.
///
/// An expected value of zero only matches an observed zero.
pub fn close_to(observed: f64, expected: f64, delta: f64) -> bool {
    if expected == 0.0 {
        return observed == 0.0;
    }
    (1.0 - observed / expected).abs() < delta
}

/// The on-chain timestamp may not precede the expected one by more than `threshold_secs`.
pub fn is_timestamp_valid(tx_timestamp: i64, expected_timestamp: i64, threshold_secs: i64) -> bool {
    expected_timestamp - tx_timestamp <= threshold_secs
}

pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

fn is_hex_of_len(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn is_valid_evm_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .map_or(false, |hex| is_hex_of_len(hex, 40))
}

pub fn is_valid_evm_transaction_hash(hash: &str) -> bool {
    hash.strip_prefix("0x")
        .map_or(false, |hex| is_hex_of_len(hex, 64))
}

/// Base58 public key decoding to 32 bytes.
pub fn is_valid_solana_address(address: &str) -> bool {
    (32..=44).contains(&address.len())
        && bs58::decode(address)
            .into_vec()
            .map_or(false, |bytes| bytes.len() == 32)
}

/// Base58 transaction signature decoding to 64 bytes.
pub fn is_valid_solana_signature(signature: &str) -> bool {
    (87..=88).contains(&signature.len())
        && bs58::decode(signature)
            .into_vec()
            .map_or(false, |bytes| bytes.len() == 64)
}

pub fn is_valid_stellar_address(address: &str) -> bool {
    address.len() == 56
        && address.starts_with('G')
        && address
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
}

/// Stellar and Cardano both identify transactions by a bare 32-byte hex hash.
pub fn is_valid_hex_transaction_hash(hash: &str) -> bool {
    is_hex_of_len(hash, 64)
}

pub fn is_valid_cardano_address(address: &str) -> bool {
    let body = address
        .strip_prefix("addr_test1")
        .or_else(|| address.strip_prefix("addr1"));

    body.map_or(false, |rest| {
        rest.len() >= 50
            && rest
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    })
}
