//! Decoding of donation-related event logs from EVM transaction receipts.

use ethers::types::{Address, Log, H160, H256, U256};
use ethers::utils::format_units;
use thiserror::Error;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_EVENT_TOPIC: H256 = H256([
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d, 0xaa,
    0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23, 0xb3, 0xef,
]);

/// keccak256("DonationMade(address,uint256,address,bytes)")
pub const DONATION_MADE_EVENT_TOPIC: H256 = H256([
    0x42, 0x8e, 0x11, 0x90, 0xdf, 0xef, 0x99, 0x7f, 0x3a, 0xc8, 0xda, 0x6a, 0xfa, 0x80, 0xe3, 0x30,
    0xfc, 0x78, 0x5b, 0xaf, 0xb1, 0xfe, 0xbe, 0xd9, 0x10, 0x95, 0x98, 0xbf, 0xee, 0xe4, 0x5e, 0xc0,
]);

/// Token address the donation handler reports for native-currency donations.
pub const NATIVE_TOKEN_ADDRESS: Address = H160([0u8; 20]);

pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;

/// Candidates within `expected / TOLERANCE_DIVISOR` of the expected amount match (1%).
const TOLERANCE_DIVISOR: u64 = 100;

const WORD: usize = 32;

/// One transfer decoded from a receipt log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationTransfer {
    pub from: Address,
    pub to: Address,
    pub amount: U256,
    pub token: Address,
    pub is_native: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogDecodeError {
    #[error("log signature does not match the event")]
    SignatureMismatch,

    #[error("expected {expected} topics, found {found}")]
    MissingTopics { expected: usize, found: usize },

    #[error("expected at least {expected} bytes of data, found {found}")]
    ShortData { expected: usize, found: usize },
}

fn check_shape(log: &Log, topic: H256) -> Result<(), LogDecodeError> {
    if log.topics.first() != Some(&topic) {
        return Err(LogDecodeError::SignatureMismatch);
    }
    if log.topics.len() < 3 {
        return Err(LogDecodeError::MissingTopics {
            expected: 3,
            found: log.topics.len(),
        });
    }
    if log.data.len() < WORD {
        return Err(LogDecodeError::ShortData {
            expected: WORD,
            found: log.data.len(),
        });
    }
    Ok(())
}

fn first_word(log: &Log) -> U256 {
    U256::from_big_endian(&log.data[..WORD])
}

/// `Transfer(address indexed from, address indexed to, uint256 value)`.
///
/// The emitting contract is the token; these are never native.
pub fn decode_transfer(log: &Log) -> Result<DonationTransfer, LogDecodeError> {
    check_shape(log, TRANSFER_EVENT_TOPIC)?;

    Ok(DonationTransfer {
        from: Address::from(log.topics[1]),
        to: Address::from(log.topics[2]),
        amount: first_word(log),
        token: log.address,
        is_native: false,
    })
}

/// `DonationMade(address indexed recipient, uint256 amount, address indexed token, bytes data)`.
///
/// The event does not name the donor, so the transaction sender is used.
pub fn decode_donation_made(
    log: &Log,
    sender: Address,
) -> Result<DonationTransfer, LogDecodeError> {
    check_shape(log, DONATION_MADE_EVENT_TOPIC)?;

    let token = Address::from(log.topics[2]);
    Ok(DonationTransfer {
        from: sender,
        to: Address::from(log.topics[1]),
        amount: first_word(log),
        token,
        is_native: token == NATIVE_TOKEN_ADDRESS,
    })
}

fn collect<'a, F>(logs: &'a [Log], event: &str, decode: F) -> Vec<DonationTransfer>
where
    F: Fn(&'a Log) -> Result<DonationTransfer, LogDecodeError>,
{
    logs.iter()
        .filter_map(|log| match decode(log) {
            Ok(transfer) => Some(transfer),
            Err(LogDecodeError::SignatureMismatch) => None,
            Err(e) => {
                tracing::debug!(
                    contract = ?log.address,
                    log_index = ?log.log_index,
                    "Skipping malformed {} log: {}",
                    event,
                    e
                );
                None
            }
        })
        .collect()
}

pub fn parse_transfer_events(logs: &[Log]) -> Vec<DonationTransfer> {
    collect(logs, "Transfer", decode_transfer)
}

pub fn parse_donation_made_events(logs: &[Log], sender: Address) -> Vec<DonationTransfer> {
    collect(logs, "DonationMade", |log| decode_donation_made(log, sender))
}

/// Converts a display amount into integer base units, truncating toward zero.
pub fn scale_amount(amount: f64, decimals: u32) -> U256 {
    if !amount.is_finite() || amount <= 0.0 {
        return U256::zero();
    }
    let scaled = (amount * 10f64.powi(decimals as i32)).floor();
    U256::from(scaled as u128)
}

pub fn units_to_decimal(amount: U256, decimals: u32) -> Result<f64, String> {
    let formatted = format_units(amount, decimals).map_err(|e| e.to_string())?;
    formatted
        .parse::<f64>()
        .map_err(|e| format!("invalid amount {}: {}", formatted, e))
}

fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Picks the candidate paying `recipient`.
///
/// With several candidates for the same recipient the one closest to the
/// expected amount wins if it lies within 1%; otherwise the first in log order
/// is returned. Two different transfers of similar size to one address cannot
/// be told apart.
pub fn find_donation_transfer(
    candidates: &[DonationTransfer],
    recipient: Address,
    expected_amount: Option<f64>,
    decimals: u32,
) -> Option<DonationTransfer> {
    let matching: Vec<&DonationTransfer> = candidates
        .iter()
        .filter(|candidate| candidate.to == recipient)
        .collect();

    let first = *matching.first()?;
    if matching.len() == 1 {
        return Some(first.clone());
    }

    let Some(expected) = expected_amount else {
        return Some(first.clone());
    };

    let expected = scale_amount(expected, decimals);
    let tolerance = expected / U256::from(TOLERANCE_DIVISOR);

    let closest = matching
        .iter()
        .map(|candidate| (abs_diff(candidate.amount, expected), *candidate))
        .filter(|(diff, _)| *diff <= tolerance)
        .min_by_key(|(diff, _)| *diff)
        .map(|(_, candidate)| candidate);

    Some(closest.unwrap_or(first).clone())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ethers::abi::{encode, Token};
    use ethers::types::Bytes;
    use ethers::utils::keccak256;

    pub(crate) fn address_topic(address: Address) -> H256 {
        H256::from(address)
    }

    pub(crate) fn transfer_log(token: Address, from: Address, to: Address, amount: U256) -> Log {
        Log {
            address: token,
            topics: vec![TRANSFER_EVENT_TOPIC, address_topic(from), address_topic(to)],
            data: Bytes::from(encode(&[Token::Uint(amount)])),
            ..Default::default()
        }
    }

    pub(crate) fn donation_made_log(
        handler: Address,
        to: Address,
        token: Address,
        amount: U256,
    ) -> Log {
        Log {
            address: handler,
            topics: vec![DONATION_MADE_EVENT_TOPIC, address_topic(to), address_topic(token)],
            data: Bytes::from(encode(&[Token::Uint(amount), Token::Bytes(vec![0xca, 0xfe])])),
            ..Default::default()
        }
    }

    fn candidate(to: Address, amount: u64) -> DonationTransfer {
        DonationTransfer {
            from: Address::repeat_byte(0xaa),
            to,
            amount: U256::from(amount),
            token: Address::repeat_byte(0x70),
            is_native: false,
        }
    }

    #[test]
    fn test_event_topics_match_signatures() {
        assert_eq!(
            TRANSFER_EVENT_TOPIC,
            H256::from(keccak256("Transfer(address,address,uint256)"))
        );
        assert_eq!(
            DONATION_MADE_EVENT_TOPIC,
            H256::from(keccak256("DonationMade(address,uint256,address,bytes)"))
        );
    }

    #[test]
    fn test_decode_transfer() {
        let token = Address::repeat_byte(0x70);
        let from = Address::repeat_byte(0x01);
        let to = Address::repeat_byte(0x02);
        let log = transfer_log(token, from, to, U256::from(1_500u64));

        let transfer = decode_transfer(&log).unwrap();
        assert_eq!(transfer.from, from);
        assert_eq!(transfer.to, to);
        assert_eq!(transfer.amount, U256::from(1_500u64));
        assert_eq!(transfer.token, token);
        assert!(!transfer.is_native);
    }

    #[test]
    fn test_decode_donation_made_native() {
        let sender = Address::repeat_byte(0x0a);
        let recipient = Address::repeat_byte(0x0b);
        let log = donation_made_log(
            Address::repeat_byte(0x99),
            recipient,
            NATIVE_TOKEN_ADDRESS,
            U256::exp10(18),
        );

        let donation = decode_donation_made(&log, sender).unwrap();
        assert_eq!(donation.from, sender);
        assert_eq!(donation.to, recipient);
        assert_eq!(donation.amount, U256::exp10(18));
        assert!(donation.is_native);
    }

    #[test]
    fn test_decode_errors() {
        let mut log = transfer_log(
            Address::zero(),
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            U256::one(),
        );
        assert_eq!(
            decode_donation_made(&log, Address::zero()),
            Err(LogDecodeError::SignatureMismatch)
        );

        log.topics.truncate(2);
        assert_eq!(
            decode_transfer(&log),
            Err(LogDecodeError::MissingTopics { expected: 3, found: 2 })
        );

        let short = Log {
            topics: vec![TRANSFER_EVENT_TOPIC, H256::zero(), H256::zero()],
            data: Bytes::from(vec![0u8; 8]),
            ..Default::default()
        };
        assert_eq!(
            decode_transfer(&short),
            Err(LogDecodeError::ShortData { expected: 32, found: 8 })
        );
    }

    #[test]
    fn test_parsing_skips_unrelated_logs() {
        let to = Address::repeat_byte(2);
        let logs = vec![
            Log::default(),
            transfer_log(
                Address::repeat_byte(0x70),
                Address::repeat_byte(1),
                to,
                U256::from(5u64),
            ),
            donation_made_log(
                Address::repeat_byte(0x99),
                to,
                NATIVE_TOKEN_ADDRESS,
                U256::from(7u64),
            ),
        ];

        let transfers = parse_transfer_events(&logs);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, U256::from(5u64));

        let donations = parse_donation_made_events(&logs, Address::repeat_byte(1));
        assert_eq!(donations.len(), 1);
        assert_eq!(donations[0].amount, U256::from(7u64));
    }

    #[test]
    fn test_find_selects_expected_amount_or_first() {
        let recipient = Address::repeat_byte(0x0b);
        let candidates = vec![candidate(recipient, 100), candidate(recipient, 200)];

        let picked = find_donation_transfer(&candidates, recipient, Some(200.0), 0).unwrap();
        assert_eq!(picked.amount, U256::from(200u64));

        let picked = find_donation_transfer(&candidates, recipient, None, 0).unwrap();
        assert_eq!(picked.amount, U256::from(100u64));

        let picked = find_donation_transfer(&candidates, recipient, Some(150.0), 0).unwrap();
        assert_eq!(picked.amount, U256::from(100u64));
    }

    #[test]
    fn test_find_prefers_closest_within_tolerance() {
        let recipient = Address::repeat_byte(0x0b);
        let candidates = vec![
            candidate(recipient, 1_008),
            candidate(recipient, 999),
            candidate(Address::repeat_byte(0x0c), 1_000),
        ];

        let picked = find_donation_transfer(&candidates, recipient, Some(1_000.0), 0).unwrap();
        assert_eq!(picked.amount, U256::from(999u64));
    }

    #[test]
    fn test_find_without_recipient_match() {
        let candidates = vec![candidate(Address::repeat_byte(0x0c), 100)];
        let recipient = Address::repeat_byte(0x0b);
        assert!(find_donation_transfer(&candidates, recipient, Some(100.0), 18).is_none());
        assert!(find_donation_transfer(&[], Address::repeat_byte(0x0b), None, 18).is_none());
    }

    #[test]
    fn test_amount_scaling() {
        assert_eq!(scale_amount(1.5, 6), U256::from(1_500_000u64));
        assert_eq!(scale_amount(-1.0, 18), U256::zero());
        assert_eq!(scale_amount(f64::NAN, 18), U256::zero());
        assert_eq!(units_to_decimal(U256::exp10(18), 18).unwrap(), 1.0);
        assert_eq!(units_to_decimal(U256::from(2_500_000u64), 6).unwrap(), 2.5);
    }
}
