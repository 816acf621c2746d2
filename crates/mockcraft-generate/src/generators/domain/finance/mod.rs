use std::collections::BTreeMap;

use rand::{Rng, RngCore};

use mockcraft_core::Value;

use crate::errors::GeneratorError;
use crate::generators::domain::FINANCE;
use crate::generators::primitives::bounded_float;
use crate::generators::{
    GeneratorContext, GeneratorRegistry, digits, pick, register_choices, register_fns,
    upper_letters,
};
use crate::params::{ParamKind, ParamMap, ParamSpec};

const ACCOUNT_PARAMS: &[ParamSpec] = &[ParamSpec::new("length", ParamKind::Int, false)];
const IBAN_PARAMS: &[ParamSpec] = &[ParamSpec::new("country", ParamKind::String, false)];
const AMOUNT_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Float, false),
    ParamSpec::new("max", ParamKind::Float, false),
];

const DEFAULT_AMOUNT_MIN: f64 = 1.0;
const DEFAULT_AMOUNT_MAX: f64 = 10_000.0;

pub fn register(registry: &mut GeneratorRegistry) {
    register_choices(
        registry,
        FINANCE,
        &[
            ("bank_name", "Retail bank name", BANKS),
            ("transaction_type", "Ledger transaction type", TRANSACTION_TYPES),
        ],
    );
    register_fns(
        registry,
        FINANCE,
        &[
            (
                "account_number",
                "Numeric account number of `length` digits",
                ACCOUNT_PARAMS,
                account_number,
            ),
            (
                "routing_number",
                "ABA routing number with a valid checksum",
                &[],
                routing_number,
            ),
            ("iban", "IBAN with valid mod-97 check digits", IBAN_PARAMS, iban),
            ("swift_code", "SWIFT/BIC code", &[], swift_code),
            (
                "transaction_amount",
                "Amount in [min, max] with two decimals",
                AMOUNT_PARAMS,
                transaction_amount,
            ),
            ("transaction_id", "Transaction reference", &[], transaction_id),
            ("transaction", "Transaction record", AMOUNT_PARAMS, transaction),
        ],
    );
}

fn account_number(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let length = params.get_i64("length").unwrap_or(10);
    if !(4..=34).contains(&length) {
        return Err(GeneratorError::range(format!(
            "length must be between 4 and 34 (got {length})"
        )));
    }
    let lead = rng.random_range(1..=9);
    Ok(Value::Text(format!(
        "{lead}{}",
        digits(rng, length as usize - 1)
    )))
}

/// ABA weights 3-7-1 over the nine digits must sum to a multiple of ten.
pub(crate) fn routing_check_digit(first_eight: &[u8; 8]) -> u8 {
    const WEIGHTS: [u32; 8] = [3, 7, 1, 3, 7, 1, 3, 7];
    let sum: u32 = first_eight
        .iter()
        .zip(WEIGHTS)
        .map(|(digit, weight)| u32::from(*digit) * weight)
        .sum();
    ((10 - sum % 10) % 10) as u8
}

fn routing_number(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let mut first_eight = [0u8; 8];
    // Federal Reserve routing symbols start with 01-12.
    let district = rng.random_range(1..=12u8);
    first_eight[0] = district / 10;
    first_eight[1] = district % 10;
    for digit in &mut first_eight[2..] {
        *digit = rng.random_range(0..10);
    }
    let check = routing_check_digit(&first_eight);
    let mut value: String = first_eight.iter().map(|d| char::from(b'0' + d)).collect();
    value.push(char::from(b'0' + check));
    Ok(Value::Text(value))
}

/// ISO 7064 mod-97 check digits for `country` + `bban`.
pub(crate) fn iban_check_digits(country: &str, bban: &str) -> u32 {
    let rearranged = format!("{bban}{country}00");
    let remainder = rearranged.chars().fold(0u32, |acc, ch| {
        let value = ch.to_digit(36).unwrap_or(0);
        if value >= 10 {
            (acc * 100 + value) % 97
        } else {
            (acc * 10 + value) % 97
        }
    });
    98 - remainder
}

fn iban(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let country = params.get_str("country").unwrap_or("DE").to_ascii_uppercase();
    let Some(&(_, length)) = IBAN_LENGTHS.iter().find(|(code, _)| *code == country) else {
        return Err(GeneratorError::InvalidParamType {
            param: "country".to_string(),
            expected: "a supported IBAN country code (DE, FR, GB, ES, IT, NL)",
        });
    };
    let bban = if country == "GB" || country == "NL" {
        format!("{}{}", upper_letters(rng, 4), digits(rng, length - 8))
    } else {
        digits(rng, length - 4)
    };
    let check = iban_check_digits(&country, &bban);
    Ok(Value::Text(format!("{country}{check:02}{bban}")))
}

fn swift_code(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let bank = upper_letters(rng, 4);
    let country = pick(&["US", "GB", "DE", "FR", "CH", "JP", "BR"], rng);
    let location = format!("{}{}", upper_letters(rng, 1), digits(rng, 1));
    let branch = if rng.random_bool(0.5) {
        "XXX".to_string()
    } else {
        digits(rng, 3)
    };
    Ok(Value::Text(format!("{bank}{country}{location}{branch}")))
}

fn amount(params: &ParamMap<'_>, rng: &mut dyn RngCore) -> Result<f64, GeneratorError> {
    let (min, max) = params.float_range(DEFAULT_AMOUNT_MIN, DEFAULT_AMOUNT_MAX)?;
    Ok(bounded_float(rng, min, max, 2))
}

fn transaction_amount(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(Value::Float(amount(params, rng)?))
}

fn make_transaction_id(rng: &mut dyn RngCore) -> String {
    let mut bytes = [0u8; 6];
    rng.fill_bytes(&mut bytes);
    format!("TXN-{}", hex::encode_upper(bytes))
}

fn transaction_id(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(Value::Text(make_transaction_id(rng)))
}

fn transaction(
    ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let amount = amount(params, rng)?;
    let hours_ago = rng.random_range(0..=30 * 24);
    let mut map = BTreeMap::new();
    map.insert("id".to_string(), Value::Text(make_transaction_id(rng)));
    map.insert("type".to_string(), Value::from(*pick(TRANSACTION_TYPES, rng)));
    map.insert("amount".to_string(), Value::Float(amount));
    map.insert("currency".to_string(), Value::from(*pick(&["USD", "EUR", "GBP"], rng)));
    map.insert(
        "timestamp".to_string(),
        Value::Timestamp(ctx.reference_time - chrono::Duration::hours(hours_ago)),
    );
    map.insert("status".to_string(), Value::from(*pick(STATUSES, rng)));
    Ok(Value::Map(map))
}

const BANKS: &[&str] = &[
    "First National Bank",
    "Citizens Trust",
    "Harbor Savings Bank",
    "Summit Federal Credit Union",
    "Pioneer Community Bank",
    "Granite State Bank",
    "Evergreen Bank",
    "Lakeside Savings",
];

const TRANSACTION_TYPES: &[&str] = &[
    "deposit",
    "withdrawal",
    "transfer",
    "payment",
    "refund",
    "fee",
    "interest",
];

const STATUSES: &[&str] = &["pending", "completed", "failed", "reversed"];

/// Country code and total IBAN length.
const IBAN_LENGTHS: &[(&str, usize)] = &[
    ("DE", 22),
    ("FR", 27),
    ("GB", 22),
    ("ES", 24),
    ("IT", 27),
    ("NL", 18),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_checksum_accepts_known_number() {
        // 011000015 is a published Federal Reserve routing number.
        assert_eq!(routing_check_digit(&[0, 1, 1, 0, 0, 0, 0, 1]), 5);
    }

    #[test]
    fn iban_check_digits_match_reference() {
        // DE89 3704 0044 0532 0130 00
        assert_eq!(iban_check_digits("DE", "370400440532013000"), 89);
        // GB29 NWBK 6016 1331 9268 19
        assert_eq!(iban_check_digits("GB", "NWBK60161331926819"), 29);
    }
}
