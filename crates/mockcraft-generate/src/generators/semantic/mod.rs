use fake::Fake;
use fake::faker::address::en::{BuildingNumber, CityName, CountryName, StateAbbr, StreetName, ZipCode};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{DomainSuffix, SafeEmail, Username};
use fake::faker::name::en::{FirstName, LastName, Name};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use mockcraft_core::Value;

use crate::errors::GeneratorError;
use crate::generators::primitives::{bounded_float, word};
use crate::generators::{
    BASE, GeneratorContext, GeneratorRegistry, digits, pick, register_choices, register_fns,
    upper_letters,
};
use crate::params::{ParamKind, ParamMap, ParamSpec, bounded_size};

const PHONE_PARAMS: &[ParamSpec] = &[ParamSpec::new("format", ParamKind::String, false)];
const PASSWORD_PARAMS: &[ParamSpec] = &[ParamSpec::new("length", ParamKind::Int, false)];
const IP_PARAMS: &[ParamSpec] = &[ParamSpec::new("version", ParamKind::Int, false)];
const PRICE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Float, false),
    ParamSpec::new("max", ParamKind::Float, false),
];

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!@#$%^&*()-_=+[]{}";

pub fn register(registry: &mut GeneratorRegistry) {
    register_fns(
        registry,
        BASE,
        &[
            ("first_name", "Given name", &[], first_name),
            ("last_name", "Family name", &[], last_name),
            ("name", "Full name", &[], full_name),
            ("email", "Email address on a reserved example domain", &[], email),
            ("username", "Login handle", &[], username),
            (
                "phone",
                "Phone number; format is international, national or local",
                PHONE_PARAMS,
                phone,
            ),
            ("address", "Street address with city, state and zip", &[], address),
            ("city", "City name", &[], city),
            ("country", "Country name", &[], country),
            ("zip_code", "Postal code", &[], zip_code),
            ("company", "Company name", &[], company),
            ("ssn", "US social security number (AAA-GG-SSSS)", &[], ssn),
            (
                "password",
                "Password with lower, upper, digit and special characters",
                PASSWORD_PARAMS,
                password,
            ),
            ("url", "HTTPS URL", &[], url),
            ("domain", "Domain name", &[], domain),
            ("ip", "IP address; version 4 (default) or 6", IP_PARAMS, ip),
            ("mac_address", "Colon separated MAC address", &[], mac_address),
            ("credit_card", "Card number with a valid Luhn check digit", &[], credit_card),
            ("stock_symbol", "Ticker symbol", &[], stock_symbol),
            ("stock_price", "Share price with two decimals", &[], stock_price),
            ("price", "Price in [min, max] with two decimals", PRICE_PARAMS, price),
        ],
    );
    register_choices(
        registry,
        BASE,
        &[
            ("currency", "Currency name", CURRENCIES),
            ("currency_code", "ISO 4217 currency code", CURRENCY_CODES),
        ],
    );
}

fn first_name(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let value: String = FirstName().fake_with_rng(rng);
    Ok(Value::Text(value))
}

fn last_name(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let value: String = LastName().fake_with_rng(rng);
    Ok(Value::Text(value))
}

fn full_name(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let value: String = Name().fake_with_rng(rng);
    Ok(Value::Text(value))
}

fn email(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let value: String = SafeEmail().fake_with_rng(rng);
    Ok(Value::Text(value))
}

fn username(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let value: String = Username().fake_with_rng(rng);
    Ok(Value::Text(value))
}

fn phone(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let area = rng.random_range(200..=999);
    let exchange = rng.random_range(200..=999);
    let line = rng.random_range(0..=9999);
    let value = match params.get_str("format").unwrap_or("international") {
        "international" => format!("+1-{area}-{exchange}-{line:04}"),
        "national" => format!("({area}) {exchange}-{line:04}"),
        "local" => format!("{exchange}-{line:04}"),
        _ => {
            return Err(GeneratorError::InvalidParamType {
                param: "format".to_string(),
                expected: "international, national or local",
            });
        }
    };
    Ok(Value::Text(value))
}

fn address(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let number: String = BuildingNumber().fake_with_rng(rng);
    let street: String = StreetName().fake_with_rng(rng);
    let city: String = CityName().fake_with_rng(rng);
    let state: String = StateAbbr().fake_with_rng(rng);
    let zip: String = ZipCode().fake_with_rng(rng);
    Ok(Value::Text(format!("{number} {street}, {city}, {state} {zip}")))
}

fn city(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let value: String = CityName().fake_with_rng(rng);
    Ok(Value::Text(value))
}

fn country(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let value: String = CountryName().fake_with_rng(rng);
    Ok(Value::Text(value))
}

fn zip_code(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let value: String = ZipCode().fake_with_rng(rng);
    Ok(Value::Text(value))
}

fn company(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let value: String = CompanyName().fake_with_rng(rng);
    Ok(Value::Text(value))
}

fn ssn(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    // Area 666 and 900-999 are never issued.
    let mut area = rng.random_range(1..=898);
    if area >= 666 {
        area += 1;
    }
    let group = rng.random_range(1..=99);
    let serial = rng.random_range(1..=9999);
    Ok(Value::Text(format!("{area:03}-{group:02}-{serial:04}")))
}

fn password(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let length = bounded_size("length", params.get_i64("length").unwrap_or(12), 1)?;
    let all: Vec<u8> = [LOWER, UPPER, DIGITS, SPECIAL].concat();

    let mut chars: Vec<u8> = Vec::with_capacity(length);
    if length >= 4 {
        for class in [LOWER, UPPER, DIGITS, SPECIAL] {
            chars.push(*pick(class, rng));
        }
    }
    while chars.len() < length {
        chars.push(*pick(&all, rng));
    }
    chars.shuffle(rng);
    Ok(Value::Text(chars.into_iter().map(char::from).collect()))
}

fn domain_name(rng: &mut dyn RngCore) -> String {
    let suffix: String = DomainSuffix().fake_with_rng(rng);
    format!("{}{}.{suffix}", word(rng), rng.random_range(1..=999))
}

fn url(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let host = domain_name(rng);
    Ok(Value::Text(format!("https://www.{host}/{}", word(rng))))
}

fn domain(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(Value::Text(domain_name(rng)))
}

pub(crate) fn ipv4_octets(rng: &mut dyn RngCore) -> [u8; 4] {
    [
        rng.random_range(1..=223),
        rng.random(),
        rng.random(),
        rng.random_range(1..=254),
    ]
}

pub(crate) fn ipv6_segments(rng: &mut dyn RngCore) -> [u16; 8] {
    let mut segments = [0u16; 8];
    for segment in &mut segments {
        *segment = rng.random();
    }
    segments[0] = 0x2001;
    segments
}

fn ip(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let value = match params.get_i64("version").unwrap_or(4) {
        4 => std::net::Ipv4Addr::from(ipv4_octets(rng)).to_string(),
        6 => std::net::Ipv6Addr::from(ipv6_segments(rng)).to_string(),
        other => {
            return Err(GeneratorError::range(format!(
                "ip version must be 4 or 6 (got {other})"
            )));
        }
    };
    Ok(Value::Text(value))
}

fn mac_address(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let mut bytes = [0u8; 6];
    rng.fill_bytes(&mut bytes);
    let parts: Vec<String> = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    Ok(Value::Text(parts.join(":")))
}

/// Check digit that makes `payload` + digit pass the Luhn test.
pub(crate) fn luhn_check_digit(payload: &str) -> u8 {
    let sum: u32 = payload
        .bytes()
        .rev()
        .enumerate()
        .map(|(idx, byte)| {
            let digit = u32::from(byte - b'0');
            if idx % 2 == 0 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

fn credit_card(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let (prefix, length) = *pick(CARD_PREFIXES, rng);
    let mut number = prefix.to_string();
    number.push_str(&digits(rng, length - prefix.len() - 1));
    let check = luhn_check_digit(&number);
    number.push(char::from(b'0' + check));
    Ok(Value::Text(number))
}

fn stock_symbol(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let length = rng.random_range(3..=4);
    Ok(Value::Text(upper_letters(rng, length)))
}

fn stock_price(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(Value::Float(bounded_float(rng, 1.0, 1000.0, 2)))
}

fn price(
    _ctx: &mut GeneratorContext<'_>,
    params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let (min, max) = params.float_range(1.0, 1000.0)?;
    Ok(Value::Float(bounded_float(rng, min, max, 2)))
}

/// Issuer prefix and total length.
const CARD_PREFIXES: &[(&str, usize)] = &[
    ("4", 16),
    ("51", 16),
    ("52", 16),
    ("53", 16),
    ("54", 16),
    ("55", 16),
    ("34", 15),
    ("37", 15),
    ("6011", 16),
];

const CURRENCIES: &[&str] = &[
    "US Dollar",
    "Euro",
    "British Pound",
    "Japanese Yen",
    "Swiss Franc",
    "Canadian Dollar",
    "Australian Dollar",
    "Brazilian Real",
    "Indian Rupee",
    "Mexican Peso",
];

const CURRENCY_CODES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CHF", "CAD", "AUD", "BRL", "INR", "MXN", "CNY", "SEK",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_digit_matches_known_numbers() {
        assert_eq!(luhn_check_digit("7992739871"), 3);
        assert_eq!(luhn_check_digit("411111111111111"), 1);
    }
}
