use std::collections::BTreeMap;

use chrono::Duration;
use rand::{Rng, RngCore};

use mockcraft_core::Value;

use crate::errors::GeneratorError;
use crate::generators::domain::AVIATION;
use crate::generators::{
    GeneratorContext, GeneratorRegistry, digits, pick, register_choices, register_fns,
    upper_letters,
};
use crate::params::ParamMap;

pub fn register(registry: &mut GeneratorRegistry) {
    register_choices(
        registry,
        AVIATION,
        &[
            ("aircraft_type", "Aircraft model", AIRCRAFT_TYPES),
            ("flight_status", "Operational flight status", FLIGHT_STATUSES),
        ],
    );
    register_fns(
        registry,
        AVIATION,
        &[
            ("airline", "Airline name", &[], airline),
            ("airport", "Airport name", &[], airport),
            ("airport_code", "IATA airport code", &[], airport_code),
            (
                "aircraft_registration",
                "US civil aircraft registration (N-number)",
                &[],
                aircraft_registration,
            ),
            ("flight_number", "Airline designator plus number", &[], flight_number),
            (
                "flight_schedule",
                "Departure and arrival times around the reference instant",
                &[],
                flight_schedule,
            ),
            ("flight_info", "Flight summary", &[], flight_info),
        ],
    );
}

fn airline(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(Value::from(pick(AIRLINES, rng).1))
}

fn airport(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(Value::from(pick(AIRPORTS, rng).1))
}

fn airport_code(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(Value::from(pick(AIRPORTS, rng).0))
}

fn aircraft_registration(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    // N-numbers never start with zero.
    let lead = rng.random_range(1..=9);
    let number_len = rng.random_range(1..=3);
    let number = digits(rng, number_len);
    let suffix_len = rng.random_range(0..=2);
    let suffix = upper_letters(rng, suffix_len);
    Ok(Value::Text(format!("N{lead}{number}{suffix}")))
}

fn make_flight_number(rng: &mut dyn RngCore, designator: &str) -> String {
    format!("{designator}{}", rng.random_range(1..=9999))
}

fn flight_number(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let designator = pick(AIRLINES, rng).0;
    Ok(Value::Text(make_flight_number(rng, designator)))
}

fn schedule(ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> BTreeMap<String, Value> {
    let week = 7 * 24 * 60;
    let departure = ctx.reference_time + Duration::minutes(rng.random_range(-week..=week));
    let arrival = departure + Duration::minutes(rng.random_range(45..=16 * 60));
    let mut map = BTreeMap::new();
    map.insert("departure".to_string(), Value::Timestamp(departure));
    map.insert("arrival".to_string(), Value::Timestamp(arrival));
    map
}

fn flight_schedule(
    ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    Ok(Value::Map(schedule(ctx, rng)))
}

fn flight_info(
    ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let &(designator, name) = pick(AIRLINES, rng);
    let origin = pick(AIRPORTS, rng).0;
    let destination = loop {
        let candidate = pick(AIRPORTS, rng).0;
        if candidate != origin {
            break candidate;
        }
    };

    let mut map = schedule(ctx, rng);
    map.insert(
        "flight_number".to_string(),
        Value::Text(make_flight_number(rng, designator)),
    );
    map.insert("airline".to_string(), Value::from(name));
    map.insert("origin".to_string(), Value::from(origin));
    map.insert("destination".to_string(), Value::from(destination));
    map.insert("aircraft".to_string(), Value::from(*pick(AIRCRAFT_TYPES, rng)));
    map.insert("status".to_string(), Value::from(*pick(FLIGHT_STATUSES, rng)));
    Ok(Value::Map(map))
}

/// IATA designator and name.
const AIRLINES: &[(&str, &str)] = &[
    ("AA", "American Airlines"),
    ("DL", "Delta Air Lines"),
    ("UA", "United Airlines"),
    ("WN", "Southwest Airlines"),
    ("BA", "British Airways"),
    ("LH", "Lufthansa"),
    ("AF", "Air France"),
    ("EK", "Emirates"),
    ("QF", "Qantas"),
    ("LA", "LATAM Airlines"),
];

/// IATA code and name.
const AIRPORTS: &[(&str, &str)] = &[
    ("ATL", "Hartsfield-Jackson Atlanta International Airport"),
    ("LAX", "Los Angeles International Airport"),
    ("ORD", "O'Hare International Airport"),
    ("DFW", "Dallas/Fort Worth International Airport"),
    ("JFK", "John F. Kennedy International Airport"),
    ("LHR", "London Heathrow Airport"),
    ("CDG", "Paris Charles de Gaulle Airport"),
    ("FRA", "Frankfurt Airport"),
    ("DXB", "Dubai International Airport"),
    ("HND", "Tokyo Haneda Airport"),
    ("SYD", "Sydney Kingsford Smith Airport"),
    ("GRU", "Sao Paulo/Guarulhos International Airport"),
];

const AIRCRAFT_TYPES: &[&str] = &[
    "Boeing 737-800",
    "Boeing 737 MAX 8",
    "Boeing 777-300ER",
    "Boeing 787-9",
    "Airbus A320neo",
    "Airbus A321",
    "Airbus A350-900",
    "Airbus A380-800",
    "Embraer E175",
    "Bombardier CRJ900",
];

const FLIGHT_STATUSES: &[&str] = &[
    "scheduled",
    "boarding",
    "departed",
    "in_air",
    "landed",
    "arrived",
    "delayed",
    "cancelled",
    "diverted",
];
