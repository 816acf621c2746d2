use std::collections::BTreeMap;

use rand::{Rng, RngCore};

use mockcraft_core::Value;

use crate::errors::GeneratorError;
use crate::generators::domain::HEALTH;
use crate::generators::{
    GeneratorContext, GeneratorRegistry, digits, pick, register_choices, register_fns, round_to,
};
use crate::params::ParamMap;

pub fn register(registry: &mut GeneratorRegistry) {
    register_choices(
        registry,
        HEALTH,
        &[
            ("blood_type", "ABO/Rh blood group", BLOOD_TYPES),
            ("medical_condition", "Chronic or acute condition", CONDITIONS),
            ("medication", "Generic drug name", MEDICATIONS),
            ("symptom", "Reported symptom", SYMPTOMS),
            ("diagnosis", "ICD-10 style diagnosis", DIAGNOSES),
            ("allergy", "Common allergen", ALLERGIES),
        ],
    );
    register_fns(
        registry,
        HEALTH,
        &[
            ("lab_result", "Lab test with value, unit and reference range", &[], lab_result),
            ("vital_sign", "Vital signs snapshot", &[], vital_sign),
            ("medical_record", "Patient record summary", &[], medical_record),
        ],
    );
}

fn lab_result(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let &(test, unit, low, high) = pick(LAB_TESTS, rng);
    // Draw from a band 20% wider than the reference range so some results are abnormal.
    let spread = (high - low) * 0.2;
    let value = round_to(rng.random_range(low - spread..=high + spread), 1);
    let status = if value < low {
        "low"
    } else if value > high {
        "high"
    } else {
        "normal"
    };

    let mut map = BTreeMap::new();
    map.insert("test".to_string(), Value::from(test));
    map.insert("value".to_string(), Value::Float(value));
    map.insert("unit".to_string(), Value::from(unit));
    map.insert(
        "reference_range".to_string(),
        Value::Text(format!("{low}-{high}")),
    );
    map.insert("status".to_string(), Value::from(status));
    Ok(Value::Map(map))
}

fn vital_sign(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let systolic = rng.random_range(95..=160);
    let diastolic = rng.random_range(60..=100);
    let mut map = BTreeMap::new();
    map.insert(
        "blood_pressure".to_string(),
        Value::Text(format!("{systolic}/{diastolic}")),
    );
    map.insert("heart_rate".to_string(), Value::Int(rng.random_range(50..=120)));
    map.insert(
        "temperature".to_string(),
        Value::Float(round_to(rng.random_range(36.0..=39.5), 1)),
    );
    map.insert(
        "respiratory_rate".to_string(),
        Value::Int(rng.random_range(12..=24)),
    );
    map.insert(
        "oxygen_saturation".to_string(),
        Value::Int(rng.random_range(90..=100)),
    );
    Ok(Value::Map(map))
}

fn medical_record(
    _ctx: &mut GeneratorContext<'_>,
    _params: &ParamMap<'_>,
    rng: &mut dyn RngCore,
) -> Result<Value, GeneratorError> {
    let mut map = BTreeMap::new();
    map.insert(
        "record_number".to_string(),
        Value::Text(format!("MRN-{}", digits(rng, 8))),
    );
    map.insert("blood_type".to_string(), Value::from(*pick(BLOOD_TYPES, rng)));
    map.insert("condition".to_string(), Value::from(*pick(CONDITIONS, rng)));
    map.insert("diagnosis".to_string(), Value::from(*pick(DIAGNOSES, rng)));
    map.insert("medication".to_string(), Value::from(*pick(MEDICATIONS, rng)));
    map.insert("allergy".to_string(), Value::from(*pick(ALLERGIES, rng)));
    Ok(Value::Map(map))
}

const BLOOD_TYPES: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

const CONDITIONS: &[&str] = &[
    "Hypertension",
    "Type 2 Diabetes",
    "Asthma",
    "Chronic Kidney Disease",
    "Hyperlipidemia",
    "Migraine",
    "Osteoarthritis",
    "Hypothyroidism",
    "Atrial Fibrillation",
    "Depression",
];

const MEDICATIONS: &[&str] = &[
    "Lisinopril",
    "Metformin",
    "Atorvastatin",
    "Levothyroxine",
    "Amlodipine",
    "Omeprazole",
    "Albuterol",
    "Sertraline",
    "Ibuprofen",
    "Amoxicillin",
];

const SYMPTOMS: &[&str] = &[
    "Fever",
    "Cough",
    "Headache",
    "Fatigue",
    "Nausea",
    "Shortness of breath",
    "Chest pain",
    "Dizziness",
    "Sore throat",
    "Joint pain",
];

const DIAGNOSES: &[&str] = &[
    "I10 Essential hypertension",
    "E11.9 Type 2 diabetes mellitus",
    "J45.909 Unspecified asthma",
    "J06.9 Acute upper respiratory infection",
    "M54.5 Low back pain",
    "K21.9 Gastro-esophageal reflux disease",
    "F32.9 Major depressive disorder",
    "E78.5 Hyperlipidemia",
];

const ALLERGIES: &[&str] = &[
    "Penicillin",
    "Peanuts",
    "Shellfish",
    "Latex",
    "Pollen",
    "Dust mites",
    "Sulfa drugs",
    "Eggs",
];

/// Test name, unit, and reference range bounds.
const LAB_TESTS: &[(&str, &str, f64, f64)] = &[
    ("Hemoglobin", "g/dL", 12.0, 17.5),
    ("Glucose", "mg/dL", 70.0, 100.0),
    ("Cholesterol", "mg/dL", 125.0, 200.0),
    ("Potassium", "mmol/L", 3.5, 5.1),
    ("Creatinine", "mg/dL", 0.6, 1.3),
    ("TSH", "mIU/L", 0.4, 4.0),
];
