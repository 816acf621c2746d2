use mockcraft_core::Schema;
use schemars::schema_for;

fn main() {
    let schema = schema_for!(Schema);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to render JSON Schema: {err}"),
    }
}
