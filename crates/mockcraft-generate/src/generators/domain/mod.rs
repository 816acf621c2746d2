use crate::generators::GeneratorRegistry;

pub mod aviation;
pub mod finance;
pub mod health;

pub const HEALTH: &str = "health";
pub const AVIATION: &str = "aviation";
pub const FINANCE: &str = "finance";

pub fn register(registry: &mut GeneratorRegistry) {
    health::register(registry);
    aviation::register(registry);
    finance::register(registry);
}
