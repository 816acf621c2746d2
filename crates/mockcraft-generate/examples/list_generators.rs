use mockcraft_generate::GeneratorEngine;

fn main() {
    let engine = GeneratorEngine::new(0);
    for industry in engine.list_industries() {
        for name in engine.list_generators(industry) {
            println!("{industry}.{name}");
        }
    }
}
