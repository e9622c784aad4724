use randomizer_gen::{Body, Document, FixedEntropy, RandomizerDef, Registry, StringTemplate};
use std::error::Error;

/// Example of assembling a document in code instead of parsing a file
fn main() -> Result<(), Box<dyn Error>> {
    // Example 1: build the declarations by hand
    let defs = vec![
        RandomizerDef::new(
            "GREETING",
            Body::Literal(StringTemplate::parse("Hello, {NAME}!")?),
        ),
        RandomizerDef::new(
            "NAME",
            Body::List(vec![
                StringTemplate::text("Ann"),
                StringTemplate::text("Bo"),
                StringTemplate::text("Cy"),
            ]),
        ),
        RandomizerDef::new(
            "FAREWELL",
            Body::RotateList(vec![
                StringTemplate::text("Goodbye."),
                StringTemplate::text("Until next time."),
            ]),
        ),
    ];

    let document = Document::new(defs)?;

    // The document renders back to the file syntax
    println!("{}", document);

    // Example 2: evaluate with a fixed entropy source; draw 0 always
    // selects the first list item
    let mut registry = Registry::build(document)?;
    let mut entropy = FixedEntropy(0);

    println!("\nWith FixedEntropy(0):");
    for i in 1..=3 {
        let text = registry.evaluate("GREETING", &mut entropy)?;
        println!("{}. {}", i, text);
    }

    // Rotations consume no entropy at all
    println!("\nRotation:");
    for i in 1..=3 {
        let text = registry.evaluate("FAREWELL", &mut entropy)?;
        println!("{}. {}", i, text);
    }

    Ok(())
}
