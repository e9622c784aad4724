use rand::SeedableRng;
use rand::rngs::StdRng;
use randomizer_gen::Registry;
use std::error::Error;

/// Example of generating story fragments from an embedded randomizer file
fn main() -> Result<(), Box<dyn Error>> {
    let source = r"STORY
| {INTRO} A {HERO} left {PLACE} at {TIME}.
| {OBSTACLE} The {1<HERO} pressed on{ELLIPSIS}

INTRO
- Listen.
+ And then?

HERO
- wanderer
- cartographer
- smuggler

PLACE
- Dunwich
- Port Sorrow
- the Low Quarter

TIME
+ dawn
+ noon
+ dusk
+ midnight

OBSTACLE
3- Rain fell for days.
2- The bridge was out.
1- Wolves shadowed the road.

ELLIPSIS
3*.
";

    // Example 1: a seeded run is reproducible
    let mut registry = Registry::from_source(source)?;
    println!("Loaded {} randomizers.", registry.len());

    let mut rng = StdRng::seed_from_u64(2024);
    println!("\nSeeded run:");
    for i in 1..=5 {
        let story = registry.evaluate("STORY", &mut rng)?;
        println!("{}. {}", i, story);
    }

    // Example 2: a fresh session drawing from OS randomness. Note how the
    // opener changes after the first story and the times rotate in order.
    let mut registry = Registry::from_source(source)?;
    let mut rng = StdRng::from_entropy();
    println!("\nUnseeded run:");
    for i in 1..=5 {
        let story = registry.evaluate("STORY", &mut rng)?;
        println!("{}. {}", i, story);
    }

    Ok(())
}
