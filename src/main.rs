use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use randomizer_gen::{DEFAULT_MAX_DEPTH, Registry};
use std::fs;
use std::path::PathBuf;

/// Randomizer-based text generator
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the randomizer file
    #[arg(help = "Path to the randomizer file")]
    file: Option<PathBuf>,

    /// Name of the randomizer to evaluate
    #[arg(help = "Name of the randomizer to evaluate")]
    name: Option<String>,

    /// Number of texts to generate
    #[arg(help = "Number of texts to generate", default_value = "1")]
    count: Option<usize>,

    /// Seed for reproducible output
    #[arg(long, help = "Seed for reproducible output")]
    seed: Option<u64>,

    /// Recursion limit applied to cyclic randomizers
    #[arg(
        long,
        help = "Recursion limit applied to cyclic randomizers",
        default_value_t = DEFAULT_MAX_DEPTH
    )]
    max_depth: usize,

    /// Print the parsed document as JSON instead of generating
    #[arg(long, help = "Print the parsed document as JSON instead of generating")]
    describe: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example randomizer file
    Example {
        /// Output file path
        #[arg(help = "Output file path")]
        output: Option<PathBuf>,
    },
}

const EXAMPLE_GRAMMAR: &str = r"STORY
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

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(command) = cli.command {
        match command {
            Commands::Example { output } => {
                let output_path = output.unwrap_or_else(|| PathBuf::from("example_story.txt"));
                fs::write(&output_path, EXAMPLE_GRAMMAR)?;
                println!(
                    "Created example randomizer file at: {}",
                    output_path.display()
                );
                return Ok(());
            }
        }
    }

    // Process normal text generation
    let file = cli.file.ok_or("Randomizer file path required")?;
    let name = cli.name.ok_or("Randomizer name required")?;
    let count = cli.count.unwrap_or(1);

    println!("Loading randomizers from {}...", file.display());
    let mut registry = Registry::from_file(&file)?;
    println!("Loaded {} randomizers.", registry.len());

    if cli.describe {
        println!("{}", serde_json::to_string_pretty(registry.document())?);
        return Ok(());
    }

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    println!("Generating {} random samples:\n", count);
    for i in 0..count {
        let generated = randomizer_gen::evaluate(&mut registry, &name, &mut rng, cli.max_depth)?;
        println!("{}. {}", i + 1, generated);
    }

    Ok(())
}
