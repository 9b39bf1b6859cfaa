//! Catalog command handler.

use anyhow::{Context, Result};

use storyloom::story::{Language, Level, StoryLength, Topic};

/// Print the choices a story can be built from.
pub(crate) fn cmd_catalog(level: Option<&str>) -> Result<()> {
    let levels = match level {
        Some(name) => vec![name.parse::<Level>().context("Invalid --level")?],
        None => Level::ALL.to_vec(),
    };

    for level in levels {
        println!("{level}");
        println!("  Vocabulary: {}", level.vocabulary().join(", "));
        println!("  Grammar:    {}", level.grammar().join("; "));
    }
    println!();

    println!("Topics:");
    for topic in Topic::ALL {
        println!("  - {topic}");
    }
    println!();

    let lengths: Vec<&str> = StoryLength::ALL.iter().map(StoryLength::as_str).collect();
    println!("Lengths: {}", lengths.join(", "));
    println!("Native languages: {}", join_names(&Language::NATIVE));
    println!("Target languages: {}", join_names(&Language::TARGET));

    Ok(())
}

fn join_names(languages: &[Language]) -> String {
    languages
        .iter()
        .map(Language::name)
        .collect::<Vec<_>>()
        .join(", ")
}
