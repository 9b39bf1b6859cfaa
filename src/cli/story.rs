//! Story command handler.

use anyhow::{bail, Context, Result};

use storyloom::config::Config;
use storyloom::media::{GeneratedImage, MediaStore};
use storyloom::story::{StoryOutcome, StoryRequest, StorySections, StoryService};

use super::StoryArgs;

/// Generate a story and print it, with optional narration and illustration.
pub(crate) async fn cmd_story(config: Config, args: StoryArgs) -> Result<()> {
    let request = StoryRequest::parse(
        &args.native,
        &args.target,
        &args.level,
        &args.topic,
        &args.length,
        args.grammar.as_deref(),
    )
    .context("Invalid story selection")?
    .with_characters(&args.characters);

    let mut service = StoryService::from_config(&config, !args.no_cache)
        .context("Failed to set up story generation")?;

    let outcome = match service.generate(&request).await {
        Ok(outcome) => outcome,
        Err(err) if err.is_transient() => {
            bail!("Story generation failed: {err}. This is usually temporary; please try again.")
        }
        Err(err) => return Err(err).context("Story generation failed"),
    };

    print_story(&request, &outcome);

    let media = MediaStore::new(config.media.resolved_dir());

    if args.narrate {
        match service.narrate(&outcome).await {
            Ok(narration) => {
                let path = media
                    .save(&narration.audio, &narration.mime_type)
                    .await
                    .context("Failed to save narration audio")?;
                println!("Narration: {}", path.display());
            }
            Err(err) => eprintln!("Narration failed: {err}"),
        }
    }

    if args.illustrate {
        match service.illustrate(&request).await {
            Ok(GeneratedImage::Url(url)) => println!("Illustration: {url}"),
            Ok(GeneratedImage::Bytes(bytes)) => {
                let path = media
                    .save(&bytes, "image/png")
                    .await
                    .context("Failed to save illustration")?;
                println!("Illustration: {}", path.display());
            }
            Err(err) => eprintln!("Illustration failed: {err}"),
        }
    }

    Ok(())
}

fn print_story(request: &StoryRequest, outcome: &StoryOutcome) {
    println!(
        "Level {} | {} | {} | grammar: {}",
        request.level, request.topic, request.length, request.grammar
    );
    println!("Level vocabulary: {}", request.level.vocabulary().join(", "));
    if !request.characters.is_empty() {
        println!("Characters: {}", request.characters.join(", "));
    }
    println!();

    print_sections(&format!("Story ({})", request.target), &outcome.original);
    print_sections(&format!("Translation ({})", request.native), &outcome.translated);

    if !outcome.response.vocabulary.is_empty() {
        println!("Vocabulary:");
        for entry in &outcome.response.vocabulary {
            println!("  {} = {}", entry.word, entry.translation);
        }
        println!();
    }

    let source = if outcome.cache_hit { "cache" } else { "model" };
    println!("Source: {} (key {})", source, outcome.key.short());
    if let Some(warning) = &outcome.cache_warning {
        eprintln!("Warning: response not saved to cache: {warning}");
    }
}

fn print_sections(title: &str, sections: &StorySections) {
    println!("{title}");
    println!("  Introduction: {}", sections.introduction);
    println!("  Development: {}", sections.development);
    println!("  Conclusion: {}", sections.conclusion);
    println!();
}
