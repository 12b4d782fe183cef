use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use talevoice::config::Config;
use talevoice::engine::SimulatedEngine;
use talevoice::narrator::Narrator;
use talevoice::player::{PlaybackState, Player};
use talevoice::story::Story;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load()?;
    config.ensure_directories()?;

    let mut entries: Vec<PathBuf> = Vec::new();
    let mut dir = tokio::fs::read_dir(&config.input_folder).await?;
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "json") {
            entries.push(path);
        }
    }
    entries.sort();

    if entries.is_empty() {
        println!(
            "No stories found in '{}'. Drop story .json files there and re-run.",
            config.input_folder
        );
        return Ok(());
    }

    for path in entries {
        let story = Story::load(&path)?;
        println!(
            "Narrating '{}' by {} [{}], {} paragraph(s)",
            story.title,
            story.author,
            story.genre,
            story.paragraphs().len()
        );

        let engine = Arc::new(SimulatedEngine::new(40.0));
        let narrator = Narrator::new(engine, &config.language)
            .voice_load_timeout(config.playback.voice_load_timeout());
        let mut player = Player::spawn(
            narrator,
            &story.content,
            &story.genre,
            config.playback.playback_config(),
        );

        player
            .wait_until(|s| {
                s.state == PlaybackState::Ready || s.state == PlaybackState::Complete
            })
            .await;

        println!("Character voices:");
        for cv in player.snapshot().voices.iter() {
            println!("  {:<20} {}", cv.character_name, cv.voice.name);
        }

        player.play();
        player.wait_for(PlaybackState::Complete).await;
        player.shutdown().await;
        println!("Finished '{}'", story.title);
    }

    Ok(())
}
