mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use reelbox_media::Mp4;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise derive from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelbox=trace,reelbox_media=trace".to_string()
        } else {
            "reelbox=info,reelbox_media=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Info { file } => info(&file),
        Commands::Dump { file } => dump(&file),
        Commands::Remux { input, output } => remux(&input, &output),
        Commands::Version => {
            println!("reelbox {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn info(path: &Path) -> Result<()> {
    let mp4 = Mp4::open(path)?;

    println!("duration: {:.3}s", mp4.duration());
    if let Some((width, height)) = mp4.dimensions() {
        println!("video:    {width}x{height}");
    }
    for track in mp4.tracks() {
        println!(
            "track:    {} | {} samples | {} key frames | timescale {}",
            track.codec,
            track.index.len(),
            track.key_frames.len(),
            track.time_scale,
        );
    }
    if let Some(config) = mp4.video_config() {
        println!("video config: {} bytes", config.len());
    }
    if let Some(config) = mp4.audio_config() {
        println!("audio config: {} bytes", config.len());
    }

    mp4.close()?;
    Ok(())
}

fn dump(path: &Path) -> Result<()> {
    let mp4 = Mp4::open(path)?;
    print!("{}", mp4.dump());
    mp4.close()?;
    Ok(())
}

fn remux(input: &Path, output: &Path) -> Result<()> {
    let mp4 = Mp4::open(input)?;

    let mut sink = BufWriter::new(File::create(output)?);
    mp4.write_to(&mut sink)?;
    sink.flush()?;

    tracing::info!(input = %input.display(), output = %output.display(), "remux complete");
    mp4.close()?;
    Ok(())
}
