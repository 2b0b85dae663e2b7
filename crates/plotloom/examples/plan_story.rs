//! Minimal planning example — outline in, storyline out.
//!
//! Reads an outline file, plans the requested chapter count in batches, and
//! prints the completion report plus each accepted chapter brief.
//!
//! # Usage
//!
//! ```bash
//! OPENROUTER_KEY=sk-... cargo run --example plan_story -- outline.txt 25
//! ```

use plotloom::prelude::*;

#[tokio::main]
async fn main() -> Result<(), String> {
    let mut args = std::env::args().skip(1);
    let outline_path = args.next().ok_or("usage: plan_story <outline-file> <chapters>")?;
    let total: u32 = args
        .next()
        .and_then(|n| n.parse().ok())
        .ok_or("usage: plan_story <outline-file> <chapters>")?;

    let outline = std::fs::read_to_string(&outline_path)
        .map_err(|e| format!("failed to read {outline_path}: {e}"))?;

    // 1. Create the generation client.
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "Set OPENROUTER_KEY env var to your OpenRouter API key")?;
    let client = GenerationClient::new(api_key)?;

    // 2. Configure the session.
    let config = SessionConfig::new(outline, total);

    // 3. Run the planned pass (plus its single repair pass).
    let mut pipeline = StorylinePipeline::new(&client, config)?
        .with_retry_policy(RetryPolicy::with_attempts(3));
    let report = pipeline.plan_storyline().await;

    // 4. Print results.
    println!("{}\n", report.summary());
    for (_, plan) in pipeline.storyline().iter() {
        let flag = if plan.placeholder { " [placeholder]" } else { "" };
        println!("{}{flag}", plan.brief());
    }

    // 5. Persist the storyline for a later session.
    let snapshot = pipeline.snapshot().to_json()?;
    std::fs::write("storyline.json", snapshot).map_err(|e| format!("failed to save: {e}"))?;
    println!("\nsaved storyline.json");

    Ok(())
}
