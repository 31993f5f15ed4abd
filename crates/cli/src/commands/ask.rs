//! `scholarag ask` — Ask a single question from the terminal.

use std::io::Write;

use scholarag_core::message::ChatMessage;

use super::load_config;

pub async fn run(message: String, stream: bool, use_rag: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    // Check for the API key before building anything
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set the environment variable:");
        eprintln!("    export ANTHROPIC_API_KEY='sk-ant-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", scholarag_config::AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let pipeline = scholarag_gateway::build_pipeline(&config)?.with_rag(use_rag);
    let messages = Some(vec![ChatMessage::user(message)]);

    if stream {
        let mut stdout = std::io::stdout();
        let result = pipeline
            .stream_reply(messages, |fragment| {
                let _ = write!(stdout, "{fragment}");
                let _ = stdout.flush();
            })
            .await;
        println!();

        if let Err(failure) = result {
            if failure.is_partial() {
                eprintln!("  ⚠️  Answer interrupted after {} fragment(s)", failure.fragments_delivered);
            }
            return Err(describe(&failure.error).into());
        }
    } else {
        let reply = pipeline
            .respond(messages)
            .await
            .map_err(|e| describe(&e))?;
        println!("{}", reply.message);
    }

    Ok(())
}

fn describe(error: &scholarag_core::ChatError) -> String {
    match error.details() {
        Some(details) => format!("{}: {details}", error.public_message()),
        None => error.public_message().to_string(),
    }
}
