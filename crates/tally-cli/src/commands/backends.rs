//! Vision backend status command

use anyhow::Result;
use tally_core::AnalyzerClient;

/// Show which vision backend is configured and whether it responds
pub async fn cmd_backends() -> Result<()> {
    match AnalyzerClient::from_env() {
        Some(client) => {
            println!("Configured backend: {}", client.name());
            print!("Checking reachability... ");
            if client.health_check().await {
                println!("ok");
            } else {
                println!("unreachable");
            }
        }
        None => {
            println!("No vision backend configured.");
            println!();
            println!("Set one of:");
            println!("  OPENAI_COMPATIBLE_HOST    e.g. https://api.openai.com or a local llama.cpp host");
            println!("  OPENAI_COMPATIBLE_MODEL   defaults to gpt-4o-mini");
            println!("  OPENAI_COMPATIBLE_API_KEY optional");
            println!();
            println!("  GEMINI_API_KEY            Google AI Studio key");
            println!("  GEMINI_MODEL              defaults to gemini-2.0-flash-lite");
            println!();
            println!("  TALLY_AI_PROVIDER         force a provider: openai_compatible, gemini, or mock");
        }
    }
    Ok(())
}
