//! `scholarag serve` — Start the HTTP chat gateway.

use super::load_config;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("📚 ScholaRAG Gateway");
    println!("   Listening: {}", config.bind_addr());
    println!("   Model:     {}", config.model);
    println!("   Retrieval: {:?}", config.retrieval.backend);
    if !config.has_api_key() {
        println!("   ⚠️  No API key set; chat requests will return a configuration error");
    }

    scholarag_gateway::start(config).await?;

    Ok(())
}
