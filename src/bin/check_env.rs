use anyhow::{Context, Result};
use clap::Parser;
use gemini_nlp::config::{API_KEY_VAR, MODEL_VAR};
use gemini_nlp::core::{GenerationHints, GenerativeBackend};
use gemini_nlp::utils::logger;
use gemini_nlp::{GeminiClient, ServiceConfig};

/// 檢查 Gemini 相關環境變數，可選擇實際呼叫一次 API
#[derive(Debug, Parser)]
#[command(name = "check_env")]
struct Args {
    /// Send one small generation request to verify the key works
    #[arg(long)]
    probe: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    println!("🚀 Checking Gemini environment");

    match dotenvy::dotenv() {
        Ok(path) => println!("📄 Loaded {}", path.display()),
        Err(_) => println!("📄 No .env file found, using process environment"),
    }

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("❌ {}", e.user_friendly_message());
            println!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    println!("✅ {} = {}", API_KEY_VAR, config.masked_api_key());
    match std::env::var(MODEL_VAR) {
        Ok(model) => println!("✅ {} = {}", MODEL_VAR, model),
        Err(_) => println!("ℹ️  {} not set, using {}", MODEL_VAR, config.model),
    }

    if !args.probe {
        return Ok(());
    }

    println!("🔍 Probing {} ...", config.model);
    let client = GeminiClient::with_base_url(&config.api_key, &config.base_url);
    let hints = GenerationHints {
        max_tokens: 16,
        ..GenerationHints::default()
    };
    let completion = client
        .generate_content(&config.model, "Reply with the single word: ok", &hints)
        .await
        .context("probe request failed")?;

    println!("✅ API responded: {}", completion.text.trim());
    if let Some(usage) = completion.usage {
        println!("📊 Tokens used: {}", usage.total());
    }
    Ok(())
}
