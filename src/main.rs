use clap::Parser;
use gemini_nlp::core::{Embedder, GenerationHints, ModerationService, SchematicGenerator};
use gemini_nlp::utils::error::ErrorSeverity;
use gemini_nlp::utils::logger;
use gemini_nlp::utils::validation::{validate_positive_number, validate_range};
use gemini_nlp::{
    agent, CliConfig, Command, FieldKind, FieldSpec, GeminiNlpService, NlpError, Schema,
    Schematic, ServiceConfig, ToolRegistry,
};
use serde::{Deserialize, Serialize};

/// 命令列 generate 子命令使用的回應格式
#[derive(Debug, Serialize, Deserialize)]
struct Reply {
    message: String,
    confidence: f64,
}

impl Schematic for Reply {
    fn schema() -> Schema {
        Schema::new("Reply")
            .field(FieldSpec::required("message", FieldKind::String))
            .field(FieldSpec::required("confidence", FieldKind::Number))
    }
}

fn load_config(cli: &CliConfig) -> gemini_nlp::Result<ServiceConfig> {
    match &cli.config {
        Some(path) => {
            tracing::info!("📄 Loading configuration overrides from {}", path);
            ServiceConfig::from_env_and_file(path)
        }
        None => ServiceConfig::from_env(),
    }
}

/// 不需要 API 金鑰的子命令：工具與藍圖
async fn run_offline(command: Command) -> gemini_nlp::Result<()> {
    let registry = ToolRegistry::with_defaults();

    match command {
        Command::Tools => {
            for definition in registry.definitions() {
                println!(
                    "{:<34} {}",
                    definition["name"].as_str().unwrap_or_default(),
                    definition["description"].as_str().unwrap_or_default()
                );
            }
        }
        Command::Tool { name, args } => {
            let args: serde_json::Value = serde_json::from_str(&args)?;
            let result = registry.invoke(&name, args).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Blueprint => {
            let blueprint = agent::project_manager();
            blueprint.validate_tools(&registry)?;
            println!("{}", blueprint.to_json()?);
        }
        Command::Generate { .. } | Command::Embed { .. } | Command::Moderate { .. } => {}
    }
    Ok(())
}

fn generation_hints(
    temperature: Option<f32>,
    max_tokens: Option<u32>,
) -> gemini_nlp::Result<GenerationHints> {
    let defaults = GenerationHints::default();
    let temperature = temperature.unwrap_or(defaults.temperature);
    let max_tokens = max_tokens.unwrap_or(defaults.max_tokens);
    validate_range("temperature", temperature, 0.0, 2.0)?;
    validate_positive_number("max_tokens", u64::from(max_tokens), 1)?;
    Ok(GenerationHints {
        temperature,
        max_tokens,
        ..defaults
    })
}

async fn run(cli: CliConfig) -> gemini_nlp::Result<()> {
    if !cli.command.needs_api_key() {
        return run_offline(cli.command).await;
    }

    let service = GeminiNlpService::from_config(load_config(&cli)?)?;

    match cli.command {
        Command::Generate {
            prompt,
            temperature,
            max_tokens,
        } => {
            let hints = generation_hints(temperature, max_tokens)?;
            let result = service
                .schematic_generator::<Reply>()
                .generate(&prompt, &hints)
                .await?;
            if result.is_fallback() {
                tracing::warn!("⚠️ Served a fallback reply ({})", result.info.model);
            }
            tracing::info!(
                "✅ Generated with {} in {:?} ({} tokens)",
                result.info.model,
                result.info.duration,
                result.info.usage.total()
            );
            println!("{}", serde_json::to_string_pretty(&result.content)?);
        }
        Command::Embed { texts } => {
            let embedder = service.embedder();
            let result = embedder.embed(&texts).await?;
            for (text, vector) in texts.iter().zip(&result.vectors) {
                let preview: Vec<String> =
                    vector.iter().take(4).map(|v| format!("{:.4}", v)).collect();
                println!("{} [{}, ...] ({} dims)", text, preview.join(", "), vector.len());
            }
        }
        Command::Moderate { text } => {
            let check = service.moderation_service().check(&text).await;
            println!("{}", serde_json::to_string_pretty(&check)?);
        }
        Command::Tools | Command::Tool { .. } | Command::Blueprint => {}
    }

    let (per_minute, per_day) = service.rate_limiter().usage().await;
    tracing::debug!("Rate limiter usage: {} in window, {} today", per_minute, per_day);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting gemini-nlp");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(cli).await {
        report_and_exit(e);
    }
}

fn report_and_exit(e: NlpError) {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}
