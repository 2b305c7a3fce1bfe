use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "gemini-nlp")]
#[command(about = "Gemini-backed NLP service and mock developer tools for agent hosts")]
pub struct CliConfig {
    /// Optional TOML file overriding model, rate limit, and retry settings
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Generate a structured reply ({"message", "confidence"}) for a prompt
    Generate {
        prompt: String,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// Embed one or more texts
    Embed {
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Run a moderation check
    Moderate { text: String },
    /// List the registered tools
    Tools,
    /// Invoke a tool with JSON arguments
    Tool {
        name: String,

        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Print the agent blueprint as JSON
    Blueprint,
}

impl Command {
    /// 只有會呼叫遠端 API 的子命令需要 API 金鑰
    pub fn needs_api_key(&self) -> bool {
        matches!(
            self,
            Command::Generate { .. } | Command::Embed { .. } | Command::Moderate { .. }
        )
    }
}
