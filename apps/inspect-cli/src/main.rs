//! Inspection Command CLI
//!
//! Parses robot inspection commands and prints the fused interpretation:
//! Text → Intent + Entities (+ optional LLM) → Structured Command

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

use command_parser::{
    init as init_command_parser, CommandProcessor, CommandResult, LlmAnalyzer, ProcessingContext,
    ReplayAnalyzer,
};

const SAMPLE_COMMANDS: &[&str] = &[
    "巡检A区2号房主柜温度",
    "开启B区空调",
    "查询UPS1状态",
    "前往C区3号房",
    "关闭主柜电源",
    "检查配电室湿度",
    "设置空调温度为25度",
    "确认高温报警",
];

#[derive(Parser)]
#[command(name = "inspect")]
#[command(about = "Inspection robot command parser")]
struct Args {
    /// Command text to parse
    text: Option<String>,

    /// Run the built-in sample commands
    #[arg(long)]
    samples: bool,

    /// Interactive mode (read commands from stdin)
    #[arg(long)]
    interactive: bool,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,

    /// Load the intent/entity registry from a YAML file
    #[arg(long, value_name = "YAML")]
    registry: Option<PathBuf>,

    /// Enable the LLM collaborator (OPENAI_API_KEY, OPENAI_BASE_URL, MODEL_NAME)
    #[arg(long, conflicts_with = "replay")]
    llm: bool,

    /// Use a recorded collaborator reply instead of a live LLM
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,
}

fn main() -> Result<()> {
    setup_tracing();

    let args = Args::parse();
    let processor = build_processor(&args)?;

    if args.samples {
        run_samples(&processor, args.json)?;
    } else if let (Some(text), false) = (args.text.as_deref(), args.interactive) {
        let result = processor.process(text, None);
        print_result(&result, args.json)?;
    } else {
        run_interactive(&processor, args.json)?;
    }
    Ok(())
}

fn build_processor(args: &Args) -> Result<CommandProcessor> {
    let registry = init_command_parser(args.registry.as_deref()).with_context(|| {
        format!(
            "failed to load registry {}",
            args.registry
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })?;
    let processor = CommandProcessor::new(registry.clone());

    if let Some(path) = &args.replay {
        let replay = ReplayAnalyzer::from_file(path)
            .with_context(|| format!("failed to read replay file {}", path.display()))?;
        info!("Using recorded collaborator reply from {}", path.display());
        return Ok(processor.with_analyzer(Box::new(replay)));
    }

    if args.llm {
        match LlmAnalyzer::from_env(&registry) {
            Ok(analyzer) => return Ok(processor.with_analyzer(Box::new(analyzer))),
            Err(e) => warn!("LLM collaborator disabled: {}", e),
        }
    }
    Ok(processor)
}

fn run_samples(processor: &CommandProcessor, json: bool) -> Result<()> {
    println!("Running {} sample commands", SAMPLE_COMMANDS.len());
    println!();
    for (i, command) in SAMPLE_COMMANDS.iter().enumerate() {
        println!("{}/{}: {}", i + 1, SAMPLE_COMMANDS.len(), command);
        let result = processor.process(command, None);
        print_result(&result, json)?;
        println!();
    }
    Ok(())
}

fn run_interactive(processor: &CommandProcessor, json: bool) -> Result<()> {
    let mut context = ProcessingContext::with_session(uuid::Uuid::new_v4().to_string());
    println!("Inspection command parser (session {})", context.session_id.as_deref().unwrap_or("-"));
    println!("Type a command and press Enter ('quit', 'exit' or '退出' to leave)");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        stdout.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let command = line?;
        let command = command.trim();
        if command.eq_ignore_ascii_case("quit")
            || command.eq_ignore_ascii_case("exit")
            || command == "退出"
        {
            break;
        }
        if command.is_empty() {
            continue;
        }

        let result = processor.process(command, Some(&context));
        print_result(&result, json)?;
        println!();
        context.record(result);
    }

    info!(
        "Session ended after {} commands",
        context.previous_commands.len()
    );
    Ok(())
}

fn print_result(result: &CommandResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!(
        "  Intent:     {} [{}] (confidence: {:.2})",
        result.intent.name, result.intent.intent_type, result.intent.confidence
    );
    if result.entities.is_empty() {
        println!("  Entities:   none");
    } else {
        println!("  Entities:");
        for entity in &result.entities {
            println!(
                "    - {}: {} [{}..{}] (confidence: {:.2})",
                entity.entity_type, entity.value, entity.start, entity.end, entity.confidence
            );
        }
    }
    println!("  Confidence: {:.2}", result.overall_confidence);
    if result.is_valid {
        println!("  Valid:      yes");
    } else {
        println!("  Valid:      no ({})", result.validation_errors.join("; "));
    }
    if let Some(command) = &result.structured_command {
        println!("  Command:    {}", serde_json::to_string(command)?);
    }
    Ok(())
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}
