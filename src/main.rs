use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

mod chunker;
mod config;
mod extract;
mod io;
mod llm;
mod planner;
mod render;

use crate::render as render_mod;
use anyhow::Context as _;
use chunker::{Chunk, ChunkAllocator, Page};
use config::EffectiveSettings;
use llm::ProviderRegistry;
use planner::QuestionBudget;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "dq", version, about = "Document chunking and question generation CLI", long_about = None)]
struct Cli {
    /// Active profile name
    #[arg(short = 'p', long = "profile", global = true)]
    profile: Option<String>,

    /// Default model override
    #[arg(short = 'm', long = "model", global = true)]
    model: Option<String>,

    /// Output JSON instead of human-readable text
    #[arg(long = "json", global = true)]
    json: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Timeout (seconds) for network requests
    #[arg(long = "timeout", global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// First-time profile setup
    Init(InitArgs),

    /// Show the planned question count for a document
    Plan(PlanArgs),

    /// Partition a document into generation chunks
    Chunks(ChunksArgs),

    /// Generate one study question per chunk of a document
    Questions(QuestionsArgs),

    /// Batch Q&A generation for every document in a folder
    Qna(QnaArgs),

    /// Summarize CSV sheets with an analyst prompt
    Sheets(SheetsArgs),
}

#[derive(Args, Debug, Clone)]
struct InitArgs {
    /// Non-interactive: provider name (ollama, openai, mock)
    #[arg(long)]
    provider: Option<String>,
    /// Non-interactive: API key value (openai)
    #[arg(long = "api-key")]
    api_key: Option<String>,
    /// Non-interactive: default model
    #[arg(long)]
    default_model: Option<String>,
    /// Profile name to create or update (default: "default")
    #[arg(long, default_value = "default")]
    profile: String,
    /// Validate provider reachability now
    #[arg(long)]
    validate: bool,
}

#[derive(Args, Debug, Clone)]
struct PlanArgs {
    /// Page count to plan for
    #[arg(long)]
    pages: Option<usize>,
    /// Document to count pages from instead of --pages
    #[arg(long)]
    file: Option<PathBuf>,
    /// Cap for very large documents
    #[arg(long = "question-cap")]
    question_cap: Option<usize>,
}

#[derive(Args, Debug, Clone)]
struct ChunksArgs {
    /// Document to partition (.pdf, .txt, .md, .csv)
    #[arg(long)]
    file: PathBuf,
    /// Exact chunk count; defaults to the planned question count
    #[arg(long)]
    target: Option<usize>,
    /// Minimum chunk length in characters
    #[arg(long = "min-chunk-len")]
    min_chunk_len: Option<usize>,
    /// Directory of extracted page images to associate
    #[arg(long = "images-dir")]
    images_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct QuestionsArgs {
    /// Document to generate questions from
    #[arg(long)]
    file: PathBuf,
    /// Exact question count; defaults to the planned count
    #[arg(long)]
    target: Option<usize>,
    /// Minimum chunk length in characters
    #[arg(long = "min-chunk-len")]
    min_chunk_len: Option<usize>,
    /// Directory of extracted page images to associate
    #[arg(long = "images-dir")]
    images_dir: Option<PathBuf>,
    /// Stream output tokens as they arrive
    #[arg(long)]
    stream: bool,
    /// Provider to use (ollama, openai, mock)
    #[arg(long)]
    provider: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct QnaArgs {
    /// Folder of documents to process (.pdf, .txt, .md)
    #[arg(long)]
    dir: PathBuf,
    /// Regenerate even when the source content is unchanged
    #[arg(long)]
    force: bool,
    /// Output directory for QnA files
    #[arg(long = "output-dir")]
    output_dir: Option<String>,
    /// Provider to use (ollama, openai, mock)
    #[arg(long)]
    provider: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct SheetsArgs {
    /// Single CSV sheet to summarize
    #[arg(long)]
    file: Option<PathBuf>,
    /// Folder of CSV sheets to summarize
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Write one narrative paragraph per row instead of a summary
    #[arg(long = "per-row")]
    per_row: bool,
    /// Output directory for summary files
    #[arg(long = "output-dir")]
    output_dir: Option<String>,
    /// Provider to use (ollama, openai, mock)
    #[arg(long)]
    provider: Option<String>,
}

#[derive(Debug, Clone)]
struct GlobalOpts {
    profile: Option<String>,
    model: Option<String>,
    json: bool,
    verbose: u8,
    timeout_secs: Option<u64>,
}

fn json_error(_globals: &GlobalOpts, _code: &str, message: &str, _hint: Option<&str>) -> anyhow::Error {
    // Do not print here; the top-level handler prints exactly once in --json mode
    anyhow::anyhow!(message.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Cli {
        profile,
        model,
        json,
        verbose,
        timeout_secs,
        command,
    } = cli;

    let globals = GlobalOpts {
        profile,
        model,
        json,
        verbose,
        timeout_secs,
    };

    let result = match command {
        Commands::Init(args) => cmd_init(&globals, args).await,
        Commands::Plan(args) => cmd_plan(&globals, args).await,
        Commands::Chunks(args) => cmd_chunks(&globals, args).await,
        Commands::Questions(args) => cmd_questions(&globals, args).await,
        Commands::Qna(args) => cmd_qna(&globals, args).await,
        Commands::Sheets(args) => cmd_sheets(&globals, args).await,
    };

    if let Err(e) = result {
        if globals.json {
            let (code, hint) = classify_error(&e);
            let msg = e.to_string();
            render_mod::print_json_error(&code, &msg, hint.as_deref());
        } else {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn classify_error(e: &anyhow::Error) -> (String, Option<String>) {
    let msg = e.to_string().to_lowercase();
    if msg.contains("file not found") {
        return ("file_not_found".to_string(), Some("check the file path".to_string()));
    }
    if msg.contains("directory not found") {
        return ("dir_not_found".to_string(), Some("check the directory path".to_string()));
    }
    if msg.contains("no documents found") || msg.contains("no sheets found") {
        return ("missing_input".to_string(), None);
    }
    if msg.contains("unsupported document extension") {
        return ("unsupported_extension".to_string(), Some("supported: pdf, txt, md, csv".to_string()));
    }
    if msg.contains("exactly one of") || msg.contains("invalid") {
        return ("invalid_args".to_string(), None);
    }
    if msg.contains("openai_api_key") || msg.contains("missing api key") {
        return ("missing_api_key".to_string(), Some("set OPENAI_API_KEY in env or .env".to_string()));
    }
    if msg.contains("timed out") || msg.contains("timeout") {
        return ("timeout".to_string(), Some("try increasing --timeout or check network".to_string()));
    }
    if msg.contains("unsupported provider") || msg.contains("unknown provider") {
        return ("provider_unsupported".to_string(), None);
    }
    if msg.contains("network") || msg.contains("dns") || msg.contains("connection refused") || msg.contains("cannot reach") {
        return ("network_error".to_string(), None);
    }
    ("unknown".to_string(), None)
}

fn resolve_settings(globals: &GlobalOpts, provider: Option<&str>) -> anyhow::Result<EffectiveSettings> {
    config::resolve_effective_settings(
        globals.profile.as_deref(),
        provider,
        globals.model.as_deref(),
        None,
        None,
        None,
    )
}

fn request_timeout(globals: &GlobalOpts, eff: &EffectiveSettings) -> Duration {
    let secs = globals
        .timeout_secs
        .or(eff.timeout_secs)
        .unwrap_or(llm::DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

async fn cmd_init(globals: &GlobalOpts, mut args: InitArgs) -> anyhow::Result<()> {
    use config::{default_config_path, load_config_if_exists, write_config, Profile};
    use std::io::{IsTerminal as _, Write};

    let path = default_config_path()?;
    let mut cfg = load_config_if_exists(&path)?.unwrap_or_default();

    let stdin_is_tty = std::io::stdin().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let interactive = stdin_is_tty && stdout_is_tty;

    if args.provider.is_none() && interactive {
        print!("Provider [ollama|openai|mock] (default: ollama): ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        let p = line.trim();
        args.provider = Some(if p.is_empty() { "ollama".to_string() } else { p.to_string() });
    }
    let provider = args.provider.clone().unwrap_or_else(|| config::DEFAULT_PROVIDER.to_string());

    // Key only matters for openai; ollama and mock run without one.
    let needs_key = provider.to_lowercase() == "openai";
    if needs_key && args.api_key.is_none() {
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            if !val.trim().is_empty() {
                args.api_key = Some(val);
            }
        }
        if args.api_key.is_none() && interactive {
            print!("API key for {} (leave blank to skip): ", provider);
            std::io::stdout().flush().ok();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            let v = line.trim();
            if !v.is_empty() {
                args.api_key = Some(v.to_string());
            }
        }
    }

    if args.default_model.is_none() && interactive {
        let suggestion = match provider.to_lowercase().as_str() {
            "openai" => "gpt-4o-mini",
            _ => config::DEFAULT_MODEL,
        };
        print!("Default model (default: {}): ", suggestion);
        std::io::stdout().flush().ok();
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        let m = line.trim();
        args.default_model = Some(if m.is_empty() { suggestion.to_string() } else { m.to_string() });
    }

    let mut profile_name = args.profile.clone();
    if interactive && cfg.profiles.contains_key(&profile_name) {
        println!("Profile '{}' already exists.", profile_name);
        print!("Press Enter to overwrite, or type a new profile name: ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        let s = line.trim();
        if !s.is_empty() {
            profile_name = s.to_string();
        }
    }

    let mut do_validate = args.validate;
    if interactive && !do_validate {
        print!("Validate provider now? [y/N]: ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        let a = line.trim().to_lowercase();
        do_validate = a == "y" || a == "yes";
    }
    if do_validate {
        llm::validate_provider_credentials(
            &provider,
            args.api_key.as_deref(),
            None,
            globals.timeout_secs,
        )
        .await?;
    }

    let prof = cfg
        .profiles
        .entry(profile_name.clone())
        .or_insert_with(Profile::default);
    if let Some(p) = args.provider {
        prof.provider = Some(p);
    }
    if let Some(api_key) = args.api_key {
        prof.api_key = Some(api_key);
    }
    if let Some(model) = args.default_model {
        prof.model = Some(model);
    }
    if cfg.default_profile.is_none() {
        cfg.default_profile = Some(profile_name);
    }

    write_config(&path, &cfg)?;
    println!("config written: {}", path.display());
    Ok(())
}

async fn cmd_plan(globals: &GlobalOpts, args: PlanArgs) -> anyhow::Result<()> {
    let eff = config::resolve_effective_settings(
        globals.profile.as_deref(),
        None,
        globals.model.as_deref(),
        None,
        args.question_cap,
        None,
    )?;
    let pages = match (args.pages, args.file) {
        (Some(n), None) => n,
        (None, Some(file)) => {
            if !file.exists() {
                return Err(json_error(globals, "file_not_found", &format!("file not found: {}", file.display()), None));
            }
            extract::extract_pages(&file).await?.len()
        }
        _ => {
            return Err(json_error(globals, "invalid_args", "provide exactly one of --pages or --file", None));
        }
    };

    let planned = QuestionBudget::new(eff.question_cap).plan(pages);
    if globals.json {
        #[derive(serde::Serialize)]
        struct Out {
            pages: usize,
            planned: usize,
        }
        render_mod::print_json(&Out { pages, planned });
    } else {
        println!("pages: {}", pages);
        println!("planned questions: {}", planned);
    }
    Ok(())
}

async fn load_chunks(
    globals: &GlobalOpts,
    file: &Path,
    target_override: Option<usize>,
    min_chunk_len: Option<usize>,
    images_dir: Option<&Path>,
    question_cap: usize,
    default_min_chunk_len: usize,
) -> anyhow::Result<(Vec<Page>, usize, Vec<Chunk>)> {
    if !file.exists() {
        return Err(json_error(globals, "file_not_found", &format!("file not found: {}", file.display()), None));
    }
    let mut pages = extract::extract_pages(file).await?;
    if let Some(dir) = images_dir {
        if !dir.is_dir() {
            return Err(json_error(globals, "dir_not_found", &format!("directory not found: {}", dir.display()), None));
        }
        extract::attach_sidecar_images(&mut pages, dir)?;
    }
    if globals.verbose > 0 {
        eprintln!("extracted {} pages from {}", pages.len(), file.display());
    }

    let budget = QuestionBudget::new(question_cap);
    let target = target_override.unwrap_or_else(|| budget.plan(pages.len()));
    let allocator = ChunkAllocator::new(min_chunk_len.unwrap_or(default_min_chunk_len));
    let chunks = allocator.allocate(&pages, target);
    Ok((pages, target, chunks))
}

async fn cmd_chunks(globals: &GlobalOpts, args: ChunksArgs) -> anyhow::Result<()> {
    let eff = resolve_settings(globals, None)?;
    let (pages, target, chunks) = load_chunks(
        globals,
        &args.file,
        args.target,
        args.min_chunk_len,
        args.images_dir.as_deref(),
        eff.question_cap,
        eff.min_chunk_len,
    )
    .await?;

    if globals.json {
        #[derive(serde::Serialize)]
        struct Out<'a> {
            pages: usize,
            target: usize,
            chunks: &'a [Chunk],
        }
        render_mod::print_json(&Out { pages: pages.len(), target, chunks: &chunks });
    } else {
        println!("pages: {}  target: {}", pages.len(), target);
        for (i, chunk) in chunks.iter().enumerate() {
            println!();
            println!("--- chunk {} ({} chars, {} images)", i + 1, chunk.text.len(), chunk.artifacts.len());
            println!("{}", chunk.text);
        }
    }
    Ok(())
}

fn question_prompt(chunk: &Chunk) -> String {
    let images = if chunk.artifacts.is_empty() {
        "No images.".to_string()
    } else {
        format!(
            "Image paths: {}",
            chunk.artifacts.iter().map(|a| a.0.as_str()).collect::<Vec<_>>().join(", ")
        )
    };
    format!(
        "You are a tutor preparing exam material. Read the passage below and write \
         one clear question that tests understanding of its content.\n\nPassage:\n{}\n\n{}",
        chunk.text, images
    )
}

fn qna_prompt(chunk: &Chunk) -> String {
    format!(
        "You are an educator writing study material. From the passage below, produce \
         one higher-order question that requires synthesis rather than recall, and a \
         thorough model answer. Format strictly as:\nQ: <question>\nA: <answer>\n\nPassage:\n{}",
        chunk.text
    )
}

fn sheet_summary_prompt(table: &str, clues: &[String]) -> String {
    let context = if clues.is_empty() {
        "No particular structure was detected.".to_string()
    } else {
        format!("The sheet appears to contain {}.", clues.join(", "))
    };
    format!(
        "You are a data analyst. Study the table below and write a concise summary of \
         what it contains, notable values, and any obvious trends. {}\n\n{}",
        context, table
    )
}

fn row_narrative_prompt(row: &[(String, String)]) -> String {
    let fields = row
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You are a data analyst. Write one short narrative paragraph describing this \
         record in plain language.\n\nRecord: {}",
        fields
    )
}

fn mock_reply(prompt_kind: &str, seed: &str) -> String {
    let head: String = seed.chars().take(40).collect();
    match prompt_kind {
        "question" => format!("[stub question] {}", head),
        "qna" => format!("Q: What is the main point of \"{}\"?\nA: [stub answer] {}", head, head),
        "summary" => format!("[stub summary] {}", head),
        "narrative" => format!("[stub narrative] {}", head),
        _ => format!("[stub] {}", head),
    }
}

async fn generate(
    globals: &GlobalOpts,
    eff: &EffectiveSettings,
    prompt: String,
    prompt_kind: &str,
    seed: &str,
    stream: bool,
) -> anyhow::Result<String> {
    let provider = eff.provider.to_lowercase();
    if provider == "mock" {
        return Ok(mock_reply(prompt_kind, seed));
    }

    let registry = ProviderRegistry::new_with_timeout(request_timeout(globals, eff))?;
    let adapter = registry
        .get(&provider)
        .with_context(|| format!("unsupported provider: {}", provider))?;
    // JSON mode always emits a single object, so force non-streaming there.
    let stream = stream && !globals.json;
    let req = llm::GenerationRequest {
        model: eff.model.clone(),
        prompt,
        stream,
        api_base: eff.api_base.clone(),
    };

    if stream {
        use futures_util::StreamExt;
        use std::io::Write as _;
        let mut s = adapter.send_stream(req).await?;
        let mut full = String::new();
        while let Some(token) = s.next().await {
            let token = token?;
            print!("{}", token);
            std::io::stdout().flush().ok();
            full.push_str(&token);
        }
        println!();
        Ok(full)
    } else {
        let res = adapter.send(req).await?;
        Ok(res.content)
    }
}

async fn cmd_questions(globals: &GlobalOpts, args: QuestionsArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let eff = resolve_settings(globals, args.provider.as_deref())?;
    let (pages, target, chunks) = load_chunks(
        globals,
        &args.file,
        args.target,
        args.min_chunk_len,
        args.images_dir.as_deref(),
        eff.question_cap,
        eff.min_chunk_len,
    )
    .await?;
    let min_len = args.min_chunk_len.unwrap_or(eff.min_chunk_len);

    let mut questions: Vec<String> = Vec::new();
    let mut skipped = 0usize;
    for (i, chunk) in chunks.iter().enumerate() {
        if chunk.text.len() < min_len {
            skipped += 1;
            if !globals.json {
                println!("skipping chunk {}: too short", i + 1);
            }
            continue;
        }
        if globals.verbose > 0 {
            eprintln!(
                "generating question {}/{} (text {} chars, {} images)",
                i + 1,
                chunks.len(),
                chunk.text.len(),
                chunk.artifacts.len()
            );
        }
        let reply = generate(
            globals,
            &eff,
            question_prompt(chunk),
            "question",
            &chunk.text,
            args.stream,
        )
        .await?;
        let reply = reply.trim().to_string();
        if !globals.json && !args.stream {
            println!("Question {}: {}", questions.len() + 1, reply);
        }
        questions.push(reply);
    }

    if globals.json {
        #[derive(serde::Serialize)]
        struct Out<'a> {
            file: String,
            pages: usize,
            target: usize,
            skipped: usize,
            questions: &'a [String],
        }
        render_mod::print_json(&Out {
            file: args.file.display().to_string(),
            pages: pages.len(),
            target,
            skipped,
            questions: &questions,
        });
    }
    Ok(())
}

async fn cmd_qna(globals: &GlobalOpts, args: QnaArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let eff = config::resolve_effective_settings(
        globals.profile.as_deref(),
        args.provider.as_deref(),
        globals.model.as_deref(),
        None,
        None,
        args.output_dir.as_deref(),
    )?;
    if !args.dir.is_dir() {
        return Err(json_error(globals, "dir_not_found", &format!("directory not found: {}", args.dir.display()), None));
    }
    let files = io::scan_folder_for_extensions(&args.dir, &["pdf", "txt", "md"]).await?;
    if files.is_empty() {
        return Err(json_error(globals, "missing_input", &format!("no documents found in {}", args.dir.display()), None));
    }

    let output_dir = PathBuf::from(&eff.output_dir);
    let budget = QuestionBudget::new(eff.question_cap);
    let allocator = ChunkAllocator::new(eff.min_chunk_len);
    let mut summary = render_mod::ProcessingSummary::default();

    for file in &files {
        let name = io::filename_only(file);
        if globals.verbose > 0 {
            eprintln!("processing: {}", name);
        }
        let pages = match extract::extract_pages(file).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("failed: {}: {}", name, e);
                summary.failed += 1;
                continue;
            }
        };
        let combined: String = pages.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n");
        let digest = io::content_digest(&combined);
        let digest_path = io::digest_path_for(&output_dir, file);
        if !args.force && io::digest_matches(&digest_path, &digest).await {
            if globals.verbose > 0 {
                eprintln!("unchanged, skipping: {}", name);
            }
            summary.skipped += 1;
            continue;
        }

        let (_target, chunks) = chunker::plan_and_allocate(&pages, &budget, &allocator);
        let mut pairs: Vec<render_mod::QaPair> = Vec::new();
        let mut failed = false;
        for chunk in &chunks {
            if chunk.text.len() < eff.min_chunk_len {
                continue;
            }
            match generate(globals, &eff, qna_prompt(chunk), "qna", &chunk.text, false).await {
                Ok(reply) => pairs.extend(render_mod::parse_qa_pairs(&reply)),
                Err(e) => {
                    eprintln!("failed: {}: {}", name, e);
                    summary.failed += 1;
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            continue;
        }

        let out_path = io::qna_output_path(&output_dir, file);
        let text = io::render_qna_file(&name, &pairs);
        io::write_file_async(&out_path, &text).await?;
        io::record_digest(&digest_path, &digest).await?;
        summary.processed += 1;
        summary.outputs.push(out_path.display().to_string());
    }

    if globals.json {
        render_mod::print_json(&summary);
    } else {
        render_mod::render_processing_summary("DOCUMENT PROCESSING SUMMARY", &summary);
    }
    Ok(())
}

async fn cmd_sheets(globals: &GlobalOpts, args: SheetsArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let eff = config::resolve_effective_settings(
        globals.profile.as_deref(),
        args.provider.as_deref(),
        globals.model.as_deref(),
        None,
        None,
        args.output_dir.as_deref(),
    )?;

    let files: Vec<PathBuf> = match (&args.file, &args.dir) {
        (Some(file), None) => {
            if !file.exists() {
                return Err(json_error(globals, "file_not_found", &format!("file not found: {}", file.display()), None));
            }
            vec![file.clone()]
        }
        (None, Some(dir)) => {
            if !dir.is_dir() {
                return Err(json_error(globals, "dir_not_found", &format!("directory not found: {}", dir.display()), None));
            }
            let found = io::scan_folder_for_extensions(dir, &["csv"]).await?;
            if found.is_empty() {
                return Err(json_error(globals, "missing_input", &format!("no sheets found in {}", dir.display()), None));
            }
            found
        }
        _ => {
            return Err(json_error(globals, "invalid_args", "provide exactly one of --file or --dir", None));
        }
    };

    let output_dir = PathBuf::from(&eff.output_dir);
    let mut summary = render_mod::ProcessingSummary::default();

    for file in &files {
        let name = io::filename_only(file);
        if globals.verbose > 0 {
            eprintln!("processing: {}", name);
        }
        let text = match io::read_file_to_string_async(file).await {
            Ok(t) => t,
            Err(e) => {
                eprintln!("failed: {}: {}", name, e);
                summary.failed += 1;
                continue;
            }
        };

        let result = if args.per_row {
            sheet_per_row(globals, &eff, file, &name, &text, &output_dir).await
        } else {
            sheet_summary(globals, &eff, file, &name, &text, &output_dir).await
        };
        match result {
            Ok(out_path) => {
                summary.processed += 1;
                summary.outputs.push(out_path.display().to_string());
            }
            Err(e) => {
                eprintln!("failed: {}: {}", name, e);
                summary.failed += 1;
            }
        }
    }

    if globals.json {
        render_mod::print_json(&summary);
    } else {
        render_mod::render_processing_summary("SHEET PROCESSING SUMMARY", &summary);
    }
    Ok(())
}

async fn sheet_summary(
    globals: &GlobalOpts,
    eff: &EffectiveSettings,
    file: &Path,
    name: &str,
    text: &str,
    output_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let columns = extract::csv_columns(text);
    let clues = extract::infer_context_clues(&columns);
    let table = extract::csv_to_markdown(text);
    let reply = generate(
        globals,
        eff,
        sheet_summary_prompt(&table, &clues),
        "summary",
        name,
        false,
    )
    .await?;
    let out_path = io::summary_output_path(output_dir, file, "Sheet1");
    let content = io::render_summary_file(name, "Sheet1", &reply);
    io::write_file_async(&out_path, &content).await?;
    Ok(out_path)
}

async fn sheet_per_row(
    globals: &GlobalOpts,
    eff: &EffectiveSettings,
    file: &Path,
    name: &str,
    text: &str,
    output_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let rows = extract::csv_rows(text);
    let mut paragraphs: Vec<String> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        if globals.verbose > 0 {
            eprintln!("row {}/{}", i + 1, rows.len());
        }
        let seed = row
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let reply = generate(
            globals,
            eff,
            row_narrative_prompt(row),
            "narrative",
            &seed,
            false,
        )
        .await?;
        paragraphs.push(reply.trim().to_string());
    }
    let out_path = io::narrative_output_path(output_dir, file, "Sheet1");
    let content = io::render_summary_file(name, "Sheet1", &paragraphs.join("\n\n"));
    io::write_file_async(&out_path, &content).await?;
    Ok(out_path)
}
