//! Tagplay - RFID-driven asset playback server.
//!
//! Provides both human-friendly and agent-friendly (robot mode) interfaces.
#![forbid(unsafe_code)]

use std::io;
use std::sync::Arc;

use clap::Parser;
use console::style;
use serde::Serialize;

use tagplay::assets::AssetRegistry;
use tagplay::cli::{self, Cli, Commands};
use tagplay::config::{ServerConfig, load_config};
use tagplay::error::{Result, TagplayError};
use tagplay::logging::init_logging;
use tagplay::mapping::{CardResolver, FileResolver};
use tagplay::server;
use tagplay::storage::DirStorage;

/// Build information embedded at compile time.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> &'static str {
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    }

    pub fn git_dirty() -> &'static str {
        option_env!("VERGEN_GIT_DIRTY").unwrap_or("false")
    }

    pub fn build_timestamp() -> &'static str {
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    }

    pub fn rustc_semver() -> &'static str {
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    }

    pub fn target() -> &'static str {
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown")
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    init_logging(cli.use_json(), cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        output_error(&cli, &e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        None => print_quick_start(cli),
        Some(Commands::Serve(args)) => cmd_serve(cli, args),
        Some(Commands::Assets) => cmd_assets(cli),
        Some(Commands::Cards) => cmd_cards(cli),
        Some(Commands::Version) => cmd_version(cli),
        Some(Commands::Completions(args)) => cmd_completions(cli, args),
    }
}

fn load(cli: &Cli) -> Result<ServerConfig> {
    load_config(cli.config.as_deref())
}

// === Quick Start ===

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn print_quick_start(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        print_robot_quick_start(cli);
    } else {
        print_human_quick_start();
    }
    Ok(())
}

#[derive(Serialize)]
struct RobotQuickStart {
    tool: &'static str,
    version: &'static str,
    description: &'static str,
    commands: RobotCommands,
    endpoints: RobotEndpoints,
    output_modes: OutputModes,
}

#[derive(Serialize)]
struct RobotCommands {
    serve: &'static str,
    assets: &'static str,
    cards: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct RobotEndpoints {
    play: &'static str,
    navigate: &'static str,
    card_removed: &'static str,
    events: &'static str,
    media: &'static str,
}

#[derive(Serialize)]
struct OutputModes {
    human: &'static str,
    robot: &'static str,
    compact: &'static str,
}

fn print_robot_quick_start(cli: &Cli) {
    let help = RobotQuickStart {
        tool: "tagplay",
        version: build_info::VERSION,
        description: "RFID-driven asset playback server with live event streaming",
        commands: RobotCommands {
            serve: "tagplay serve --port 8080 --assets ./assets --mapping ./cards.toml",
            assets: "tagplay assets --robot",
            cards: "tagplay cards --robot",
            version: "tagplay version --robot",
        },
        endpoints: RobotEndpoints {
            play: "POST /play {\"card_id\": \"...\", \"asset_index\": 0}",
            navigate: "POST /navigate {\"card_id\": \"...\", \"direction\": \"next\"}",
            card_removed: "POST /card-removed {\"card_id\": \"...\"}",
            events: "GET /events (Server-Sent Events)",
            media: "GET /assets/{filename} (Range supported for video)",
        },
        output_modes: OutputModes {
            human: "--format=text (default)",
            robot: "--robot or --format=json",
            compact: "--format=json-compact",
        },
    };
    output_json(cli, &help);
}

fn print_human_quick_start() {
    println!(
        "{} {} - RFID asset playback server\n",
        style("tagplay").bold().cyan(),
        build_info::VERSION
    );

    println!("{}", style("QUICK START").bold().underlined());
    println!();
    println!("  {}  Start the server", style("tagplay serve").green());
    println!("  {}  List playable assets", style("tagplay assets").green());
    println!("  {}  Show card mapping", style("tagplay cards").green());
    println!();

    println!("{}", style("CARD EVENTS").bold().underlined());
    println!();
    println!("  {}  Card placed", style("POST /play").cyan());
    println!("  {}  Step through assets", style("POST /navigate").cyan());
    println!("  {}  Card lifted", style("POST /card-removed").cyan());
    println!("  {}  Live event stream", style("GET  /events").cyan());
    println!();

    println!("Run {} for full help", style("tagplay --help").yellow());
}

// === Command Implementations ===

fn cmd_serve(cli: &Cli, args: &cli::ServeArgs) -> Result<()> {
    let mut config = load(cli)?;
    args.apply(&mut config);
    config.validate()?;

    if !cli.quiet && !cli.use_json() {
        println!(
            "Serving {} on http://{} (Ctrl+C to stop)",
            style(config.assets.folder.display()).green(),
            config.bind_addr()
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(server::serve(config))
}

fn cmd_assets(cli: &Cli) -> Result<()> {
    let config = load(cli)?;
    let folder = &config.assets.folder;
    if !folder.is_dir() {
        return Err(TagplayError::NotFound {
            what: format!("Assets folder '{}'", folder.display()),
        });
    }

    let registry = AssetRegistry::new(Arc::new(DirStorage::new(folder)?));
    let assets = registry.list();

    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "folder": folder.display().to_string(),
                "count": assets.len(),
                "assets": assets,
            }),
        );
    } else if assets.is_empty() {
        println!("{}", style("No playable assets found").yellow());
        println!("Supported: video (mp4, webm, mov, ...) and images (jpg, png, gif, ...)");
    } else {
        for asset in &assets {
            println!(
                "{:<40} {:<6} {:>8.2} MB",
                style(&asset.filename).green(),
                asset.kind.as_str(),
                asset.size_mb
            );
        }
        if !cli.quiet {
            println!();
            println!("{} assets in {}", assets.len(), folder.display());
        }
    }
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_cards(cli: &Cli) -> Result<()> {
    let config = load(cli)?;
    let resolver = FileResolver::new(&config.mapping.file);
    let cards = resolver.mapping();

    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "mapping_file": config.mapping.file.display().to_string(),
                "count": cards.len(),
                "cards": cards,
            }),
        );
    } else if cards.is_empty() {
        println!(
            "{} {}",
            style("No cards mapped in").yellow(),
            config.mapping.file.display()
        );
    } else {
        for (card_id, assets) in &cards {
            println!("{}: {}", style(card_id).bold(), assets.join(", "));
        }
    }
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_version(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "version": build_info::VERSION,
                "git_sha": build_info::git_sha(),
                "git_dirty": build_info::git_dirty() == "true",
                "build_timestamp": build_info::build_timestamp(),
                "rustc_version": build_info::rustc_semver(),
                "target": build_info::target(),
            }),
        );
    } else {
        println!("tagplay {}", build_info::VERSION);
        println!(
            "git: {}{}",
            build_info::git_sha(),
            if build_info::git_dirty() == "true" {
                " (dirty)"
            } else {
                ""
            }
        );
        println!("built: {}", build_info::build_timestamp());
        println!("rustc: {}", build_info::rustc_semver());
        println!("target: {}", build_info::target());
    }
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_completions(_cli: &Cli, args: &cli::CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    clap_complete::generate(args.shell, &mut Cli::command(), "tagplay", &mut io::stdout());
    Ok(())
}

// === Utility Functions ===

fn output_json<T: Serialize>(cli: &Cli, data: &T) {
    let json = if cli.use_compact_json() {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("{}: {e}", style("Serialization failed").red()),
    }
}

fn output_error(cli: &Cli, error: &TagplayError) {
    if cli.use_json() {
        let json = serde_json::json!({
            "error": true,
            "kind": error.kind(),
            "message": error.to_string(),
            "suggestion": error.suggestion(),
            "recoverable": error.is_user_recoverable(),
        });
        match serde_json::to_string_pretty(&json) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("{error}"),
        }
    } else {
        eprintln!("{}: {}", style("Error").red().bold(), error);
        if let Some(suggestion) = error.suggestion() {
            eprintln!("{}: {}", style("Hint").yellow(), suggestion);
        }
    }
}
