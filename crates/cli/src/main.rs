use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use komal_core::{AnalysisRequest, ModerationPolicy, SafeDomain, DEFAULT_AGE_GROUP};
use komal_engine::ModerationEngine;
use komal_ml::SemanticStack;
use komal_observability::{init_tracing, AppMetrics};
use komal_taxonomy::TaxonomyStore;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "moderate")]
#[command(about = "Komal content moderation CLI")]
struct Cli {
    #[arg(long, env = "KOMAL_TAXONOMY_PATH", default_value = "taxonomy/moderation_taxonomy.csv")]
    taxonomy: PathBuf,

    #[arg(long, env = "KOMAL_POLICY_PATH")]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze one piece of text and print the full result.
    Analyze {
        #[arg(long)]
        text: String,
        #[arg(long, default_value = DEFAULT_AGE_GROUP)]
        age_group: String,
        #[arg(long)]
        content_id: Option<String>,
    },
    /// Read lines from stdin and analyze each one.
    Repl {
        #[arg(long, default_value = DEFAULT_AGE_GROUP)]
        age_group: String,
    },
    /// Summarize the loaded taxonomy.
    Taxonomy,
    /// Check whether a keyword appears in a safe context.
    Context {
        #[arg(long)]
        text: String,
        #[arg(long)]
        keyword: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleSummary<'a> {
    category: &'a str,
    subcategory: &'a str,
    category_keywords: usize,
    subcategory_keywords: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextReport {
    keyword: String,
    safe_context: bool,
    domains: Vec<SafeDomain>,
    snippet: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("komal_cli");
    let cli = Cli::parse();

    let engine = build_engine(&cli.taxonomy, cli.policy.as_ref())?;

    match cli.command {
        Command::Analyze {
            text,
            age_group,
            content_id,
        } => {
            let content_id = content_id.unwrap_or_else(|| format!("cli-{}", Uuid::new_v4()));
            let result = engine
                .analyze(AnalysisRequest::new(content_id, text, age_group))
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Repl { age_group } => run_repl(&engine, &age_group).await?,
        Command::Taxonomy => {
            let summary = engine
                .taxonomy()
                .rules()
                .iter()
                .map(|rule| RuleSummary {
                    category: &rule.category,
                    subcategory: &rule.subcategory,
                    category_keywords: rule.category_keywords.len(),
                    subcategory_keywords: rule.subcategory_keywords.len(),
                })
                .collect::<Vec<_>>();
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Context { text, keyword } => {
            let validator = engine.validator();
            let report = ContextReport {
                safe_context: validator.is_safe_context(&text, &keyword),
                domains: validator.safe_domains(&text, &keyword),
                snippet: validator.context_snippet(&text, &keyword),
                keyword,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn run_repl(engine: &ModerationEngine, age_group: &str) -> Result<()> {
    println!("Komal moderation repl (age group {age_group}). type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        let request = AnalysisRequest::new(format!("repl-{}", Uuid::new_v4()), message, age_group);
        let result = engine.analyze(request).await?;
        let analysis = &result.category_analysis;

        println!(
            "\n{} (score {:.4}) {}",
            result.final_decision.decision.as_str(),
            result.final_decision.weighted_score,
            result.final_decision.action_required
        );
        println!(
            "category: {} / {} ({:.2})",
            analysis.primary_category.as_deref().unwrap_or("-"),
            analysis.subcategory.as_deref().unwrap_or("-"),
            analysis.confidence
        );
        if !analysis.matched_keywords.is_empty() {
            println!("matched: {}", analysis.matched_keywords.join(", "));
        }
        println!(
            "semantic: {} ({:.2})\n",
            result.semantic_analysis.label, result.semantic_analysis.confidence
        );
    }

    Ok(())
}

fn build_engine(taxonomy_path: &PathBuf, policy_path: Option<&PathBuf>) -> Result<ModerationEngine> {
    let taxonomy = TaxonomyStore::from_path(taxonomy_path)
        .with_context(|| format!("failed loading taxonomy from {}", taxonomy_path.display()))?;

    let policy = match policy_path {
        Some(path) => ModerationPolicy::from_json_file(path)?,
        None => ModerationPolicy::default(),
    };

    let semantic = SemanticStack::from_env(&taxonomy);

    Ok(ModerationEngine::new(
        Arc::new(taxonomy),
        policy,
        semantic,
        AppMetrics::shared(),
    ))
}
