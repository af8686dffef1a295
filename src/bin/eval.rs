use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use kuran_chatbot::canon;
use kuran_chatbot::classify;
use kuran_chatbot::models::QueryIntent;

#[derive(Parser, Debug)]
#[command(name = "eval")]
#[command(about = "Run the offline query-classification evaluation set")]
struct Cli {
    #[arg(long, default_value = "eval/queries.jsonl")]
    file: String,
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

/// One labeled query. `expect` uses short tags so the JSONL stays hand
/// editable: full_sura, ayah_range, single_ayah, semantic, history, count,
/// trivial, continue.
#[derive(Debug, Deserialize)]
struct EvalQuery {
    id: String,
    query: String,
    expect: String,
    #[serde(default)]
    sura: Option<String>,
    #[serde(default)]
    start: Option<u32>,
    #[serde(default)]
    end: Option<u32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let queries = load_queries(&cli.file)?;
    if queries.is_empty() {
        anyhow::bail!("no queries found in {}", cli.file);
    }

    let mut total = 0usize;
    let mut passed = 0usize;

    for query in queries {
        total += 1;
        let (actual, ok) = evaluate(&query);

        if ok {
            passed += 1;
            if cli.verbose {
                println!("ok   {}: {}", query.id, actual);
            }
        } else {
            println!(
                "FAIL {}: {} (expected {}) for {:?}",
                query.id, actual, query.expect, query.query
            );
        }
    }

    println!("Queries: {total}");
    println!(
        "Classification accuracy: {:.1}% ({passed}/{total})",
        100.0 * passed as f32 / total as f32
    );

    if passed < total {
        std::process::exit(1);
    }
    Ok(())
}

fn evaluate(query: &EvalQuery) -> (String, bool) {
    let intent = classify::resolve(&query.query);
    let (tag, ok) = match &intent {
        QueryIntent::Greeting | QueryIntent::Thanks | QueryIntent::Farewell => {
            ("trivial", query.expect == "trivial")
        }
        QueryIntent::CanonicalCountQuery => ("count", query.expect == "count"),
        QueryIntent::ContinuePrevious => ("continue", query.expect == "continue"),
        QueryIntent::HistorySummary => ("history", query.expect == "history"),
        QueryIntent::FullSuraPaginated { sura } => (
            "full_sura",
            query.expect == "full_sura" && matches_sura(query, sura),
        ),
        QueryIntent::AyahRange { sura, start, end } => (
            "ayah_range",
            query.expect == "ayah_range"
                && matches_sura(query, sura)
                && query.start.map_or(true, |s| s == *start)
                && query.end.map_or(true, |e| e == *end),
        ),
        QueryIntent::SingleAyah { ayah } => (
            "single_ayah",
            query.expect == "single_ayah" && query.start.map_or(true, |s| s == *ayah),
        ),
        QueryIntent::SemanticSearch { .. } => ("semantic", query.expect == "semantic"),
    };

    (tag.to_string(), ok)
}

fn matches_sura(query: &EvalQuery, actual: &str) -> bool {
    match &query.sura {
        Some(expected) => canon::fold(expected) == canon::fold(actual),
        None => true,
    }
}

fn load_queries(path: &str) -> Result<Vec<EvalQuery>> {
    let file = File::open(path).with_context(|| format!("failed opening {}", path))?;
    let reader = BufReader::new(file);
    let mut queries = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parsed: EvalQuery = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON at {} line {}", path, idx + 1))?;
        queries.push(parsed);
    }

    Ok(queries)
}
