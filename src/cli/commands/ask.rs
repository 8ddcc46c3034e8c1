use anyhow::Result;
use clap::Args;

use crate::cli::commands::describe_error;
use crate::cli::output::get_formatter;
use crate::client::DaemonClient;
use crate::models::{Config, OutputFormat, QueryOptions};

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(required = true, help = "Question about the uploaded corpus")]
    pub question: String,

    #[arg(long, short = 'k', help = "Number of chunks to retrieve as context")]
    pub k: Option<usize>,

    #[arg(long, short = 's', help = "Show the retrieved chunks behind the answer")]
    pub sources: bool,
}

pub async fn handle_ask(args: AskArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    if args.k == Some(0) {
        anyhow::bail!("k must be at least 1");
    }
    if verbose {
        eprintln!("Question: \"{}\"", args.question.trim());
        eprintln!("  k: {}", args.k.unwrap_or(config.retrieval.default_k));
    }

    let client = DaemonClient::new(&config);
    let options = QueryOptions {
        k: args.k,
        include_sources: args.sources,
    };

    match client.query(&args.question, options).await {
        Ok(answer) => {
            print!("{}", formatter.format_answer(&answer));
            if verbose {
                eprintln!(
                    "Answered from corpus v{} in {}ms",
                    answer.corpus_version, answer.duration_ms
                );
            }
            Ok(())
        }
        Err(e) => {
            eprint!("{}", formatter.format_error(&describe_error(&e)));
            Err(anyhow::anyhow!("question could not be answered"))
        }
    }
}
