//! mimir: interactive chat front-end
//!
//! Reads prompts from stdin, streams answers to stdout. Lines starting
//! with `/` are commands; `/help` lists them.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mimir::{
    ChatSession, Config, DocumentSet, EmbeddingCache, FeedbackStore, GREETING, LlmBackend,
    MimirError, Mode, ModelEngineFactory, RetrievalParams, Role, TurnOutcome, UploadStore,
};

/// Mimir chat client
#[derive(Parser)]
#[command(name = "mimir")]
#[command(version = mimir::PKG_VERSION)]
#[command(about = "Chat with a language model, optionally grounded in your documents")]
struct Args {
    /// Config file (default: ~/.mimir/config.toml, then /etc/mimir/config.toml)
    #[arg(short, long, env = "MIMIR_CONFIG")]
    config: Option<PathBuf>,

    /// Start in RAG mode
    #[arg(long)]
    rag: bool,

    /// Document to chat about (repeatable)
    #[arg(short, long = "file")]
    files: Vec<PathBuf>,

    /// Number of documents to retrieve
    #[arg(long)]
    num_docs: Option<u32>,

    /// Similarity threshold for retrieved chunks (0.0 to 1.0)
    #[arg(long)]
    threshold: Option<f32>,
}

/// One line of user input.
#[derive(Debug, PartialEq)]
enum Input {
    Prompt(String),
    Rag,
    Plain,
    Files(Vec<PathBuf>),
    ClearFiles,
    NumDocs(u32),
    Threshold(f32),
    Reset,
    NewChat,
    ClearHistory,
    Feedback { rating: u8, comment: String },
    History,
    Help,
    Quit,
}

const HELP: &str = "\
/rag                      answer from the uploaded files
/plain                    answer without retrieval
/files PATH...            replace the uploaded files
/clear-files              remove all uploaded files
/num-docs N               documents to retrieve
/threshold X              minimum similarity (0.0 to 1.0)
/reset                    restore default parameters and rebuild engines
/new                      start a new conversation with fresh engines
/clear-history            forget the conversation so far
/feedback RATING [TEXT]   rate the last answer from 1 to 5
/history                  show the conversation
/quit                     leave";

fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Input::Prompt(line.to_string()));
    };
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((command, ""));

    match name {
        "rag" => Ok(Input::Rag),
        "plain" => Ok(Input::Plain),
        "files" if rest.is_empty() => Err("usage: /files PATH...".to_string()),
        "files" => Ok(Input::Files(
            rest.split_whitespace().map(PathBuf::from).collect(),
        )),
        "clear-files" => Ok(Input::ClearFiles),
        "num-docs" => rest
            .parse()
            .map(Input::NumDocs)
            .map_err(|_| "usage: /num-docs N".to_string()),
        "threshold" => rest
            .parse()
            .map(Input::Threshold)
            .map_err(|_| "usage: /threshold X".to_string()),
        "reset" => Ok(Input::Reset),
        "new" => Ok(Input::NewChat),
        "clear-history" => Ok(Input::ClearHistory),
        "feedback" => {
            let (rating, comment) = rest
                .split_once(char::is_whitespace)
                .map(|(r, c)| (r, c.trim()))
                .unwrap_or((rest, ""));
            let rating = rating
                .parse()
                .map_err(|_| "usage: /feedback RATING [COMMENT]".to_string())?;
            Ok(Input::Feedback {
                rating,
                comment: comment.to_string(),
            })
        }
        "history" => Ok(Input::History),
        "help" => Ok(Input::Help),
        "quit" | "exit" => Ok(Input::Quit),
        other => Err(format!("unknown command /{other}, try /help")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let defaults = config.retrieval_params()?;
    let mut params = defaults;
    if let Some(n) = args.num_docs {
        params = params.with_num_docs(n)?;
    }
    if let Some(t) = args.threshold {
        params = params.with_similarity_threshold(t)?;
    }

    let backend = LlmBackend::new(config.llm_settings())?;
    let factory = ModelEngineFactory::from_backend(
        backend,
        EmbeddingCache::new(&config.embedding_cache_config()),
        config.engine_settings(),
    );
    let mut session = ChatSession::new(Arc::new(factory), &config.cache_config())
        .with_upload_store(UploadStore::new(config.storage.uploads_dir()));
    let feedback = FeedbackStore::new(config.storage.feedback_file());

    let mut documents = DocumentSet::from_paths(&args.files)?;
    let mut mode = if args.rag { Mode::Rag } else { Mode::Plain };

    tracing::debug!(version = %mimir::version_string(), session = session.id(), "starting");
    println!("{GREETING}");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("[{mode}]> ");
        io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let input = match parse_input(&line) {
            Ok(input) => input,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };

        match input {
            Input::Prompt(prompt) => {
                let outcome = session
                    .turn(mode, &prompt, &mut documents, params, |token| {
                        print!("{token}");
                        let _ = io::stdout().flush();
                    })
                    .await;
                println!();
                match outcome {
                    TurnOutcome::NoDocuments => {
                        eprintln!(
                            "{}: add some with /files or switch to /plain",
                            MimirError::NoDocuments
                        );
                    }
                    TurnOutcome::Answered(answer) => {
                        for warning in &answer.warnings {
                            eprintln!("warning: {warning}");
                        }
                        if let Some(sources) = &answer.completion.sources {
                            println!("\n{sources}");
                        }
                        let origin = if answer.cached { " (cached)" } else { "" };
                        println!(
                            "\nResponse time: {:.2} seconds{origin}",
                            answer.elapsed.as_secs_f64()
                        );
                    }
                }
            }
            Input::Rag => mode = Mode::Rag,
            Input::Plain => mode = Mode::Plain,
            Input::Files(paths) => match DocumentSet::from_paths(&paths) {
                Ok(docs) => {
                    println!("{} file(s) uploaded", docs.len());
                    documents = docs;
                }
                Err(e) => eprintln!("error: {e}"),
            },
            Input::ClearFiles => {
                documents = DocumentSet::default();
                println!("files cleared");
            }
            Input::NumDocs(n) => match params.with_num_docs(n) {
                Ok(p) => params = p,
                Err(e) => eprintln!("error: {e}"),
            },
            Input::Threshold(t) => match params.with_similarity_threshold(t) {
                Ok(p) => params = p,
                Err(e) => eprintln!("error: {e}"),
            },
            Input::Reset => {
                params = defaults;
                session.reset();
                print_params(&params);
            }
            Input::NewChat => {
                session.new_conversation();
                println!("{GREETING}");
            }
            Input::ClearHistory => {
                session.clear_history();
                println!("History cleared.");
            }
            Input::Feedback { rating, comment } => {
                match session.feedback(&feedback, rating, comment) {
                    Ok(_) => println!("Feedback saved."),
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            Input::History => {
                for message in session.history() {
                    let who = match message.role {
                        Role::User => "you",
                        Role::Assistant => "assistant",
                    };
                    println!("{who}: {}", message.content);
                }
            }
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
        }
    }

    Ok(())
}

fn print_params(params: &RetrievalParams) {
    println!(
        "num_docs = {}, threshold = {}",
        params.num_docs(),
        params.similarity_threshold()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_prompt() {
        assert_eq!(
            parse_input("  what is mimir? "),
            Ok(Input::Prompt("what is mimir?".to_string()))
        );
    }

    #[test]
    fn feedback_with_comment() {
        assert_eq!(
            parse_input("/feedback 4 pretty good answer"),
            Ok(Input::Feedback {
                rating: 4,
                comment: "pretty good answer".to_string()
            })
        );
        assert_eq!(
            parse_input("/feedback 2"),
            Ok(Input::Feedback {
                rating: 2,
                comment: String::new()
            })
        );
    }

    #[test]
    fn conversation_commands() {
        assert_eq!(parse_input("/new"), Ok(Input::NewChat));
        assert_eq!(parse_input("/clear-history"), Ok(Input::ClearHistory));
    }

    #[test]
    fn bad_arguments_are_reported() {
        assert!(parse_input("/num-docs many").is_err());
        assert!(parse_input("/files").is_err());
        assert!(parse_input("/bogus").is_err());
    }

    #[test]
    fn files_split_on_whitespace() {
        assert_eq!(
            parse_input("/files a.txt b.md"),
            Ok(Input::Files(vec![PathBuf::from("a.txt"), PathBuf::from("b.md")]))
        );
    }
}
