use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use na_agent::{persist_results, ChatAgent, Pipeline};
use na_core::config::{
    Config, FilterStrategy, ModelConfig, ModelProvider, NewsConfig, PipelineConfig, SortOrder, StorageConfig,
    SummaryStrategy, DEFAULT_NEWS_API_URL,
};
use na_core::logging::init_logging;
use na_core::ArticleStorage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

/// A duration written as `30s`, `2m`, `1h30m` or a bare number of seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut total = 0u64;
        let mut digits = String::new();
        let mut seen_number = false;

        for c in s.trim().chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let n: u64 = digits.parse().map_err(|_| format!("Expected a number before '{}'", c))?;
            total += match c {
                's' => n,
                'm' => n * 60,
                'h' => n * 3600,
                _ => return Err(format!("Invalid duration unit: {}", c)),
            };
            digits.clear();
            seen_number = true;
        }
        if !digits.is_empty() {
            total += digits.parse::<u64>().map_err(|e| e.to_string())?;
            seen_number = true;
        }
        if !seen_number || total == 0 {
            return Err("Duration must be a positive number of seconds".to_string());
        }
        Ok(HumanDuration(Duration::from_secs(total)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Search, filter and summarize news with an LLM", long_about = None)]
struct Cli {
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    news_api_key: Option<String>,
    #[arg(long, env = "NEWS_API_URL", default_value = DEFAULT_NEWS_API_URL)]
    news_api_url: String,
    #[arg(long, env = "NA_MODEL", value_enum, default_value_t = ModelProvider::Gemini, help = "Text-generation provider")]
    model: ModelProvider,
    #[arg(long, env = "NA_MODEL_NAME")]
    model_name: Option<String>,
    #[arg(long, env = "NA_MODEL_URL")]
    model_url: Option<String>,
    #[arg(long, help = "Model API key, defaults to GEMINI_API_KEY or DEEPSEEK_API_KEY by provider")]
    model_api_key: Option<String>,
    #[arg(long, env = "GEMINI_API_KEY", hide = true, hide_env_values = true)]
    gemini_api_key: Option<String>,
    #[arg(long, env = "DEEPSEEK_API_KEY", hide = true, hide_env_values = true)]
    deepseek_api_key: Option<String>,
    #[arg(long, default_value = "memory", help = "Storage backend: memory or sqlite")]
    storage: String,
    #[arg(long, env = "DATABASE_URL")]
    backend_url: Option<String>,
    #[arg(long, default_value_t = 8)]
    articles_count: u32,
    #[arg(long, value_enum, default_value_t = SortOrder::Rel)]
    sort_by: SortOrder,
    #[arg(long, value_enum, default_value_t = FilterStrategy::PerArticle)]
    filter_strategy: FilterStrategy,
    #[arg(long, value_enum, default_value_t = SummaryStrategy::PerArticle)]
    summary_strategy: SummaryStrategy,
    #[arg(long, default_value_t = 5.0, help = "Minimum relevance score (0-10) to keep an article")]
    threshold: f32,
    #[arg(long, default_value = "30s", help = "Timeout for each provider call (e.g. 30s, 2m)")]
    timeout: HumanDuration,
    #[arg(long, help = "Log filter, overrides RUST_LOG (e.g. debug, na_agent=trace)")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the search, filter and summarize pipeline once
    Query {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Serve the HTTP API and web page
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: String,
    },
    /// Talk to the news assistant
    Chat {
        #[arg(long, default_value = "cli")]
        thread_id: String,
    },
    /// List stored articles
    Articles {
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

impl Cli {
    fn model_api_key(&self) -> Option<String> {
        let fallback = match self.model {
            ModelProvider::Gemini => &self.gemini_api_key,
            ModelProvider::Deepseek => &self.deepseek_api_key,
            ModelProvider::Dummy => &None,
        };
        self.model_api_key.clone().or_else(|| fallback.clone())
    }

    fn config(&self) -> Config {
        Config {
            news: NewsConfig {
                api_key: self.news_api_key.clone(),
                api_url: self.news_api_url.clone(),
                articles_count: self.articles_count,
                sort_by: self.sort_by,
                request_timeout: self.timeout.0,
            },
            model: ModelConfig {
                provider: self.model,
                model_name: self.model_name.clone(),
                api_key: self.model_api_key(),
                base_url: self.model_url.clone(),
                request_timeout: self.timeout.0,
                ..ModelConfig::default()
            },
            storage: StorageConfig { kind: Some(self.storage.clone()), url: self.backend_url.clone() },
            pipeline: PipelineConfig {
                filter_strategy: self.filter_strategy,
                summary_strategy: self.summary_strategy,
                threshold: self.threshold,
                ..PipelineConfig::default()
            },
        }
    }
}

async fn open_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn ArticleStorage>> {
    let kind = config.kind.as_deref().unwrap_or("memory");
    let storage = na_storage::create_storage(kind, config.url.as_deref())
        .await
        .with_context(|| format!("Failed to open {} storage", kind))?;
    info!("💾 Storage initialized (using {})", kind);
    Ok(storage)
}

async fn run_query(config: &Config, query: &str) -> anyhow::Result<bool> {
    let pipeline = Pipeline::from_config(config)?;
    let storage = open_storage(&config.storage).await?;

    let state = pipeline.run(query).await;
    if let Some(error) = &state.error {
        eprintln!("{}", error);
        return Ok(false);
    }
    persist_results(storage.as_ref(), &state).await;

    let results = state.results();
    if results.is_empty() {
        println!("No relevant articles found for \"{}\".", query);
    }
    for (i, result) in results.iter().enumerate() {
        println!("{}. {} ({})", i + 1, result.title, result.source);
        println!("   {}", result.url);
        println!("   {}\n", result.summary);
    }
    if let Some(takeaways) = &state.takeaways {
        println!("Key Takeaways: {}", takeaways);
    }
    Ok(true)
}

async fn serve(config: &Config, addr: &str) -> anyhow::Result<()> {
    let source = na_sources::create_source(&config.news)?;
    let model = na_inference::create_model(&config.model)?;
    let state = na_web::AppState {
        pipeline: Arc::new(Pipeline::new(source.clone(), model.clone(), &config.pipeline)),
        chat: Arc::new(ChatAgent::new(source, model, &config.pipeline)),
        storage: Some(open_storage(&config.storage).await?),
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🌐 Listening on http://{}", addr);
    axum::serve(listener, na_web::create_app(state)).await?;
    Ok(())
}

async fn chat(config: &Config, thread_id: &str) -> anyhow::Result<()> {
    let source = na_sources::create_source(&config.news)?;
    let model = na_inference::create_model(&config.model)?;
    let agent = ChatAgent::new(source, model, &config.pipeline);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Ask about the news. Type 'exit' to quit.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else { break };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let (tx, mut rx) = mpsc::channel::<String>(32);
        let respond = async {
            let tx = tx;
            agent.respond(thread_id, message, &tx).await
        };
        let print = async {
            while let Some(fragment) = rx.recv().await {
                print!("{}", fragment);
                let _ = std::io::stdout().flush();
            }
            println!();
        };
        let (result, ()) = tokio::join!(respond, print);
        if let Err(e) = result {
            eprintln!("Error: {}", e);
        }
    }
    Ok(())
}

async fn list_articles(config: &Config, skip: usize, limit: usize) -> anyhow::Result<()> {
    let storage = open_storage(&config.storage).await?;
    let articles = storage.list_articles(skip, limit).await?;
    if articles.is_empty() {
        println!("No stored articles.");
    }
    for stored in articles {
        println!("{}  {}  {}", stored.id, stored.created_at.format("%Y-%m-%d %H:%M"), stored.article.title);
        println!("    {}", stored.article.url);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let config = cli.config();
    config.validate()?;
    info!("🧠 Using {:?} model", config.model.provider);

    match &cli.command {
        Commands::Query { query } => {
            if !run_query(&config, &query.join(" ")).await? {
                std::process::exit(1);
            }
        }
        Commands::Serve { addr } => serve(&config, addr).await?,
        Commands::Chat { thread_id } => chat(&config, thread_id).await?,
        Commands::Articles { skip, limit } => list_articles(&config, *skip, *limit).await?,
    }
    Ok(())
}
