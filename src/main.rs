use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use tokenfeed::{
    arguments::{Cli, Command},
    config,
    context::FeedContext,
    feeds::InstantOptions,
    logger::{self, LogLevel, LogTag},
    tokens::{TokenDetails, TokenRecord},
};
use tokio_util::sync::CancellationToken;

/// Entry point for the tokenfeed CLI
///
/// Loads the configuration, builds one `FeedContext` and runs the requested command.
/// Ctrl-C cancels the session token, which ends searches and streams cleanly.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mut log_config = cli.logger_config();
    // Keep stdout parseable when printing JSON
    if cli.json && log_config.min_level == LogLevel::Info {
        log_config.min_level = LogLevel::Warning;
    }
    logger::init_with(log_config);

    if let Err(e) = run(cli).await {
        logger::error(LogTag::System, &format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.config {
        Some(path) => config::load_config_from_path(path),
        None => config::load_config(),
    }
    .map_err(anyhow::Error::msg)?;

    let ctx = FeedContext::new(config::get_config_clone())?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            logger::info(LogTag::System, "Interrupted, stopping");
            on_signal.cancel();
        }
    });

    match cli.command {
        Command::Search {
            query,
            limit,
            deadline_ms,
        } => {
            let mut opts = tokenfeed::aggregator::CollectOptions::from_config(
                &ctx.config().aggregator,
                cancel,
            );
            if let Some(limit) = limit {
                opts.limit = limit;
            }
            if let Some(ms) = deadline_ms {
                opts.deadline = std::time::Duration::from_millis(ms);
            }
            let records = ctx.search_tokens_with(&query, &opts).await?;
            print_records(&format!("Results for '{}'", query), &records, cli.json)?;
        }

        Command::Stream {
            budget,
            concurrency,
            offset,
            no_seeds,
        } => {
            let mut opts = ctx.stream_options(cancel);
            if let Some(budget) = budget {
                opts.budget = budget;
            }
            if let Some(concurrency) = concurrency {
                opts.max_concurrent = concurrency;
            }
            if let Some(offset) = offset {
                opts.window_offset = offset;
            }
            if no_seeds {
                opts.include_seeds = false;
            }

            let mut stream = ctx.stream_feeds(opts)?;
            while let Some(batch) = stream.next().await {
                if cli.json {
                    println!("{}", serde_json::to_string(&batch)?);
                } else {
                    print_records(
                        &format!("[{}] {}", batch.source, batch.term),
                        &batch.new_items,
                        false,
                    )?;
                }
            }
        }

        Command::Feeds { budget, seeds } => {
            let mut opts = ctx.feeds_options(cancel);
            if let Some(budget) = budget {
                opts.budget = budget;
            }
            opts.include_seeds = seeds;
            let records = ctx.fetch_feeds(&opts).await;
            print_records("Feeds", &records, cli.json)?;
        }

        Command::Info { mint } => {
            let details = ctx.fetch_token_info(&mint, &cancel).await?;
            if cli.json {
                print_json(&details)?;
            } else {
                print_details(&details);
            }
        }

        Command::Instant { limit } => {
            let mut opts = InstantOptions::new(cancel);
            if let Some(limit) = limit {
                opts.limit = limit;
            }
            let records = ctx.collect_instant(&opts).await;
            print_records("Instant feed", &records, cli.json)?;
        }

        Command::Health => {
            #[derive(Serialize)]
            struct Report<'a, H, C, A> {
                providers: &'a H,
                caches: &'a C,
                apis: &'a A,
            }
            print_json(&Report {
                providers: &ctx.feed_health(),
                caches: &ctx.cache_metrics(),
                apis: &ctx.api_stats(),
            })?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fmt_num(value: Option<f64>) -> String {
    match value {
        Some(v) if v >= 1_000_000.0 => format!("{:.2}M", v / 1_000_000.0),
        Some(v) if v >= 1_000.0 => format!("{:.1}K", v / 1_000.0),
        Some(v) if v >= 0.01 => format!("{:.2}", v),
        Some(v) => format!("{:.8}", v),
        None => "-".to_string(),
    }
}

fn print_records(title: &str, records: &[TokenRecord], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&records);
    }

    println!("\n{} ({})", title.bold(), records.len());
    println!("{}", "=".repeat(100));
    for (i, r) in records.iter().enumerate() {
        println!(
            "{:>3}. {:<10} {:<24} {:>12} {:>10}  {:<44} {}",
            i + 1,
            r.symbol.as_deref().unwrap_or("?").cyan(),
            r.name.as_deref().unwrap_or("").chars().take(24).collect::<String>(),
            fmt_num(r.price_usd),
            fmt_num(r.liquidity),
            r.mint,
            r.sources
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(",")
                .dimmed()
        );
    }
    Ok(())
}

fn print_details(d: &TokenDetails) {
    println!("\n{} {} ({})", d.symbol.bold(), d.name, d.mint);
    println!("{}", "=".repeat(80));
    println!("Source:      {}", d.source);
    println!(
        "Headline:    {} {}",
        d.headline_dex,
        d.headline_url.as_deref().unwrap_or("")
    );
    println!("Price USD:   {}", fmt_num(d.price_usd));
    println!(
        "Change:      5m {}  1h {}  6h {}  24h {}",
        fmt_num(d.change5m),
        fmt_num(d.change1h),
        fmt_num(d.change6h),
        fmt_num(d.change24h)
    );
    println!("Liquidity:   {}", fmt_num(d.liquidity_usd));
    println!("FDV / MCap:  {} / {}", fmt_num(d.fdv), fmt_num(d.market_cap));
    println!("Volume 24h:  {}", fmt_num(d.volume24h));
    println!(
        "Txns 24h:    {} buys / {} sells",
        d.txns24h.buys, d.txns24h.sells
    );
    if let Some(age) = d.age_ms {
        println!("Age:         {:.1}h", age as f64 / 3_600_000.0);
    }
    if let Some(supply) = d.supply {
        println!("Supply:      {} (decimals {:?})", supply, d.decimals);
    }
    println!("Pools:       {}", d.pairs.len());
    for site in &d.websites {
        println!("Website:     {}", site);
    }
}
