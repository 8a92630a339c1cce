use clap::Parser;
use snipesync_core::SyncErr;
use snipesync_core::config::Config;
use snipesync_core::connection;
use snipesync_core::http::RetryingClient;
use snipesync_core::snipe::SnipeClient;
use snipesync_core::sources;

use crate::output::Palette;

#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// Print the results as JSON.
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: CheckArgs) -> anyhow::Result<bool> {
    let palette = Palette::stdout();
    let env = connection::env_report(|name| std::env::var(name).ok());

    if !args.json {
        println!("{}", palette.bold("Environment"));
        for entry in &env {
            let value = match (&entry.display, entry.required) {
                (Some(value), _) => palette.ok(value),
                (None, true) => palette.err("missing"),
                (None, false) => "not set".to_string(),
            };
            println!("  {:<28} {value}", entry.name);
        }
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            println!("{} {err}", palette.err("configuration error:"));
            return Ok(false);
        }
    };
    let http = RetryingClient::new(config.rate_limit.retry_policy())?;
    let snipe = SnipeClient::new(http.clone(), &config.snipe);
    let (sources, source_error) = match sources::build_sources(&config, &http, &[]) {
        Ok(sources) => (sources, None),
        Err(err @ SyncErr::NoSources) => (Vec::new(), Some(err)),
        Err(err) => return Err(err.into()),
    };

    let results = connection::check_connections(&snipe, &sources).await;
    let all_ok = source_error.is_none() && results.iter().all(|result| result.ok);

    if args.json {
        let out = serde_json::json!({
            "environment": env,
            "connections": results,
            "ok": all_ok,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(all_ok);
    }

    println!("{}", palette.bold("Connections"));
    for result in &results {
        println!(
            "  {:<10} {:<6} {}",
            result.service,
            palette.status(result.ok),
            result.detail
        );
    }
    if let Some(err) = source_error {
        println!("  {}", palette.err(&err.to_string()));
    }
    Ok(all_ok)
}
