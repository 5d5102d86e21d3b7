use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use treni_server::cache::{BoundedCache, Cache, CachedClient, MemoryCache};
use treni_server::config::AppConfig;
use treni_server::itinerary::{ItineraryEngine, Solution};
use treni_server::stations::{
    CompositeStationProvider, DEFAULT_QUEUE_CAPACITY, ImportScheduler, SqliteStore,
    StationRepository, StationSource, WriteThrough,
};
use treni_server::viaggiatreno::{HttpClient, TransitApi};

#[derive(Parser, Debug)]
#[command(name = "treni-server")]
#[command(version, about = "Italian rail itinerary service")]
struct Cli {
    /// Origin station ID (e.g. S01700); with TO, run one search and exit
    #[arg(requires = "to")]
    from: Option<String>,

    /// Destination station ID
    to: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("treni_server=info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    info!(
        path = %config.database_path.display(),
        stations = store.count()?,
        "opened station store"
    );

    let http = Arc::new(HttpClient::new(config.client.clone())?);

    let cache: Arc<dyn Cache> = match config.cache_max_entries {
        Some(max_entries) => Arc::new(BoundedCache::new(max_entries)),
        None => Arc::new(MemoryCache::new()),
    };
    let api = Arc::new(CachedClient::new(http.clone(), cache, config.ttl.clone()));

    let (write_through, writer) = WriteThrough::spawn(store.clone(), DEFAULT_QUEUE_CAPACITY);
    let provider = CompositeStationProvider::new(
        config.staleness_age,
        vec![
            StationSource::store(store.clone()),
            StationSource::live(api.clone()),
        ],
    )
    .with_write_through(write_through);

    if let (Some(from), Some(to)) = (&cli.from, &cli.to) {
        let engine = ItineraryEngine::new(api, config.search.clone());
        let result = plan(&engine, &provider, from, to).await;
        // Closing the queue lets the writer persist what the lookups found.
        drop(provider);
        if let Err(e) = writer.await {
            warn!(error = %e, "write-through worker failed");
        }
        return result;
    }

    let scheduler = config.auto_import.then(|| {
        Arc::new(ImportScheduler::new(http, store.clone(), config.import.clone())).start()
    });
    info!(auto_import = config.auto_import, "treni-server running, Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    Ok(())
}

/// Run one search and print the solutions.
async fn plan<A, R, L>(
    engine: &ItineraryEngine<A>,
    provider: &CompositeStationProvider<R, L>,
    from: &str,
    to: &str,
) -> Result<(), Box<dyn std::error::Error>>
where
    A: TransitApi + 'static,
    R: StationRepository + 'static,
    L: TransitApi,
{
    let from_name = station_name(provider, from).await;
    let to_name = station_name(provider, to).await;

    let solutions = engine.search(from, to).await?;
    println!("{from_name} -> {to_name}: {} solution(s)", solutions.len());
    for solution in &solutions {
        print_solution(solution);
    }
    Ok(())
}

/// Display name for a station ID, falling back to the ID itself.
async fn station_name<R, L>(provider: &CompositeStationProvider<R, L>, id: &str) -> String
where
    R: StationRepository + 'static,
    L: TransitApi,
{
    match provider.get_station(id).await {
        Ok((station, freshness)) => {
            if freshness.is_stale {
                warn!(station = %id, source = %freshness.source, "station data is stale");
            }
            station.name
        }
        Err(e) => {
            warn!(station = %id, error = %e, "station lookup failed");
            id.to_string()
        }
    }
}

fn print_solution(solution: &Solution) {
    println!(
        "\n{} -> {} ({} min, {} change(s))",
        solution.departure_at().format("%H:%M"),
        solution.arrival_at().format("%H:%M"),
        solution.duration().num_minutes(),
        solution.changes()
    );
    for leg in solution.legs() {
        let platform = leg
            .platform
            .as_deref()
            .map(|p| format!(" platform {p}"))
            .unwrap_or_default();
        let delay = if leg.delay > 0 {
            format!(" (+{} min)", leg.delay)
        } else {
            String::new()
        };
        println!(
            "  {} {} {} {}{} -> {} {}{}",
            leg.category,
            leg.train_number,
            leg.departure_at.format("%H:%M"),
            leg.from.name,
            platform,
            leg.arrival_at.format("%H:%M"),
            leg.to.name,
            delay
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn no_arguments_runs_the_service() {
        let cli = Cli::try_parse_from(["treni-server"]).unwrap();
        assert!(cli.from.is_none() && cli.to.is_none());
    }

    #[test]
    fn two_arguments_run_a_search() {
        let cli = Cli::try_parse_from(["treni-server", "S01700", "S08409"]).unwrap();
        assert_eq!(cli.from.as_deref(), Some("S01700"));
        assert_eq!(cli.to.as_deref(), Some("S08409"));
    }

    #[test]
    fn origin_without_destination_is_rejected() {
        let err = Cli::try_parse_from(["treni-server", "S01700"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn help_and_extra_arguments_do_not_start_the_service() {
        let err = Cli::try_parse_from(["treni-server", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);

        assert!(Cli::try_parse_from(["treni-server", "A", "B", "C"]).is_err());
    }
}
