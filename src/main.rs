use clap::Parser;
use dogfinder::config::Settings;
use dogfinder::core::{format_remaining, parse_age_input, PageView};
use dogfinder::{FetchClient, FetchOutcome, FileSnapshotStore, OrchestratorConfig, SearchOrchestrator, SortSpec};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Search adoptable dogs, keep favorites and generate a match
#[derive(Debug, Parser)]
#[command(name = "dogfinder", version, about)]
struct Cli {
    /// Name to log in with
    #[arg(long)]
    name: String,

    /// Email to log in with; also keys the saved filters
    #[arg(long)]
    email: String,

    /// Breed filter, repeatable
    #[arg(long = "breed")]
    breeds: Vec<String>,

    /// Zip code filter, repeatable
    #[arg(long = "zip")]
    zip_codes: Vec<String>,

    #[arg(long)]
    age_min: Option<String>,

    #[arg(long)]
    age_max: Option<String>,

    /// Sort as field:order, e.g. age:desc
    #[arg(long)]
    sort: Option<SortSpec>,

    /// Number of pages to walk through
    #[arg(long, default_value_t = 1)]
    pages: u32,

    /// Dog id to toggle as favorite (must be on a displayed page), repeatable
    #[arg(long = "favorite")]
    favorites: Vec<String>,

    /// Generate a match from the favorites
    #[arg(long = "match")]
    generate_match: bool,

    /// List all breeds and exit
    #[arg(long)]
    list_breeds: bool,
}

fn print_page(page: &PageView) {
    println!("Page {} / {} ({} dogs)", page.current_page, page.total_pages, page.total);
    for dog in &page.dogs {
        println!(
            "  {:<22} {:<20} {:<28} age {:>2}  zip {}",
            dog.id, dog.name, dog.breed, dog.age, dog.zip_code
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        Settings::default()
    });

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }

    let api = Arc::new(FetchClient::new(
        settings.api.base_url.clone(),
        Duration::from_secs(settings.api.timeout_secs),
    ));
    let store = Arc::new(FileSnapshotStore::new(settings.storage.dir.clone()));
    let engine = SearchOrchestrator::new(api, store, OrchestratorConfig::from(&settings));

    info!("Using search API at {}", settings.api.base_url);

    engine.login(&cli.name, &cli.email).await?;
    if let Some(remaining) = engine.session_remaining().await {
        info!("Session expires in {}", format_remaining(remaining));
    }

    let result = run(&engine, &cli).await;
    if let Err(e) = &result {
        error!("{}", e);
    }

    engine.logout().await;
    result
}

async fn run(engine: &SearchOrchestrator, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.list_breeds {
        for breed in engine.breeds().await? {
            println!("{}", breed);
        }
        return Ok(());
    }

    let mut criteria = engine.criteria().await;
    for breed in &cli.breeds {
        criteria = criteria.with_breed(breed);
    }
    for zip in &cli.zip_codes {
        criteria = criteria.with_location(zip, zip);
    }
    if let Some(raw) = &cli.age_min {
        criteria = criteria.with_age_min(parse_age_input(raw)?);
    }
    if let Some(raw) = &cli.age_max {
        criteria = criteria.with_age_max(parse_age_input(raw)?);
    }
    if let Some(sort) = cli.sort {
        criteria = criteria.with_sort(sort);
    }

    // Restored criteria that already match still need a first page
    if engine.apply_criteria(criteria).await? == FetchOutcome::Unchanged {
        engine.reset_and_search().await?;
    }

    let mut seen = Vec::new();
    for page_number in 0..cli.pages.max(1) {
        if page_number > 0 && engine.go_next().await? != FetchOutcome::Applied {
            break;
        }
        let page = engine.page().await;
        print_page(&page);
        seen.extend(page.dogs);
    }

    for id in &cli.favorites {
        match seen.iter().find(|d| &d.id == id) {
            Some(dog) => {
                let now_favorite = engine.toggle_favorite(dog).await;
                println!("{} {}", if now_favorite { "Favorited" } else { "Unfavorited" }, dog.name);
            }
            None => println!("Dog {} is not on a displayed page", id),
        }
    }

    let favorites = engine.favorites().await;
    println!("Favorites: {}", favorites.len());

    if cli.generate_match {
        match engine.generate_match().await? {
            Some(dog) => println!("Matched with {} ({}, {})", dog.name, dog.breed, dog.zip_code),
            None => println!("No match to display"),
        }
    }

    Ok(())
}
