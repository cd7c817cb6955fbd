mod cache;
mod catalog;
mod config;
mod error;
mod logging;
mod mutation;
mod pagination;
mod query;
mod render;

use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use cache::{CacheStore, QueryExecutor, SqliteStorage};
use catalog::{CachedCatalogClient, CatalogApi, CatalogClient, CatalogData, ProductPatch};
use config::Config;
use mutation::{MutationCoordinator, MutationRequest};
use pagination::{PaginationController, PaginationState, RawParams};

#[derive(Parser, Debug)]
#[command(name = "catalog")]
#[command(about = "Browse and update a remote product catalog through a local query cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/catalog-query/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Catalog service base URL
  #[arg(long)]
  base_url: Option<String>,

  /// Don't read or write the persistent cache
  #[arg(long)]
  no_cache: bool,

  /// Debug-level logging
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List a page of products
  List(PageArgs),
  /// Move forward one step and list
  Next(PageArgs),
  /// Move back one step and list
  Prev(PageArgs),
  /// Show a single product
  Show { id: String },
  /// Update fields of a product
  Update(UpdateArgs),
  /// List category names
  Categories,
  /// Manage the local cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(ClapArgs, Debug)]
struct PageArgs {
  /// Navigation parameters as a query string, e.g. "skip=8&limit=8"
  #[arg(long, conflicts_with_all = ["skip", "limit"])]
  params: Option<String>,

  #[arg(long)]
  skip: Option<String>,

  #[arg(long)]
  limit: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct UpdateArgs {
  id: String,
  #[arg(long)]
  title: Option<String>,
  #[arg(long)]
  category: Option<String>,
  #[arg(long)]
  price: Option<f64>,
  #[arg(long)]
  brand: Option<String>,
  #[arg(long)]
  description: Option<String>,
  #[arg(long)]
  discount_percentage: Option<f64>,
  #[arg(long)]
  stock: Option<i64>,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Drop every cached result
  Clear,
}

/// Long-lived services, created once at startup.
struct Services {
  store: Arc<CacheStore<CatalogData>>,
  client: CachedCatalogClient,
  mutations: MutationCoordinator,
}

impl Services {
  fn new(config: &Config, persist: bool) -> Result<Self> {
    let api: Arc<dyn CatalogApi> = Arc::new(CatalogClient::new(config)?);

    let mut store: CacheStore<CatalogData> =
      CacheStore::new().with_invalidation_mode(config.cache.invalidation);
    if let Some(secs) = config.cache.ttl_secs {
      let ttl = i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| eyre!("cache.ttl_secs is too large: {}", secs))?;
      store = store.with_ttl(ttl);
    }
    if persist {
      let storage = match &config.cache.path {
        Some(path) => SqliteStorage::<CatalogData>::open_at(path)?,
        None => SqliteStorage::<CatalogData>::open()?,
      };
      store = store.with_storage(Box::new(storage));
    }

    let store = Arc::new(store);
    if let Err(e) = store.hydrate() {
      warn!(error = %e, "Failed to load persisted cache");
    }

    let executor = QueryExecutor::new(Arc::clone(&store));
    let client = CachedCatalogClient::new(Arc::clone(&api), executor.clone());
    let mutations = MutationCoordinator::new(api, executor)
      .with_list_invalidation(config.mutation.invalidate_lists);

    Ok(Self {
      store,
      client,
      mutations,
    })
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = logging::init(args.verbose)?;

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(base_url) = args.base_url {
    config.api.base_url = base_url;
  }
  info!(base_url = %config.api.base_url, "Starting");

  let services = Services::new(&config, config.cache.persist && !args.no_cache)?;
  let mut out = std::io::stdout().lock();
  let step = i64::try_from(config.pagination.step).unwrap_or(i64::MAX);

  match args.command {
    Command::List(page) => list(&services, &config, &page, 0, step, &mut out).await?,
    Command::Next(page) => list(&services, &config, &page, step, step, &mut out).await?,
    Command::Prev(page) => list(&services, &config, &page, -step, step, &mut out).await?,
    Command::Show { id } => {
      let result = services.client.product(&id).await;
      render::product(&mut out, &result)?;
    }
    Command::Update(update) => {
      let patch = ProductPatch {
        title: update.title,
        category: update.category,
        price: update.price,
        brand: update.brand,
        description: update.description,
        discount_percentage: update.discount_percentage,
        stock: update.stock,
      };
      if patch.is_empty() {
        return Err(eyre!("Nothing to update: pass at least one field"));
      }
      let result = services
        .mutations
        .mutate(MutationRequest {
          target_id: update.id,
          patch,
        })
        .await;
      render::mutation(&mut out, &result)?;
    }
    Command::Categories => {
      let result = services.client.categories().await;
      render::categories(&mut out, &result)?;
    }
    Command::Cache {
      action: CacheAction::Clear,
    } => {
      let cleared = services.store.clear();
      writeln!(out, "Cleared {} cached results", cleared)?;
    }
  }

  Ok(())
}

async fn list<W: Write>(
  services: &Services,
  config: &Config,
  page: &PageArgs,
  delta: i64,
  step: i64,
  out: &mut W,
) -> Result<()> {
  let default_limit = config.pagination.default_limit;
  let current = match &page.params {
    Some(query) => PaginationState::from_query(query, default_limit),
    None => PaginationState::parse(
      &RawParams {
        skip: page.skip.clone(),
        limit: page.limit.clone(),
      },
      default_limit,
    ),
  };

  let mut controller = PaginationController::new(services.client.clone(), current);
  let navigation = async {
    if delta == 0 {
      controller.load().await
    } else {
      controller.move_by(delta).await
    }
  };
  let (view, categories) = tokio::join!(navigation, services.client.categories());

  render::page(out, &view, &categories, step)?;
  Ok(())
}
