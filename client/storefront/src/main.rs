//! Storefront CLI — entry point.
//!
//! Browses the academic projects catalog and runs a checkout from the
//! terminal against the storefront's PHP API.

mod terminal;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use storefront::catalog::{ProjectCard, ALL};
use storefront::downloads;
use storefront::models::{CustomerInfo, PageRequest, PurchaseStatus};
use storefront::purchase::{DownloadRef, PurchaseView};
use storefront::router::{render, ViewContent};
use storefront::{
    CatalogFilter, CatalogStore, Config, HttpBackend, LazyGateway, PurchaseOptions,
    PurchaseOrchestrator, View,
};

use terminal::{prompt, ScriptLoader};

#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List projects as one of the storefront views
    #[command(alias = "ls")]
    List {
        /// home, projects, categories or freeprojects
        #[arg(long, default_value = "projects")]
        view: String,

        /// Substring matched against title and description
        #[arg(long, default_value = "")]
        search: String,

        #[arg(long, default_value = ALL)]
        category: String,

        /// beginner, intermediate or advanced
        #[arg(long, default_value = ALL)]
        difficulty: String,

        /// Fetch a single page of the catalog
        #[arg(long)]
        page: Option<u32>,

        /// Page size (defaults to PAGE_SIZE)
        #[arg(long)]
        limit: Option<u32>,

        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one project
    Show { id: i64 },

    /// Buy (or claim, if free) a project
    Buy {
        id: i64,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        phone: String,

        /// Where directly delivered files are saved
        #[arg(long, default_value = "downloads")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::from_env().map_err(|e| anyhow!("{e}"))?;

    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;
    let backend = Arc::new(HttpBackend::new(client.clone(), config.api_base_url.clone()));
    let mut catalog = CatalogStore::new(backend.clone());

    match cli.command {
        Commands::List {
            view,
            search,
            category,
            difficulty,
            page,
            limit,
            json,
        } => {
            let page = page.map(|page| PageRequest {
                page,
                limit: limit.unwrap_or(config.page_size),
            });
            catalog
                .fetch(page)
                .await
                .context("Error loading projects, try again")?;

            let filter = CatalogFilter {
                search,
                category,
                difficulty,
            };
            let content = render(View::parse(&view), &catalog, &filter, &config.currency_symbol);
            if json {
                println!("{}", serde_json::to_string_pretty(&content)?);
            } else {
                print_content(&content);
            }
        }

        Commands::Show { id } => {
            catalog
                .fetch(None)
                .await
                .context("Error loading projects, try again")?;
            let project = catalog
                .get(id)
                .ok_or_else(|| anyhow!("No project with id {id}"))?;
            print_card(&ProjectCard::new(project, &config.currency_symbol), true);
        }

        Commands::Buy {
            id,
            name,
            email,
            phone,
            out,
        } => {
            catalog
                .fetch(None)
                .await
                .context("Error loading projects, try again")?;
            let project = catalog
                .get(id)
                .cloned()
                .ok_or_else(|| anyhow!("No project with id {id}"))?;

            let gateway = LazyGateway::new(ScriptLoader {
                client: client.clone(),
                script_url: config.checkout_script_url.clone(),
            });
            let orchestrator = PurchaseOrchestrator::new(
                backend,
                Arc::new(gateway),
                PurchaseOptions::from(&config),
            );

            orchestrator.open(project.clone());
            orchestrator.set_customer_info(CustomerInfo { name, email, phone });

            if !project.is_free() {
                // Reveals the contact form; no request is made.
                orchestrator.purchase().await;
                if config.otp_required {
                    verify_email(&orchestrator).await?;
                }
            }

            let view = orchestrator.purchase().await;
            report(&view, &client, &out).await?;
        }
    }

    Ok(())
}

async fn verify_email(orchestrator: &PurchaseOrchestrator) -> Result<()> {
    let view = orchestrator.send_otp().await;
    println!("{}", view.state.message);
    if !view.otp.sent {
        bail!("Could not send a verification code");
    }
    println!("Code valid for {}s", view.otp.remaining_secs);

    let code = prompt("Verification code: ").await?;
    orchestrator.set_otp_code(code);
    let view = orchestrator.verify_otp().await;

    println!("{}", view.state.message);
    if !view.otp.verified {
        bail!("Email verification failed");
    }
    Ok(())
}

async fn report(view: &PurchaseView, client: &Client, out: &Path) -> Result<()> {
    match view.state.status {
        PurchaseStatus::Success => println!("✔ {}", view.state.message),
        PurchaseStatus::Failed => bail!("{}", view.state.message),
        PurchaseStatus::Pending if view.state.message.is_empty() => {
            println!("Checkout cancelled");
            return Ok(());
        }
        PurchaseStatus::Pending => bail!("{}", view.state.message),
    }

    match &view.state.download {
        Some(DownloadRef::Link(url)) => println!("Download: {url}"),
        Some(DownloadRef::Files(links)) => {
            for link in links {
                let path = downloads::fetch_to_dir(client, link, out)
                    .await
                    .with_context(|| format!("Failed to download {}", link.url))?;
                info!("Downloaded {}", link.url);
                println!("Saved {}", path.display());
            }
        }
        None => {}
    }
    Ok(())
}

fn print_content(content: &ViewContent) {
    match content {
        ViewContent::Home {
            featured,
            categories,
            total,
            free,
        } => {
            println!("{total} projects, {free} free\n");
            for card in featured {
                print_card(card, false);
            }
            println!("Categories:");
            for c in categories {
                println!("  {:<28} {:>3} ({} free)", c.name, c.count, c.free_count);
            }
        }
        ViewContent::Projects { cards, page_count } => {
            println!("Showing {} projects ({page_count} page(s))\n", cards.len());
            for card in cards {
                print_card(card, false);
            }
        }
        ViewContent::Categories {
            categories,
            selected,
            cards,
        } => {
            for c in categories {
                let marker = if selected.as_deref() == Some(c.name.as_str()) {
                    '*'
                } else {
                    ' '
                };
                println!(
                    "{marker} {:<28} {:>3} ({} free)",
                    c.name, c.count, c.free_count
                );
            }
            if !cards.is_empty() {
                println!();
                for card in cards {
                    print_card(card, false);
                }
            }
        }
        ViewContent::FreeProjects { cards } => {
            if cards.is_empty() {
                println!("No free projects found");
            }
            for card in cards {
                print_card(card, false);
            }
        }
    }
}

fn print_card(card: &ProjectCard, detailed: bool) {
    println!(
        "#{:<4} {}  [{}]  {}",
        card.id,
        card.title,
        card.price,
        card.difficulty.as_str()
    );
    println!("      {}", card.categories.join(", "));
    if detailed {
        println!();
        println!("{}", card.description);
        println!();
        if !card.technologies.is_empty() {
            println!("Technologies: {}", card.technologies.join(", "));
        }
        if let Some(created) = &card.created {
            println!("Added: {created}");
        }
        println!(
            "Includes: source code {}, documentation {}",
            yes_no(card.has_source),
            yes_no(card.has_documentation)
        );
    }
    println!();
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
