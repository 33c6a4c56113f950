//! # Roomstage CLI
//!
//! Command-line interface for staging products in room photos.
//!
//! ## Usage
//!
//! ```bash
//! # Run the HTTP API
//! GEMINI_API_KEY=... roomstage serve --listen 0.0.0.0:8080
//!
//! # Flatten a layout offline (no API key needed)
//! roomstage composite --room room.jpg --display 800x600 --layout layout.json -o out.jpg
//!
//! # Composite and harmonize in one go
//! roomstage harmonize --room room.jpg --display 800x600 --layout layout.json \
//!     --instructions "put the lamp in the corner" -o staged.png
//! ```
//!
//! A layout file lists placements in display space, bottom-most first:
//!
//! ```json
//! [ { "image": "chair.png", "x": 120, "y": 300, "width": 180 } ]
//! ```

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roomstage::{
    RoomstageError,
    catalog::{CatalogEntry, FALLBACK_DESCRIPTION, ProductId},
    composite,
    config::{
        DEFAULT_BASE_URL, DEFAULT_DESCRIPTION_MODEL, DEFAULT_IMAGE_MODEL, DEFAULT_LISTEN_ADDR,
        ServerConfig, ServiceConfig,
    },
    harmonize::Harmonizer,
    media::ImageData,
    placement::{DEFAULT_WIDTH, Placement, PlacementId, Point, Size},
    server::{self, AppState},
    service::{DescriptionService, GeminiClient},
    session::Session,
};

/// Roomstage - stage product photos in a room and harmonize them
#[derive(Parser, Debug)]
#[command(name = "roomstage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "ROOMSTAGE_LISTEN", default_value = DEFAULT_LISTEN_ADDR)]
        listen: String,

        /// Drop sessions idle for this many seconds
        #[arg(long, default_value = "3600")]
        session_ttl: u64,

        /// Maximum upload size in megabytes
        #[arg(long, default_value = "50")]
        max_upload_mb: usize,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Flatten a room and a layout into one image (offline)
    Composite {
        #[command(flatten)]
        scene: SceneArgs,
    },

    /// Composite a layout and harmonize it with the generation API
    Harmonize {
        #[command(flatten)]
        scene: SceneArgs,

        /// Free-text instructions for the model
        #[arg(long)]
        instructions: Option<String>,

        #[command(flatten)]
        service: ServiceArgs,
    },
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Generation API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// API base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Model used to describe products
    #[arg(long, default_value = DEFAULT_DESCRIPTION_MODEL)]
    description_model: String,

    /// Model used to harmonize composites
    #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
    image_model: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "120")]
    timeout: u64,
}

impl ServiceArgs {
    fn into_config(self) -> ServiceConfig {
        ServiceConfig {
            api_key: self.api_key,
            base_url: self.base_url,
            description_model: self.description_model,
            image_model: self.image_model,
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

#[derive(Args, Debug)]
struct SceneArgs {
    /// Room photograph
    #[arg(long)]
    room: PathBuf,

    /// Size the layout coordinates refer to, e.g. 800x600 (defaults to the room's size)
    #[arg(long, value_parser = parse_display)]
    display: Option<Size>,

    /// JSON layout file
    #[arg(long)]
    layout: PathBuf,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,
}

/// One entry of a layout file.
#[derive(Debug, Deserialize)]
struct LayoutItem {
    /// Product image, relative to the layout file
    image: PathBuf,
    /// Top-left corner in display space
    x: f64,
    y: f64,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    description: Option<String>,
}

fn parse_display(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width: f64 = w.trim().parse().map_err(|_| format!("bad width '{}'", w))?;
    let height: f64 = h.trim().parse().map_err(|_| format!("bad height '{}'", h))?;
    if width <= 0.0 || height <= 0.0 {
        return Err("display size must be positive".to_string());
    }
    Ok(Size::new(width, height))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), RoomstageError> {
    match command {
        Commands::Serve {
            listen,
            session_ttl,
            max_upload_mb,
            service,
        } => {
            let client = Arc::new(GeminiClient::new(service.into_config())?);
            let config = ServerConfig {
                listen_addr: listen,
                max_upload_bytes: max_upload_mb * 1024 * 1024,
                session_ttl: Duration::from_secs(session_ttl),
            };
            server::serve(AppState::new(config, client.clone(), client)).await
        }

        Commands::Composite { scene } => {
            let room = read_image(&scene.room)?;
            let display = display_or_natural(scene.display, &room)?;
            let placements: Vec<Placement> = load_layout(&scene.layout)?
                .into_iter()
                .map(|item| item.placement)
                .collect();

            info!(count = placements.len(), "Compositing layout");
            let out = composite::build_composite(&room, display, &placements).await?;
            std::fs::write(&scene.output, out.bytes())?;
            println!("Saved to {}", scene.output.display());
            Ok(())
        }

        Commands::Harmonize {
            scene,
            instructions,
            service,
        } => {
            let client = Arc::new(GeminiClient::new(service.into_config())?);
            let room = read_image(&scene.room)?;
            let display = display_or_natural(scene.display, &room)?;
            let layout = load_layout(&scene.layout)?;

            let mut session = Session::new();
            session.load_room(room)?;
            session.set_display_size(display)?;

            stage_layout(&mut session, client.clone(), &layout).await?;

            println!("Harmonizing {} product(s)...", session.placements().len());
            session
                .harmonize(&Harmonizer::new(client), instructions.as_deref())
                .await?;

            let download = session.download()?;
            let output = with_extension_of(&scene.output, download.image.extension());
            std::fs::write(&output, download.image.bytes())?;
            println!("Saved to {}", output.display());
            Ok(())
        }
    }
}

/// Add every layout placement to the session in file order.
///
/// Items without a description in the file are described in one batch
/// first; the rest keep the text the file gave them.
async fn stage_layout(
    session: &mut Session,
    describer: Arc<dyn DescriptionService>,
    layout: &[LayoutPlacement],
) -> Result<(), RoomstageError> {
    let pending: Vec<ImageData> = layout
        .iter()
        .filter(|item| !item.described)
        .map(|item| item.placement.image.clone())
        .collect();
    let mut described_ids = if pending.is_empty() {
        Vec::new()
    } else {
        session.ingest_products(describer, pending).await?
    }
    .into_iter();

    for item in layout {
        let product = if item.described {
            session
                .add_products(vec![CatalogEntry::new(
                    item.placement.image.clone(),
                    item.placement.description.clone(),
                )])
                .into_iter()
                .next()
        } else {
            described_ids.next()
        }
        .ok_or_else(|| {
            RoomstageError::Description("Layout item was not catalogued".to_string())
        })?;
        place(session, product, &item.placement)?;
    }
    Ok(())
}

/// Drop a product and move/resize it to match a layout placement.
fn place(
    session: &mut Session,
    product: ProductId,
    target: &Placement,
) -> Result<(), RoomstageError> {
    let Some(id) = session.add_placement(product, target.position)? else {
        return Err(RoomstageError::Image(format!(
            "Product image for '{}' has no readable size",
            target.description
        )));
    };
    session.move_placement(id, target.position)?;
    session.resize_placement(id, target.size.width)?;
    Ok(())
}

fn read_image(path: &Path) -> Result<ImageData, RoomstageError> {
    let bytes = std::fs::read(path).map_err(|e| {
        RoomstageError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    Ok(ImageData::sniff(bytes))
}

fn display_or_natural(display: Option<Size>, room: &ImageData) -> Result<Size, RoomstageError> {
    if let Some(size) = display {
        return Ok(size);
    }
    let (w, h) = room
        .dimensions()
        .ok_or_else(|| RoomstageError::Image("Unreadable room image".to_string()))?;
    Ok(Size::new(w as f64, h as f64))
}

/// A layout entry resolved to a placement.
#[derive(Debug)]
struct LayoutPlacement {
    placement: Placement,
    /// The file supplied a description
    described: bool,
}

/// Read a layout file into placements, in file order.
fn load_layout(path: &Path) -> Result<Vec<LayoutPlacement>, RoomstageError> {
    let text = std::fs::read_to_string(path)?;
    let layout: Vec<LayoutItem> = serde_json::from_str(&text)
        .map_err(|e| RoomstageError::Config(format!("Invalid layout {}: {}", path.display(), e)))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    layout
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let image = read_image(&base.join(&item.image))?;
            let natural = image.dimensions();
            let described = item.description.is_some();
            let description = item
                .description
                .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string());
            let placement = Placement::create(
                PlacementId(i as u64),
                image,
                description,
                Point::default(),
                natural,
            )
            .ok_or_else(|| {
                RoomstageError::Image(format!("Unreadable product {}", item.image.display()))
            })?;
            Ok(LayoutPlacement {
                placement: placement
                    .moved_to(Point::new(item.x, item.y))
                    .with_width(item.width.unwrap_or(DEFAULT_WIDTH)),
                described,
            })
        })
        .collect()
}

fn with_extension_of(path: &Path, ext: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(ext)
    }
}
