use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use devshot::mockup::Compositor;
use devshot::{CaptureTiming, DeviceCatalog, ImageFormat, Pipeline, PipelineConfig, TemplateRegistry};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "devshot", version, about = "Capture a page at device sizes and build device mockups")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in device profiles
    Devices,
    /// Capture a URL and composite each screenshot into its device frame
    Run {
        #[arg(long)]
        url: String,
        /// Device class to capture (repeatable)
        #[arg(long = "device", default_values_t = ["mobile".to_string(), "tablet".to_string(), "desktop".to_string()])]
        devices: Vec<String>,
        /// Output root; screenshots go to OUT/normal and mockups to OUT/mockup
        #[arg(long, default_value = "screenshots")]
        out: PathBuf,
        #[arg(long, default_value_t = 1000)]
        settle_ms: u64,
        #[arg(long, default_value_t = 50)]
        scroll_step_ms: u64,
        #[arg(long, default_value_t = 120_000)]
        timeout_ms: u64,
        #[arg(long, default_value = "png")]
        format: ImageFormat,
        /// Directory holding a frames.json manifest
        #[arg(long, env = "DEVSHOT_FRAMES")]
        frames: Option<PathBuf>,
        /// Skip the local headless browser
        #[arg(long)]
        no_browser: bool,
        /// Skip the hosted screenshot API
        #[arg(long)]
        no_remote: bool,
    },
    /// Composite one existing screenshot
    Compose {
        #[arg(long)]
        screenshot: PathBuf,
        /// Device class of the screenshot
        #[arg(long)]
        device: String,
        #[arg(long, default_value = "screenshots/mockup")]
        out: PathBuf,
        #[arg(long, env = "DEVSHOT_FRAMES")]
        frames: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Devices => {
            let catalog = DeviceCatalog::builtin();
            println!("{}", serde_json::to_string_pretty(catalog.profiles())?);
        }
        Command::Run {
            url,
            devices,
            out,
            settle_ms,
            scroll_step_ms,
            timeout_ms,
            format,
            frames,
            no_browser,
            no_remote,
        } => {
            let timing = CaptureTiming {
                page_settle_delay_ms: settle_ms,
                scroll_step_delay_ms: scroll_step_ms,
                total_timeout_ms: timeout_ms,
            };
            timing.validate()?;

            let config = PipelineConfig {
                screenshots_dir: out.join("normal"),
                mockups_dir: out.join("mockup"),
                format,
                frames_dir: frames,
                use_browser: !no_browser,
                use_remote: !no_remote,
                ..Default::default()
            };
            let pipeline = Pipeline::with_default_backends(config).context("failed to set up the pipeline")?;
            let outcomes = pipeline
                .run(&url, &devices, &timing)
                .with_context(|| format!("capturing {} failed", url))?;
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
        Command::Compose { screenshot, device, out, frames } => {
            let templates = match frames {
                Some(dir) => TemplateRegistry::load_dir(&dir)?,
                None => TemplateRegistry::builtin(),
            };
            let result = Compositor::new(Arc::new(templates)).compose(&screenshot, &device, &out);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                bail!("mockup failed: {}", result.error.unwrap_or_default());
            }
        }
    }
    Ok(())
}
