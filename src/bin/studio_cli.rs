//! Diagram Studio CLI - headless render and fencing demo
//!
//! A terminal front-end for the engine, useful for trying the render
//! pipeline without a GUI host:
//!
//! Examples:
//!   studio-cli render diagram.mmd -o out.svg   # Compile and export
//!   studio-cli simulate --submissions 5        # Show generation fencing
//!   studio-cli simulate --json                 # Machine-readable events

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::time::Duration;

use diagram_studio::{
    CompileError, DiagramCompiler, DiagramView, DisplaySurface, HeadlessSurface, Size,
    ViewConfig, ViewEvent, VisualArtifact,
};

#[derive(Parser)]
#[command(name = "studio-cli")]
#[command(version = "0.2.0")]
#[command(about = "Diagram Studio CLI - render diagrams headlessly from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a description file and export the SVG
    Render {
        /// Path to the diagram description file
        input: PathBuf,

        /// Output SVG path (defaults to the input with a .svg extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Simulated compiler latency in milliseconds
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,
    },
    /// Fire rapid successive submissions to demonstrate generation fencing
    Simulate {
        /// Number of submissions
        #[arg(long, default_value_t = 3)]
        submissions: u64,

        /// Compiler latency per submission in milliseconds
        #[arg(long, default_value_t = 200)]
        latency_ms: u64,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

/// Stand-in for a real DSL compiler: wraps the description in a fixed-size
/// SVG after a configurable delay. Good enough to exercise the engine.
struct PlaceholderCompiler {
    latency: Duration,
}

impl DiagramCompiler for PlaceholderCompiler {
    fn compile(
        &self,
        id: &str,
        source: &str,
    ) -> BoxFuture<'static, Result<VisualArtifact, CompileError>> {
        let latency = self.latency;
        let id = id.to_owned();
        let source = source.to_owned();
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            if source.trim().is_empty() {
                return Err(CompileError::Syntax {
                    message: "empty description".into(),
                });
            }
            let text = source
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;");
            let svg = format!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" id="{id}" width="2200" height="1400"><text x="40" y="60" font-family="monospace">{text}</text></svg>"#
            );
            Ok(VisualArtifact::new(id, svg))
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    match cli.command {
        Commands::Render {
            input,
            output,
            latency_ms,
        } => render(input, output, latency_ms).await,
        Commands::Simulate {
            submissions,
            latency_ms,
            json,
        } => simulate(submissions, latency_ms, json).await,
    }
}

fn new_view(latency_ms: u64) -> (DiagramView, tokio::sync::mpsc::UnboundedReceiver<ViewEvent>) {
    let compiler = std::sync::Arc::new(PlaceholderCompiler {
        latency: Duration::from_millis(latency_ms),
    });
    let surface = std::sync::Arc::new(HeadlessSurface::new(Size::new(1280.0, 800.0)));
    DiagramView::new(
        compiler,
        surface as std::sync::Arc<dyn DisplaySurface>,
        ViewConfig::default(),
    )
}

async fn render(input: PathBuf, output: Option<PathBuf>, latency_ms: u64) -> Result<()> {
    let description = std::fs::read_to_string(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let output = output.unwrap_or_else(|| input.with_extension("svg"));

    let (view, mut events) = new_view(latency_ms);
    let generation = view.submit(&description);

    while let Some(event) = events.recv().await {
        match event {
            ViewEvent::RenderFailed { message, .. } => {
                anyhow::bail!("render failed: {message}");
            }
            ViewEvent::SettleFinished { generation: g } if g == generation => break,
            _ => {}
        }
    }

    view.export_svg(&output)
        .with_context(|| format!("failed to export {}", output.display()))?;
    let t = view.transform();
    println!("Exported {}", output.display());
    println!(
        "Settled transform: x={:.1} y={:.1} scale={:.2}",
        t.x, t.y, t.scale
    );
    Ok(())
}

async fn simulate(submissions: u64, latency_ms: u64, json: bool) -> Result<()> {
    anyhow::ensure!(submissions > 0, "need at least one submission");
    let (view, mut events) = new_view(latency_ms);

    // Submit faster than compiles complete; only the last generation may win.
    let mut last = 0;
    for i in 1..=submissions {
        last = view.submit(&format!("graph TD; step{i} --> step{}", i + 1));
        tokio::time::sleep(Duration::from_millis(latency_ms / 4)).await;
    }

    while let Some(event) = events.recv().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            match &event {
                ViewEvent::RenderStarted { generation } => {
                    println!("generation {generation}: submitted");
                }
                ViewEvent::RenderSucceeded { generation } => {
                    println!("generation {generation}: rendered");
                }
                ViewEvent::RenderFailed {
                    generation,
                    message,
                } => println!("generation {generation}: failed: {message}"),
                ViewEvent::SettleFinished { generation } => {
                    println!("generation {generation}: settled");
                }
            }
        }
        if event == (ViewEvent::SettleFinished { generation: last }) {
            break;
        }
    }

    let t = view.transform();
    println!(
        "Final: generation {last} displayed at x={:.1} y={:.1} scale={:.2}",
        t.x, t.y, t.scale
    );
    Ok(())
}
