use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tracing::info;

use filter_engine::{
    BlurType, EngineConfig, FilterEngine, FilterState, RenderSurface,
    engine::InlineDispatcher,
};

const BITMAP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BlurArg {
    Radial,
    Linear,
}

impl From<BlurArg> for BlurType {
    fn from(value: BlurArg) -> Self {
        match value {
            BlurArg::Radial => BlurType::Radial,
            BlurArg::Linear => BlurType::Linear,
        }
    }
}

/// Render a photo through the filter chain without a window.
#[derive(Debug, Parser)]
#[command(name = "filter-engine", version)]
struct Cli {
    /// Image to filter.
    input: PathBuf,

    /// Filter state JSON. Defaults to the image's `.filters/` sidecar.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Output PNG. Defaults to `<stem>.filtered.png` beside the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Render with neutral parameters.
    #[arg(long)]
    show_original: bool,

    #[arg(long, value_enum)]
    blur: Option<BlurArg>,

    #[arg(long, allow_hyphen_values = true)]
    enhance: Option<i32>,
    #[arg(long, allow_hyphen_values = true)]
    exposure: Option<i32>,
    #[arg(long, allow_hyphen_values = true)]
    contrast: Option<i32>,
    #[arg(long, allow_hyphen_values = true)]
    warmth: Option<i32>,
    #[arg(long, allow_hyphen_values = true)]
    saturation: Option<i32>,
    #[arg(long, allow_hyphen_values = true)]
    vignette: Option<i32>,
    #[arg(long, allow_hyphen_values = true)]
    sharpen: Option<i32>,
}

impl Cli {
    fn resolve_state(&self) -> anyhow::Result<FilterState> {
        let mut state = match &self.state {
            Some(path) => FilterState::from_file(path)?,
            None => FilterState::load(&self.input).unwrap_or_default(),
        };
        self.apply_overrides(&mut state);
        Ok(state)
    }

    fn apply_overrides(&self, state: &mut FilterState) {
        let overrides = [
            (self.enhance, &mut state.enhance),
            (self.exposure, &mut state.exposure),
            (self.contrast, &mut state.contrast),
            (self.warmth, &mut state.warmth),
            (self.saturation, &mut state.saturation),
            (self.vignette, &mut state.vignette),
            (self.sharpen, &mut state.sharpen),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value.clamp(-100, 100);
            }
        }
        if let Some(blur) = self.blur {
            state.blur_type = blur.into();
        }
    }

    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.input))
    }
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}.filtered.png"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load();

    let image = image::open(&cli.input)
        .with_context(|| format!("failed to open {}", cli.input.display()))?
        .into_rgba8();
    let (width, height) = image.dimensions();
    let state = Arc::new(cli.resolve_state()?);
    info!(width, height, blur = ?state.blur_type, "rendering");

    let engine = FilterEngine::new(
        RenderSurface::offscreen(width, height),
        None,
        Arc::clone(&state),
        Arc::new(InlineDispatcher),
        &config,
    )
    .context("failed to start render engine")?;

    let _ = engine.resume_with_data(image, state);
    if cli.show_original {
        let _ = engine.set_show_original(true);
    }
    let (tx, rx) = crossbeam_channel::bounded(1);
    let _ = engine.get_bitmap(move |bitmap| {
        let _ = tx.send(bitmap);
    });

    let bitmap = rx
        .recv_timeout(BITMAP_TIMEOUT)
        .context("render engine did not answer the bitmap request")?;
    drop(engine);
    let Some(bitmap) = bitmap else {
        bail!("render engine produced no image; is a GPU adapter available?");
    };

    let output = cli.output_path();
    bitmap
        .save(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(output = %output.display(), "saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_sits_beside_input() {
        assert_eq!(
            default_output_path(Path::new("/photos/beach.jpg")),
            PathBuf::from("/photos/beach.filtered.png")
        );
    }

    #[test]
    fn overrides_clamp_and_set_blur() {
        let cli = Cli::parse_from([
            "filter-engine",
            "in.png",
            "--exposure",
            "150",
            "--warmth",
            "-20",
            "--blur",
            "linear",
        ]);
        let mut state = FilterState::default();
        state.contrast = 12;
        cli.apply_overrides(&mut state);
        assert_eq!(state.exposure, 100);
        assert_eq!(state.warmth, -20);
        assert_eq!(state.contrast, 12);
        assert_eq!(state.blur_type, BlurType::Linear);
    }

    #[test]
    fn explicit_output_wins() {
        let cli = Cli::parse_from(["filter-engine", "a.png", "-o", "b.png"]);
        assert_eq!(cli.output_path(), PathBuf::from("b.png"));
    }
}
