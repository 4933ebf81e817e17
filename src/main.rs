use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "retypeset",
    version,
    about = "Redraw translated text over detected regions in the source style"
)]
struct Cli {
    /// Source image the regions were detected on
    #[arg(short = 'i', long = "image")]
    image: PathBuf,

    /// Detector output: JSON array of {"box": [[x, y], ...], "text": "..."}
    #[arg(short = 'g', long = "regions")]
    regions: PathBuf,

    /// JSON array of translated strings: one per region (blank regions' entries are
    /// ignored) or one per region with text (default: keep source text)
    #[arg(short = 't', long = "translations")]
    translations: Option<PathBuf>,

    /// Image with the source text removed, drawn on instead of the source
    #[arg(short = 'c', long = "canvas")]
    canvas: Option<PathBuf>,

    /// Output image (default: <image stem>_translated.png)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Write the per-region style report here instead of stdout
    #[arg(long = "report")]
    report: Option<PathBuf>,

    /// JSON object of style fields applied to every region
    #[arg(long = "style-overrides")]
    style_overrides: Option<PathBuf>,

    /// Source language code. Use "auto" to detect.
    #[arg(short = 'L', long = "source-lang")]
    source_lang: Option<String>,

    /// Cover source text with a flat background color when no canvas is given
    #[arg(long = "solid-background")]
    solid_background: bool,

    /// Always center text instead of using the estimated alignment
    #[arg(long = "no-align")]
    no_align: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    retypeset::logging::init(cli.verbose)?;

    let config = retypeset::Config {
        image: cli.image,
        regions: cli.regions,
        translations: cli.translations,
        canvas: cli.canvas,
        output: cli.output,
        report: cli.report,
        style_overrides: cli.style_overrides,
        source_lang: cli.source_lang,
        solid_background: cli.solid_background,
        no_align: cli.no_align,
        settings_path: cli.read_settings,
        settings_home: None,
    };
    let output = retypeset::run(config)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
