//! fOS Font Control - command-line front end for the font library

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use fos_fonts::{CustomFont, FontLibrary, FontRequirement, FontStyle, FontsConfig, UploadMetadata};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: fos-fontctl [--config FILE] <command> [args]

Commands:
  resolve <requirements.json> [--out DIR]   Resolve fonts, optionally writing them to DIR
  upload <file> [--family F] [--weight W] [--style S]
                                            Validate and store a custom font
  list                                      List custom fonts
  show <id>                                 Show one custom font
  remove <id>                               Remove one custom font
  clear                                     Remove every custom font
  stats                                     Custom font storage usage";

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config = match take_option(&mut args, "--config") {
        Some(path) => FontsConfig::load(Path::new(&path))?,
        None => FontsConfig::from_env()?,
    };

    let Some(command) = (!args.is_empty()).then(|| args.remove(0)) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let fonts = FontLibrary::new(&config);
    smol::block_on(run(&fonts, &command, args))
}

async fn run(fonts: &FontLibrary, command: &str, mut args: Vec<String>) -> anyhow::Result<()> {
    match command {
        "resolve" => {
            let out = take_option(&mut args, "--out").map(PathBuf::from);
            let path = positional(&args, "requirements file")?;
            resolve(fonts, Path::new(path), out.as_deref()).await
        }
        "upload" => {
            let family = take_option(&mut args, "--family");
            let weight = take_option(&mut args, "--weight");
            let style = take_option(&mut args, "--style");
            let path = positional(&args, "font file")?;
            upload(fonts, Path::new(path), family, weight, style).await
        }
        "list" => {
            let custom = fonts.list_custom().await;
            if custom.is_empty() {
                println!("No custom fonts");
            }
            for font in &custom {
                print_font(font);
            }
            Ok(())
        }
        "show" => {
            let id = positional(&args, "font id")?;
            let font = fonts
                .get_custom(id)
                .await
                .with_context(|| format!("no custom font with id {id}"))?;
            print_font(&font);
            println!("  uploaded {}", font.uploaded_at.to_rfc3339());
            Ok(())
        }
        "remove" => {
            let id = positional(&args, "font id")?;
            if !fonts.remove_custom(id).await? {
                bail!("no custom font with id {id}");
            }
            println!("Removed {id}");
            Ok(())
        }
        "clear" => {
            fonts.clear_all_custom().await?;
            println!("Removed all custom fonts");
            Ok(())
        }
        "stats" => {
            let stats = fonts.custom_stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(2);
        }
    }
}

async fn resolve(fonts: &FontLibrary, path: &Path, out: Option<&Path>) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let requirements: Vec<FontRequirement> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    let resolved = fonts
        .resolve_with_progress(&requirements, |current, total, family| {
            info!("[{current}/{total}] {family}");
        })
        .await?;

    if let Some(dir) = out {
        std::fs::create_dir_all(dir)?;
        for font in &resolved {
            let name = format!(
                "{}-{}-{}.{}",
                file_stem(&font.family),
                font.weight,
                font.style,
                font.format.extension()
            );
            std::fs::write(dir.join(&name), &font.bytes)?;
        }
    }

    for font in &resolved {
        println!("{} {} {} ({} bytes)", font.family, font.weight, font.style, font.bytes.len());
    }
    let cache = fonts.cache_stats();
    println!(
        "Resolved {} of {} requirements (cache {}/{}, {} hits)",
        resolved.len(),
        requirements.len(),
        cache.size,
        cache.max_size,
        cache.hits
    );
    Ok(())
}

async fn upload(
    fonts: &FontLibrary,
    path: &Path,
    family: Option<String>,
    weight: Option<String>,
    style: Option<String>,
) -> anyhow::Result<()> {
    let family = family
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_default();
    let weight: u16 = match weight {
        Some(w) => w.parse().with_context(|| format!("invalid weight {w}"))?,
        None => 400,
    };
    let style = match style {
        Some(s) => FontStyle::parse(&s).with_context(|| format!("invalid style {s}"))?,
        None => FontStyle::Normal,
    };

    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;

    // The font's own naming wins over the flags, so check what will be stored
    let validated = fonts
        .validate_upload(&file_name, bytes, &UploadMetadata::new(family, weight, style))
        .await?;
    let meta = &validated.metadata;
    if fonts.is_duplicate(&meta.family, meta.weight.0, meta.style).await {
        bail!(
            "{} {} {} is already uploaded; remove it first",
            meta.family,
            meta.weight,
            meta.style
        );
    }

    let font = fonts.save_validated(&file_name, validated).await?;
    println!("Uploaded {}", font.id);
    print_font(&font);
    Ok(())
}

fn print_font(font: &CustomFont) {
    println!(
        "{}  {} {} {} [{}] {} bytes",
        font.id, font.family, font.weight, font.style, font.format, font.file_size
    );
}

/// Family name reduced to characters safe in a file name
fn file_stem(family: &str) -> String {
    let stem: String = family
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if stem.is_empty() { "font".to_string() } else { stem }
}

/// Remove `--name VALUE` from `args`
fn take_option(args: &mut Vec<String>, name: &str) -> Option<String> {
    let index = args.iter().position(|a| a == name)?;
    args.remove(index);
    (index < args.len()).then(|| args.remove(index))
}

fn positional<'a>(args: &'a [String], what: &str) -> anyhow::Result<&'a str> {
    match args.first() {
        Some(arg) => Ok(arg),
        None => bail!("missing {what}\n\n{USAGE}"),
    }
}
