use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use faceswap_client::{Config, FaceSwapClient, SlotKind, Workspace};
use faceswap_core::{BoxFormat, DetectedFace, ImageFile};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "faceswap", about = "Swap a face from one photo into another via a remote face-swap service")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Service base URL (overrides config file and environment)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// How to read detector boxes: auto, corners or extent
    #[arg(long, global = true)]
    box_format: Option<BoxFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces in an image
    Detect {
        image: PathBuf,
        /// Print faces as JSON
        #[arg(long)]
        json: bool,
        /// Write each face thumbnail into this directory
        #[arg(long)]
        thumbnails: Option<PathBuf>,
    },
    /// Put a face from SOURCE onto a face in TARGET
    Swap {
        /// Photo providing the face
        source: PathBuf,
        /// Photo the face is placed into
        target: PathBuf,
        /// Face number in the source photo, as listed by `detect`
        #[arg(long)]
        source_face: Option<u32>,
        /// Face number in the target photo, as listed by `detect`
        #[arg(long)]
        target_face: Option<u32>,
        /// Where to write the result image
        #[arg(short, long, default_value = "face-swap-result.jpg")]
        output: PathBuf,
        /// Also write the unmodified target image here, for before/after comparison
        #[arg(long)]
        before: Option<PathBuf>,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Detect {
            image,
            json,
            thumbnails,
        } => {
            let client = FaceSwapClient::new(config)?;
            run_detect(&client, &image, json, thumbnails.as_deref()).await?;
        }
        Commands::Swap {
            source,
            target,
            source_face,
            target_face,
            output,
            before,
        } => {
            let client = FaceSwapClient::new(config)?;
            let mut ws = Workspace::new();
            let s = ws.upload(SlotKind::Source, ImageFile::open(&source)?);
            let t = ws.upload(SlotKind::Target, ImageFile::open(&target)?);

            println!("Detecting faces...");
            let (source_faces, target_faces) = tokio::join!(s.run(&client), t.run(&client));
            ws.apply_detection(&s, source_faces)?;
            ws.apply_detection(&t, target_faces)?;

            choose_face(&mut ws, SlotKind::Source, source_face)?;
            choose_face(&mut ws, SlotKind::Target, target_face)?;

            println!("Swapping faces...");
            let result = ws.swap(&client).await?;
            std::fs::write(&output, result.bytes())
                .with_context(|| format!("cannot write {}", output.display()))?;
            println!("Result written to {}", output.display());

            if let Some(before) = before {
                let original = ws
                    .slot(SlotKind::Target)
                    .file()
                    .context("target image missing")?;
                std::fs::write(&before, original.bytes())
                    .with_context(|| format!("cannot write {}", before.display()))?;
                println!("Original written to {}", before.display());
            }
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    if let Some(url) = &cli.endpoint {
        config.endpoint_base_url = url.clone();
    }
    if let Some(format) = cli.box_format {
        config.box_format = format;
    }
    Ok(config)
}

async fn run_detect(
    client: &FaceSwapClient,
    image: &Path,
    json: bool,
    thumbnails: Option<&Path>,
) -> Result<()> {
    let file = ImageFile::open(image)?;
    let faces = client
        .detect_faces(&file)
        .await
        .with_context(|| format!("could not detect faces in {}", image.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&faces)?);
    } else if faces.is_empty() {
        println!("No faces were detected in this image.");
    } else {
        println!("Detected {} face(s):", faces.len());
        for face in &faces {
            print_face(face);
        }
    }

    if let Some(dir) = thumbnails {
        std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
        for face in &faces {
            let path = write_data_uri(dir, &format!("face-{}", face.id), &face.thumbnail_url)?;
            tracing::debug!(path = %path.display(), "thumbnail written");
        }
    }

    Ok(())
}

fn print_face(face: &DetectedFace) {
    let b = &face.bbox;
    println!(
        "  {} (id {}): x={:.4} y={:.4} w={:.4} h={:.4}",
        face.label(),
        face.id,
        b.x,
        b.y,
        b.width,
        b.height
    );
}

/// Select the requested face (1-based, as printed by `detect`), or rely on the
/// automatic selection when the slot has exactly one face.
fn choose_face(ws: &mut Workspace, kind: SlotKind, number: Option<u32>) -> Result<()> {
    let count = ws.slot(kind).faces().map_or(0, <[DetectedFace]>::len);
    if count == 0 {
        bail!("no faces were detected in the {kind} image");
    }

    match number {
        Some(0) => bail!("face numbers start at 1"),
        Some(n) if n as usize > count => {
            bail!("no face {n} in the {kind} image; it has {count} face(s)")
        }
        Some(n) => ws.select_face(kind, &(n - 1).to_string())?,
        None if ws.slot(kind).selected_face_id().is_none() => {
            bail!("detected {count} faces in the {kind} image; pick one with --{kind}-face <1-{count}>")
        }
        None => {}
    }
    Ok(())
}

/// Decode a `data:<mime>;base64,` URI into `<dir>/<stem>.<ext>`.
fn write_data_uri(dir: &Path, stem: &str, uri: &str) -> Result<PathBuf> {
    let (header, payload) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .context("thumbnail is not a base64 data URI")?;
    let ext = match header {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    };
    let path = dir.join(format!("{stem}.{ext}"));
    let bytes = STANDARD.decode(payload).context("thumbnail payload is not valid base64")?;
    std::fs::write(&path, bytes).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceswap_core::BoundingBox;

    fn workspace_with_faces(kind: SlotKind, count: usize) -> Workspace {
        let faces = (0..count)
            .map(|i| DetectedFace {
                id: i.to_string(),
                bbox: BoundingBox { x: 0.1, y: 0.1, width: 0.2, height: 0.2 },
                thumbnail_url: String::new(),
            })
            .collect();
        let mut ws = Workspace::new();
        let ticket = ws.upload(kind, ImageFile::new("photo.jpg", vec![0xff, 0xd8]));
        ws.apply_detection(&ticket, Ok(faces)).unwrap();
        ws
    }

    #[test]
    fn test_choose_face_is_one_based() {
        let mut ws = workspace_with_faces(SlotKind::Source, 3);
        choose_face(&mut ws, SlotKind::Source, Some(3)).unwrap();
        assert_eq!(ws.slot(SlotKind::Source).selected_face_id(), Some("2"));
    }

    #[test]
    fn test_choose_face_out_of_range_reports_entered_number() {
        let mut ws = workspace_with_faces(SlotKind::Source, 3);
        let err = choose_face(&mut ws, SlotKind::Source, Some(4)).unwrap_err();
        assert_eq!(err.to_string(), "no face 4 in the source image; it has 3 face(s)");
        assert!(ws.slot(SlotKind::Source).selected_face_id().is_none());
    }

    #[test]
    fn test_choose_face_zero_rejected() {
        let mut ws = workspace_with_faces(SlotKind::Target, 2);
        let err = choose_face(&mut ws, SlotKind::Target, Some(0)).unwrap_err();
        assert!(err.to_string().contains("start at 1"));
    }

    #[test]
    fn test_choose_face_single_face_needs_no_number() {
        let mut ws = workspace_with_faces(SlotKind::Target, 1);
        choose_face(&mut ws, SlotKind::Target, None).unwrap();
        assert_eq!(ws.slot(SlotKind::Target).selected_face_id(), Some("0"));
    }
}
