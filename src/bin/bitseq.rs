use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bitseq", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print canvas size, frame count and keyframe positions.
    Info(InfoArgs),
    /// Composite a single frame as a PNG.
    Frame(FrameArgs),
    /// Play a frame range sequentially, printing a content hash per frame.
    Play(PlayArgs),
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Input sequence manifest JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input sequence manifest JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Input sequence manifest JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// First frame (inclusive).
    #[arg(long, default_value_t = 0)]
    from: u64,

    /// Last frame (inclusive); defaults to the final frame.
    #[arg(long)]
    to: Option<u64>,

    /// Also write every frame as `frame_NNNNN.png` into this directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Info(args) => cmd_info(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Play(args) => cmd_play(args),
    }
}

fn open_reader(
    in_path: &Path,
    perf: Arc<bitseq::Performance>,
) -> anyhow::Result<bitseq::SequenceReader> {
    let seq = bitseq::load_manifest(in_path)
        .with_context(|| format!("load sequence '{}'", in_path.display()))?;
    Ok(bitseq::SequenceReader::with_opts(
        seq,
        Arc::new(bitseq::ImagePatchCodec),
        perf,
        bitseq::ReaderOpts::default(),
    ))
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let seq = bitseq::load_manifest(&args.in_path)?;
    let keyframes: Vec<String> = seq
        .frames()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_keyframe)
        .map(|(i, _)| i.to_string())
        .collect();
    let patches: usize = seq.frames().iter().map(|f| f.patches.len()).sum();

    println!("canvas:     {}x{}", seq.width(), seq.height());
    println!("frames:     {}", seq.len());
    println!("frame_rate: {}", seq.frame_rate());
    println!("static:     {}", seq.static_content());
    println!("patches:    {patches}");
    println!("keyframes:  {}", keyframes.join(","));
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let perf = Arc::new(bitseq::Performance::new());
    let reader = open_reader(&args.in_path, perf.clone())?;
    let frame = reader.read_frame(bitseq::FrameIndex(args.frame))?;

    write_png(&args.out, &frame)?;
    eprintln!(
        "wrote {} ({} us decoding)",
        args.out.display(),
        perf.stats().image_decoding_time / 1_000
    );
    Ok(())
}

fn cmd_play(args: PlayArgs) -> anyhow::Result<()> {
    let perf = Arc::new(bitseq::Performance::new());
    let reader = open_reader(&args.in_path, perf.clone())?;
    let len = reader.sequence().len() as u64;
    if len == 0 {
        anyhow::bail!("sequence has no frames");
    }
    let to = args.to.unwrap_or(len - 1);
    if args.from > to || to >= len {
        anyhow::bail!("invalid range {}..={to} for {len} frames", args.from);
    }

    for f in args.from..=to {
        let guard = reader.get_frame(bitseq::FrameIndex(f))?;
        println!("{f:>6} {:016x}", guard.content_hash());
        if let Some(dir) = &args.out_dir {
            let frame = guard.to_frame();
            drop(guard);
            write_png(&dir.join(format!("frame_{f:05}.png")), &frame)?;
        }
    }

    let stats = perf.stats();
    eprintln!(
        "played {} frames, {} decode passes, {} us decoding",
        to - args.from + 1,
        stats.decode_calls,
        stats.image_decoding_time / 1_000
    );
    Ok(())
}

fn write_png(out: &Path, frame: &bitseq::FrameRGBA) -> anyhow::Result<()> {
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        out,
        &frame.to_straight_rgba8(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out.display()))
}
