use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use covergrid::{
    CellIndex, ContentType, CoverConfig, CoverService, CoverSession, DrawPolicy, GridSize,
    ImageLoader, ImageSource, RenderOutcome, ResolutionPolicy, SourceKind, Step,
};
use sha2::Digest as _;

#[derive(Parser, Debug)]
#[command(name = "covergrid", version, about = "Compose grid cover images from track artwork")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the selectable resolutions for a grid size.
    Resolutions(ResolutionsArgs),
    /// Generate a cover non-interactively.
    Render(RenderArgs),
    /// Step-by-step interactive wizard.
    Wizard(WizardArgs),
}

#[derive(Parser, Debug)]
struct ConfigArgs {
    /// JSON config file.
    #[arg(long, env = "COVERGRID_CONFIG")]
    config: Option<PathBuf>,

    /// Image resolution service endpoint.
    #[arg(long, env = "COVERGRID_SERVICE_URL")]
    service_url: Option<String>,

    /// Per-cell placement.
    #[arg(long, value_enum)]
    draw: Option<DrawChoice>,
}

#[derive(Parser, Debug)]
struct ResolutionsArgs {
    /// Grid size (2-5).
    #[arg(long)]
    size: u8,

    #[arg(long)]
    min: Option<u32>,

    #[arg(long)]
    step: Option<u32>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[arg(long = "type", value_enum)]
    content_type: TypeChoice,

    /// Grid size (2-5).
    #[arg(long)]
    size: u8,

    /// Output side length in pixels.
    #[arg(long)]
    resolution: u32,

    /// Cell source in row-major order: a share URL, or `@path` to upload a local image.
    #[arg(long = "cell")]
    cells: Vec<String>,

    /// Playlist share URL.
    #[arg(long)]
    playlist: Option<String>,

    /// Directory to write the PNG into (defaults to the current directory unless --copy).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Copy the result to the system clipboard.
    #[arg(long)]
    copy: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Parser, Debug)]
struct WizardArgs {
    /// Directory used by `download`.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TypeChoice {
    Track,
    Playlist,
}

impl From<TypeChoice> for ContentType {
    fn from(c: TypeChoice) -> Self {
        match c {
            TypeChoice::Track => ContentType::Track,
            TypeChoice::Playlist => ContentType::Playlist,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DrawChoice {
    Cover,
    Stretch,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Command::Resolutions(args) => cmd_resolutions(args),
        Command::Render(args) => cmd_render(args),
        Command::Wizard(args) => cmd_wizard(args),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("covergrid={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<CoverConfig> {
    let mut config = match &args.config {
        Some(path) => CoverConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => CoverConfig::default(),
    };
    if let Some(url) = &args.service_url {
        config.service_url = url.clone();
    }
    if let Some(draw) = args.draw {
        config.draw = match draw {
            DrawChoice::Cover => DrawPolicy::Cover,
            DrawChoice::Stretch => DrawPolicy::Stretch,
        };
    }
    config.validate()?;
    Ok(config)
}

fn current_thread_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")
}

fn cmd_resolutions(args: ResolutionsArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let policy = ResolutionPolicy {
        min: args.min.unwrap_or(config.resolution.min),
        step: args.step.unwrap_or(config.resolution.step),
    };
    policy.validate()?;
    let grid = GridSize::new(args.size)?;
    for r in policy.domain(grid) {
        println!("{r}");
    }
    Ok(())
}

/// `@path` uploads a local file; anything else is a share link.
fn parse_cell(spec: &str) -> anyhow::Result<ImageSource> {
    match spec.strip_prefix('@') {
        Some(path) => ImageSource::from_upload(Path::new(path))
            .with_context(|| format!("upload '{path}'")),
        None => Ok(ImageSource::url(spec)),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let session = CoverSession::connect(&config)?;
    let grid = GridSize::new(args.size)?;

    session.set_content_type(args.content_type.into());
    session.set_grid_size(grid);
    if !session.set_resolution(args.resolution) {
        let valid = config.resolution.domain(grid);
        anyhow::bail!(
            "resolution {} is not available for a {grid}x{grid} grid (choose one of {valid:?})",
            args.resolution
        );
    }

    match args.content_type {
        TypeChoice::Track => {
            if args.cells.len() != grid.cell_count() {
                anyhow::bail!(
                    "a {grid}x{grid} grid needs {} --cell values, got {}",
                    grid.cell_count(),
                    args.cells.len()
                );
            }
            for (i, spec) in args.cells.iter().enumerate() {
                session.set_cell_source(CellIndex::from_linear(i, grid), parse_cell(spec)?);
            }
        }
        TypeChoice::Playlist => {
            let url = args
                .playlist
                .as_deref()
                .context("--playlist is required for --type playlist")?;
            session.set_playlist_url(url);
        }
    }

    let errors = session.validate_all();
    if !errors.is_empty() {
        for err in &errors {
            eprintln!("{}: {err}", err.step());
        }
        anyhow::bail!("selection is incomplete ({} problem(s))", errors.len());
    }

    let rt = current_thread_runtime()?;
    let outcome = rt.block_on(session.generate());
    print_notices(&session);
    if outcome != RenderOutcome::Initialized {
        anyhow::bail!("cover was not generated");
    }

    let out = match (&args.out, args.copy) {
        (Some(dir), _) => Some(dir.clone()),
        (None, false) => Some(PathBuf::from(".")),
        (None, true) => None,
    };
    if let Some(dir) = out {
        let path = session
            .download(&dir)
            .with_context(|| format!("download into '{}'", dir.display()))?;
        let png = std::fs::read(&path).with_context(|| format!("read back '{}'", path.display()))?;
        eprintln!("wrote {}", path.display());
        eprintln!("sha256 {}", sha256_hex(&png));
    }
    if args.copy {
        copy_result(&session)?;
    }
    print_notices(&session);
    Ok(())
}

#[cfg(feature = "clipboard")]
fn copy_result<S: CoverService, L: ImageLoader>(
    session: &CoverSession<S, L>,
) -> anyhow::Result<()> {
    let mut clipboard = covergrid::SystemClipboard::new()?;
    if !session.copy_to_clipboard(&mut clipboard) {
        print_notices(session);
        anyhow::bail!("copy failed");
    }
    Ok(())
}

#[cfg(not(feature = "clipboard"))]
fn copy_result<S: CoverService, L: ImageLoader>(
    _session: &CoverSession<S, L>,
) -> anyhow::Result<()> {
    anyhow::bail!("built without clipboard support")
}

fn print_notices<S: CoverService, L: ImageLoader>(session: &CoverSession<S, L>) {
    for notice in session.take_notices() {
        eprintln!("{notice}");
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn cmd_wizard(args: WizardArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let session = CoverSession::connect(&config)?;
    let rt = current_thread_runtime()?;
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    run_wizard(&session, &rt, &mut input, &mut output, &args.out)
}

enum Reply {
    Line(String),
    Back,
    Quit,
}

fn prompt(input: &mut impl BufRead, output: &mut impl Write, text: &str) -> anyhow::Result<Reply> {
    write!(output, "{text}> ")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(Reply::Quit);
    }
    Ok(match line.trim() {
        "back" => Reply::Back,
        "quit" | "exit" => Reply::Quit,
        other => Reply::Line(other.to_string()),
    })
}

fn run_wizard<S: CoverService, L: ImageLoader>(
    session: &CoverSession<S, L>,
    rt: &tokio::runtime::Runtime,
    input: &mut impl BufRead,
    output: &mut impl Write,
    out_dir: &Path,
) -> anyhow::Result<()> {
    writeln!(output, "type `back` to return to the previous step, `quit` to exit")?;
    loop {
        let step = session.wizard().step();
        writeln!(output, "\n== {step} ==")?;

        let reply = match step {
            Step::ContentType => prompt(input, output, "track or playlist")?,
            Step::GridSize => prompt(input, output, "grid size (2-5)")?,
            Step::Resolution => {
                let options = session.wizard().resolutions();
                prompt(input, output, &format!("resolution {options:?}"))?
            }
            Step::Sources => fill_sources(session, input, output)?,
            Step::Generate => {
                let outcome = rt.block_on(session.generate());
                print_notices(session);
                if outcome == RenderOutcome::Initialized {
                    writeln!(output, "cover ready")?;
                }
                if !after_generate(session, input, output, out_dir)? {
                    return Ok(());
                }
                continue;
            }
        };

        let line = match reply {
            Reply::Quit => return Ok(()),
            Reply::Back => {
                session.back();
                continue;
            }
            Reply::Line(line) => line,
        };

        match step {
            Step::ContentType => match line.parse::<ContentType>() {
                Ok(t) => {
                    session.set_content_type(t);
                }
                Err(err) => writeln!(output, "{err}")?,
            },
            Step::GridSize => match line.parse::<u8>().ok().map(GridSize::new) {
                Some(Ok(g)) => {
                    session.set_grid_size(g);
                }
                _ => writeln!(output, "enter a number from 2 to 5")?,
            },
            Step::Resolution => {
                let accepted = match line.parse::<u32>() {
                    Ok(r) => session.set_resolution(r) || session.wizard().resolution() == Some(r),
                    Err(_) => false,
                };
                if !accepted {
                    writeln!(output, "pick one of the listed resolutions")?;
                }
            }
            Step::Sources | Step::Generate => {}
        }

        if let Err(err) = session.advance() {
            writeln!(output, "{err}")?;
        }
    }
}

/// Prompt for every source. An empty line keeps a cell's current valid value.
fn fill_sources<S: CoverService, L: ImageLoader>(
    session: &CoverSession<S, L>,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<Reply> {
    let content_type = session.wizard().content_type();
    match content_type {
        Some(ContentType::Playlist) => {
            let current = session.wizard().playlist_url().unwrap_or_default().to_string();
            match prompt(input, output, &format!("playlist URL [{current}]"))? {
                Reply::Line(url) if url.is_empty() => {}
                Reply::Line(url) => {
                    session.set_playlist_url(url);
                }
                other => return Ok(other),
            }
        }
        Some(ContentType::Track) => {
            let Some(cells) = session.cells() else {
                return Ok(Reply::Line(String::new()));
            };
            let Some(grid) = cells.grid() else {
                return Ok(Reply::Line(String::new()));
            };
            for (i, cell) in cells.iter().enumerate() {
                let index = CellIndex::from_linear(i, grid);
                let current = match cell.kind {
                    SourceKind::File => cell.file_name.as_deref().unwrap_or("uploaded file"),
                    SourceKind::Url => cell.value.as_str(),
                };
                let text = format!("cell {index}: URL or @file [{current}]");
                match prompt(input, output, &text)? {
                    Reply::Line(spec) if spec.is_empty() => {}
                    Reply::Line(spec) => match parse_cell(&spec) {
                        Ok(source) => {
                            session.set_cell_source(index, source);
                        }
                        Err(err) => writeln!(output, "{err:#}")?,
                    },
                    other => return Ok(other),
                }
            }
        }
        None => {}
    }
    for err in session.validate_all() {
        writeln!(output, "{err}")?;
    }
    Ok(Reply::Line(String::new()))
}

/// Post-generation commands. Returns `false` on quit.
fn after_generate<S: CoverService, L: ImageLoader>(
    session: &CoverSession<S, L>,
    input: &mut impl BufRead,
    output: &mut impl Write,
    out_dir: &Path,
) -> anyhow::Result<bool> {
    loop {
        match prompt(input, output, "download, copy, retry, reset")? {
            Reply::Quit => return Ok(false),
            Reply::Back => {
                session.back();
                return Ok(true);
            }
            Reply::Line(cmd) => match cmd.as_str() {
                "download" => {
                    if let Some(path) = session.download(out_dir) {
                        writeln!(output, "wrote {}", path.display())?;
                    }
                }
                "copy" => {
                    if let Err(err) = copy_result(session) {
                        writeln!(output, "{err:#}")?;
                    }
                }
                "retry" => return Ok(true),
                "reset" => {
                    session.reset();
                    return Ok(true);
                }
                other => writeln!(output, "unknown command '{other}'")?,
            },
        }
        print_notices(session);
    }
}
