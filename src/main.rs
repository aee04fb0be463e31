use std::io::Write as _;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use petafs::block::layout::Layout;
use petafs::fs::{FileSystem, FsError, SeekOrigin};
use petafs::store::{BlobStore, LocalFsBlobStore, MemoryBlobStore};
use petafs::utils::hexdump;

#[derive(Parser)]
#[command(name = "petafs", version, about = "PetaFS blob-backed file system CLI")]
struct Cli {
    /// Layout overrides as a JSON file ({"max_blob_size": .., "dir_heads": ..}).
    #[arg(long, global = true, value_name = "FILE")]
    layout: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Exercise the file system in-process against a throwaway store.
    Demo,
    /// Store bytes under a name.
    Write(WriteArgs),
    /// Print a file's contents.
    Read(ReadArgs),
    /// Remove a file by name.
    Remove(RemoveArgs),
    /// Hexdump one blob of the backing store.
    Dump(DumpArgs),
}

#[derive(Args)]
struct StoreArgs {
    /// Directory used as the blob store.
    #[arg(long, value_name = "DIR", default_value = "./petafs-data")]
    data_dir: PathBuf,
}

#[derive(Args)]
struct WriteArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// File name inside the file system.
    name: String,

    /// Read the payload from this path.
    #[arg(long, value_name = "PATH", conflicts_with = "text")]
    input: Option<PathBuf>,

    /// Use this literal as the payload.
    #[arg(long)]
    text: Option<String>,
}

#[derive(Args)]
struct ReadArgs {
    #[command(flatten)]
    store: StoreArgs,

    name: String,

    /// Save to this path instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RemoveArgs {
    #[command(flatten)]
    store: StoreArgs,

    name: String,
}

#[derive(Args)]
struct DumpArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Blob id to dump.
    blob_id: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "petafs=info".to_string()))
        .init();

    let cli = Cli::parse();
    let layout = load_layout(cli.layout.as_deref())?;

    match cli.cmd {
        Command::Demo => demo_cmd(layout),
        Command::Write(args) => write_cmd(layout, args),
        Command::Read(args) => read_cmd(layout, args),
        Command::Remove(args) => remove_cmd(layout, args),
        Command::Dump(args) => dump_cmd(args),
    }
}

fn load_layout(path: Option<&Path>) -> anyhow::Result<Layout> {
    let layout = match path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Layout::default(),
    };
    if let Err(e) = layout.validate() {
        anyhow::bail!("invalid layout: {e}");
    }
    Ok(layout)
}

fn open_fs(layout: Layout, data_dir: &Path) -> anyhow::Result<FileSystem> {
    let store = BlobStore::new(LocalFsBlobStore::open(data_dir)?);
    Ok(FileSystem::init(store, layout)?)
}

/// The in-process exercise the original sample main performed, end to end.
fn demo_cmd(layout: Layout) -> anyhow::Result<()> {
    let mut fs = FileSystem::init(BlobStore::new(MemoryBlobStore::new()), layout)?;

    let mut h = fs.open("abcdef.txt", "rw")?;
    let written = fs.write(&mut h, b"hello disk!")?;
    println!("wrote {written} bytes, cursor at {}", fs.tell(&h));
    fs.close(h);

    let mut h = fs.open("abcdef.txt", "r")?;
    let mut buf = [0u8; 64];
    let read = fs.read(&mut h, &mut buf)?;
    println!(
        "read {read} bytes back: {:?}",
        String::from_utf8_lossy(&buf[..read])
    );
    fs.seek(&mut h, -6, SeekOrigin::End)?;
    let read = fs.read(&mut h, &mut buf)?;
    println!("tail reads {:?}", String::from_utf8_lossy(&buf[..read]));
    fs.close(h);

    fs.remove("abcdef.txt")?;
    println!("removed; reopen gives {:?}", fs.open("abcdef.txt", "r").err());

    let stats = fs.cache_stats();
    println!(
        "cache: {} hits, {} misses, {} live handles",
        stats.hits, stats.misses, stats.live
    );
    fs.finalize()?;
    Ok(())
}

fn write_cmd(layout: Layout, args: WriteArgs) -> anyhow::Result<()> {
    let payload = match (&args.input, &args.text) {
        (Some(path), None) => std::fs::read(path)?,
        (None, Some(text)) => text.clone().into_bytes(),
        _ => anyhow::bail!("pass exactly one of --input or --text"),
    };

    let mut fs = open_fs(layout, &args.store.data_dir)?;
    let mut h = fs.open(&args.name, "w")?;
    let written = fs.write(&mut h, &payload)?;
    fs.close(h);
    fs.finalize()?;
    println!("wrote {written} bytes to {}", args.name);
    Ok(())
}

fn read_cmd(layout: Layout, args: ReadArgs) -> anyhow::Result<()> {
    let mut fs = open_fs(layout, &args.store.data_dir)?;
    let mut h = match fs.open(&args.name, "r") {
        Ok(h) => h,
        Err(FsError::NotFound) => anyhow::bail!("no such file: {}", args.name),
        Err(e) => return Err(e.into()),
    };

    let mut contents = Vec::new();
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        let n = fs.read(&mut h, &mut chunk)?;
        if n == 0 {
            break;
        }
        contents.extend_from_slice(&chunk[..n]);
    }
    fs.close(h);
    fs.finalize()?;

    match args.output {
        Some(path) => std::fs::write(path, &contents)?,
        None => std::io::stdout().write_all(&contents)?,
    }
    Ok(())
}

fn remove_cmd(layout: Layout, args: RemoveArgs) -> anyhow::Result<()> {
    let mut fs = open_fs(layout, &args.store.data_dir)?;
    match fs.remove(&args.name) {
        Ok(()) => println!("removed {}", args.name),
        Err(FsError::NotFound) => anyhow::bail!("no such file: {}", args.name),
        Err(e) => return Err(e.into()),
    }
    fs.finalize()?;
    Ok(())
}

fn dump_cmd(args: DumpArgs) -> anyhow::Result<()> {
    let store = BlobStore::new(LocalFsBlobStore::open(&args.store.data_dir)?);
    let blob = store.get_blob(args.blob_id);
    let bytes = blob.read()?;
    if bytes.is_empty() {
        println!("blob {} is empty", args.blob_id);
    } else {
        print!("{}", hexdump(&bytes));
    }
    Ok(())
}
