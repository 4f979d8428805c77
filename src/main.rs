//! GCL codec CLI
//!
//! Command-line tool for decompiling and recompiling game script files:
//! GCX procedure files from the stage directory, the RADIO.DAT dialog
//! archive, and the DEMO.DAT container.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use tracing::{info, warn};
use walkdir::WalkDir;

use gcl_codec::{
    compile_gcx, compile_radio, decompile_gcx, decompile_radio, pack_demo, unpack_demo,
    CodecOptions, CrossRef, DatEntry, Dialog, GcxFile,
};

/// Decompile/recompile game script files.
///
/// Exactly one of --decompile, --compile, or --test must be given.
#[derive(Parser, Debug)]
#[command(name = "gcl-tool")]
#[command(author, version, about, long_about = None)]
#[command(group(clap::ArgGroup::new("mode").required(true)))]
struct Args {
    /// Decompile game files from this directory
    #[arg(short, long, value_name = "PATH", group = "mode")]
    decompile: Option<PathBuf>,

    /// Compile decompiled files from this directory
    #[arg(short, long, value_name = "PATH", group = "mode")]
    compile: Option<PathBuf>,

    /// Round-trip every file under the given directories and report
    /// whether the recompiled bytes match
    #[arg(short, long, value_name = "PATH", num_args = 1.., group = "mode")]
    test: Option<Vec<PathBuf>>,

    /// Output directory for decompiled/recompiled files
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Do not align RADIO dialogs to 0x800 boundaries
    #[arg(long)]
    no_padding: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("gcl_codec=debug,gcl_tool=debug,info")
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter("info").init();
    }

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<bool> {
    let padding = !args.no_padding;
    if let Some(input) = &args.decompile {
        let output = args
            .output
            .as_ref()
            .context("missing --output path for --decompile")?;
        decompile_tree(input, output, padding)?;
        Ok(true)
    } else if let Some(input) = &args.compile {
        let output = args
            .output
            .as_ref()
            .context("missing --output path for --compile")?;
        compile_tree(input, output, padding)?;
        Ok(true)
    } else if let Some(inputs) = &args.test {
        let mut matched = 0usize;
        let mut total = 0usize;
        for input in inputs {
            let (m, t) = test_tree(input, padding)?;
            matched += m;
            total += t;
        }
        println!("{matched}/{total} files matched");
        Ok(matched == total)
    } else {
        unreachable!("clap enforces the mode group")
    }
}

/// Options for a game directory: the PC release ships no VOX archive.
fn options_for(input: &Path, padding: bool) -> CodecOptions {
    let has_vox = find_file(input, "VOX.DAT").is_some();
    CodecOptions {
        padding,
        is_pc_version: Some(!has_vox),
    }
}

/// Locate a file by name, tolerating lowercase spellings.
fn find_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let upper = dir.join(name);
    if upper.is_file() {
        return Some(upper);
    }
    let lower = dir.join(name.to_lowercase());
    lower.is_file().then_some(lower)
}

/// Locate a subdirectory by name, tolerating lowercase spellings.
fn find_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    let upper = dir.join(name);
    if upper.is_dir() {
        return Some(upper);
    }
    let lower = dir.join(name.to_lowercase());
    lower.is_dir().then_some(lower)
}

fn decompile_tree(input: &Path, output: &Path, padding: bool) -> anyhow::Result<()> {
    info!("decompiling {} to {}", input.display(), output.display());
    let options = options_for(input, padding);

    // Unpack DEMO.DAT if present.
    let mut demo_entries = Vec::new();
    if let Some(demo_path) = find_file(input, "DEMO.DAT") {
        info!("unpacking {}", demo_path.display());
        let bytes = fs::read(&demo_path)?;
        demo_entries = unpack_demo(&bytes)?;
        let demo_dir = output.join("DEMO");
        fs::create_dir_all(&demo_dir)?;
        for entry in &demo_entries {
            fs::write(demo_dir.join(&entry.name), &entry.data)?;
        }
    }

    // Decompile RADIO.DAT if present.
    let mut dialogs: Vec<Dialog> = Vec::new();
    if let Some(radio_path) = find_file(input, "RADIO.DAT") {
        info!("decompiling {}", radio_path.display());
        let bytes = fs::read(&radio_path)?;
        dialogs = decompile_radio(&bytes, &CrossRef::new(), &options)
            .with_context(|| format!("decompiling {}", radio_path.display()))?;
        let radio_dir = output.join("RADIO");
        fs::create_dir_all(&radio_dir)?;
        for dialog in &dialogs {
            let path = radio_dir.join(format!("{}.json", dialog.name));
            fs::write(path, serde_json::to_string(dialog)?)?;
        }
    }

    let mut xref = CrossRef::new().with_radio_dialogs(&dialogs);
    if !demo_entries.is_empty() {
        xref = xref.with_demo(&demo_entries);
    }

    // Decompile GCX files from the stage directory.
    let Some(stage_dir) = find_dir(input, "STAGE") else {
        return Ok(());
    };
    for entry in WalkDir::new(&stage_dir) {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map_or(true, |e| e != "gcx") {
            continue;
        }
        info!("decompiling {}", path.display());
        let bytes = fs::read(path)?;
        let file = match decompile_gcx(&bytes, &xref) {
            Ok(file) => file,
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                continue;
            }
        };
        let rel = path.strip_prefix(input)?;
        let out_path = output.join(renamed(rel, ".gcx", ".json"));
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(out_path, serde_json::to_string(&file)?)?;
    }
    Ok(())
}

fn compile_tree(input: &Path, output: &Path, padding: bool) -> anyhow::Result<()> {
    info!("compiling {} to {}", input.display(), output.display());
    fs::create_dir_all(output)?;

    // Pack demo files.
    let mut demo_entries = Vec::new();
    if let Some(demo_dir) = find_dir(input, "DEMO") {
        let mut names: Vec<_> = fs::read_dir(&demo_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        names.sort();
        let mut offset = 0u32;
        for path in names {
            let data = fs::read(&path)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let len = data.len() as u32;
            demo_entries.push(DatEntry::new(name, offset, data));
            offset += len;
        }
        fs::write(output.join("DEMO.DAT"), pack_demo(&demo_entries)?)?;
    }

    let options = CodecOptions {
        padding,
        is_pc_version: Some(find_dir(input, "VOX").is_none()),
    };

    // Compile dialog files.
    let mut calls = BTreeMap::new();
    if let Some(radio_dir) = find_dir(input, "RADIO") {
        let mut dialogs: Vec<Dialog> = Vec::new();
        for entry in fs::read_dir(&radio_dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let dialog: Dialog = serde_json::from_str(&fs::read_to_string(&path)?)
                .with_context(|| format!("parsing {}", path.display()))?;
            dialogs.push(dialog);
        }
        // Archive order is positional, not alphabetical.
        dialogs.sort_by_key(|d| d.offset);
        info!("compiling {} dialogs", dialogs.len());
        let image = compile_radio(&dialogs, &CrossRef::new(), &options)?;
        fs::write(output.join("RADIO.DAT"), &image.data)?;
        calls = image.calls;
    }

    let mut xref = CrossRef::new().with_radio_calls(calls);
    if !demo_entries.is_empty() {
        xref = xref.with_demo(&demo_entries);
    }

    // Compile GCX files.
    let Some(stage_dir) = find_dir(input, "STAGE") else {
        return Ok(());
    };
    for entry in WalkDir::new(&stage_dir) {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map_or(true, |e| e != "json") {
            continue;
        }
        info!("compiling {}", path.display());
        let file: GcxFile = serde_json::from_str(&fs::read_to_string(path)?)
            .with_context(|| format!("parsing {}", path.display()))?;
        let bytes = compile_gcx(&file, &xref, &options)?;
        let rel = path.strip_prefix(input)?;
        let out_path = output.join(renamed(rel, ".json", ".gcx"));
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(out_path, bytes)?;
    }
    Ok(())
}

fn test_tree(input: &Path, padding: bool) -> anyhow::Result<(usize, usize)> {
    let options = options_for(input, padding);
    let mut matched = 0usize;
    let mut total = 0usize;

    let mut report = |path: &Path, ok: bool| {
        total += 1;
        if ok {
            matched += 1;
            println!("ok   {}", path.display());
        } else {
            println!("FAIL {}", path.display());
        }
    };

    // DEMO.DAT
    let mut demo_entries = Vec::new();
    if let Some(demo_path) = find_file(input, "DEMO.DAT") {
        let bytes = fs::read(&demo_path)?;
        demo_entries = unpack_demo(&bytes)?;
        report(&demo_path, pack_demo(&demo_entries)? == bytes);
    }

    // RADIO.DAT
    let mut dialogs = Vec::new();
    let mut calls = BTreeMap::new();
    if let Some(radio_path) = find_file(input, "RADIO.DAT") {
        let bytes = fs::read(&radio_path)?;
        dialogs = decompile_radio(&bytes, &CrossRef::new(), &options)?;
        let image = compile_radio(&dialogs, &CrossRef::new(), &options)?;
        report(&radio_path, image.data == bytes);
        calls = image.calls;
    }

    // Stage GCX files.
    let mut decode_xref = CrossRef::new().with_radio_dialogs(&dialogs);
    let mut encode_xref = CrossRef::new().with_radio_calls(calls);
    if !demo_entries.is_empty() {
        decode_xref = decode_xref.with_demo(&demo_entries);
        encode_xref = encode_xref.with_demo(&demo_entries);
    }
    if let Some(stage_dir) = find_dir(input, "STAGE") {
        for entry in WalkDir::new(&stage_dir) {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(true, |e| e != "gcx") {
                continue;
            }
            let bytes = fs::read(path)?;
            let ok = decompile_gcx(&bytes, &decode_xref)
                .and_then(|file| compile_gcx(&file, &encode_xref, &options))
                .map(|rebuilt| rebuilt == bytes)
                .unwrap_or(false);
            report(path, ok);
        }
    }

    Ok((matched, total))
}

/// Swap a path's extension, applying the demo/scenario file renames used
/// by the decompiled tree.
fn renamed(rel: &Path, from: &str, to: &str) -> PathBuf {
    let s = rel.to_string_lossy();
    let s = if from == ".gcx" {
        s.replace("a242.gcx", "demo.gcx")
            .replace("ea54.gcx", "scenerio.gcx")
    } else {
        s.replace("demo.json", "a242.json")
            .replace("scenerio.json", "ea54.json")
    };
    PathBuf::from(s.replace(from, to))
}
