//! Line-driven reader shell over the reading engine.
//!
//! Usage: `manga-shelf <library-root> [folder]`. Commands on stdin:
//! `n`/`p` next/previous page, `N`/`P` one panel, `f`/`l` first/last panel
//! (again at the edge opens the sibling folder), `d` toggle double pages,
//! `q` quit.

use log::warn;
use manga_shelf::config::{CATALOG_PATH_ENV, DEFAULT_CATALOG_FILE, EngineConfig, MAX_SCAN_DEPTH};
use manga_shelf::model::User;
use manga_shelf::scanner::FsScanner;
use manga_shelf::services::{Command, CommandOutcome, DirectoryWatcher, ReaderEngine};
use manga_shelf::store::{JsonFileStore, LibraryStore};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::Path;

type Engine = ReaderEngine<JsonFileStore, FsScanner<JsonFileStore>>;

fn main() -> Result<(), Box<dyn Error>> {
    #[cfg(debug_assertions)]
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();
    #[cfg(not(debug_assertions))]
    env_logger::init();

    let mut args = std::env::args().skip(1).filter(|arg| !arg.starts_with('-'));
    let Some(root) = args.next() else {
        eprintln!("usage: manga-shelf <library-root> [folder]");
        std::process::exit(2);
    };
    let folder = args.next();

    async_std::task::block_on(run(root, folder))
}

async fn run(root: String, folder: Option<String>) -> Result<(), Box<dyn Error>> {
    let catalog_path =
        std::env::var(CATALOG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CATALOG_FILE.to_string());
    let store = JsonFileStore::open(&catalog_path).await?;
    let scanner = FsScanner::new(store.clone());
    let user = User::default();

    let library = scanner.index_root(&root, &user).await?;
    let mut engine = ReaderEngine::new(store, scanner, EngineConfig::default(), user);

    let _watcher = match DirectoryWatcher::new(engine.listing_cache())
        .start_watching(Path::new(&library.path))
    {
        Ok(debouncer) => Some(debouncer),
        Err(e) => {
            warn!("Library changes will not be tracked: {}", e);
            None
        }
    };

    let start = match folder {
        Some(folder) => folder,
        None => match first_manga_folder(&engine, &library.path).await {
            Some(folder) => folder,
            None => {
                eprintln!("no readable folder under {}", library.path);
                return Ok(());
            }
        },
    };

    engine.open_session(&start).await?;
    print_position(&engine);

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let command = match line.trim() {
            "n" => Command::Advance,
            "p" => Command::Retreat,
            "N" => Command::AdvanceSingle,
            "P" => Command::RetreatSingle,
            "f" => Command::JumpToFirst,
            "l" => Command::JumpToLast,
            "d" => Command::ToggleDoubleMode,
            "q" => break,
            "" => continue,
            other => {
                println!("unknown command: {other}");
                continue;
            }
        };

        match engine.dispatch(command).await {
            Ok(CommandOutcome::ModeLocked) => println!("double pages unavailable on the last panel"),
            Ok(CommandOutcome::BoundaryBlocked(direction)) => {
                println!("no {direction:?} folder")
            }
            Ok(CommandOutcome::BoundaryCrossed { to, .. }) => println!("opened {to}"),
            Ok(_) => {}
            Err(e) => println!("error: {e}"),
        }

        for warning in engine.take_warnings() {
            println!("warning: read position not saved ({})", warning.error);
        }
        print_position(&engine);
    }

    for warning in engine.shutdown().await {
        println!("warning: read position not saved ({})", warning.error);
    }
    Ok(())
}

fn print_position(engine: &Engine) {
    let pair = engine.current_pair();
    let (first, second) = pair.paths();
    let progress = engine
        .progress()
        .map(|(position, total)| format!("{position}/{total}"))
        .unwrap_or_else(|| "-".to_string());

    match (first, second) {
        (Some(first), Some(second)) => println!("[{progress}] {first} | {second}"),
        (Some(first), None) => println!("[{progress}] {first}"),
        _ => println!("[{progress}] (no panels)"),
    }
}

/// Descends through first children until a folder with panels is found.
async fn first_manga_folder(engine: &Engine, root: &str) -> Option<String> {
    let mut current = engine.store().get_folder_by_path(root).await.ok()?;

    for _ in 0..MAX_SCAN_DEPTH {
        if current.is_manga_folder {
            return Some(current.path);
        }
        let browser = engine.browse(Some(current.path.as_str())).await.ok()?;
        current = browser.visible().first().map(|f| (*f).clone())?;
    }
    None
}
