use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use canvaskeep::scene::{ElementId, ShapeKind};
use canvaskeep::{AccessMode, DocumentLink, EditorConfig, EditorSession, MemorySurface, SceneSurface};
use canvaskeep_store::{DocumentStore, FileStore, MemoryStore, default_data_dir};

/// Scene editor session backed by a document store
#[derive(Parser, Debug)]
#[command(name = "canvaskeep")]
#[command(version, about, long_about = None)]
struct Args {
    /// Document link, path or id to open (a new document if omitted)
    #[arg(value_name = "LINK")]
    link: Option<String>,

    /// Directory holding saved documents
    #[arg(long, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Keep documents in memory only
    #[arg(long, conflicts_with = "store")]
    memory: bool,

    /// Quiet period before changes are saved, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 500)]
    quiet_ms: u64,

    /// Number of undo steps kept
    #[arg(long, value_name = "N", default_value_t = 100)]
    max_history: usize,

    /// Origin used when building share links
    #[arg(long, default_value = "http://localhost:5173")]
    origin: String,
}

const HELP: &str = "\
Commands:
  rect | circle | text      add a shape
  pen | select              switch tool
  stroke X,Y X,Y ...        draw a freehand stroke (pen tool)
  list                      list elements
  pick N | pick none        select element N from `list`
  move LEFT TOP             move the selection (snaps to grid)
  color #RRGGBB             recolor the selection
  lock                      lock/unlock the selection
  delete                    delete the selection
  undo | z, redo | y        step through history
  status                    show session status
  share [view]              print an editable or view-only link
  save                      write now
  quit                      save and exit";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canvaskeep=info,canvaskeep_store=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let store: Arc<dyn DocumentStore> = if args.memory {
        Arc::new(MemoryStore::new())
    } else {
        let root = args.store.clone().unwrap_or_else(default_data_dir);
        Arc::new(FileStore::new(root))
    };

    let link = match &args.link {
        Some(link) => DocumentLink::parse(link)?,
        None => DocumentLink::fresh(),
    };

    let config = EditorConfig::default()
        .with_quiet_interval(Duration::from_millis(args.quiet_ms))
        .with_max_history(args.max_history);

    let mut session = EditorSession::open(link, store, MemorySurface::new(), config).await?;
    println!("{}", session.share_url(&args.origin, session.access()));
    println!("{}", session.status());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, rest)) = words.split_first() else {
            continue;
        };
        if matches!(command, "quit" | "exit" | "q") {
            break;
        }
        match run_command(&mut session, &args.origin, command, rest).await {
            Ok(()) => {}
            Err(e) => println!("error: {:#}", e),
        }
    }

    session.flush_now().await?;
    session.close();
    Ok(())
}

async fn run_command(
    session: &mut EditorSession<MemorySurface>,
    origin: &str,
    command: &str,
    args: &[&str],
) -> Result<()> {
    match command {
        "rect" | "circle" | "text" => {
            let shape = match command {
                "rect" => ShapeKind::Rectangle,
                "circle" => ShapeKind::Circle,
                _ => ShapeKind::Text,
            };
            report(session.add_shape(shape)?.is_some(), "added", "document is view-only");
        }
        "pen" => report(session.enable_pen(), "pen tool", "document is view-only"),
        "select" => session.select_tool(),
        "stroke" => {
            let points = args
                .iter()
                .map(|p| parse_point(p))
                .collect::<Result<Vec<_>>>()?;
            let drawn = session.complete_stroke(&points)?;
            report(drawn.is_some(), "stroke added", "switch to the pen tool first");
        }
        "list" => {
            let selected = session.surface().selected();
            for (index, el) in session.surface().scene().elements.iter().enumerate() {
                println!(
                    "{}{:>3} {:<8} {} fill={} at ({}, {}){}",
                    if selected == Some(el.id) { '*' } else { ' ' },
                    index,
                    el.kind.type_name(),
                    el.id,
                    el.fill.as_deref().unwrap_or("-"),
                    el.left,
                    el.top,
                    if el.is_locked() { " locked" } else { "" }
                );
            }
        }
        "pick" => {
            let id = match args.first().copied() {
                None | Some("none") => None,
                Some(arg) => Some(resolve_element(session, arg)?),
            };
            report(session.select(id), "selected", "nothing selected");
        }
        "move" => {
            let [left, top] = args else {
                bail!("usage: move LEFT TOP");
            };
            let moved = session.move_selected(left.parse()?, top.parse()?)?;
            report(moved, "moved", "select an unlocked element first");
        }
        "color" => {
            let color = args.first().ok_or_else(|| anyhow!("usage: color #RRGGBB"))?;
            let changed = session.change_color(color)?;
            report(changed, "recolored", "select an unlocked element first");
        }
        "lock" => report(session.toggle_lock()?, "toggled lock", "select an element first"),
        "delete" => {
            let deleted = session.delete_selected()?;
            report(deleted, "deleted", "select an unlocked element first");
        }
        "undo" | "z" => report(session.undo().await?, "undone", "nothing to undo"),
        "redo" | "y" => report(session.redo().await?, "redone", "nothing to redo"),
        "status" => println!("{}", session.status()),
        "share" => {
            let access = match args.first().copied() {
                Some("view") => AccessMode::ReadOnly,
                _ => AccessMode::Editable,
            };
            println!("{}", session.share_url(origin, access));
        }
        "save" => session.flush_now().await?,
        "help" | "?" => println!("{}", HELP),
        other => bail!("unknown command {:?}, try `help`", other),
    }
    Ok(())
}

fn report(done: bool, ok: &str, refused: &str) {
    println!("{}", if done { ok } else { refused });
}

fn parse_point(input: &str) -> Result<(f64, f64)> {
    let (x, y) = input
        .split_once(',')
        .ok_or_else(|| anyhow!("expected X,Y but got {:?}", input))?;
    Ok((x.trim().parse()?, y.trim().parse()?))
}

fn resolve_element(session: &EditorSession<MemorySurface>, arg: &str) -> Result<ElementId> {
    let elements = &session.surface().scene().elements;
    if let Ok(index) = arg.parse::<usize>() {
        return elements
            .get(index)
            .map(|el| el.id)
            .with_context(|| format!("no element at index {}", index));
    }
    elements
        .iter()
        .find(|el| el.id.to_string().starts_with(arg))
        .map(|el| el.id)
        .with_context(|| format!("no element matching {:?}", arg))
}
