mod ui;
mod state;
mod map_draw;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use geojson::GeoJson;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    rc::Rc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::{self, UnboundedSender};

use networkmap::bridge::ParentFrame;
use networkmap::data::{AreaCatalog, CurrentSelection, MapMode};
use networkmap::error::MapResult;
use networkmap::session::{MapConfig, MapSession, PendingWork, WorkResult, perform};
use networkmap::source::{DirectorySource, GeoSource, HttpSource, SnapRequest, SnapResponse};

use map_draw::TerminalMap;
use state::AppState;

/// Odświeżenie ekranu, gdy nic się nie dzieje.
const IDLE_REDRAW: Duration = Duration::from_millis(250);

/// Przeglądarka mapy obszarów i sieci w terminalu.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Plik JSON z listą obszarów (uniqueId, fullName, mapName, ...)
    #[arg(long)]
    areas: PathBuf,

    /// Adres serwera map albo katalog zawierający `maps/`
    #[arg(long, default_value = ".")]
    source: String,

    /// Adres API przyciągania tras (domyślnie `--source`)
    #[arg(long)]
    api: Option<String>,

    /// '', location-markers albo location-draw
    #[arg(long, default_value = "")]
    mode: String,

    #[arg(long)]
    hide_networks: bool,

    /// Zaznaczenie początkowe: dystrykty rozdzielone przecinkami
    #[arg(long)]
    district: Option<String>,

    #[arg(long)]
    network: Option<String>,

    /// Plik NDJSON, do którego trafiają komunikaty dla strony osadzającej
    #[arg(long)]
    events: Option<PathBuf>,

    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn current_selection(&self) -> Option<CurrentSelection> {
        self.district.as_ref().map(|district| CurrentSelection {
            district_id: Some(district.clone()),
            network_id: self.network.clone(),
        })
    }
}

/// Źródło wybrane z linii poleceń.
enum Source {
    Http(HttpSource),
    Directory(DirectorySource),
}

impl GeoSource for Source {
    async fn fetch_geojson(&self, url: &str) -> MapResult<GeoJson> {
        match self {
            Source::Http(s) => s.fetch_geojson(url).await,
            Source::Directory(s) => s.fetch_geojson(url).await,
        }
    }

    async fn snap_route(&self, request: &SnapRequest) -> MapResult<SnapResponse> {
        match self {
            Source::Http(s) => s.snap_route(request).await,
            Source::Directory(s) => s.snap_route(request).await,
        }
    }
}

/// Logi trafiają tylko do pliku: stderr jest zasłonięty ekranem mapy.
fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let catalog = AreaCatalog::load(&args.areas)
        .with_context(|| format!("cannot read areas from {}", args.areas.display()))?;

    let local_dir = Path::new(&args.source).is_dir();
    let source = if local_dir {
        Source::Directory(DirectorySource::new(&args.source))
    } else {
        Source::Http(HttpSource::new(args.api.clone().unwrap_or_else(|| args.source.clone())))
    };
    let config = MapConfig {
        mode: MapMode::parse(&args.mode),
        source_domain: if local_dir { String::new() } else { args.source.clone() },
        show_networks: !args.hide_networks,
        current_selection: args.current_selection(),
    };

    let mut session = MapSession::new(TerminalMap::new(), config, catalog);
    if let Some(path) = &args.events {
        let file = File::create(path)
            .with_context(|| format!("cannot create events file {}", path.display()))?;
        session.subscribe(Box::new(ParentFrame::new(file, true)));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start the async runtime")?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, run(AppState::new(session), Rc::new(source)))
}

async fn run(mut state: AppState, source: Rc<Source>) -> anyhow::Result<()> {
    state.session.load_areas(&*source).await;
    if let Some(selection) = state.session.config().current_selection.clone() {
        state.session.apply_selection(&*source, &selection).await;
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut state, source).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}

/// Uruchamia zlecenia jako zadania lokalne; wyniki wracają kanałem.
fn spawn_work<S: GeoSource + 'static>(
    work: impl IntoIterator<Item = PendingWork>,
    source: &Rc<S>,
    tx: &UnboundedSender<WorkResult>,
) {
    for work in work {
        let source = source.clone();
        let tx = tx.clone();
        tokio::task::spawn_local(async move {
            // odbiornik znika tylko przy wyjściu
            let _ = tx.send(perform(&*source, work).await);
        });
    }
}

/// Zwraca true, jeśli trzeba wyjść.
fn handle_event(state: &mut AppState, event: Event) -> bool {
    match event {
        Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) => state.handle_input(code),
        Event::Mouse(mouse) => {
            state.handle_mouse(mouse, Instant::now());
            false
        }
        _ => false,
    }
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    source: Rc<Source>,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<WorkResult>();
    let mut input = EventStream::new();

    loop {
        terminal.draw(|f| ui::draw(f, state))?;

        let wake = state
            .session
            .next_deadline()
            .unwrap_or_else(|| Instant::now() + IDLE_REDRAW);
        let quit = tokio::select! {
            event = input.next() => match event {
                Some(event) => handle_event(state, event?),
                None => true,
            },
            Some(result) = rx.recv() => {
                state.session.complete(result);
                false
            }
            _ = tokio::time::sleep_until(wake.into()) => false,
        };
        if quit {
            break;
        }

        state.tick(Instant::now());
        spawn_work(state.pending.drain(..), &source, &tx);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use networkmap::data::LatLng;
    use networkmap::drawing::PendingStroke;
    use networkmap::layers::LayerId;

    #[test]
    fn logging_stays_off_without_a_log_file() {
        init_logging(None).unwrap();
        assert_eq!(log::max_level(), log::LevelFilter::Off);
    }

    #[tokio::test]
    async fn spawned_work_reports_back_while_the_loop_waits() {
        let dir = tempfile::tempdir().unwrap();
        let source = Rc::new(DirectorySource::new(dir.path()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let work = PendingWork::Snap(PendingStroke {
            polyline: LayerId(7),
            points: vec![LatLng::new(0.0, 0.0), LatLng::new(0.0, 0.01)],
            snap: true,
        });

        let local = tokio::task::LocalSet::new();
        let result = local
            .run_until(async move {
                spawn_work([work], &source, &tx);
                tokio::time::timeout(Duration::from_secs(5), rx.recv()).await
            })
            .await
            .unwrap();

        match result {
            Some(WorkResult::Snap { polyline, snapped }) => {
                assert_eq!(polyline, LayerId(7));
                assert!(snapped.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
