//! CLI walkthrough of the placement engine.
//!
//! # Responsibility
//! - Seed an in-memory store from a fixture and load the board.
//! - Run one drag-and-drop and print the resulting layout.

use cube_kernels_core::{
    init_from_config, Board, ClientConfig, DragSession, DragSource, DropTarget, Fixture,
    InMemoryRemoteStore, PlacementEngine,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

const DEMO_FIXTURE: &str = include_str!("../fixtures/demo.json");

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("cube-kernels: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = ClientConfig::from_env()?;
    init_from_config(&config)?;

    let fixture = match &config.fixture {
        Some(path) => Fixture::load(path)?,
        None => Fixture::parse(DEMO_FIXTURE)?,
    };
    let store = InMemoryRemoteStore::new();
    let summary = fixture.seed(&store).await?;
    info!(
        "event=fixture_seed module=cli status=ok cards={} kernels={} placed={}",
        summary.cards, summary.kernels, summary.placed
    );

    let engine = PlacementEngine::new(store);
    engine.refresh().await?;
    println!("cube_kernels_core version={}", cube_kernels_core::core_version());
    print_board("loaded", &engine.board());

    let board = engine.board();
    let dragged = board.candidates().first().map(|record| record.card.clone());
    let target = board.kernels().last().map(|kernel| DropTarget::kernel(kernel.id));
    if let (Some(card), Some(target)) = (dragged, target) {
        let mut session = DragSession::new();
        session.start(&DragSource { card: Some(card) });
        if let Some(command) = session.finish(&board, Some(&target)) {
            let reconciliation = engine.dispatch(command).await?;
            println!("dispatched {command:?} -> {reconciliation:?}");
            print_board("after drop", &engine.board());
        }
    }

    Ok(())
}

fn print_board(label: &str, board: &Board) {
    println!("[{label}]");
    for kernel in board.kernels() {
        let names = kernel
            .cards
            .iter()
            .map(|member| member.card.name.as_str())
            .collect::<Vec<_>>();
        println!(
            "  kernel #{} {:?} order={} cards={} {:?}",
            kernel.id, kernel.name, kernel.order, kernel.card_count, names
        );
    }
    let pool = board
        .candidates()
        .iter()
        .map(|candidate| candidate.card.name.as_str())
        .collect::<Vec<_>>();
    println!("  candidates={} {:?}", pool.len(), pool);
}
