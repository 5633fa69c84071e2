use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use chatstate_core::folders::FolderEngine;
use chatstate_core::store::Action;
use chatstate_core::{
    install_handlers, CoreConfig, FolderManager, GlobalAction, GlobalState, GlobalStore,
    HeavyAnimationGate, TokioScheduler,
};
use tokio::task::LocalSet;

use super::report::{same_results, Report};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    /// Wait out the update throttle so the last pass runs through the
    /// regular scheduled path
    pub settle: bool,
    /// Compare the incremental results with a full rebuild of the final state
    pub verify: bool,
}

/// Drive `actions` through a store and folder manager on a current-thread
/// runtime and report the resulting folders.
pub fn replay(
    state: GlobalState,
    actions: Vec<GlobalAction>,
    config: &CoreConfig,
    options: ReplayOptions,
) -> Result<Report> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let local = LocalSet::new();
    local.block_on(&runtime, replay_local(state, actions, config.clone(), options))
}

async fn replay_local(
    state: GlobalState,
    actions: Vec<GlobalAction>,
    config: CoreConfig,
    options: ReplayOptions,
) -> Result<Report> {
    let scheduler = TokioScheduler::shared();
    let gate = HeavyAnimationGate::new(scheduler.clone(), config.heavy_animation_timeout());
    let store = GlobalStore::new(state, scheduler.clone(), gate, &config);
    install_handlers(&store);
    store.set_error_handler(|err| tracing::error!("replay: {:#}", err));

    let manager = FolderManager::new(&store, &config);
    let publications = Rc::new(Cell::new(0usize));
    let publications_clone = Rc::clone(&publications);
    let _subscription = manager.add_chats_count_callback(move |_| {
        publications_clone.set(publications_clone.get() + 1);
    });

    let total = actions.len();
    for (index, action) in actions.into_iter().enumerate() {
        tracing::debug!("replay: action {}/{}: {:?}", index + 1, total, action.kind());
        store
            .dispatch(action)
            .await
            .with_context(|| format!("Action #{} failed", index + 1))?;
        tokio::task::yield_now().await;
    }

    if options.settle {
        tokio::time::sleep(config.folder_update_throttle() + Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
    }
    manager.update_now();

    tracing::info!(
        "replay: {} actions applied, {} counter publications",
        total,
        publications.get()
    );

    let final_state = store.state();
    let mut report = Report::collect(&manager, &final_state, total);
    if options.verify {
        let rebuilt = FolderEngine::rebuild(&final_state);
        let matches = same_results(&manager, &rebuilt, &final_state);
        if !matches {
            tracing::warn!("replay: incremental results differ from a full rebuild");
        }
        report.matches_full_rebuild = Some(matches);
    }

    Ok(report)
}

/// Report the folders of a snapshot with one full rebuild.
pub fn inspect(state: &GlobalState) -> Report {
    let engine = FolderEngine::rebuild(state);
    Report::collect(&engine, state, 0)
}
