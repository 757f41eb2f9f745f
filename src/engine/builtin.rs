//! Hooks every engine starts with. They can be unscheduled and rescheduled
//! by name like user hooks.
use crate::engine::{HookContext, Phase, RUN_KEY, Schedule};
use crate::error::{ApplyError, PersistenceError};
use crate::message::{Category, Message};
use crate::persist;
use crate::task::ViewTarget;
use crate::view::{apply_view, creation_order};

type BuiltIn = fn(&mut HookContext<'_>) -> anyhow::Result<()>;

const PRE: [(u32, &str, BuiltIn); 4] = [
    (10, "announce", announce),
    (20, "open_messages", open_messages),
    (30, "start_profiler", start_profiler),
    (40, "start_progress", start_progress),
];

const POST: [(u32, &str, BuiltIn); 6] = [
    (10, "build_views", build_views),
    (20, "dump_data", dump_data),
    (30, "summarize", summarize),
    (40, "print_messages", print_messages),
    (50, "stop_progress", stop_progress),
    (60, "stop_profiler", stop_profiler),
];

/// Registers and schedules every built-in hook.
pub(crate) fn install(schedule: &mut Schedule) {
    for (phase, hooks) in [(Phase::Pre, &PRE[..]), (Phase::Post, &POST[..])] {
        for &(priority, name, hook) in hooks {
            if let Err(err) = schedule
                .register(name, Box::new(hook))
                .and_then(|()| schedule.schedule(phase, priority, name))
            {
                tracing::error!("{err}");
            }
        }
    }
}

fn announce(cx: &mut HookContext<'_>) -> anyhow::Result<()> {
    tracing::info!(title = %cx.config.title, tasks = cx.tasks.len(), "starting run");
    let text = cx.host.translate.translate("status.start", &[&cx.config.title]);
    cx.host.progress.set_status_text(&text);
    Ok(())
}

fn open_messages(cx: &mut HookContext<'_>) -> anyhow::Result<()> {
    cx.run.messages.set_print_once(cx.config.print_once);
    Ok(())
}

fn start_profiler(cx: &mut HookContext<'_>) -> anyhow::Result<()> {
    cx.run.profiler.start(RUN_KEY);
    Ok(())
}

fn start_progress(cx: &mut HookContext<'_>) -> anyhow::Result<()> {
    cx.host.progress.set_length(cx.tasks.len() as u64);
    cx.host.progress.set_progress(0);
    Ok(())
}

/// Confirms the targets of valid tasks, merges their view properties, puts
/// them in draw order and applies them to newly created views.
fn build_views(cx: &mut HookContext<'_>) -> anyhow::Result<()> {
    let text = cx.host.translate.translate("status.views", &[]);
    cx.host.progress.set_status_text(&text);

    let mut confirmed: Vec<ViewTarget> = Vec::new();
    for task in cx.tasks.iter().filter(|task| task.is_valid()) {
        confirmed.extend(task.targets().iter().cloned());
        cx.run.views.merge(task.view_properties().clone());
    }
    cx.run.views.finish();

    for name in creation_order(&confirmed) {
        let config = cx.config.view(&name);
        let title = config
            .title
            .unwrap_or_else(|| cx.host.translate.translate(&name, &[]));
        let kind = config.kind.as_deref().unwrap_or("graph");

        let mut view = match cx.host.visualization.create_view(&title, kind) {
            Ok(view) => view,
            Err(err) => {
                tracing::error!(view = %name, "{err:#}");
                cx.run.messages.add(
                    Category::Error,
                    Message::paragraph(format!("Couldn't create view '{name}'"))
                        .with_detail(format!("{err:#}")),
                );
                continue;
            }
        };

        tracing::debug!(view = %name, %title, kind, "created view");

        if let Some(properties) = cx.run.views.view(&name) {
            for err in apply_view(&name, view.as_mut(), properties, &cx.run.graphics) {
                cx.run.messages.warning(err.to_string());
            }
        }

        if let Err(err) = view.commit() {
            tracing::warn!(view = %name, "{err:#}");
            cx.run
                .messages
                .warning(format!("Couldn't commit view '{name}': {err:#}"));
        }

        cx.run.created.push(name);
    }

    let orphans: Vec<String> = cx
        .run
        .views
        .views()
        .filter(|view| !cx.run.created.iter().any(|created| created == view))
        .map(String::from)
        .collect();

    for view in orphans {
        let err = ApplyError::UnknownView(view);
        tracing::warn!("{err}");
        cx.run.messages.warning(err.to_string());
    }

    Ok(())
}

fn dump_data(cx: &mut HookContext<'_>) -> anyhow::Result<()> {
    let selected: Vec<_> = cx
        .tasks
        .iter()
        .filter(|task| task.is_valid())
        .filter(|task| task.config().dump || cx.config.dumps(task.name()))
        .collect();

    if selected.is_empty() {
        return Ok(());
    }

    let result = match cx.config.dump_file.as_deref() {
        Some(locator) => persist::dump(cx.host.store.as_mut(), locator, selected),
        None => Err(PersistenceError::NoLocator("dumping data sets")),
    };

    match result {
        Ok(dump) => {
            for err in dump.rejected {
                tracing::warn!("{err}");
                cx.run.messages.warning(err.to_string());
            }
            cx.run.dumped = dump.written;
        }
        Err(err) => {
            tracing::warn!("skipping dump: {err}");
            cx.run.messages.warning(err.to_string());
        }
    }

    Ok(())
}

fn summarize(cx: &mut HookContext<'_>) -> anyhow::Result<()> {
    let valid = cx.tasks.iter().filter(|task| task.is_valid()).count();
    let text = cx.host.translate.translate(
        "summary.tasks",
        &[&valid.to_string(), &cx.tasks.len().to_string()],
    );
    cx.run.messages.summary(text);

    if let Some(elapsed) = cx.run.profiler.describe(RUN_KEY) {
        let text = cx.host.translate.translate("summary.time", &[&elapsed]);
        cx.run.messages.summary(text);
    }

    Ok(())
}

fn print_messages(cx: &mut HookContext<'_>) -> anyhow::Result<()> {
    let host = &mut *cx.host;
    cx.run
        .messages
        .print_all(host.report.as_mut(), host.translate.as_ref());
    Ok(())
}

fn stop_progress(cx: &mut HookContext<'_>) -> anyhow::Result<()> {
    let key = match cx.run.cancelled {
        true => "status.cancelled",
        false => "status.done",
    };
    let text = cx.host.translate.translate(key, &[]);
    cx.host.progress.set_status_text(&text);
    cx.host.progress.finish();
    Ok(())
}

fn stop_profiler(cx: &mut HookContext<'_>) -> anyhow::Result<()> {
    cx.run.profiler.stop_all();
    tracing::debug!(ms = cx.run.profiler.elapsed_ms(RUN_KEY), "profiler stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_scheduled_in_order() {
        let mut schedule = Schedule::new();
        install(&mut schedule);

        assert_eq!(
            schedule.ordered(Phase::Pre),
            vec!["announce", "open_messages", "start_profiler", "start_progress"]
        );
        assert_eq!(
            schedule.ordered(Phase::Post),
            vec![
                "build_views",
                "dump_data",
                "summarize",
                "print_messages",
                "stop_progress",
                "stop_profiler"
            ]
        );
    }
}
