use clap::{Parser, Subcommand};
use reps_core::session::{clear_snapshot, resumable_snapshot};
use reps_core::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "reps")]
#[command(about = "Interval workout timer with experience levels", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List workouts and their exercises
    List,

    /// Start a workout, or resume today's session of it
    Start {
        /// Workout type (see `reps list`)
        workout: String,

        /// Auto-complete (for testing) - skip through every interval immediately
        #[arg(long)]
        auto_complete: bool,

        /// Work interval length in seconds
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        work_seconds: Option<u32>,

        /// Rest interval length in seconds
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        rest_seconds: Option<u32>,
    },

    /// Show level, experience and any session in progress
    Status,

    /// Change one exercise of a workout
    Edit {
        /// Workout type
        workout: String,

        /// Exercise position as shown by `reps list` (starting at 1)
        exercise: usize,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        sets: Option<u32>,

        #[arg(long)]
        reps: Option<String>,

        /// New weight; an empty string removes it
        #[arg(long)]
        weight: Option<String>,
    },

    /// Clear the session in progress
    Reset {
        /// Also restore the default workouts and reset progression
        #[arg(long)]
        all: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    reps_core::logging::init();

    let cli = Cli::parse();

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let store: SharedStore = Arc::new(FileStore::new(data_dir));

    match cli.command {
        Commands::List => cmd_list(&store),
        Commands::Start {
            workout,
            auto_complete,
            work_seconds,
            rest_seconds,
        } => {
            let mut timing = config.timer.timing();
            if let Some(seconds) = work_seconds {
                timing.work_seconds = seconds;
            }
            if let Some(seconds) = rest_seconds {
                timing.rest_seconds = seconds;
            }
            cmd_start(store, &workout, timing, auto_complete, &config)
        }
        Commands::Status => cmd_status(store),
        Commands::Edit {
            workout,
            exercise,
            name,
            sets,
            reps,
            weight,
        } => cmd_edit(
            &store,
            &workout,
            exercise,
            ExerciseEdit {
                name,
                sets,
                reps,
                weight,
            },
        ),
        Commands::Reset { all } => cmd_reset(store, all),
    }
}

fn load_catalog(store: &SharedStore) -> Result<Catalog> {
    let catalog = Catalog::load(store.as_ref())?;
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::Catalog("Invalid catalog".into()));
    }
    Ok(catalog)
}

fn cmd_list(store: &SharedStore) -> Result<()> {
    let catalog = load_catalog(store)?;

    for (key, workout) in &catalog.workouts {
        println!("\n{} ({})", workout.title, key);
        for (i, exercise) in workout.exercises.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, describe_exercise(exercise));
        }
    }
    println!();
    Ok(())
}

fn cmd_start(
    store: SharedStore,
    workout_type: &str,
    timing: IntervalTiming,
    auto_complete: bool,
    config: &Config,
) -> Result<()> {
    let catalog = load_catalog(&store)?;
    let clock: SharedClock = Arc::new(SystemClock);

    let engine = SessionEngine::load_or_init(
        store.clone(),
        clock.clone(),
        timing,
        workout_type,
        &catalog,
    )?;

    match engine.load_outcome() {
        LoadOutcome::Resumed => println!("Resuming today's session."),
        LoadOutcome::Discarded(reason) => {
            tracing::info!("Stored session not resumed: {:?}", reason);
        }
        LoadOutcome::StoreUnavailable => {
            eprintln!("⚠ Could not read saved progress; starting fresh.");
        }
        LoadOutcome::Fresh => {}
    }

    display_header(&engine);

    let progression = ProgressionEngine::new(store, clock);
    let mut controller =
        SessionController::new(engine, progression, config.timer.extend_seconds);

    let award = if auto_complete {
        let mut award = None;
        while !controller.engine().is_complete() {
            let outcome = controller.handle(Intent::Skip);
            display_transition(&controller, &outcome);
            if outcome.award.is_some() {
                award = outcome.award;
            }
        }
        award
    } else {
        run_interactive(&mut controller)?
    };

    if controller.engine().had_write_failure() {
        eprintln!("⚠ Progress could not be saved to disk during this session.");
    }

    if controller.engine().is_complete() {
        println!("\n✓ Workout complete!");
        match award {
            Some(award) => display_award(&award),
            None => eprintln!("⚠ Completion could not be recorded."),
        }
    } else {
        println!("\nPaused. Run `reps start {}` to continue.", workout_type);
    }

    Ok(())
}

fn run_interactive(controller: &mut SessionController) -> Result<Option<Award>> {
    println!("─────────────────────────────────────────");
    println!("Enter or 'p' + Enter to start/pause");
    println!("  's' + Enter to skip the interval");
    println!("  '+' + Enter to add time");
    println!("  'q' + Enter to quit (progress is kept)");
    println!();

    let (tx, mailbox) = mpsc::channel();
    tx.send(Intent::Start)
        .map_err(|e| Error::Other(format!("Failed to start session: {}", e)))?;

    // Blocking stdin reader; detached because a read cannot be interrupted
    let input_tx = tx.clone();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let intent = match line.trim().to_lowercase().as_str() {
                "" | "p" => Intent::Toggle,
                "s" => Intent::Skip,
                "+" => Intent::Extend,
                "q" => Intent::Quit,
                other => {
                    tracing::debug!("Ignoring input {:?}", other);
                    continue;
                }
            };
            if input_tx.send(intent).is_err() {
                return;
            }
        }
        // End of input counts as quitting
        let _ = input_tx.send(Intent::Quit);
    });

    let ticker = Ticker::spawn(tx, Duration::from_secs(1));
    let award = controller.run(&mailbox, display_transition);
    ticker.stop();

    Ok(award)
}

fn cmd_status(store: SharedStore) -> Result<()> {
    let clock: SharedClock = Arc::new(SystemClock);
    let now = clock.now();
    let progression = ProgressionEngine::new(store.clone(), clock).get_progression();

    if progression.leveled_up_recently(now) {
        println!("\n★ LEVEL UP! You reached level {} ★", progression.level);
    }

    println!("\nLevel {}", progression.level);
    println!(
        "  XP: {}/{} {} {}%",
        progression.xp,
        progression.xp_to_next_level,
        progress_bar(progression.xp_percentage(), 20),
        progression.xp_percentage()
    );
    println!("  Workouts completed: {}", progression.total_completed());

    let mut counts: Vec<_> = progression.completed_workouts.iter().collect();
    counts.sort();
    for (workout, count) in counts {
        println!("    {}: {}", workout, count);
    }

    let catalog = Catalog::load(store.as_ref())?;
    match resumable_snapshot(store.as_ref(), &catalog, now) {
        Some(session) => {
            println!(
                "\nIn progress: {} (exercise {}, set {}, {} {})",
                session.workout_type,
                session.current_exercise_index + 1,
                session.current_set,
                session.phase.label(),
                format_clock(session.remaining_seconds)
            );
        }
        None => println!("\nNo workout in progress."),
    }
    println!();
    Ok(())
}

fn cmd_edit(store: &SharedStore, workout_type: &str, number: usize, edit: ExerciseEdit) -> Result<()> {
    let mut catalog = load_catalog(store)?;

    let workout = catalog
        .get(workout_type)
        .ok_or_else(|| Error::UnknownWorkout(workout_type.to_string()))?;
    let exercise_id = number
        .checked_sub(1)
        .and_then(|i| workout.exercises.get(i))
        .map(|e| e.id.clone())
        .ok_or_else(|| {
            Error::Catalog(format!(
                "Workout '{}' has no exercise number {}",
                workout_type, number
            ))
        })?;

    let updated = catalog
        .update_exercise(workout_type, &exercise_id, edit)?
        .clone();
    catalog.save(store.as_ref())?;

    println!("✓ Updated: {}", describe_exercise(&updated));
    Ok(())
}

fn cmd_reset(store: SharedStore, all: bool) -> Result<()> {
    if all {
        reps_core::catalog::reset_to_defaults(store.as_ref())?;
        ProgressionEngine::new(store, Arc::new(SystemClock)).factory_reset()?;
        println!("✓ Workouts, progression and session progress reset.");
    } else {
        clear_snapshot(store.as_ref())?;
        println!("✓ Session progress cleared.");
    }
    Ok(())
}

fn describe_exercise(exercise: &Exercise) -> String {
    let mut line = format!(
        "{} - {} x {}",
        exercise.name, exercise.sets, exercise.reps
    );
    if let Some(weight) = &exercise.weight {
        line.push_str(&format!(" @ {}", weight));
    }
    line
}

fn display_header(engine: &SessionEngine) {
    let state = engine.state();
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", engine.workout().title.to_uppercase());
    println!("╰─────────────────────────────────────────╯");
    println!(
        "  Exercise {}/{}: {}",
        state.current_exercise_index + 1,
        engine.workout().exercises.len(),
        describe_exercise(engine.current_exercise())
    );
    println!(
        "  Set {} · {} {}",
        state.current_set,
        state.phase.label(),
        format_clock(state.remaining_seconds)
    );
    println!();
}

fn display_transition(controller: &SessionController, outcome: &Outcome) {
    let engine = controller.engine();
    let state = &outcome.state;

    match outcome.transition {
        Some(Transition::EnteredRest { next_exercise }) => {
            let label = if next_exercise { "Next exercise" } else { "Next set" };
            println!(
                "\n  REST {} · {}: {} (set {}/{})",
                format_clock(state.remaining_seconds),
                label,
                engine.current_exercise().name,
                state.current_set,
                engine.current_exercise().sets
            );
        }
        Some(Transition::EnteredWork) => {
            println!(
                "\n  WORK {} · {} (set {}/{}) · {:.0}% done",
                format_clock(state.remaining_seconds),
                describe_exercise(engine.current_exercise()),
                state.current_set,
                engine.current_exercise().sets,
                engine.progress_fraction() * 100.0
            );
        }
        Some(Transition::Completed) => {}
        None if outcome.intent == Intent::Tick || outcome.intent == Intent::Extend => {
            print!(
                "\r  {} {}   ",
                state.phase.label(),
                format_clock(state.remaining_seconds)
            );
            let _ = io::stdout().flush();
        }
        None => {
            if !outcome.active && !state.completed {
                println!("\n  Paused at {}", format_clock(state.remaining_seconds));
            }
        }
    }
}

fn display_award(award: &Award) {
    println!("  +{} XP", progression::COMPLETION_BONUS_XP);
    if award.did_level_up {
        println!(
            "  ★ Leveled up from {} to {}!",
            award.previous_level, award.state.level
        );
    }
    println!(
        "  Level {} · {}/{} XP {}",
        award.state.level,
        award.state.xp,
        award.state.xp_to_next_level,
        progress_bar(award.state.xp_percentage(), 20)
    );
}

fn progress_bar(percent: u32, width: usize) -> String {
    let filled = (percent.min(100) as usize * width) / 100;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}
