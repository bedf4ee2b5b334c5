use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use session_control::shared::settings::CreateSessionSetting;
use session_control::shared::{AsyncProcessId, EngineResult, HandlingType, ResultCode, State};
use session_control::{
    ControlConfig, FailurePoint, LoopbackEngine, RecoveryPhase, SessionContext,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "session-demo")]
#[command(about = "Session control layer - loopback walkthrough")]
struct Args {
    /// Control configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upper bound of dispatches to wait for a single operation
    #[arg(long, default_value_t = 32)]
    frames: u32,

    /// Let the first create request fail with a connection loss
    #[arg(long)]
    fail_create: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ControlConfig::load(path)
            .wrap_err_with(|| format!("loading {}", path.display()))?,
        None => ControlConfig::default(),
    };
    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .wrap_err("invalid log filter")?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .init();

    let mut ctx = SessionContext::loopback(config);
    if args.fail_create {
        ctx.engine_mut().fail_next(
            FailurePoint::Operation(AsyncProcessId::CreateSession),
            EngineResult::new(ResultCode::ConnectionLost, HandlingType::CleanupWithLeave),
        );
    }

    expect_success(
        &mut ctx,
        AsyncProcessId::ChangeState,
        |ctx| ctx.request_transition(State::SessionStartedUp),
        args.frames,
    )?;

    let mut create = CreateSessionSetting::new();
    create.set_max_participants(4);
    create.set_open_on_create(true);
    let created = run(
        &mut ctx,
        AsyncProcessId::CreateSession,
        |ctx| ctx.create_session_async(&create),
        args.frames,
    )?;

    if created.is_failure() {
        warn!(%created, "create failed, recovering");
        if ctx.config().recovery.auto_handle_errors {
            let mut frames = 0;
            while ctx.recovery_phase() != RecoveryPhase::Idle {
                if frames == args.frames {
                    bail!("automatic recovery did not finish within {} frames", args.frames);
                }
                ctx.dispatch();
                frames += 1;
            }
        } else {
            expect_success(
                &mut ctx,
                AsyncProcessId::HandleError,
                |ctx| ctx.handle_error_async(created),
                args.frames,
            )?;
            let target = ctx.target_state_for(created.handling_type());
            expect_success(
                &mut ctx,
                AsyncProcessId::ChangeState,
                |ctx| ctx.request_transition(target),
                args.frames,
            )?;
        }
        if ctx.state() < State::SessionStartedUp {
            expect_success(
                &mut ctx,
                AsyncProcessId::ChangeState,
                |ctx| ctx.request_transition(State::SessionStartedUp),
                args.frames,
            )?;
        }
        expect_success(
            &mut ctx,
            AsyncProcessId::CreateSession,
            |ctx| ctx.create_session_async(&create),
            args.frames,
        )?;
    }

    if let Some(guest) = ctx.engine_mut().simulate_station_join() {
        info!(%guest, "remote station joined");
    }
    ctx.dispatch();
    for event in ctx.drain_events() {
        info!(kind = %event.event_type, station = %event.station_constant_id, index = %event.station_index, "session event");
    }
    let diagnostics = ctx.diagnostics();
    info!(
        stage = ctx.state_label(),
        stations = ctx.stations().len(),
        rtt_ms = ?diagnostics.rtt_ms,
        memory = diagnostics.memory_used_bytes,
        "session running"
    );

    expect_success(
        &mut ctx,
        AsyncProcessId::ChangeState,
        |ctx| ctx.request_transition(State::NotInitialized),
        args.frames,
    )?;
    info!(stage = ctx.state_label(), "terminated");
    Ok(())
}

/// Starts an operation and dispatches until it completes. Returns its result.
fn run(
    ctx: &mut SessionContext<LoopbackEngine>,
    id: AsyncProcessId,
    start: impl FnOnce(&mut SessionContext<LoopbackEngine>) -> EngineResult,
    frames: u32,
) -> Result<EngineResult> {
    let ack = start(ctx);
    if ack.is_failure() {
        bail!("{id} was rejected: {ack}");
    }
    for _ in 0..frames {
        ctx.dispatch();
        let state = ctx.poll(id);
        if state.is_completed {
            return Ok(state.result);
        }
    }
    bail!("{id} did not complete within {frames} frames")
}

fn expect_success(
    ctx: &mut SessionContext<LoopbackEngine>,
    id: AsyncProcessId,
    start: impl FnOnce(&mut SessionContext<LoopbackEngine>) -> EngineResult,
    frames: u32,
) -> Result<()> {
    run(ctx, id, start, frames)?
        .into_result()
        .wrap_err_with(|| format!("{id} failed"))
}
