//! Implementation of the `gui-agent tap` command.
//!
//! Direct coordinate control without model planning. The whole device
//! interaction runs under the operation deadline:
//! 1. Snapshot the screen and derive its size (PNG header, else `wm size`)
//! 2. Resolve the requested coordinate onto device pixels
//! 3. Issue `input tap`, wait `--post-delay-ms`, snapshot again
//!
//! Taps never touch the session store; every tap gets a fresh id.

use super::{finish, record_timeout, reject};
use crate::cli::TapArgs;
use crate::context::AgentContext;
use crate::device::screen::{parse_wm_size, png_size};
use crate::device::{self, CoordSpace, CoordinateResolution, DetailLevel, DeviceCollector, DeviceState};
use crate::error::{GuiAgentError, Result};
use crate::events::{Event, EventAction};
use crate::result::{FailureReport, SessionMode, TAP_PROVIDER, TapReport};
use crate::session::new_session_id;
use serde_json::{Value, json};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};


pub fn cmd_tap(ctx: &mut AgentContext, args: TapArgs) -> Value {
    finish(tap(ctx, args))
}

fn tap(ctx: &mut AgentContext, args: TapArgs) -> std::result::Result<TapReport, FailureReport> {
    let timeout = ctx.operation_timeout(args.timeout_sec).map_err(reject)?;
    if args.post_delay_ms < 0 {
        return Err(reject(GuiAgentError::InvalidArgument(
            "Invalid --post-delay-ms: must be >= 0".to_string(),
        )));
    }
    let space: CoordSpace = args.coord_space.parse().map_err(reject)?;
    let post_delay = Duration::from_millis(args.post_delay_ms.unsigned_abs());

    let device_id = ctx
        .select_device(args.device_id.as_deref())
        .map_err(|e| FailureReport::from_error(&e, None).with_provider(TAP_PROVIDER))?;

    let collector = Arc::clone(&ctx.collector);
    let target = device_id.clone();
    let (x, y) = (args.x, args.y);
    let outcome = ctx.executor().run("tap", timeout, move || {
        tap_on_device(collector.as_ref(), &target, x, y, space, post_delay)
    });
    let (coordinate, state) = match outcome {
        Ok(done) => done,
        Err(e) => {
            record_timeout(ctx, &e, "tap", None);
            return Err(FailureReport::from_error(&e, Some("Coordinate tap failed"))
                .with_provider(TAP_PROVIDER)
                .with_device(&device_id)
                .with_mode(SessionMode::DirectCoordinate)
                .with_timeout(timeout));
        }
    };

    let session_id = new_session_id();
    let observation = ctx.normalizer.observe(&session_id, None, state);
    let report = ctx
        .normalizer
        .tap_report(session_id.clone(), device_id.clone(), coordinate, observation);

    ctx.events.record(
        Event::new(EventAction::Tap)
            .with_session(&session_id)
            .with_details(json!({
                "device_id": device_id,
                "tap": report.coordinate.tap,
                "effective_coord_space": report.coordinate.effective_coord_space,
                "clamped": report.coordinate.clamped,
            })),
    );
    Ok(report)
}

/// The device half of a tap: size, resolve, tap, settle, observe.
fn tap_on_device(
    collector: &dyn DeviceCollector,
    device_id: &str,
    x: f64,
    y: f64,
    space: CoordSpace,
    post_delay: Duration,
) -> Result<(CoordinateResolution, DeviceState)> {
    let before = collector
        .get_state(device_id, DetailLevel::Snapshot)
        .map_err(|e| GuiAgentError::adapter("Pre-tap state collection failed", e))?;
    let (width, height) = screen_size(collector, device_id, &before)?;

    let coordinate = device::resolve(x, y, space, width, height)?;
    let (tap_x, tap_y) = (coordinate.tap.x.to_string(), coordinate.tap.y.to_string());
    info!(
        device_id,
        x = coordinate.tap.x,
        y = coordinate.tap.y,
        clamped = coordinate.clamped,
        "tapping"
    );
    collector
        .run_raw_command(&["shell", "input", "tap", tap_x.as_str(), tap_y.as_str()], device_id)
        .map_err(|e| GuiAgentError::adapter("Tap command failed", e))?;

    if !post_delay.is_zero() {
        thread::sleep(post_delay);
    }
    let after = collector
        .get_state(device_id, DetailLevel::Snapshot)
        .map_err(|e| GuiAgentError::adapter("Post-tap state collection failed", e))?;
    Ok((coordinate, after))
}

/// Screen size from the screenshot header, falling back to `wm size`.
fn screen_size(
    collector: &dyn DeviceCollector,
    device_id: &str,
    state: &DeviceState,
) -> Result<(i64, i64)> {
    if let Some(size) = state.screenshot_b64().and_then(png_size) {
        return Ok(size);
    }
    debug!(device_id, "no usable screenshot, asking wm size");
    let size = collector
        .run_raw_command(&["shell", "wm", "size"], device_id)
        .ok()
        .and_then(|out| parse_wm_size(&out.stdout));
    size.ok_or_else(|| {
        GuiAgentError::InvalidArgument(
            "Cannot determine screen size. Ensure screenshot/state collection is enabled."
                .to_string(),
        )
    })
}
