use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;

use crate::animation::Animation;
use crate::controller::Pipeline;
use crate::error::ControllerError;

/// Spawn the animation player. It takes one animation at a time from `queue`
/// and plays it to completion; there is no way to interrupt playback.
pub fn spawn_player(
    queue: Receiver<Animation>,
    pipeline: Pipeline,
    playing: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for animation in queue {
            playing.store(true, Ordering::Release);
            let result = play(&animation, &pipeline);
            playing.store(false, Ordering::Release);

            if let Err(e) = result {
                log::error!("Animation aborted: {}", e);
                return;
            }
        }

        log::debug!("Animation queue closed");
    })
}

/// Play every loop of `animation`, then put back the colors shown before it started
fn play(animation: &Animation, pipeline: &Pipeline) -> Result<(), ControllerError> {
    let rest = pipeline.store().snapshot();

    log::info!("Playing animation: {} loops of {} frames ({} writes)",
               animation.loops, animation.frames.len(), animation.write_count());

    for _ in 0..animation.loops {
        for frame in &animation.frames {
            pipeline.apply(frame.leds.clone())?;

            let hold = frame.hold();
            if !hold.is_zero() {
                thread::sleep(hold);
            }
        }
    }

    pipeline.apply(rest)?;
    log::info!("Animation finished");
    Ok(())
}
