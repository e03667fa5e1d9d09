use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender, SyncSender};
use std::sync::Arc;

use crate::animation::Animation;
use crate::color_store::{ColorBuffer, ColorStore};
use crate::config::StripConfig;
use crate::device::{self, DeviceLink, DeviceStats, WRITE_QUEUE_DEPTH};
use crate::error::{ControllerError, Halt};
use crate::player;
use crate::protocol::FrameEncoder;
use crate::ready::Ready;

/// Animations that may wait while another one plays. Submitting more blocks.
pub const ANIMATION_SLOTS: usize = 1;

/// The store plus the writer queue. A buffer that is accepted by the store
/// is queued for the device before anyone else can change the store.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<ColorStore>,
    writes: SyncSender<ColorBuffer>,
}

impl Pipeline {
    pub fn new(store: Arc<ColorStore>, writes: SyncSender<ColorBuffer>) -> Self {
        Pipeline { store, writes }
    }

    pub fn store(&self) -> &ColorStore {
        &self.store
    }

    pub fn apply(&self, buffer: ColorBuffer) -> Result<(), ControllerError> {
        self.store.set(buffer, |colors| {
            self.writes
                .send(colors.clone())
                .map_err(|_| ControllerError::WriterStopped)
        })
    }
}

/// Owns the strip: current colors, the device threads and the animation player
pub struct Controller {
    pipeline: Pipeline,
    animations: SyncSender<Animation>,
    playing: Arc<AtomicBool>,
    ready: Ready,
    stats: Arc<DeviceStats>,
}

impl Controller {
    /// Start the writer, reader and player threads on `link`. Device failures
    /// are reported on `halt`.
    pub fn start(link: DeviceLink, config: &StripConfig, halt: Sender<Halt>) -> Self {
        let store = Arc::new(ColorStore::new(config.led_count));
        let stats = Arc::new(DeviceStats::default());
        let ready = Ready::new();
        let playing = Arc::new(AtomicBool::new(false));

        let (write_tx, write_rx) = mpsc::sync_channel(WRITE_QUEUE_DEPTH);
        let (anim_tx, anim_rx) = mpsc::sync_channel(ANIMATION_SLOTS);

        let encoder = FrameEncoder::new(config.protocol, config.pixel_format);
        device::spawn_writer(link.name.clone(), link.writer, write_rx, encoder,
                             Arc::clone(&stats), halt.clone());
        device::spawn_reader(link.name, link.reader, ready.clone(), Arc::clone(&stats), halt);

        let pipeline = Pipeline::new(store, write_tx);
        player::spawn_player(anim_rx, pipeline.clone(), Arc::clone(&playing));

        Controller {
            pipeline,
            animations: anim_tx,
            playing,
            ready,
            stats,
        }
    }

    /// Show `colors` now. Rejected without any change if the length is wrong.
    pub fn set_colors(&self, colors: ColorBuffer) -> Result<(), ControllerError> {
        self.pipeline.apply(colors)
    }

    /// Queue `animation` for playback. Blocks while the animation slot is
    /// taken; returns once the player has accepted it, not when it finishes.
    pub fn play_animation(&self, animation: Animation) -> Result<(), ControllerError> {
        animation.validate(self.pipeline.store().buffer_len())?;

        log::debug!("Queueing animation: {} loops of {} frames ({:?} per run)",
                    animation.loops, animation.frames.len(), animation.duration());

        self.animations
            .send(animation)
            .map_err(|_| ControllerError::PlayerStopped)
    }

    pub fn snapshot(&self) -> ColorBuffer {
        self.pipeline.store().snapshot()
    }

    pub fn buffer_len(&self) -> usize {
        self.pipeline.store().buffer_len()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn ready(&self) -> &Ready {
        &self.ready
    }

    pub fn stats(&self) -> Arc<DeviceStats> {
        Arc::clone(&self.stats)
    }

    /// Turn every LED off
    pub fn blackout(&self) -> Result<(), ControllerError> {
        self.set_colors(vec![0; self.buffer_len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Frame;
    use crate::device::testing::fake_link;
    use crate::error::ValidationError;
    use std::sync::mpsc::Receiver;
    use std::thread;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        controller: Arc<Controller>,
        written: Receiver<Vec<u8>>,
        inbound: Sender<Vec<u8>>,
        halt: Receiver<Halt>,
    }

    fn start(led_count: usize) -> Harness {
        let (link, written, inbound) = fake_link();
        let (halt_tx, halt) = mpsc::channel();
        let config = StripConfig { led_count, ..StripConfig::default() };
        Harness {
            controller: Arc::new(Controller::start(link, &config, halt_tx)),
            written,
            inbound,
            halt,
        }
    }

    impl Harness {
        fn take(&self, n: usize) -> Vec<Vec<u8>> {
            (0..n).map(|_| self.written.recv_timeout(WAIT).unwrap()).collect()
        }

        fn assert_quiet(&self) {
            assert!(self.written.recv_timeout(Duration::from_millis(50)).is_err());
        }
    }

    fn frame(value: u8, len: usize, delay: u64) -> Frame {
        Frame { leds: vec![value; len], delay }
    }

    #[test]
    fn set_colors_updates_snapshot_and_device() {
        let h = start(16);
        let colors: Vec<u8> = (0..48).collect();
        h.controller.set_colors(colors.clone()).unwrap();

        assert_eq!(h.take(1), vec![colors.clone()]);
        assert_eq!(h.controller.snapshot(), colors);
    }

    #[test]
    fn wrong_length_is_rejected_without_writes() {
        let h = start(16);
        h.controller.set_colors(vec![3; 48]).unwrap();
        h.take(1);

        for len in [0, 3, 47, 49] {
            let err = h.controller.set_colors(vec![1; len]).unwrap_err();
            assert!(matches!(
                err,
                ControllerError::Validation(ValidationError::LengthMismatch { expected: 48, .. })
            ));
        }
        h.assert_quiet();
        assert_eq!(h.controller.snapshot(), vec![3; 48]);
    }

    #[test]
    fn two_loop_blink_then_restore() {
        let h = start(16);
        h.controller.set_colors(vec![0; 48]).unwrap();
        assert_eq!(h.take(1), vec![vec![0; 48]]);

        h.controller.play_animation(Animation {
            loops: 2,
            frames: vec![frame(255, 48, 10), frame(0, 48, 10)],
        }).unwrap();

        assert_eq!(h.take(5), vec![
            vec![255; 48],
            vec![0; 48],
            vec![255; 48],
            vec![0; 48],
            vec![0; 48],
        ]);
        h.assert_quiet();
        assert_eq!(h.controller.snapshot(), vec![0; 48]);
    }

    #[test]
    fn n_loops_of_f_frames_write_n_times_f_plus_one() {
        let h = start(2);
        h.controller.set_colors(vec![42; 6]).unwrap();
        h.take(1);

        let anim = Animation {
            loops: 3,
            frames: vec![frame(1, 6, 0), frame(2, 6, 0), frame(3, 6, 1)],
        };
        let expected = anim.write_count();
        assert_eq!(expected, 10);
        h.controller.play_animation(anim).unwrap();

        let written = h.take(expected);
        let frames: Vec<u8> = written[..9].iter().map(|b| b[0]).collect();
        assert_eq!(frames, vec![1, 2, 3, 1, 2, 3, 1, 2, 3]);
        assert_eq!(written[9], vec![42; 6]);
        h.assert_quiet();
    }

    #[test]
    fn zero_loops_leaves_colors_unchanged() {
        let h = start(1);
        h.controller.set_colors(vec![7, 8, 9]).unwrap();
        h.take(1);

        h.controller.play_animation(Animation { loops: 0, frames: vec![frame(255, 3, 0)] }).unwrap();

        assert_eq!(h.take(1), vec![vec![7, 8, 9]]);
        h.assert_quiet();
        assert_eq!(h.controller.snapshot(), vec![7, 8, 9]);
    }

    #[test]
    fn empty_frames_complete_with_restore_only() {
        let h = start(1);
        h.controller.play_animation(Animation { loops: 5, frames: vec![] }).unwrap();
        assert_eq!(h.take(1), vec![vec![0, 0, 0]]);
        h.assert_quiet();
    }

    #[test]
    fn replaying_gives_same_final_state() {
        let h = start(1);
        h.controller.set_colors(vec![10, 20, 30]).unwrap();
        h.take(1);

        let anim = Animation { loops: 2, frames: vec![frame(1, 3, 0), frame(2, 3, 0)] };
        h.controller.play_animation(anim.clone()).unwrap();
        let first = h.take(anim.write_count());
        h.controller.play_animation(anim.clone()).unwrap();
        let second = h.take(anim.write_count());

        assert_eq!(first, second);
        assert_eq!(second.last(), Some(&vec![10, 20, 30]));
        assert_eq!(h.controller.snapshot(), vec![10, 20, 30]);
    }

    #[test]
    fn mis_sized_frame_rejects_whole_animation() {
        let h = start(16);
        for bad in [0, 47] {
            let anim = Animation {
                loops: 1,
                frames: vec![frame(1, 48, 0), frame(2, bad, 0)],
            };
            let err = h.controller.play_animation(anim).unwrap_err();
            assert!(matches!(
                err,
                ControllerError::Validation(ValidationError::FrameLength { index: 1, .. })
            ));
        }
        h.assert_quiet();
        assert_eq!(h.controller.snapshot(), vec![0; 48]);
    }

    #[test]
    fn set_colors_during_playback_is_overwritten() {
        let h = start(1);
        h.controller.play_animation(Animation {
            loops: 1,
            frames: vec![frame(1, 3, 100), frame(2, 3, 0)],
        }).unwrap();

        assert_eq!(h.take(1), vec![vec![1; 3]]);
        h.controller.set_colors(vec![9; 3]).unwrap();

        // direct write, next frame, then the rest state captured before playback
        assert_eq!(h.take(3), vec![vec![9; 3], vec![2; 3], vec![0; 3]]);
        assert_eq!(h.controller.snapshot(), vec![0; 3]);
    }

    #[test]
    fn second_submission_waits_for_a_free_slot() {
        let h = start(1);
        let long = Animation { loops: 1, frames: vec![frame(1, 3, 300)] };

        // first plays, second waits in the slot
        h.controller.play_animation(long.clone()).unwrap();
        assert_eq!(h.take(1), vec![vec![1; 3]]);
        h.controller.play_animation(long.clone()).unwrap();

        let controller = Arc::clone(&h.controller);
        let third = thread::spawn(move || controller.play_animation(long));

        thread::sleep(Duration::from_millis(100));
        assert!(!third.is_finished());
        assert!(h.controller.is_playing());

        // restore of the first lets the second start, which frees the slot
        assert_eq!(h.take(2), vec![vec![0; 3], vec![1; 3]]);
        third.join().unwrap().unwrap();

        // restore of the second, then the third plays
        assert_eq!(h.take(3), vec![vec![0; 3], vec![1; 3], vec![0; 3]]);
    }

    #[test]
    fn concurrent_callers_leave_device_matching_store() {
        let h = start(4);

        for _ in 0..10 {
            let callers: Vec<_> = (1..=4u8)
                .map(|n| {
                    let controller = Arc::clone(&h.controller);
                    thread::spawn(move || {
                        for i in 0..50u8 {
                            controller.set_colors(vec![n * 50 + i; 12]).unwrap();
                        }
                    })
                })
                .collect();

            let written = h.take(200);
            for caller in callers {
                caller.join().unwrap();
            }
            h.assert_quiet();

            // each caller's buffers reach the device in the order it set them
            for n in 1..=4u8 {
                let base = n * 50;
                let mine: Vec<u8> = written.iter()
                    .map(|b| b[0].wrapping_sub(base))
                    .filter(|&i| i < 50)
                    .collect();
                assert_eq!(mine, (0..50).collect::<Vec<u8>>());
            }
            assert_eq!(written.last(), Some(&h.controller.snapshot()));
        }
    }

    #[test]
    fn inbound_bytes_mark_ready() {
        let h = start(1);
        assert!(!h.controller.ready().is_ready());
        h.inbound.send(b"Ready\r\n".to_vec()).unwrap();
        assert!(h.controller.ready().wait_timeout(WAIT));
    }

    #[test]
    fn device_close_is_reported_as_halt() {
        let Harness { controller, halt, inbound, .. } = start(1);
        drop(inbound);
        assert!(matches!(halt.recv_timeout(WAIT).unwrap(), Halt::Device(_)));
        drop(controller);
    }

    #[test]
    fn blackout_turns_everything_off() {
        let h = start(2);
        h.controller.set_colors(vec![200; 6]).unwrap();
        h.controller.blackout().unwrap();
        assert_eq!(h.take(2), vec![vec![200; 6], vec![0; 6]]);
        assert_eq!(h.controller.snapshot(), vec![0; 6]);
    }
}
