//! Mixer integration tests
//!
//! Drive `Mixer::render` directly the way the device callback does.

use std::sync::Arc;
use zenamp_player::audio::{AudioFormat, EqualizerSettings};
use zenamp_player::playback::{level_meter, Mixer, PlaybackStatus};

fn mixer_with(samples: Vec<i16>, format: AudioFormat) -> Mixer {
    let mixer = Mixer::new(EqualizerSettings::default(), None);
    mixer.load(samples, format);
    mixer.play().unwrap();
    mixer
}

/// Render blocks until `frames` output frames are produced; returns frames consumed
fn consumed_after(mixer: &Mixer, blocks: usize, block_frames: usize) -> usize {
    let mut out = vec![0i16; block_frames];
    for _ in 0..blocks {
        assert_eq!(mixer.render(&mut out, 1), block_frames);
    }
    mixer.position_samples()
}

#[test]
fn test_volume_scaling_never_wraps() {
    let inputs: Vec<i16> = vec![i16::MIN, i16::MIN + 1, -20000, -1, 0, 1, 12345, 20000, i16::MAX];

    for volume in (0..=500).step_by(7).chain([500]) {
        let mixer = mixer_with(inputs.clone(), AudioFormat::new(44100, 1));
        mixer.set_volume(volume);

        let mut out = vec![0i16; inputs.len()];
        mixer.render(&mut out, 1);

        for (input, output) in inputs.iter().zip(&out) {
            let expected = (*input as i64 * volume as i64 / 100).clamp(i16::MIN as i64, i16::MAX as i64);
            assert_eq!(*output as i64, expected, "input {} at {}%", input, volume);
        }
    }
}

#[test]
fn test_disabled_equalizer_is_transparent_in_mix() {
    let inputs: Vec<i16> = (0..4096).map(|i| ((i * 7919) % 65536 - 32768) as i16).collect();
    let mixer = mixer_with(inputs.clone(), AudioFormat::new(48000, 2));

    let mut out = vec![0i16; inputs.len()];
    assert_eq!(mixer.render(&mut out, 2), inputs.len() / 2);
    assert_eq!(out, inputs);
}

#[test]
fn test_speed_ratio_converges() {
    for speed in [0.37, 0.5, 1.37, 2.0, 3.9] {
        let mixer = mixer_with(vec![0; 2_000_000], AudioFormat::new(44100, 1));
        mixer.set_speed(speed);

        let produced = 100 * 1000;
        let consumed = consumed_after(&mixer, 100, 1000);
        let ratio = consumed as f64 / produced as f64;
        assert!(
            (ratio - speed).abs() < 1e-3,
            "speed {} consumed {} for {} produced",
            speed,
            consumed,
            produced
        );
    }
}

#[test]
fn test_double_speed_consumes_twice_as_much() {
    let blocks = 50;
    let block_frames = 256;

    let normal = mixer_with(vec![0; 100_000], AudioFormat::new(44100, 1));
    let normal_consumed = consumed_after(&normal, blocks, block_frames);

    let fast = mixer_with(vec![0; 100_000], AudioFormat::new(44100, 1));
    fast.set_speed(2.0);
    let fast_consumed = consumed_after(&fast, blocks, block_frames);

    assert_eq!(normal_consumed, blocks * block_frames);
    assert!(fast_consumed.abs_diff(2 * normal_consumed) <= blocks);
}

#[test]
fn test_varispeed_keeps_channels_in_place() {
    // Left is always positive, right always negative
    let frames: Vec<i16> = (1..=1000).flat_map(|i| [i as i16, -(i as i16)]).collect();
    let mixer = mixer_with(frames, AudioFormat::new(44100, 2));
    mixer.set_speed(1.5);

    let mut out = vec![0i16; 400];
    let produced = mixer.render(&mut out, 2);
    for frame in out[..produced * 2].chunks_exact(2) {
        assert!(frame[0] > 0 && frame[1] < 0, "swapped frame {:?}", frame);
        assert_eq!(frame[0], -frame[1]);
    }
}

#[test]
fn test_busy_lock_from_another_thread_gives_silence() {
    let mixer = Arc::new(mixer_with(vec![1000; 4096], AudioFormat::new(44100, 1)));
    let guard = mixer.hold_lock();

    let callback = Arc::clone(&mixer);
    let (produced, out) = std::thread::spawn(move || {
        let mut out = vec![5i16; 256];
        let produced = callback.render(&mut out, 1);
        (produced, out)
    })
    .join()
    .unwrap();
    drop(guard);

    assert_eq!(produced, 0);
    assert!(out.iter().all(|&s| s == 0));
    assert_eq!(mixer.position_samples(), 0);
    assert_eq!(mixer.monitor().stats().contended_count, 1);
}

#[test]
fn test_pause_zeroes_visualizer() {
    let (meter, reader) = level_meter(4096);
    let mixer = Mixer::new(EqualizerSettings::default(), Some(Box::new(meter)));
    mixer.load(vec![16384; 4096], AudioFormat::new(44100, 1));
    mixer.play().unwrap();

    let mut out = vec![0i16; 512];
    mixer.render(&mut out, 1);
    assert!((reader.peak() - 0.5).abs() < 1e-6);
    assert!(reader.available() > 0);

    assert!(mixer.pause());
    assert_eq!(reader.peak(), 0.0);
    assert_eq!(reader.rms(), 0.0);

    // Paused blocks are silent and not fed
    let fed = reader.blocks_fed();
    mixer.render(&mut out, 1);
    assert_eq!(reader.blocks_fed(), fed);
}

#[test]
fn test_in_place_edit_of_playback_copy_is_private() {
    let original = vec![100i16; 64];
    let mixer = mixer_with(original.clone(), AudioFormat::new(44100, 1));
    mixer.with_buffer_mut(|buffer| buffer.samples_mut().fill(-1)).unwrap();

    let mut out = vec![0i16; 4];
    mixer.render(&mut out, 1);
    assert_eq!(out, vec![-1; 4]);
    assert_eq!(original, vec![100i16; 64]);
}

#[test]
fn test_track_end_marks_finished_once() {
    let mixer = mixer_with(vec![1; 1000], AudioFormat::new(44100, 1));
    let mut out = vec![0i16; 600];

    assert_eq!(mixer.render(&mut out, 1), 600);
    assert!(!mixer.take_finished());
    assert_eq!(mixer.render(&mut out, 1), 400);
    assert_eq!(mixer.status(), PlaybackStatus::Finished);
    assert!(mixer.take_finished());

    // Finished mixer stays silent
    assert_eq!(mixer.render(&mut out, 1), 0);
    assert!(!mixer.take_finished());
}

#[test]
fn test_speed_change_resets_fractional_position() {
    let mixer = mixer_with((1..=32).collect(), AudioFormat::new(8000, 1));
    mixer.set_speed(0.5);

    // Three half-speed frames leave the accumulator half way to the next step
    let mut out = [0i16; 3];
    mixer.render(&mut out, 1);
    assert_eq!(out, [1, 1, 2]);
    assert_eq!(mixer.position_samples(), 1);

    // Restarting at the same speed holds sample 2 for two full frames; a
    // carried-over half step would move on after one
    mixer.set_speed(0.5);
    let mut out = [0i16; 4];
    mixer.render(&mut out, 1);
    assert_eq!(out, [2, 2, 3, 3]);

    mixer.set_speed(1.0);
    let mut out = [0i16; 3];
    mixer.render(&mut out, 1);
    assert_eq!(out, [4, 5, 6]);
    assert_eq!(mixer.position_samples(), 6);
}

fn loud_then_silent(first: AudioFormat, second: AudioFormat) -> Vec<i16> {
    let mixer = Mixer::new(
        EqualizerSettings {
            enabled: true,
            bass_db: 12.0,
            mid_db: 6.0,
            treble_db: -6.0,
        },
        None,
    );
    let frames = 2048;
    let loud: Vec<i16> = (0..frames * first.channels as usize)
        .map(|i| if (i / 64) % 2 == 0 { 20000 } else { -20000 })
        .collect();
    mixer.load(loud, first);
    mixer.play().unwrap();
    let mut out = vec![0i16; frames * first.channels as usize];
    mixer.render(&mut out, first.channels as usize);
    assert!(out.iter().any(|&s| s != 0));

    mixer.load(vec![0; 256 * second.channels as usize], second);
    mixer.play().unwrap();
    let mut out = vec![0i16; 256 * second.channels as usize];
    mixer.render(&mut out, second.channels as usize);
    out
}

#[test]
fn test_new_format_starts_with_clean_filter_history() {
    let out = loud_then_silent(AudioFormat::new(44100, 2), AudioFormat::new(48000, 2));
    assert!(out.iter().all(|&s| s == 0), "filter ringing leaked into the next track");
}

#[test]
fn test_same_format_reload_clears_filter_history() {
    let out = loud_then_silent(AudioFormat::new(44100, 1), AudioFormat::new(44100, 1));
    assert!(out.iter().all(|&s| s == 0), "filter ringing leaked into the next track");
}
