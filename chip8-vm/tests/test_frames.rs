use chip8_vm::{constants::*, prelude::*};

fn headless(bytecode: &[u8]) -> Chip8Vm {
    let mut vm = Chip8Vm::headless(Chip8Conf {
        rng_seed: Some(1),
        ..Chip8Conf::default()
    });
    vm.load_bytecode(bytecode).unwrap();
    vm
}

#[test]
#[rustfmt::skip]
fn test_two_steps() {
    let mut vm = headless(&[
        0x60, 0x05, // LD v0, 5
        0x70, 0x03, // ADD v0, 3
    ]);

    vm.step().unwrap();
    vm.step().unwrap();

    assert_eq!(vm.cpu().register(0), 8);
    assert_eq!(vm.cpu().pc(), 0x204);
}

#[test]
fn test_key_wait_scenario() {
    let mut vm = headless(&[0xF0, 0x0A]);

    assert_eq!(vm.step().unwrap(), Flow::KeyWait);
    assert_eq!(vm.cpu().pc(), 0x200);
    assert_eq!(vm.step().unwrap(), Flow::KeyWait);
    assert_eq!(vm.cpu().pc(), 0x200);

    vm.devices_mut().set_key(KeyCode::KeyA, true);
    vm.step().unwrap();

    assert_eq!(vm.cpu().register(0), 0xA);
    assert_eq!(vm.cpu().pc(), 0x202);
}

#[test]
#[rustfmt::skip]
fn test_frame_ticks_timers_once() {
    let mut vm = headless(&[
        0x60, 0x0A, // LD v0, 10
        0xF0, 0x15, // LD DT, v0
        0xF0, 0x18, // LD ST, v0
        0x12, 0x06, // JP 0x206     ; spin
    ]);

    vm.tick(10).unwrap();
    assert_eq!(vm.cpu().delay_timer(), 9);
    assert_eq!(vm.cpu().sound_timer(), 9);
    assert_eq!(vm.devices().frame_count, 1);
    // One cue when the timer was set, one at the end of the frame.
    assert_eq!(vm.devices().audio_cues, vec![166, 150]);

    for _ in 0..20 {
        vm.run_frame().unwrap();
    }
    assert_eq!(vm.cpu().delay_timer(), 0);
    assert_eq!(vm.cpu().sound_timer(), 0);
    assert_eq!(vm.devices().frame_count, 21);
    // No cue once the timer ran out.
    assert_eq!(vm.devices().audio_cues.len(), 10);
}

#[test]
#[rustfmt::skip]
fn test_frame_presents_display() {
    let mut vm = headless(&[
        0x60, 0x00, // LD v0, 0
        0xF0, 0x29, // LD F, v0
        0xD0, 0x05, // DRW v0, v0, 5
        0x12, 0x06, // JP 0x206
    ]);

    vm.tick(3).unwrap();

    let frame = vm.devices().frame.as_ref().expect("no frame was drawn");
    assert!(frame == vm.cpu().display());
    // Glyph zero is 14 pixels.
    assert_eq!(frame.lit(), 14);
    assert_eq!(frame.get(0, 0), 1);
    assert_eq!(frame.get(1, 1), 0);
}

#[test]
fn test_fatal_error_aborts_frame() {
    let mut vm = headless(&[0x60, 0x01, 0xFF, 0xFF]);

    let err = vm.tick(10).unwrap_err();
    assert!(matches!(err, Chip8Error::Decode { opcode: 0xFFFF, address: 0x202 }));
    assert_eq!(vm.devices().frame_count, 0);
    assert_eq!(vm.devices().errors, vec![err.to_string()]);

    assert!(matches!(vm.run_frame(), Err(Chip8Error::Halted)));
    assert_eq!(vm.devices().errors.len(), 1);
}

#[test]
fn test_program_too_large_halts() {
    let mut vm = headless(&[0x60, 0x05, 0x12, 0x00]);
    let rom = vec![0; MEM_SIZE - MEM_START + 1];

    assert!(matches!(
        vm.load_bytecode(&rom),
        Err(Chip8Error::InvalidProgramLoad { size: 3585, capacity: 3584 })
    ));
    assert!(vm.is_halted());
    assert_eq!(vm.devices().errors.len(), 1);
    assert!(matches!(vm.step(), Err(Chip8Error::Halted)));
    assert_eq!(vm.devices().errors.len(), 1);

    // A program that fits starts the machine again.
    vm.load_bytecode(&[0x60, 0x05]).unwrap();
    assert!(!vm.is_halted());
    vm.step().unwrap();
    assert_eq!(vm.cpu().register(0), 5);
}

#[test]
fn test_load_file() {
    let path = std::env::temp_dir().join(format!("chip8-vm-test-{}.rom", std::process::id()));
    std::fs::write(&path, [0x61, 0x2A]).unwrap();

    let mut vm = Chip8Vm::headless(Chip8Conf::default());
    vm.load_file(&path).unwrap();
    vm.step().unwrap();
    assert_eq!(vm.cpu().register(1), 0x2A);

    std::fs::remove_file(&path).unwrap();
    assert!(matches!(vm.load_file(&path), Err(Chip8Error::Io(_))));
}

#[test]
fn test_snapshot_restore() {
    let mut vm = headless(&[0x60, 0x05, 0x70, 0x03, 0x12, 0x04]);
    let start = vm.snapshot();

    vm.tick(5).unwrap();
    assert_eq!(vm.cpu().register(0), 8);

    vm.restore_snapshot(&start);
    assert!(vm.snapshot() == start);
    assert_eq!(vm.cpu().register(0), 0);
    assert_eq!(vm.cpu().pc(), 0x200);
}
